//! REST surface over the services.

use axum::{
  extract::{rejection::JsonRejection, Path, Request, State},
  http::StatusCode,
  middleware::Next,
  response::{IntoResponse, Response},
  routing::{get, post},
  Extension, Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::ServerConfig;
use crate::context::RequestContext;
use crate::error::Error;
use crate::service::Services;
use crate::types::{NewItem, NewList, NewUser, SignInInput, UpdateItemInput, UpdateListInput};

#[derive(Clone)]
struct AppState {
  services: Services,
  request_timeout: Duration,
}

/// Identity resolved from the bearer token.
#[derive(Debug, Clone, Copy)]
struct UserId(i64);

pub struct ApiServer {
  services: Services,
  config: ServerConfig,
}

impl ApiServer {
  pub fn new(services: Services, config: ServerConfig) -> Self {
    Self { services, config }
  }

  pub fn router(&self) -> Router {
    let state = AppState {
      services: self.services.clone(),
      request_timeout: self.config.limits.request_timeout(),
    };

    let api_routes = Router::new()
      .route("/api/lists", post(create_list).get(get_all_lists))
      .route(
        "/api/lists/{id}",
        get(get_list).put(update_list).delete(delete_list),
      )
      .route("/api/lists/{id}/items", post(create_item).get(get_all_items))
      .route(
        "/api/items/{id}",
        get(get_item).put(update_item).delete(delete_item),
      )
      .layer(axum::middleware::from_fn_with_state(
        state.clone(),
        require_user,
      ));

    let cors = if self.config.server.cors_origins.is_empty()
      || self.config.server.cors_origins.iter().any(|o| o == "*")
    {
      CorsLayer::permissive()
    } else {
      let origins: Vec<_> = self
        .config
        .server
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
      CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
    };

    Router::new()
      .route("/health", get(health_check))
      .route("/auth/sign-up", post(sign_up))
      .route("/auth/sign-in", post(sign_in))
      .merge(api_routes)
      .layer(axum::middleware::from_fn_with_state(
        state.clone(),
        attach_context,
      ))
      .layer(TraceLayer::new_for_http())
      .layer(cors)
      .with_state(state)
  }

  pub async fn run(
    &self,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
  ) -> Result<(), anyhow::Error> {
    let app = self.router();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP API at http://{}", addr);

    axum::serve(listener, app.into_make_service())
      .with_graceful_shutdown(async move {
        shutdown.await;
        tracing::info!("HTTP server shutting down");
      })
      .await?;
    Ok(())
  }
}

// =============================================================================
// Middleware
// =============================================================================

/// Give every request its own context and deadline.
async fn attach_context(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
  let ctx = RequestContext::with_timeout(state.request_timeout);
  req.extensions_mut().insert(ctx);
  next.run(req).await
}

fn extract_bearer(req: &Request) -> Option<&str> {
  req
    .headers()
    .get("Authorization")
    .and_then(|v| v.to_str().ok())
    .and_then(|s| s.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|s| !s.is_empty())
}

async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
  let Some(token) = extract_bearer(&req) else {
    return ApiError(Error::auth("missing bearer token")).into_response();
  };

  match state.services.auth.resolve(token) {
    Ok(user_id) => {
      req.extensions_mut().insert(UserId(user_id));
      next.run(req).await
    }
    Err(e) => ApiError(e).into_response(),
  }
}

// =============================================================================
// Handlers
// =============================================================================

async fn health_check(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
) -> Json<serde_json::Value> {
  let cache = state.services.cache.store().ping(&ctx).await.is_ok();
  Json(json!({ "status": "ok", "cache": cache }))
}

async fn sign_up(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
  let Json(user) = payload?;
  let id = state.services.auth.sign_up(&ctx, &user).await?;
  Ok(Json(json!({ "id": id })))
}

async fn sign_in(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  payload: Result<Json<SignInInput>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
  let Json(input) = payload?;
  let token = state.services.auth.sign_in(&ctx, &input).await?;
  Ok(Json(json!({ "token": token })))
}

async fn create_list(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  Extension(UserId(user_id)): Extension<UserId>,
  payload: Result<Json<NewList>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
  let Json(list) = payload?;
  let id = state.services.lists.create(&ctx, user_id, &list).await?;
  Ok(Json(json!({ "id": id })))
}

async fn get_all_lists(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Json<serde_json::Value>, ApiError> {
  let lists = state.services.lists.get_all(&ctx, user_id).await?;
  Ok(Json(json!({ "data": lists })))
}

async fn get_list(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  Extension(UserId(user_id)): Extension<UserId>,
  Path(id): Path<i64>,
) -> Result<Response, ApiError> {
  let list = state.services.lists.get(&ctx, user_id, id).await?;
  Ok(Json(list).into_response())
}

async fn update_list(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  Extension(UserId(user_id)): Extension<UserId>,
  Path(id): Path<i64>,
  payload: Result<Json<UpdateListInput>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
  let Json(input) = payload?;
  state.services.lists.update(&ctx, user_id, id, &input).await?;
  Ok(status_ok())
}

async fn delete_list(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  Extension(UserId(user_id)): Extension<UserId>,
  Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
  state.services.lists.delete(&ctx, user_id, id).await?;
  Ok(status_ok())
}

async fn create_item(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  Extension(UserId(user_id)): Extension<UserId>,
  Path(list_id): Path<i64>,
  payload: Result<Json<NewItem>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
  let Json(item) = payload?;
  let id = state
    .services
    .items
    .create(&ctx, user_id, list_id, &item)
    .await?;
  Ok(Json(json!({ "id": id })))
}

async fn get_all_items(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  Extension(UserId(user_id)): Extension<UserId>,
  Path(list_id): Path<i64>,
) -> Result<Response, ApiError> {
  let items = state.services.items.get_all(&ctx, user_id, list_id).await?;
  Ok(Json(items).into_response())
}

async fn get_item(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  Extension(UserId(user_id)): Extension<UserId>,
  Path(id): Path<i64>,
) -> Result<Response, ApiError> {
  let item = state.services.items.get(&ctx, user_id, id).await?;
  Ok(Json(item).into_response())
}

async fn update_item(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  Extension(UserId(user_id)): Extension<UserId>,
  Path(id): Path<i64>,
  payload: Result<Json<UpdateItemInput>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
  let Json(input) = payload?;
  state.services.items.update(&ctx, user_id, id, &input).await?;
  Ok(status_ok())
}

async fn delete_item(
  State(state): State<AppState>,
  Extension(ctx): Extension<RequestContext>,
  Extension(UserId(user_id)): Extension<UserId>,
  Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
  state.services.items.delete(&ctx, user_id, id).await?;
  Ok(status_ok())
}

fn status_ok() -> Json<serde_json::Value> {
  Json(json!({ "status": "ok" }))
}

// =============================================================================
// Error Handling
// =============================================================================

struct ApiError(Error);

impl From<Error> for ApiError {
  fn from(e: Error) -> Self {
    Self(e)
  }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self {
    Self(Error::validation(e.body_text()))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, msg) = match self.0 {
      Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
      Error::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
      Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
      Error::Store(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
      }
    };
    (status, Json(json!({ "message": msg }))).into_response()
  }
}
