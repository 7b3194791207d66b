mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::Harness;
use listkeep::server::{ApiServer, ServerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app() -> Router {
  let h = Harness::new().await;
  ApiServer::new(h.services.clone(), ServerConfig::default()).router()
}

async fn send(
  app: &Router,
  method: &str,
  uri: &str,
  token: Option<&str>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut req = Request::builder().method(method).uri(uri);
  if let Some(token) = token {
    req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
  }
  let req = match body {
    Some(body) => req
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(body.to_string()))
      .unwrap(),
    None => req.body(Body::empty()).unwrap(),
  };

  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, value)
}

async fn sign_in(app: &Router, username: &str) -> String {
  let (status, _) = send(
    app,
    "POST",
    "/auth/sign-up",
    None,
    Some(json!({"name": username, "username": username, "password": "pw"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (status, body) = send(
    app,
    "POST",
    "/auth/sign-in",
    None,
    Some(json!({"username": username, "password": "pw"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/health", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ok");
  assert_eq!(body["cache"], true);
}

#[tokio::test]
async fn test_api_requires_token() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/api/lists", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert!(body["message"].is_string());

  let (status, _) = send(&app, "GET", "/api/lists", Some("1.2.abcd"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
  let app = app().await;
  sign_in(&app, "alice").await;
  let (status, body) = send(
    &app,
    "POST",
    "/auth/sign-in",
    None,
    Some(json!({"username": "alice", "password": "nope"})),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["message"], "invalid username or password");
}

#[tokio::test]
async fn test_list_and_item_flow() {
  let app = app().await;
  let token = sign_in(&app, "alice").await;
  let t = Some(token.as_str());

  let (status, body) = send(
    &app,
    "POST",
    "/api/lists",
    t,
    Some(json!({"title": "Groceries"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let list_id = body["id"].as_i64().unwrap();

  let (status, body) = send(&app, "GET", "/api/lists", t, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    body,
    json!({"data": [{"id": list_id, "title": "Groceries", "description": ""}]})
  );

  let (status, _) = send(
    &app,
    "PUT",
    &format!("/api/lists/{}", list_id),
    t,
    Some(json!({"description": "weekly"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  let (_, body) = send(&app, "GET", &format!("/api/lists/{}", list_id), t, None).await;
  assert_eq!(body["title"], "Groceries");
  assert_eq!(body["description"], "weekly");

  let (status, body) = send(
    &app,
    "POST",
    &format!("/api/lists/{}/items", list_id),
    t,
    Some(json!({"title": "Milk", "description": "2 liters"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let item_id = body["id"].as_i64().unwrap();

  let (_, body) = send(&app, "GET", &format!("/api/lists/{}/items", list_id), t, None).await;
  assert_eq!(body.as_array().unwrap().len(), 1);
  assert_eq!(body[0]["done"], false);

  let (status, body) = send(
    &app,
    "PUT",
    &format!("/api/items/{}", item_id),
    t,
    Some(json!({"done": true})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ok");

  let (_, body) = send(&app, "GET", &format!("/api/items/{}", item_id), t, None).await;
  assert_eq!(body["done"], true);

  let (status, _) = send(&app, "DELETE", &format!("/api/items/{}", item_id), t, None).await;
  assert_eq!(status, StatusCode::OK);
  let (status, _) = send(&app, "GET", &format!("/api/items/{}", item_id), t, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = send(&app, "DELETE", &format!("/api/lists/{}", list_id), t, None).await;
  assert_eq!(status, StatusCode::OK);
  let (_, body) = send(&app, "GET", "/api/lists", t, None).await;
  assert_eq!(body, json!({"data": []}));
}

#[tokio::test]
async fn test_error_mapping() {
  let app = app().await;
  let token = sign_in(&app, "alice").await;
  let t = Some(token.as_str());

  let (status, body) = send(&app, "PUT", "/api/lists/1", t, Some(json!({}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["message"].as_str().unwrap().contains("no fields to update"));

  let (status, _) = send(&app, "POST", "/api/lists", t, Some(json!({"title": ""}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(&app, "POST", "/api/lists", t, Some(json!({"nope": 1}))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, body) = send(&app, "GET", "/api/lists/404", t, None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_users_cannot_see_each_other() {
  let app = app().await;
  let alice = sign_in(&app, "alice").await;
  let bob = sign_in(&app, "bob").await;

  let (_, body) = send(
    &app,
    "POST",
    "/api/lists",
    Some(&alice),
    Some(json!({"title": "Diary"})),
  )
  .await;
  let list_id = body["id"].as_i64().unwrap();

  let (status, _) = send(&app, "GET", &format!("/api/lists/{}", list_id), Some(&bob), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, _) = send(
    &app,
    "DELETE",
    &format!("/api/lists/{}", list_id),
    Some(&bob),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (_, body) = send(&app, "GET", "/api/lists", Some(&bob), None).await;
  assert_eq!(body, json!({"data": []}));
}
