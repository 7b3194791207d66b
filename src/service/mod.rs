//! Application services. Writes go to the store first, then invalidate the
//! cache; reads go through the cache.

mod auth;
mod items;
mod lists;

use std::sync::Arc;

pub use auth::AuthService;
pub use items::ItemService;
pub use lists::ListService;

use crate::auth::TokenIssuer;
use crate::cache::{CacheCoordinator, CacheError};
use crate::context::RequestContext;
use crate::db::TodoStore;
use crate::error::Error;

/// Dependency container handed to the HTTP layer.
#[derive(Clone)]
pub struct Services {
  pub auth: AuthService,
  pub lists: ListService,
  pub items: ItemService,
  pub cache: CacheCoordinator,
}

impl Services {
  pub fn new(store: Arc<dyn TodoStore>, cache: CacheCoordinator, tokens: TokenIssuer) -> Self {
    Self {
      auth: AuthService::new(store.clone(), tokens),
      lists: ListService::new(store.clone(), cache.clone()),
      items: ItemService::new(store, cache.clone()),
      cache,
    }
  }
}

/// A failed invalidation leaves the entry to expire on its own.
fn log_cache_failure(user_id: i64, result: Result<(), CacheError>) {
  if let Err(e) = result {
    tracing::warn!(user_id, error = %e, "cache invalidation failed");
  }
}

/// Handle a write that returned an error. A store error may have come after
/// the commit (a deadline or a dropped connection), so the user's whole cache
/// is dropped before the error is passed on.
async fn invalidate_after_failed_write(
  cache: &CacheCoordinator,
  ctx: &RequestContext,
  user_id: i64,
  err: Error,
) -> Error {
  if matches!(err, Error::Store(_)) {
    tracing::warn!(user_id, error = %err, "write failed, dropping user cache");
    log_cache_failure(user_id, cache.invalidate_user(&ctx.detached(), user_id).await);
  }
  err
}
