use std::sync::Arc;

use super::{invalidate_after_failed_write, log_cache_failure};
use crate::cache::{Aggregate, CacheCoordinator, Record};
use crate::context::RequestContext;
use crate::db::TodoStore;
use crate::error::Result;
use crate::types::{NewList, TodoList, UpdateListInput};

#[derive(Clone)]
pub struct ListService {
  store: Arc<dyn TodoStore>,
  cache: CacheCoordinator,
}

impl ListService {
  pub fn new(store: Arc<dyn TodoStore>, cache: CacheCoordinator) -> Self {
    Self { store, cache }
  }

  pub async fn create(&self, ctx: &RequestContext, user_id: i64, list: &NewList) -> Result<i64> {
    list.validate()?;
    let id = match self.store.create_list(ctx, user_id, list).await {
      Ok(id) => id,
      Err(e) => return Err(invalidate_after_failed_write(&self.cache, ctx, user_id, e).await),
    };
    tracing::info!(user_id, list_id = id, "list created");

    log_cache_failure(
      user_id,
      self
        .cache
        .invalidate_aggregate(&ctx.detached(), user_id, Aggregate::Lists)
        .await,
    );
    Ok(id)
  }

  pub async fn get_all(&self, ctx: &RequestContext, user_id: i64) -> Result<Vec<TodoList>> {
    self
      .cache
      .read_through(ctx, user_id, Aggregate::Lists, || {
        self.store.get_all_lists(ctx, user_id)
      })
      .await
  }

  pub async fn get(&self, ctx: &RequestContext, user_id: i64, list_id: i64) -> Result<TodoList> {
    self
      .cache
      .read_through(ctx, user_id, Record::List(list_id), || {
        self.store.get_list(ctx, user_id, list_id)
      })
      .await
  }

  pub async fn update(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
    input: &UpdateListInput,
  ) -> Result<()> {
    input.validate()?;
    if let Err(e) = self.store.update_list(ctx, user_id, list_id, input).await {
      return Err(invalidate_after_failed_write(&self.cache, ctx, user_id, e).await);
    }
    log_cache_failure(
      user_id,
      self.cache.invalidate_user(&ctx.detached(), user_id).await,
    );
    Ok(())
  }

  pub async fn delete(&self, ctx: &RequestContext, user_id: i64, list_id: i64) -> Result<()> {
    if let Err(e) = self.store.delete_list(ctx, user_id, list_id).await {
      return Err(invalidate_after_failed_write(&self.cache, ctx, user_id, e).await);
    }
    tracing::info!(user_id, list_id, "list deleted");
    log_cache_failure(
      user_id,
      self.cache.invalidate_user(&ctx.detached(), user_id).await,
    );
    Ok(())
  }
}
