use std::sync::Arc;

use super::{invalidate_after_failed_write, log_cache_failure};
use crate::cache::{Aggregate, CacheCoordinator, Record};
use crate::context::RequestContext;
use crate::db::TodoStore;
use crate::error::Result;
use crate::types::{NewItem, TodoItem, UpdateItemInput};

#[derive(Clone)]
pub struct ItemService {
  store: Arc<dyn TodoStore>,
  cache: CacheCoordinator,
}

impl ItemService {
  pub fn new(store: Arc<dyn TodoStore>, cache: CacheCoordinator) -> Self {
    Self { store, cache }
  }

  pub async fn create(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
    item: &NewItem,
  ) -> Result<i64> {
    item.validate()?;
    let id = match self.store.create_item(ctx, user_id, list_id, item).await {
      Ok(id) => id,
      Err(e) => return Err(invalidate_after_failed_write(&self.cache, ctx, user_id, e).await),
    };
    tracing::info!(user_id, list_id, item_id = id, "item created");

    log_cache_failure(
      user_id,
      self
        .cache
        .invalidate_aggregate(&ctx.detached(), user_id, Aggregate::ItemsInList(list_id))
        .await,
    );
    Ok(id)
  }

  pub async fn get_all(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
  ) -> Result<Vec<TodoItem>> {
    self
      .cache
      .read_through(ctx, user_id, Aggregate::ItemsInList(list_id), || {
        self.store.get_all_items(ctx, user_id, list_id)
      })
      .await
  }

  pub async fn get(&self, ctx: &RequestContext, user_id: i64, item_id: i64) -> Result<TodoItem> {
    self
      .cache
      .read_through(ctx, user_id, Record::Item(item_id), || {
        self.store.get_item(ctx, user_id, item_id)
      })
      .await
  }

  pub async fn update(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    item_id: i64,
    input: &UpdateItemInput,
  ) -> Result<()> {
    input.validate()?;
    if let Err(e) = self.store.update_item(ctx, user_id, item_id, input).await {
      return Err(invalidate_after_failed_write(&self.cache, ctx, user_id, e).await);
    }
    log_cache_failure(
      user_id,
      self.cache.invalidate_user(&ctx.detached(), user_id).await,
    );
    Ok(())
  }

  pub async fn delete(&self, ctx: &RequestContext, user_id: i64, item_id: i64) -> Result<()> {
    if let Err(e) = self.store.delete_item(ctx, user_id, item_id).await {
      return Err(invalidate_after_failed_write(&self.cache, ctx, user_id, e).await);
    }
    log_cache_failure(
      user_id,
      self.cache.invalidate_user(&ctx.detached(), user_id).await,
    );
    Ok(())
  }
}
