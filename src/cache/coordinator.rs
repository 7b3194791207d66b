//! Cache-aside coordinator.
//!
//! Reads look up the user's hash and report a miss as `Ok(None)`. Populates use
//! set-if-absent followed by an expiry reset in one atomic batch, so a slow
//! populate from a stale read can never overwrite a value written after it.
//! Invalidation either drops a single aggregate field or the whole user key.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::key::{user_key, Aggregate, CacheField, Record};
use super::store::{CacheError, HashCacheStore, HashCommand};
use crate::context::RequestContext;

#[derive(Clone)]
pub struct CacheCoordinator {
  store: Arc<dyn HashCacheStore>,
  ttl: Duration,
}

impl CacheCoordinator {
  pub fn new(store: Arc<dyn HashCacheStore>, ttl: Duration) -> Self {
    Self { store, ttl }
  }

  pub fn store(&self) -> &Arc<dyn HashCacheStore> {
    &self.store
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  /// Raw serialized value of `field`, or `None` on a miss.
  pub async fn read_raw(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    field: impl Into<CacheField>,
  ) -> Result<Option<String>, CacheError> {
    let field = field.into();
    self.store.hget(ctx, &user_key(user_id), &field.name()).await
  }

  /// Set `field` to an already serialized value unless it is present, then
  /// reset the user's expiry. Returns whether the field was written.
  pub async fn write_raw(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    field: impl Into<CacheField>,
    serialized: String,
  ) -> Result<bool, CacheError> {
    let field = field.into();
    let replies = self
      .store
      .execute(
        ctx,
        &user_key(user_id),
        &[
          HashCommand::HSetNx {
            field: field.name(),
            value: serialized,
          },
          HashCommand::Expire(self.ttl),
        ],
      )
      .await?;

    let written = replies.first().copied() == Some(1);
    if !written {
      tracing::debug!(user_id, %field, "cache populate skipped, field already set");
    }
    Ok(written)
  }

  async fn read<T: DeserializeOwned>(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    field: CacheField,
  ) -> Result<Option<T>, CacheError> {
    let Some(raw) = self.read_raw(ctx, user_id, field).await? else {
      tracing::debug!(user_id, %field, "cache miss");
      return Ok(None);
    };

    match serde_json::from_str(&raw) {
      Ok(value) => {
        tracing::debug!(user_id, %field, "cache hit");
        Ok(Some(value))
      }
      Err(e) => {
        tracing::warn!(user_id, %field, error = %e, "dropping undecodable cache entry");
        self
          .store
          .execute(
            ctx,
            &user_key(user_id),
            &[HashCommand::HDel {
              field: field.name(),
            }],
          )
          .await?;
        Ok(None)
      }
    }
  }

  async fn write<T: Serialize + ?Sized>(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    field: CacheField,
    data: &T,
  ) -> Result<bool, CacheError> {
    let serialized = serde_json::to_string(data).map_err(|e| CacheError::Encode(e.to_string()))?;
    self.write_raw(ctx, user_id, field, serialized).await
  }

  pub async fn read_all<T: DeserializeOwned>(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    aggregate: Aggregate,
  ) -> Result<Option<T>, CacheError> {
    self.read(ctx, user_id, aggregate.into()).await
  }

  pub async fn read_one<T: DeserializeOwned>(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    record: Record,
  ) -> Result<Option<T>, CacheError> {
    self.read(ctx, user_id, record.into()).await
  }

  pub async fn write_aggregate<T: Serialize + ?Sized>(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    aggregate: Aggregate,
    data: &T,
  ) -> Result<bool, CacheError> {
    self.write(ctx, user_id, aggregate.into(), data).await
  }

  pub async fn write_one<T: Serialize + ?Sized>(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    record: Record,
    data: &T,
  ) -> Result<bool, CacheError> {
    self.write(ctx, user_id, record.into(), data).await
  }

  pub async fn invalidate_aggregate(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    aggregate: Aggregate,
  ) -> Result<(), CacheError> {
    let field = CacheField::from(aggregate);
    self
      .store
      .execute(
        ctx,
        &user_key(user_id),
        &[HashCommand::HDel {
          field: field.name(),
        }],
      )
      .await?;
    tracing::debug!(user_id, %field, "cache field invalidated");
    Ok(())
  }

  pub async fn invalidate_user(&self, ctx: &RequestContext, user_id: i64) -> Result<(), CacheError> {
    self
      .store
      .execute(ctx, &user_key(user_id), &[HashCommand::Del])
      .await?;
    tracing::debug!(user_id, "user cache invalidated");
    Ok(())
  }

  /// Serve `field` from the cache, or run `loader` once and populate.
  ///
  /// Cache failures never fail the read: an unavailable cache is treated as
  /// a miss and the populate is skipped.
  pub async fn read_through<T, F, Fut>(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    field: impl Into<CacheField>,
    loader: F,
  ) -> crate::Result<T>
  where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
  {
    let field = field.into();
    let cache_available = match self.read::<T>(ctx, user_id, field).await {
      Ok(Some(value)) => return Ok(value),
      Ok(None) => true,
      Err(e) => {
        tracing::warn!(user_id, %field, error = %e, "cache read failed, using store");
        false
      }
    };

    let value = loader().await?;

    if cache_available {
      if let Err(e) = self.write(ctx, user_id, field, &value).await {
        tracing::warn!(user_id, %field, error = %e, "cache populate failed");
      }
    }
    Ok(value)
  }
}
