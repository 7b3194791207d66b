//! Per-user hash cache in front of the relational store
//!
//! - `user:{id}` hash keys holding serialized query results
//! - set-if-absent populates with a key-level TTL reset
//! - in-memory and Redis stores behind one trait

pub mod config;
mod coordinator;
pub mod key;
mod redis_store;
mod store;

use std::sync::Arc;

pub use config::{CacheConfig, CacheMode, RedisConfig};
pub use coordinator::CacheCoordinator;
pub use key::{user_key, Aggregate, CacheField, Record};
pub use redis_store::RedisHashCache;
pub use store::{CacheError, CacheStats, HashCacheStore, HashCommand, InMemoryHashCache};

/// Build the configured cache store. The in-memory store gets its expiry
/// sweeper when an interval is configured.
pub async fn connect(config: &CacheConfig) -> anyhow::Result<Arc<dyn HashCacheStore>> {
  match config.mode {
    CacheMode::Memory => {
      let store = Arc::new(InMemoryHashCache::new());
      if let Some(interval) = config.sweep_interval() {
        store.spawn_sweeper(interval);
      }
      tracing::info!("Cache: in-memory (ttl {}s)", config.ttl_secs);
      Ok(store)
    }
    CacheMode::Redis => {
      let store = RedisHashCache::new(&config.redis).await?;
      tracing::info!(
        "Cache: redis at {}:{} (ttl {}s)",
        config.redis.host,
        config.redis.port,
        config.ttl_secs
      );
      Ok(Arc::new(store))
    }
  }
}
