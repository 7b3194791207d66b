//! Redis-backed hash cache

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};
use std::sync::atomic::{AtomicU64, Ordering};

use super::config::RedisConfig;
use super::store::{CacheError, CacheStats, HashCacheStore, HashCommand};
use crate::context::RequestContext;

impl From<RedisError> for CacheError {
  fn from(err: RedisError) -> Self {
    CacheError::Unavailable(err.to_string())
  }
}

/// Hash cache on an external Redis server. Batches go out as one
/// `MULTI`/`EXEC` pipeline.
pub struct RedisHashCache {
  connection: ConnectionManager,
  hits: AtomicU64,
  misses: AtomicU64,
}

impl RedisHashCache {
  pub async fn new(config: &RedisConfig) -> Result<Self, RedisError> {
    let client = Client::open(config.connection_url())?;
    let connection = ConnectionManager::new(client).await?;

    Ok(Self {
      connection,
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
    })
  }
}

/// One `MULTI`/`EXEC` transaction carrying the batch against `key`.
fn build_pipeline(key: &str, commands: &[HashCommand]) -> redis::Pipeline {
  let mut pipe = redis::pipe();
  pipe.atomic();
  for command in commands {
    match command {
      HashCommand::HSetNx { field, value } => {
        pipe.hset_nx(key, field, value);
      }
      HashCommand::Expire(ttl) => {
        pipe.expire(key, ttl.as_secs().max(1) as i64);
      }
      HashCommand::HDel { field } => {
        pipe.hdel(key, field);
      }
      HashCommand::Del => {
        pipe.del(key);
      }
    }
  }
  pipe
}

#[async_trait]
impl HashCacheStore for RedisHashCache {
  async fn hget(
    &self,
    ctx: &RequestContext,
    key: &str,
    field: &str,
  ) -> Result<Option<String>, CacheError> {
    let mut conn = self.connection.clone();
    let value: Option<String> = ctx.bound(conn.hget(key, field)).await??;

    if value.is_some() {
      self.hits.fetch_add(1, Ordering::Relaxed);
    } else {
      self.misses.fetch_add(1, Ordering::Relaxed);
    }
    Ok(value)
  }

  async fn execute(
    &self,
    ctx: &RequestContext,
    key: &str,
    commands: &[HashCommand],
  ) -> Result<Vec<i64>, CacheError> {
    let pipe = build_pipeline(key, commands);
    let mut conn = self.connection.clone();
    let replies: Vec<i64> = ctx.bound(pipe.query_async(&mut conn)).await??;
    Ok(replies)
  }

  async fn ping(&self, ctx: &RequestContext) -> Result<(), CacheError> {
    let mut conn = self.connection.clone();
    ctx
      .bound(redis::cmd("PING").query_async::<()>(&mut conn))
      .await??;
    Ok(())
  }

  async fn info(&self) -> CacheStats {
    let mut conn = self.connection.clone();
    let keys = match redis::cmd("DBSIZE").query_async::<usize>(&mut conn).await {
      Ok(n) => n,
      Err(e) => {
        tracing::debug!(error = %e, "DBSIZE failed");
        0
      }
    };
    CacheStats {
      keys,
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      expired: 0,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  fn packed(pipe: &redis::Pipeline) -> String {
    String::from_utf8_lossy(&pipe.get_packed_pipeline()).into_owned()
  }

  #[test]
  fn test_populate_is_one_transaction() {
    let commands = vec![
      HashCommand::HSetNx {
        field: "lists".into(),
        value: "[]".into(),
      },
      HashCommand::Expire(Duration::from_secs(3600)),
    ];
    let wire = packed(&build_pipeline("user:7", &commands));

    let multi = wire.find("MULTI").unwrap();
    let hsetnx = wire.find("HSETNX").unwrap();
    let expire = wire.find("EXPIRE").unwrap();
    let exec = wire.find("EXEC").unwrap();
    assert!(multi < hsetnx && hsetnx < expire && expire < exec);
    assert!(wire.contains("user:7"));
    assert!(wire.contains("3600"));
  }

  #[test]
  fn test_sub_second_ttl_rounds_up() {
    let wire = packed(&build_pipeline(
      "user:1",
      &[HashCommand::Expire(Duration::from_millis(10))],
    ));
    assert!(wire.contains("EXPIRE\r\n$6\r\nuser:1\r\n$1\r\n1\r\n"));
  }

  #[test]
  fn test_invalidations_are_wrapped() {
    let wire = packed(&build_pipeline(
      "user:3",
      &[
        HashCommand::HDel {
          field: "items:list9".into(),
        },
        HashCommand::Del,
      ],
    ));
    let multi = wire.find("MULTI").unwrap();
    let hdel = wire.find("HDEL").unwrap();
    let del = wire.rfind("DEL").unwrap();
    let exec = wire.find("EXEC").unwrap();
    assert!(multi < hdel && hdel < del && del < exec);
    assert!(wire.contains("items:list9"));
  }

  #[test]
  fn test_tls_url_is_accepted() {
    let config = RedisConfig {
      tls_enabled: true,
      ..RedisConfig::default()
    };
    assert!(config.connection_url().starts_with("rediss://"));
    assert!(Client::open(config.connection_url()).is_ok());
  }
}
