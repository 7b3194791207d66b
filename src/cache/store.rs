//! Hash cache store trait and the in-memory implementation

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::RequestContext;

/// The cache could not be reached or did not answer in time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
  #[error("cache unavailable: {0}")]
  Unavailable(String),

  /// A value could not be serialized for storage.
  #[error("cache encode error: {0}")]
  Encode(String),
}

impl CacheError {
  pub fn unavailable(msg: impl Into<String>) -> Self {
    Self::Unavailable(msg.into())
  }
}

impl From<crate::context::DeadlineExceeded> for CacheError {
  fn from(err: crate::context::DeadlineExceeded) -> Self {
    Self::Unavailable(err.to_string())
  }
}

/// One step of a pipelined batch against a single hash key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashCommand {
  /// Set `field` only if it is absent. Yields 1 when written, 0 otherwise.
  HSetNx { field: String, value: String },
  /// Reset the key's expiry. Yields 1 when the key exists, 0 otherwise.
  Expire(Duration),
  /// Remove `field`. Yields the number of fields removed.
  HDel { field: String },
  /// Remove the whole key. Yields the number of keys removed.
  Del,
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
  pub keys: usize,
  pub hits: u64,
  pub misses: u64,
  pub expired: u64,
}

impl CacheStats {
  pub fn hit_rate(&self) -> f64 {
    let total = self.hits + self.misses;
    if total == 0 {
      0.0
    } else {
      self.hits as f64 / total as f64
    }
  }
}

/// A store of per-key string hashes with key-level expiry.
#[async_trait]
pub trait HashCacheStore: Send + Sync {
  /// Read one field. `Ok(None)` is a miss.
  async fn hget(
    &self,
    ctx: &RequestContext,
    key: &str,
    field: &str,
  ) -> Result<Option<String>, CacheError>;

  /// Apply `commands` to `key` as one atomic batch, returning one reply per
  /// command in order.
  async fn execute(
    &self,
    ctx: &RequestContext,
    key: &str,
    commands: &[HashCommand],
  ) -> Result<Vec<i64>, CacheError>;

  async fn ping(&self, ctx: &RequestContext) -> Result<(), CacheError>;

  async fn info(&self) -> CacheStats;
}

#[derive(Debug, Clone, Default)]
struct HashEntry {
  fields: HashMap<String, String>,
  expires_at: Option<Instant>,
}

impl HashEntry {
  fn is_expired(&self) -> bool {
    self
      .expires_at
      .map(|exp| Instant::now() > exp)
      .unwrap_or(false)
  }
}

/// In-process hash store guarded by a single lock, so every batch is atomic
/// with respect to every other operation.
pub struct InMemoryHashCache {
  data: RwLock<HashMap<String, HashEntry>>,
  hits: AtomicU64,
  misses: AtomicU64,
  expired: AtomicU64,
}

impl Default for InMemoryHashCache {
  fn default() -> Self {
    Self::new()
  }
}

impl InMemoryHashCache {
  pub fn new() -> Self {
    Self {
      data: RwLock::new(HashMap::new()),
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
      expired: AtomicU64::new(0),
    }
  }

  /// Drop every expired key, returning how many were removed.
  pub fn evict_expired(&self) -> usize {
    let mut data = self.data.write();
    let before = data.len();
    data.retain(|_, entry| !entry.is_expired());
    let count = before - data.len();
    self.expired.fetch_add(count as u64, Ordering::Relaxed);
    count
  }

  /// Remaining time to live of `key`, if it exists and has an expiry.
  pub fn ttl(&self, key: &str) -> Option<Duration> {
    let data = self.data.read();
    let entry = data.get(key).filter(|e| !e.is_expired())?;
    entry
      .expires_at
      .map(|exp| exp.saturating_duration_since(Instant::now()))
  }

  /// Periodically evict expired keys until the returned handle is aborted.
  pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
    let store = Arc::clone(self);
    tokio::spawn(async move {
      loop {
        tokio::time::sleep(interval).await;
        let expired = store.evict_expired();
        if expired > 0 {
          tracing::debug!("Evicted {} expired cache keys", expired);
        }
      }
    })
  }

  fn apply(data: &mut HashMap<String, HashEntry>, key: &str, command: &HashCommand) -> i64 {
    if data.get(key).is_some_and(|e| e.is_expired()) {
      data.remove(key);
    }

    match command {
      HashCommand::HSetNx { field, value } => {
        let entry = data.entry(key.to_string()).or_default();
        if entry.fields.contains_key(field) {
          0
        } else {
          entry.fields.insert(field.clone(), value.clone());
          1
        }
      }
      HashCommand::Expire(ttl) => match data.get_mut(key) {
        Some(entry) => {
          entry.expires_at = Some(Instant::now() + *ttl);
          1
        }
        None => 0,
      },
      HashCommand::HDel { field } => {
        let Some(entry) = data.get_mut(key) else {
          return 0;
        };
        let removed = entry.fields.remove(field).is_some();
        if entry.fields.is_empty() {
          data.remove(key);
        }
        removed as i64
      }
      HashCommand::Del => data.remove(key).is_some() as i64,
    }
  }
}

#[async_trait]
impl HashCacheStore for InMemoryHashCache {
  async fn hget(
    &self,
    ctx: &RequestContext,
    key: &str,
    field: &str,
  ) -> Result<Option<String>, CacheError> {
    if ctx.is_expired() {
      return Err(CacheError::from(crate::context::DeadlineExceeded));
    }

    let value = {
      let data = self.data.read();
      data
        .get(key)
        .filter(|e| !e.is_expired())
        .and_then(|e| e.fields.get(field).cloned())
    };

    match value {
      Some(v) => {
        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(v))
      }
      None => {
        self.misses.fetch_add(1, Ordering::Relaxed);
        Ok(None)
      }
    }
  }

  async fn execute(
    &self,
    ctx: &RequestContext,
    key: &str,
    commands: &[HashCommand],
  ) -> Result<Vec<i64>, CacheError> {
    if ctx.is_expired() {
      return Err(CacheError::from(crate::context::DeadlineExceeded));
    }

    let mut data = self.data.write();
    Ok(
      commands
        .iter()
        .map(|cmd| Self::apply(&mut data, key, cmd))
        .collect(),
    )
  }

  async fn ping(&self, ctx: &RequestContext) -> Result<(), CacheError> {
    if ctx.is_expired() {
      return Err(CacheError::from(crate::context::DeadlineExceeded));
    }
    Ok(())
  }

  async fn info(&self) -> CacheStats {
    let keys = self.data.read().values().filter(|e| !e.is_expired()).count();
    CacheStats {
      keys,
      hits: self.hits.load(Ordering::Relaxed),
      misses: self.misses.load(Ordering::Relaxed),
      expired: self.expired.load(Ordering::Relaxed),
    }
  }
}
