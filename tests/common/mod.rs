#![allow(dead_code)]

use async_trait::async_trait;
use listkeep::auth::TokenIssuer;
use listkeep::cache::{
  CacheCoordinator, CacheError, CacheStats, HashCacheStore, HashCommand, InMemoryHashCache,
};
use listkeep::db::{SqlDialect, SqliteBackend, TodoStore};
use listkeep::service::Services;
use listkeep::types::{
  NewItem, NewList, TodoItem, TodoList, UpdateItemInput, UpdateListInput, User,
};
use listkeep::{Error, RequestContext, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const TTL: Duration = Duration::from_secs(3600);

/// Wraps a store and counts the calls that reach it.
pub struct CountingStore {
  inner: SqliteBackend,
  reads: AtomicUsize,
  writes: AtomicUsize,
  fail_after_commit: AtomicBool,
}

impl CountingStore {
  pub async fn in_memory() -> Self {
    let inner = SqliteBackend::in_memory().await.unwrap();
    inner.init_schema().await.unwrap();
    Self {
      inner,
      reads: AtomicUsize::new(0),
      writes: AtomicUsize::new(0),
      fail_after_commit: AtomicBool::new(false),
    }
  }

  pub fn reads(&self) -> usize {
    self.reads.load(Ordering::SeqCst)
  }

  pub fn writes(&self) -> usize {
    self.writes.load(Ordering::SeqCst)
  }

  fn read(&self) {
    self.reads.fetch_add(1, Ordering::SeqCst);
  }

  fn write(&self) {
    self.writes.fetch_add(1, Ordering::SeqCst);
  }

  /// Make list and item writes commit and then report a store error, like a
  /// connection lost before the reply arrived.
  pub fn fail_after_commit(&self, on: bool) {
    self.fail_after_commit.store(on, Ordering::SeqCst);
  }

  fn settle<T>(&self, result: Result<T>) -> Result<T> {
    let value = result?;
    if self.fail_after_commit.load(Ordering::SeqCst) {
      return Err(Error::store(anyhow::anyhow!("connection reset after commit")));
    }
    Ok(value)
  }
}

#[async_trait]
impl TodoStore for CountingStore {
  fn dialect(&self) -> SqlDialect {
    self.inner.dialect()
  }

  async fn init_schema(&self) -> Result<()> {
    self.inner.init_schema().await
  }

  async fn drop_schema(&self) -> Result<()> {
    self.inner.drop_schema().await
  }

  async fn create_user(
    &self,
    ctx: &RequestContext,
    name: &str,
    username: &str,
    password_hash: &str,
  ) -> Result<i64> {
    self.write();
    self
      .inner
      .create_user(ctx, name, username, password_hash)
      .await
  }

  async fn get_user_by_username(&self, ctx: &RequestContext, username: &str) -> Result<User> {
    self.read();
    self.inner.get_user_by_username(ctx, username).await
  }

  async fn create_list(&self, ctx: &RequestContext, user_id: i64, list: &NewList) -> Result<i64> {
    self.write();
    self.settle(self.inner.create_list(ctx, user_id, list).await)
  }

  async fn get_all_lists(&self, ctx: &RequestContext, user_id: i64) -> Result<Vec<TodoList>> {
    self.read();
    self.inner.get_all_lists(ctx, user_id).await
  }

  async fn get_list(&self, ctx: &RequestContext, user_id: i64, list_id: i64) -> Result<TodoList> {
    self.read();
    self.inner.get_list(ctx, user_id, list_id).await
  }

  async fn update_list(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
    input: &UpdateListInput,
  ) -> Result<()> {
    self.write();
    self.settle(self.inner.update_list(ctx, user_id, list_id, input).await)
  }

  async fn delete_list(&self, ctx: &RequestContext, user_id: i64, list_id: i64) -> Result<()> {
    self.write();
    self.settle(self.inner.delete_list(ctx, user_id, list_id).await)
  }

  async fn create_item(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
    item: &NewItem,
  ) -> Result<i64> {
    self.write();
    self.settle(self.inner.create_item(ctx, user_id, list_id, item).await)
  }

  async fn get_all_items(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    list_id: i64,
  ) -> Result<Vec<TodoItem>> {
    self.read();
    self.inner.get_all_items(ctx, user_id, list_id).await
  }

  async fn get_item(&self, ctx: &RequestContext, user_id: i64, item_id: i64) -> Result<TodoItem> {
    self.read();
    self.inner.get_item(ctx, user_id, item_id).await
  }

  async fn update_item(
    &self,
    ctx: &RequestContext,
    user_id: i64,
    item_id: i64,
    input: &UpdateItemInput,
  ) -> Result<()> {
    self.write();
    self.settle(self.inner.update_item(ctx, user_id, item_id, input).await)
  }

  async fn delete_item(&self, ctx: &RequestContext, user_id: i64, item_id: i64) -> Result<()> {
    self.write();
    self.settle(self.inner.delete_item(ctx, user_id, item_id).await)
  }
}

/// A cache that is never reachable.
pub struct FailingCache;

#[async_trait]
impl HashCacheStore for FailingCache {
  async fn hget(
    &self,
    _ctx: &RequestContext,
    _key: &str,
    _field: &str,
  ) -> std::result::Result<Option<String>, CacheError> {
    Err(CacheError::unavailable("connection refused"))
  }

  async fn execute(
    &self,
    _ctx: &RequestContext,
    _key: &str,
    _commands: &[HashCommand],
  ) -> std::result::Result<Vec<i64>, CacheError> {
    Err(CacheError::unavailable("connection refused"))
  }

  async fn ping(&self, _ctx: &RequestContext) -> std::result::Result<(), CacheError> {
    Err(CacheError::unavailable("connection refused"))
  }

  async fn info(&self) -> CacheStats {
    CacheStats::default()
  }
}

pub struct Harness {
  pub store: Arc<CountingStore>,
  pub cache_store: Arc<InMemoryHashCache>,
  pub cache: CacheCoordinator,
  pub services: Services,
  pub ctx: RequestContext,
}

impl Harness {
  pub async fn new() -> Self {
    let store = Arc::new(CountingStore::in_memory().await);
    let cache_store = Arc::new(InMemoryHashCache::new());
    let cache = CacheCoordinator::new(cache_store.clone(), TTL);
    let services = Services::new(store.clone(), cache.clone(), token_issuer());
    Self {
      store,
      cache_store,
      cache,
      services,
      ctx: RequestContext::background(),
    }
  }

  /// Services backed by a cache that always fails.
  pub async fn with_failing_cache() -> Self {
    let store = Arc::new(CountingStore::in_memory().await);
    let cache = CacheCoordinator::new(Arc::new(FailingCache), TTL);
    let services = Services::new(store.clone(), cache.clone(), token_issuer());
    Self {
      store,
      cache_store: Arc::new(InMemoryHashCache::new()),
      cache,
      services,
      ctx: RequestContext::background(),
    }
  }

  pub async fn user(&self, username: &str) -> i64 {
    self
      .store
      .create_user(&self.ctx, username, username, "unused-hash")
      .await
      .unwrap()
  }

  pub async fn raw(&self, user_id: i64, field: impl Into<listkeep::cache::CacheField>) -> Option<String> {
    self.cache.read_raw(&self.ctx, user_id, field).await.unwrap()
  }
}

pub fn token_issuer() -> TokenIssuer {
  TokenIssuer::new("integration-secret", Duration::from_secs(30 * 3600))
}
