use std::future::Future;
use std::sync::Arc;

use super::{ApiServer, BackendType, ServerConfig};
use crate::auth::TokenIssuer;
use crate::cache::{CacheCoordinator, HashCacheStore};
use crate::db::{PostgresBackend, SqliteBackend, TodoStore};
use crate::service::Services;

/// Open the configured relational backend.
pub async fn connect_store(config: &ServerConfig) -> Result<Arc<dyn TodoStore>, anyhow::Error> {
  let store: Arc<dyn TodoStore> = match config.backend {
    BackendType::Postgres => {
      tracing::info!("Backend: PostgreSQL");
      Arc::new(PostgresBackend::new(
        &config.postgres.url,
        config.postgres.max_connections,
      )?)
    }
    BackendType::Sqlite => {
      tracing::info!("Backend: SQLite ({})", config.sqlite.path);
      Arc::new(SqliteBackend::new(&config.sqlite.path).await?)
    }
  };
  Ok(store)
}

pub struct Daemon {
  config: ServerConfig,
  store: Arc<dyn TodoStore>,
  cache: Arc<dyn HashCacheStore>,
}

impl Daemon {
  pub fn new(
    config: ServerConfig,
    store: Arc<dyn TodoStore>,
    cache: Arc<dyn HashCacheStore>,
  ) -> Self {
    Self {
      config,
      store,
      cache,
    }
  }

  fn token_issuer(&self) -> TokenIssuer {
    let secret = if self.config.auth.token_secret.is_empty() {
      tracing::warn!("auth.token_secret not set, tokens will not survive a restart");
      format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
      )
    } else {
      self.config.auth.token_secret.clone()
    };
    TokenIssuer::new(secret, self.config.auth.token_ttl())
  }

  pub fn services(&self) -> Services {
    let cache = CacheCoordinator::new(self.cache.clone(), self.config.cache.ttl());
    Services::new(self.store.clone(), cache, self.token_issuer())
  }

  pub async fn run(
    &self,
    shutdown: impl Future<Output = ()> + Send + 'static,
  ) -> Result<(), anyhow::Error> {
    tracing::info!("Initializing database schema...");
    self.store.init_schema().await?;

    let api = ApiServer::new(self.services(), self.config.clone());
    api.run(&self.config.address(), shutdown).await
  }
}
