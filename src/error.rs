//! Error kinds surfaced by the store, the services and the identity layer.
//!
//! Cache failures are not part of this enum. They are reported as
//! [`crate::cache::CacheError`] and the services fall through to the store.

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// Malformed input or an empty partial update. Raised before any I/O.
  #[error("validation error: {0}")]
  Validation(String),

  /// A scoped lookup or mutation matched no rows.
  #[error("not found: {0}")]
  NotFound(String),

  /// Connection, statement or transaction failure in the relational store.
  #[error("store error: {0}")]
  Store(#[source] anyhow::Error),

  /// Token or credential rejected.
  #[error("auth error: {0}")]
  Auth(String),
}

impl Error {
  pub fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }

  pub fn not_found(msg: impl Into<String>) -> Self {
    Self::NotFound(msg.into())
  }

  pub fn auth(msg: impl Into<String>) -> Self {
    Self::Auth(msg.into())
  }

  pub fn store(err: impl Into<anyhow::Error>) -> Self {
    Self::Store(err.into())
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::NotFound(_))
  }
}

impl From<tokio_postgres::Error> for Error {
  fn from(err: tokio_postgres::Error) -> Self {
    Self::Store(err.into())
  }
}

impl From<deadpool_postgres::PoolError> for Error {
  fn from(err: deadpool_postgres::PoolError) -> Self {
    Self::Store(err.into())
  }
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    Self::Store(err.into())
  }
}

impl From<rusqlite::Error> for Error {
  fn from(err: rusqlite::Error) -> Self {
    Self::Store(err.into())
  }
}

impl From<crate::context::DeadlineExceeded> for Error {
  fn from(err: crate::context::DeadlineExceeded) -> Self {
    Self::Store(err.into())
  }
}
