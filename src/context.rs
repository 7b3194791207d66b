//! Per-request context threaded through every store and cache call.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

/// The request's deadline passed before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;

#[derive(Debug, Clone)]
pub struct RequestContext {
  request_id: Uuid,
  deadline: Option<Instant>,
}

impl RequestContext {
  /// A context without a deadline.
  pub fn background() -> Self {
    Self {
      request_id: Uuid::new_v4(),
      deadline: None,
    }
  }

  /// A context whose deadline is `timeout` from now. A zero timeout means
  /// no deadline, matching the `0 = disabled` convention of the config.
  pub fn with_timeout(timeout: Duration) -> Self {
    let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
    Self {
      request_id: Uuid::new_v4(),
      deadline,
    }
  }

  /// The same request without its deadline, for work that must finish once
  /// a write has been issued.
  pub fn detached(&self) -> Self {
    Self {
      request_id: self.request_id,
      deadline: None,
    }
  }

  pub fn request_id(&self) -> Uuid {
    self.request_id
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  pub fn is_expired(&self) -> bool {
    self.deadline.is_some_and(|d| Instant::now() >= d)
  }

  /// Run `fut` under this context's deadline.
  pub async fn bound<F: Future>(&self, fut: F) -> Result<F::Output, DeadlineExceeded> {
    match self.deadline {
      Some(deadline) => tokio::time::timeout_at(deadline, fut)
        .await
        .map_err(|_| DeadlineExceeded),
      None => Ok(fut.await),
    }
  }
}

impl Default for RequestContext {
  fn default() -> Self {
    Self::background()
  }
}
