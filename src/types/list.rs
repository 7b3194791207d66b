use serde::{Deserialize, Serialize};

use super::require_title;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
  pub id: i64,
  pub title: String,
  #[serde(default)]
  pub description: String,
}

/// Payload for creating a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewList {
  pub title: String,
  #[serde(default)]
  pub description: String,
}

impl NewList {
  pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      description: description.into(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    require_title(&self.title)
  }
}

/// Sparse update of a list. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateListInput {
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
}

impl UpdateListInput {
  pub fn is_empty(&self) -> bool {
    self.title.is_none() && self.description.is_none()
  }

  pub fn validate(&self) -> Result<()> {
    if self.is_empty() {
      return Err(Error::validation("no fields to update"));
    }
    if let Some(title) = &self.title {
      require_title(title)?;
    }
    Ok(())
  }
}
