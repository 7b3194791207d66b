use serde::{Deserialize, Serialize};

use super::require_title;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
  pub id: i64,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub done: bool,
}

impl NewItem {
  pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      description: description.into(),
      done: false,
    }
  }

  pub fn validate(&self) -> Result<()> {
    require_title(&self.title)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItemInput {
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub done: Option<bool>,
}

impl UpdateItemInput {
  pub fn is_empty(&self) -> bool {
    self.title.is_none() && self.description.is_none() && self.done.is_none()
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
