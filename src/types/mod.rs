mod item;
mod list;
mod user;

pub use item::{NewItem, TodoItem, UpdateItemInput};
pub use list::{NewList, TodoList, UpdateListInput};
pub use user::{NewUser, SignInInput, User};

use crate::error::{Error, Result};

/// Rejects a missing or blank title.
pub(crate) fn require_title(title: &str) -> Result<()> {
  if title.trim().is_empty() {
    return Err(Error::validation("title must not be empty"));
  }
  Ok(())
}
