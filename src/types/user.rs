use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A stored account. `password_hash` is an argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
  pub id: i64,
  pub name: String,
  pub username: String,
  pub password_hash: String,
}

/// Sign-up payload, carrying the plaintext password until it is hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
  pub name: String,
  pub username: String,
  pub password: String,
}

impl NewUser {
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::validation("name must not be empty"));
    }
    if self.username.trim().is_empty() {
      return Err(Error::validation("username must not be empty"));
    }
    if self.password.is_empty() {
      return Err(Error::validation("password must not be empty"));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInInput {
  pub username: String,
  pub password: String,
}
