use std::sync::Arc;

use crate::auth::{hash_password, verify_password, TokenIssuer};
use crate::context::RequestContext;
use crate::db::TodoStore;
use crate::error::{Error, Result};
use crate::types::{NewUser, SignInInput};

const BAD_CREDENTIALS: &str = "invalid username or password";

#[derive(Clone)]
pub struct AuthService {
  store: Arc<dyn TodoStore>,
  tokens: TokenIssuer,
}

impl AuthService {
  pub fn new(store: Arc<dyn TodoStore>, tokens: TokenIssuer) -> Self {
    Self { store, tokens }
  }

  pub async fn sign_up(&self, ctx: &RequestContext, user: &NewUser) -> Result<i64> {
    user.validate()?;
    let password = user.password.clone();
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
      .await
      .map_err(Error::store)??;

    let id = self
      .store
      .create_user(ctx, &user.name, &user.username, &hash)
      .await?;
    tracing::info!(user_id = id, username = %user.username, "user signed up");
    Ok(id)
  }

  /// Unknown user and wrong password fail identically.
  pub async fn sign_in(&self, ctx: &RequestContext, input: &SignInInput) -> Result<String> {
    let user = match self.store.get_user_by_username(ctx, &input.username).await {
      Ok(user) => user,
      Err(Error::NotFound(_)) => return Err(Error::auth(BAD_CREDENTIALS)),
      Err(e) => return Err(e),
    };

    let password = input.password.clone();
    let hash = user.password_hash.clone();
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
      .await
      .map_err(Error::store)?;
    if !verified {
      tracing::debug!(username = %input.username, "sign-in rejected");
      return Err(Error::auth(BAD_CREDENTIALS));
    }

    self.tokens.issue(user.id)
  }

  /// Resolve a bearer token to the user id it was issued for.
  pub fn resolve(&self, token: &str) -> Result<i64> {
    self.tokens.resolve(token)
  }
}
