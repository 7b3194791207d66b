//! Signed bearer tokens.
//!
//! A token is `{user_id}.{expires_unix}.{signature}` where the signature is
//! the hex HMAC-SHA256 of `{user_id}.{expires_unix}` under the server secret.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const INVALID_TOKEN: &str = "invalid token";

#[derive(Clone)]
pub struct TokenIssuer {
  secret: Vec<u8>,
  ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TokenIssuer").field("ttl", &self.ttl).finish()
  }
}

impl TokenIssuer {
  pub fn new(secret: impl AsRef<[u8]>, ttl: std::time::Duration) -> Self {
    Self {
      secret: secret.as_ref().to_vec(),
      ttl: Duration::from_std(ttl).unwrap_or(Duration::hours(30)),
    }
  }

  pub fn issue(&self, user_id: i64) -> Result<String> {
    self.issue_at(user_id, Utc::now())
  }

  pub fn resolve(&self, token: &str) -> Result<i64> {
    self.resolve_at(token, Utc::now())
  }

  fn mac(&self, payload: &str) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(&self.secret)
      .map_err(|_| Error::auth("invalid signing key"))?;
    mac.update(payload.as_bytes());
    Ok(mac)
  }

  fn issue_at(&self, user_id: i64, now: DateTime<Utc>) -> Result<String> {
    let expires = (now + self.ttl).timestamp();
    let payload = format!("{}.{}", user_id, expires);
    let signature = hex::encode(self.mac(&payload)?.finalize().into_bytes());
    Ok(format!("{}.{}", payload, signature))
  }

  fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Result<i64> {
    let mut parts = token.splitn(3, '.');
    let (Some(user), Some(expires), Some(signature)) = (parts.next(), parts.next(), parts.next())
    else {
      return Err(Error::auth(INVALID_TOKEN));
    };

    let signature = hex::decode(signature).map_err(|_| Error::auth(INVALID_TOKEN))?;
    self
      .mac(&format!("{}.{}", user, expires))?
      .verify_slice(&signature)
      .map_err(|_| Error::auth(INVALID_TOKEN))?;

    let user_id: i64 = user.parse().map_err(|_| Error::auth(INVALID_TOKEN))?;
    let expires: i64 = expires.parse().map_err(|_| Error::auth(INVALID_TOKEN))?;
    if now.timestamp() >= expires {
      return Err(Error::auth("token expired"));
    }
    Ok(user_id)
  }
}
