use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cache::CacheConfig;

/// Expand environment variables in a string.
/// Supports $VAR_NAME and ${VAR_NAME} syntax. Unset variables expand to "".
fn expand_env_vars(input: &str) -> String {
  let mut out = String::with_capacity(input.len());
  let mut rest = input;

  while let Some(pos) = rest.find('$') {
    out.push_str(&rest[..pos]);
    let after = &rest[pos + 1..];

    if let Some(braced) = after.strip_prefix('{') {
      if let Some(end) = braced.find('}') {
        out.push_str(&std::env::var(&braced[..end]).unwrap_or_default());
        rest = &braced[end + 1..];
        continue;
      }
    }

    // $VAR_NAME ends at the first byte outside [A-Za-z0-9_]
    let var_len = after
      .bytes()
      .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
      .count();
    if var_len > 0 {
      out.push_str(&std::env::var(&after[..var_len]).unwrap_or_default());
      rest = &after[var_len..];
    } else {
      out.push('$');
      rest = after;
    }
  }

  out.push_str(rest);
  out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
  #[default]
  Postgres,
  Sqlite,
}

impl std::str::FromStr for BackendType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "postgres" | "postgresql" | "pg" => Ok(BackendType::Postgres),
      "sqlite" | "sqlite3" => Ok(BackendType::Sqlite),
      _ => Err(format!("Unknown backend: {}", s)),
    }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
  #[serde(default)]
  pub server: ServerSection,
  #[serde(default)]
  pub backend: BackendType,
  #[serde(default)]
  pub postgres: PostgresSection,
  #[serde(default)]
  pub sqlite: SqliteSection,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub auth: AuthSection,
  #[serde(default)]
  pub limits: LimitsSection,
  #[serde(default)]
  pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
  /// CORS allowed origins. Use ["*"] for permissive mode.
  #[serde(default = "default_cors_origins")]
  pub cors_origins: Vec<String>,
}

fn default_host() -> String {
  "0.0.0.0".into()
}

fn default_port() -> u16 {
  8000
}

fn default_cors_origins() -> Vec<String> {
  vec!["*".to_string()]
}

impl Default for ServerSection {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      cors_origins: default_cors_origins(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSection {
  /// HMAC key for bearer tokens. Empty means a random key per process.
  #[serde(default)]
  pub token_secret: String,
  #[serde(default = "default_token_ttl_hours")]
  pub token_ttl_hours: u64,
}

fn default_token_ttl_hours() -> u64 {
  30
}

impl Default for AuthSection {
  fn default() -> Self {
    Self {
      token_secret: String::new(),
      token_ttl_hours: default_token_ttl_hours(),
    }
  }
}

impl AuthSection {
  pub fn token_ttl(&self) -> Duration {
    Duration::from_secs(self.token_ttl_hours.saturating_mul(3600))
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsSection {
  /// Deadline for each request's store and cache work (0 = no timeout)
  #[serde(default = "default_request_timeout_ms")]
  pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
  30000
}

impl Default for LimitsSection {
  fn default() -> Self {
    Self {
      request_timeout_ms: default_request_timeout_ms(),
    }
  }
}

impl LimitsSection {
  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.request_timeout_ms)
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresSection {
  #[serde(default = "default_pg_url")]
  pub url: String,
  #[serde(default = "default_max_conn")]
  pub max_connections: usize,
}

fn default_pg_url() -> String {
  "postgres://localhost/listkeep".into()
}

fn default_max_conn() -> usize {
  20
}

impl Default for PostgresSection {
  fn default() -> Self {
    Self {
      url: default_pg_url(),
      max_connections: default_max_conn(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteSection {
  #[serde(default = "default_sqlite_path")]
  pub path: String,
}

fn default_sqlite_path() -> String {
  "listkeep.db".into()
}

impl Default for SqliteSection {
  fn default() -> Self {
    Self {
      path: default_sqlite_path(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
  #[serde(default = "default_level")]
  pub level: String,
}

fn default_level() -> String {
  "info".into()
}

impl Default for LoggingSection {
  fn default() -> Self {
    Self {
      level: default_level(),
    }
  }
}

impl ServerConfig {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
    let content = std::fs::read_to_string(&path)?;
    Self::from_yaml(&content)
  }

  pub fn from_yaml(content: &str) -> Result<Self, anyhow::Error> {
    let expanded = expand_env_vars(content);
    Ok(serde_yaml::from_str(&expanded)?)
  }

  pub fn find_and_load() -> Result<Option<Self>, anyhow::Error> {
    for p in ["listkeep.yaml", "listkeep.yml"] {
      if Path::new(p).exists() {
        tracing::info!("Loading config from {}", p);
        return Ok(Some(Self::from_file(p)?));
      }
    }
    Ok(None)
  }

  pub fn address(&self) -> String {
    format!("{}:{}", self.server.host, self.server.port)
  }
}
