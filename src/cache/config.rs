//! Cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache mode: in-process hash store or an external Redis server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
  /// In-memory cache (default)
  #[default]
  Memory,
  /// External Redis server
  Redis,
}

impl std::fmt::Display for CacheMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      CacheMode::Memory => write!(f, "memory"),
      CacheMode::Redis => write!(f, "redis"),
    }
  }
}

impl std::str::FromStr for CacheMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "memory" | "inmemory" | "builtin" => Ok(CacheMode::Memory),
      "redis" | "external" => Ok(CacheMode::Redis),
      _ => Err(format!("Unknown cache mode: {}", s)),
    }
  }
}

/// Connection settings for redis mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
  #[serde(default = "default_host")]
  pub host: String,

  #[serde(default = "default_redis_port")]
  pub port: u16,

  #[serde(default)]
  pub password: Option<String>,

  /// Redis database number
  #[serde(default)]
  pub database: u8,

  #[serde(default)]
  pub tls_enabled: bool,
}

impl Default for RedisConfig {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_redis_port(),
      password: None,
      database: 0,
      tls_enabled: false,
    }
  }
}

fn default_host() -> String {
  "localhost".to_string()
}

fn default_redis_port() -> u16 {
  6379
}

impl RedisConfig {
  /// Generate Redis connection URL
  pub fn connection_url(&self) -> String {
    let scheme = if self.tls_enabled { "rediss" } else { "redis" };
    let auth = match &self.password {
      Some(pwd) if !pwd.is_empty() => format!(":{}@", pwd),
      _ => String::new(),
    };
    format!(
      "{}://{}{}:{}/{}",
      scheme, auth, self.host, self.port, self.database
    )
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
  #[serde(default)]
  pub mode: CacheMode,

  /// Expiry window of a user's cache key, reset on every populate
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,

  /// How often the in-memory store drops expired keys (0 = lazy only)
  #[serde(default = "default_sweep_interval_secs")]
  pub sweep_interval_secs: u64,

  #[serde(default)]
  pub redis: RedisConfig,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      mode: CacheMode::default(),
      ttl_secs: default_ttl_secs(),
      sweep_interval_secs: default_sweep_interval_secs(),
      redis: RedisConfig::default(),
    }
  }
}

fn default_ttl_secs() -> u64 {
  3600
}

fn default_sweep_interval_secs() -> u64 {
  60
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }

  pub fn sweep_interval(&self) -> Option<Duration> {
    (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
  }
}
