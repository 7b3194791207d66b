mod api;
mod config;
mod daemon;

pub use api::ApiServer;
pub use config::{
  AuthSection, BackendType, LimitsSection, LoggingSection, PostgresSection, ServerConfig,
  ServerSection, SqliteSection,
};
pub use daemon::{connect_store, Daemon};
