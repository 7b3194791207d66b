use clap::Parser;
use listkeep::cache::{self, CacheMode};
use listkeep::server::{connect_store, BackendType, Daemon, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "listkeepd", about = "Listkeep todo-list server", version)]
struct Args {
  #[arg(long, env = "LISTKEEP_PG_URL")]
  pg_url: Option<String>,
  #[arg(long, env = "LISTKEEP_SQLITE_PATH")]
  sqlite: Option<String>,
  #[arg(long, env = "LISTKEEP_REDIS_HOST")]
  redis_host: Option<String>,
  #[arg(long, env = "LISTKEEP_TOKEN_SECRET", hide_env_values = true)]
  token_secret: Option<String>,
  #[arg(long)]
  cache_ttl: Option<u64>,
  #[arg(short, long)]
  port: Option<u16>,
  #[arg(long)]
  host: Option<String>,
  #[arg(short, long)]
  config: Option<String>,
  #[arg(long)]
  log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
  let args = Args::parse();

  // Load config: explicit path > auto-detect > defaults
  let mut config = if let Some(path) = &args.config {
    ServerConfig::from_file(path)?
  } else {
    ServerConfig::find_and_load()?.unwrap_or_default()
  };

  // CLI args override config file
  if let Some(url) = args.pg_url {
    config.postgres.url = url;
    config.backend = BackendType::Postgres;
  }
  if let Some(path) = args.sqlite {
    config.sqlite.path = path;
    config.backend = BackendType::Sqlite;
  }
  if let Some(host) = args.redis_host {
    config.cache.redis.host = host;
    config.cache.mode = CacheMode::Redis;
  }
  if let Some(secret) = args.token_secret {
    config.auth.token_secret = secret;
  }
  if let Some(ttl) = args.cache_ttl {
    config.cache.ttl_secs = ttl;
  }
  if let Some(port) = args.port {
    config.server.port = port;
  }
  if let Some(host) = args.host {
    config.server.host = host;
  }
  if let Some(level) = args.log_level {
    config.logging.level = level;
  }

  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into()),
    )
    .with(tracing_subscriber::fmt::layer())
    .init();

  let store = connect_store(&config).await?;
  let cache = cache::connect(&config.cache).await?;

  let daemon = Daemon::new(config, store, cache);
  daemon.run(shutdown_signal()).await?;
  tracing::info!("Shutdown complete");
  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    tokio::signal::ctrl_c()
      .await
      .expect("Failed to install Ctrl+C handler");
  };

  #[cfg(unix)]
  let terminate = async {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
      .expect("Failed to install SIGTERM handler")
      .recv()
      .await;
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => tracing::info!("Received SIGINT"),
    _ = terminate => tracing::info!("Received SIGTERM"),
  }
}
