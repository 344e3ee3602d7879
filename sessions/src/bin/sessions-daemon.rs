use clap::Parser;
use gemini_sessions::config::AppConfig;
use gemini_sessions::http_server;
use gemini_sessions::session::{InMemorySessionStore, SessionStoreRef};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "sessions-daemon", about = "HTTP daemon backed by the per-request session registry")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP server address, overrides the config file
    #[arg(long)]
    http_addr: Option<SocketAddr>,

    /// Session cookie name, overrides the config file
    #[arg(short, long)]
    session_name: Option<String>,

    /// Maximum log level
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line args
    let args = Args::parse();

    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .init();

    info!("Starting sessions daemon");

    // Load config from file or use defaults
    let config_result = match &args.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load_from_default(),
    };
    let mut config = match config_result {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };

    // Update config from CLI args
    if let Some(http_addr) = args.http_addr {
        config.http_addr = http_addr.to_string();
    }
    if let Some(session_name) = args.session_name {
        config.session_name = session_name;
    }
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let addr: SocketAddr = config
        .http_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid HTTP address {}: {}", config.http_addr, e))?;

    let store = Arc::new(InMemorySessionStore::with_options(config.cookie.clone()));

    // Sweep expired sessions in the background
    let cleanup = (config.cleanup_interval_secs > 0).then(|| {
        let cleanup_store = store.clone();
        let period = Duration::from_secs(config.cleanup_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = cleanup_store.cleanup_expired_sessions() {
                    error!(error = %e, "Session cleanup failed");
                }
            }
        })
    });

    let store: SessionStoreRef = store;
    let result = http_server::run_server(config, store, addr).await;
    if let Err(e) = &result {
        error!(error = %e, "HTTP server failed");
    }

    if let Some(task) = cleanup {
        task.abort();
    }

    info!("Sessions daemon shutting down");
    result
}
