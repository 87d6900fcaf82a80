use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use studymate_core::UnifiedConfig;
use studymate_server::{http_server, session, AppState};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[clap(
    name = "studymate-daemon",
    about = "HTTP backend for the StudyMate study assistant",
    version
)]
struct Args {
    #[clap(short, long, env = "STUDYMATE_CONFIG")]
    /// Path to the configuration file
    config: Option<PathBuf>,

    #[clap(long)]
    /// Address to listen on; overrides configuration and environment
    bind: Option<SocketAddr>,

    #[clap(long, env = "STUDYMATE_LOG_LEVEL", default_value = "info")]
    /// Log level (trace, debug, info, warn, error)
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .init();

    info!("Starting StudyMate daemon...");

    let mut config = match &args.config {
        Some(path) => UnifiedConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => UnifiedConfig::load_from_default().context("Failed to load default configuration")?,
    };
    config
        .apply_env()
        .context("Invalid configuration in environment")?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }

    let addr = config.server.bind_addr;
    let cleanup_every = Duration::from_secs(config.session.cleanup_interval_secs.max(1));

    let state = AppState::from_config(config)?;
    if !state.gateway.has_provider() {
        warn!("Set GEMINI_API_KEY, GROQ_API_KEY or TOGETHER_API_KEY to enable completions");
    }

    let cleanup = session::spawn_cleanup_task(
        state.sessions.clone(),
        state.session_locks.clone(),
        cleanup_every,
    );

    let result = http_server::run_server(state, addr).await;
    cleanup.abort();

    info!("StudyMate daemon stopped");
    result
}
