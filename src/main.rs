// Glimpse server binary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;

use glimpse::config::Config;
use glimpse::constants::DEFAULT_CONFIG_FILE;
use glimpse::scan::{scheduler, Scanner};
use glimpse::server::{self, AppState};
use glimpse::tools::{is_tool_available, Toolbox};

#[derive(Parser)]
#[command(name = "glimpse-server")]
#[command(about = "Glimpse - photo and video library indexer and API server", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the JSON config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    glimpse::init_logging(&config.log_level);

    log::info!("Originals:  {}", config.originals_path.display());
    log::info!("Thumbnails: {}", config.thumbnails_path.display());
    log::info!("Database:   {}", config.database_path.display());

    glimpse::db::open_db(&config.database_path).context("Failed to open catalog")?;
    check_tools(&Toolbox::from_config(&config));

    if config.api_key.is_empty() {
        log::warn!("api_key is not set, every /api request will be rejected");
    }

    let scanner = Arc::new(Scanner::from_config(&config));
    let scheduler = scheduler::spawn_scheduler(Arc::clone(&scanner), config.scan_interval())
        .context("Failed to start scan scheduler")?;

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    log::info!("Listening on {}", bind_addr);

    let state = AppState::new(config.database_path.clone(), scanner, &config.api_key);
    server::serve(listener, state, shutdown_signal()).await?;

    // A pass still in flight is abandoned at exit
    scheduler.stop();
    log::info!("Glimpse stopped");
    Ok(())
}

/// Missing tools only fail the files that need them, so just warn.
fn check_tools(tools: &Toolbox) {
    for tool in [&tools.dcraw, &tools.convert, &tools.identify, &tools.ffprobe, &tools.ffmpeg] {
        if !is_tool_available(tool) {
            log::warn!("{} not found, files that need it will fail to index", tool.display());
        }
    }
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C"),
        _ = terminate => log::info!("Received SIGTERM"),
    }
}
