//! kola-bot entry point.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

/// Conditional order bot for BitMEX-style exchanges
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via KOLA_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Record orders instead of sending them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection
    kola_ws::init_crypto();

    let args = Args::parse();

    kola_telemetry::init_logging()?;

    info!("Starting kola-bot v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args
        .config
        .or_else(|| std::env::var("KOLA_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let mut config = kola_bot::AppConfig::from_file(&config_path)?;
    config.dry_run |= args.dry_run;
    info!(
        live = config.live,
        dry_run = config.dry_run,
        api_url = %config.api_url(),
        "Configuration loaded"
    );

    let app = kola_bot::Application::new(config)?;
    match app.run().await {
        Ok(summaries) => {
            for summary in &summaries {
                info!(
                    campaign = %summary.name,
                    trials_run = summary.trials_run(),
                    "Campaign summary"
                );
            }
        }
        Err(kola_bot::AppError::Shutdown) => warn!("Stopped before trading started"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
