use bd_config::Config;
use bd_core::telemetry;
use brokerdash::Cli;
use clap::Parser;
use std::process;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration - exit with non-zero if invalid
    let mut config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };
    cli.apply(&mut config);

    telemetry::init_tracing(&config.telemetry.env, "brokerdash");
    tracing::debug!(?config, "Configuration loaded successfully");

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested");
                signal_shutdown.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    match brokerdash::run(config, cli.quiet, shutdown).await {
        Ok(dashboard) => {
            tracing::info!(ticks = dashboard.ticks(), "brokerdash stopped");
        }
        Err(e) => {
            tracing::error!("Dashboard failed: {}", e);
            process::exit(1);
        }
    }
}
