//! ABOUTME: Application wiring for the brokerdash binary
//! ABOUTME: Builds the dashboard pipeline from config and runs it until shutdown

use bd_config::Config;
use bd_core::Result;
use bd_obs::ObsState;
use bd_stream::{ClientConfig, ClientMetrics, SseTransport, StreamClient};
use bd_view::{Dashboard, DashboardFrame};
use clap::Parser;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Command line overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "brokerdash", about = "Live dashboard for broker metrics", version)]
pub struct Cli {
    /// Server-sent events endpoint publishing metrics ticks
    #[arg(long)]
    pub url: Option<String>,

    /// Port for the health, metrics and dashboard JSON endpoints
    #[arg(long)]
    pub obs_port: Option<u16>,

    /// Do not start the observability server
    #[arg(long)]
    pub no_obs: bool,

    /// Do not log a line per dashboard update
    #[arg(long)]
    pub quiet: bool,
}

impl Cli {
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.url {
            config.stream.url = url.clone();
        }
        if let Some(port) = self.obs_port {
            config.server.obs_port = port;
        }
        if self.no_obs {
            config.server.enabled = false;
        }
    }
}

/// Log a summary each time the dashboard publishes a new frame
pub async fn run_console(mut frames: watch::Receiver<DashboardFrame>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let summary = frames.borrow_and_update().summary();
                info!(target: "brokerdash::console", "{}", summary);
            }
        }
    }
}

/// Run the dashboard until `shutdown` is cancelled
pub async fn run(config: Config, quiet: bool, shutdown: CancellationToken) -> Result<Dashboard> {
    let dashboard = Dashboard::new(
        config.dashboard.series_capacity,
        config.dashboard.table_capacity,
    );
    let frames = dashboard.subscribe();
    let metrics = ClientMetrics::new();

    let transport = SseTransport::new(config.stream.url.clone(), config.stream.connect_timeout())?;
    let client = StreamClient::new(
        transport,
        dashboard,
        ClientConfig {
            reconnect_delay: config.stream.reconnect_delay(),
        },
    )
    .with_metrics(metrics.clone());

    if !quiet {
        tokio::spawn(run_console(frames.clone(), shutdown.clone()));
    }

    info!(url = %config.stream.url, "Dashboard running");
    if !config.server.enabled {
        return Ok(client.run(shutdown).await);
    }

    let state = ObsState::new(frames, &metrics);
    let bind_addr = config.server.bind_addr();
    let obs_server = async {
        // The dashboard keeps running without its HTTP surface
        if let Err(e) = bd_obs::start_server(&bind_addr, state, shutdown.clone()).await {
            error!(error = %e, "Observability server failed");
        }
    };

    let (dashboard, ()) = tokio::join!(client.run(shutdown.clone()), obs_server);
    Ok(dashboard)
}
