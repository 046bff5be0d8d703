use std::sync::Once;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is unset; the HTTP stack is chatty at info
pub const DEFAULT_FILTER: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn,actix_server=warn";

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Production deployments get JSON lines, everything else pretty text
    pub fn for_env(env: &str) -> Self {
        if env.eq_ignore_ascii_case("production") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize tracing once per process; later calls are no-ops
pub fn init_tracing(env: &str, service: &str) {
    INIT.call_once(|| {
        let format = LogFormat::for_env(env);
        let registry = tracing_subscriber::registry().with(env_filter());

        // try_init: a test harness may already own the global subscriber
        let installed = match format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
                .try_init(),
            LogFormat::Pretty => registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init(),
        };

        if installed.is_ok() {
            tracing::info!(service = %service, env = %env, ?format, "Tracing initialized");
        }
    });
}
