//! ABOUTME: Core types, errors, metrics snapshot model and tracing utilities
//! ABOUTME: Foundation crate used by all other brokerdash components

pub mod error;
pub mod snapshot;
pub mod state;
pub mod telemetry;
pub mod time;

pub use error::{Error, Result};
pub use snapshot::MetricsSnapshot;
pub use state::ConnectionState;
pub use time::{now_label, now_rfc3339, to_rfc3339};
