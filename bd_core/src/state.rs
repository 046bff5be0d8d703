// ABOUTME: Connection lifecycle states shared by the stream client and the view.
// ABOUTME: Each state knows its status text and whether the indicator is healthy.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the metrics stream connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// A connection attempt is in flight
    Connecting,
    /// The transport signalled it is open and delivering ticks
    Live,
    /// The transport failed or closed; a reconnect is pending
    Disconnected,
}

impl ConnectionState {
    /// Status text shown next to the indicator
    pub fn status_text(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "Connecting…",
            ConnectionState::Live => "Live",
            ConnectionState::Disconnected => "Disconnected — retrying…",
        }
    }

    /// Whether the indicator should show the healthy color
    pub fn is_ok(&self) -> bool {
        matches!(self, ConnectionState::Live)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Live => write!(f, "live"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}
