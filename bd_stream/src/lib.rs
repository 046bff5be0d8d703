//! ABOUTME: Server-sent events client for the broker metrics stream
//! ABOUTME: Reconnecting connection state machine driving the dashboard pipeline

mod client;
mod metrics;
pub mod sse;
mod transport;

pub use client::{ClientConfig, StreamClient, DEFAULT_RECONNECT_DELAY};
pub use metrics::ClientMetrics;
pub use sse::{SseDecoder, SseEvent};
pub use transport::{
    Envelope, EventSink, SseTransport, TaskConnection, Transport, TransportError, TransportEvent,
};
