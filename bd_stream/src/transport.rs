//! ABOUTME: Transport seam between the stream client and the metrics push endpoint
//! ABOUTME: Generation-tagged event delivery and an SSE implementation over reqwest

use futures_util::StreamExt;
use reqwest::{
    header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE},
    Client,
};
use std::time::Duration;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, instrument};

use crate::sse::SseDecoder;

/// Event raised by a transport connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection is open and ready to deliver ticks
    Opened,
    /// One inbound message payload
    Message(String),
    /// The connection failed or was closed by the peer
    Errored(String),
}

/// A transport event tagged with the generation of the connection that raised it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub generation: u64,
    pub event: TransportEvent,
}

/// Handle a connection uses to report its events back to the client
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSink {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the connection this sink belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report that the connection is open; false once the client is gone
    pub fn opened(&self) -> bool {
        self.send(TransportEvent::Opened)
    }

    /// Deliver a message payload; false once the client is gone
    pub fn message(&self, payload: impl Into<String>) -> bool {
        self.send(TransportEvent::Message(payload.into()))
    }

    /// Report a failure or close; false once the client is gone
    pub fn errored(&self, reason: impl Into<String>) -> bool {
        self.send(TransportEvent::Errored(reason.into()))
    }

    fn send(&self, event: TransportEvent) -> bool {
        self.tx
            .send(Envelope {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Opens connections to the metrics push endpoint
///
/// Dropping the returned connection releases it; release must never fail.
pub trait Transport: Send + Sync {
    type Connection: Send;

    /// Start a connection that reports through `sink`
    fn connect(&self, sink: EventSink) -> Self::Connection;
}

/// Connection errors surfaced to the client as `Errored` events
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("unexpected content type: {0}")]
    ContentType(String),

    #[error("stream closed by server")]
    Closed,
}

/// A connection backed by a spawned reader task, aborted on drop
#[derive(Debug)]
pub struct TaskConnection {
    generation: u64,
    task: JoinHandle<()>,
}

impl TaskConnection {
    pub fn new(generation: u64, task: JoinHandle<()>) -> Self {
        Self { generation, task }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for TaskConnection {
    fn drop(&mut self) {
        // Aborting a finished task is a no-op
        self.task.abort();
        debug!(generation = self.generation, "Connection released");
    }
}

/// Server-sent events transport using a streaming HTTP GET
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: Client,
    url: String,
}

impl SseTransport {
    /// Create a transport for `url`; only connection setup is time-limited
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> bd_core::Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| bd_core::Error::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for SseTransport {
    type Connection = TaskConnection;

    fn connect(&self, sink: EventSink) -> TaskConnection {
        let client = self.client.clone();
        let url = self.url.clone();
        let generation = sink.generation();

        let task = tokio::spawn(async move {
            let reason = match read_events(&client, &url, &sink).await {
                Ok(()) => return,
                Err(e) => e.to_string(),
            };
            sink.errored(reason);
        });

        TaskConnection::new(generation, task)
    }
}

/// Read the event stream until it ends; `Ok` only when the client stopped listening
#[instrument(skip(client, sink), fields(generation = sink.generation()))]
async fn read_events(client: &Client, url: &str, sink: &EventSink) -> Result<(), TransportError> {
    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !content_type.starts_with("text/event-stream") {
        return Err(TransportError::ContentType(content_type));
    }

    info!("Event stream opened");
    if !sink.opened() {
        return Ok(());
    }

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for event in decoder.feed(&chunk) {
            if !event.is_message() {
                debug!(event_type = %event.event, "Ignoring non-message event");
                continue;
            }
            if !sink.message(event.data) {
                return Ok(());
            }
        }
    }

    Err(TransportError::Closed)
}
