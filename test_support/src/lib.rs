//! ABOUTME: Shared testing utilities and helper functions
//! ABOUTME: Common fixtures for metrics payloads and event-stream bodies

/// JSON text of a complete metrics tick as the broker emits it
pub fn snapshot_json(
    clients: u64,
    publishes_total: u64,
    bytes_in_total: u64,
    bytes_out_total: u64,
    uptime_sec: u64,
) -> String {
    serde_json::json!({
        "clients": clients,
        "publishes_total": publishes_total,
        "bytes_in_total": bytes_in_total,
        "bytes_out_total": bytes_out_total,
        "uptime_sec": uptime_sec,
    })
    .to_string()
}

/// JSON text of a tick carrying only the publish counter
pub fn publishes_json(publishes_total: u64) -> String {
    serde_json::json!({ "publishes_total": publishes_total }).to_string()
}

/// Encode payloads as an `text/event-stream` body, one event per payload
pub fn sse_body<S: AsRef<str>>(payloads: &[S]) -> String {
    payloads
        .iter()
        .map(|p| format!("data: {}\n\n", p.as_ref()))
        .collect()
}

/// Content type used for server-sent event responses
pub const SSE_CONTENT_TYPE: &str = "text/event-stream";
