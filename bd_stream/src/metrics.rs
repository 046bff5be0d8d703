//! ABOUTME: Metrics collection for the stream client
//! ABOUTME: Provides Prometheus counters for ticks and reconnects plus latest broker values

use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};
use std::sync::atomic::AtomicU64;

use bd_core::MetricsSnapshot;

/// Metrics for stream client operations
#[derive(Debug, Clone, Default)]
pub struct ClientMetrics {
    /// Ticks parsed and rendered
    pub ticks: Counter,
    /// Payloads dropped because they could not be parsed
    pub malformed: Counter,
    /// Connection attempts started
    pub connects: Counter,
    /// Connections lost or refused
    pub disconnects: Counter,
    /// Events discarded because they came from a superseded connection
    pub stale_events: Counter,
    /// 1 while the stream is live, 0 otherwise
    pub connection_live: Gauge,
    /// Latest broker values as seen on the stream
    pub broker_clients: Gauge,
    pub broker_publishes_total: Gauge,
    pub broker_bytes_in_total: Gauge,
    pub broker_bytes_out_total: Gauge,
    pub broker_uptime_sec: Gauge,
    pub broker_publish_rate: Gauge<f64, AtomicU64>,
}

impl ClientMetrics {
    /// Create new client metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror the latest tick into the broker gauges
    pub fn record_tick(&self, snapshot: &MetricsSnapshot, rate: f64) {
        self.ticks.inc();
        self.broker_clients.set(clamp_i64(snapshot.clients));
        self.broker_publishes_total
            .set(clamp_i64(snapshot.publishes_total));
        self.broker_bytes_in_total.set(clamp_i64(snapshot.bytes_in_total));
        self.broker_bytes_out_total
            .set(clamp_i64(snapshot.bytes_out_total));
        self.broker_uptime_sec.set(clamp_i64(snapshot.uptime_sec));
        self.broker_publish_rate.set(rate);
    }

    /// Register every metric under its exposition name
    pub fn register(&self, registry: &mut Registry) {
        registry.register("bd_ticks", "Metrics ticks rendered", self.ticks.clone());
        registry.register(
            "bd_malformed",
            "Payloads dropped as malformed",
            self.malformed.clone(),
        );
        registry.register(
            "bd_connects",
            "Stream connection attempts",
            self.connects.clone(),
        );
        registry.register(
            "bd_disconnects",
            "Stream connections lost or refused",
            self.disconnects.clone(),
        );
        registry.register(
            "bd_stale_events",
            "Events ignored from superseded connections",
            self.stale_events.clone(),
        );
        registry.register(
            "bd_connection_live",
            "Whether the metrics stream is live",
            self.connection_live.clone(),
        );
        registry.register(
            "broker_clients",
            "Connected broker clients",
            self.broker_clients.clone(),
        );
        registry.register(
            "broker_publishes_total",
            "Cumulative broker publishes",
            self.broker_publishes_total.clone(),
        );
        registry.register(
            "broker_bytes_in_total",
            "Cumulative bytes received by the broker",
            self.broker_bytes_in_total.clone(),
        );
        registry.register(
            "broker_bytes_out_total",
            "Cumulative bytes sent by the broker",
            self.broker_bytes_out_total.clone(),
        );
        registry.register(
            "broker_uptime_sec",
            "Broker process uptime in seconds",
            self.broker_uptime_sec.clone(),
        );
        registry.register(
            "broker_publish_rate",
            "Derived broker publishes per second",
            self.broker_publish_rate.clone(),
        );
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    #[test]
    fn test_record_tick_sets_gauges() {
        let metrics = ClientMetrics::new();
        let snapshot = MetricsSnapshot {
            clients: 4,
            publishes_total: 1200,
            bytes_in_total: 10,
            bytes_out_total: u64::MAX,
            uptime_sec: 60,
        };

        metrics.record_tick(&snapshot, 12.5);

        assert_eq!(metrics.ticks.get(), 1);
        assert_eq!(metrics.broker_clients.get(), 4);
        assert_eq!(metrics.broker_publishes_total.get(), 1200);
        assert_eq!(metrics.broker_bytes_out_total.get(), i64::MAX);
        assert_eq!(metrics.broker_publish_rate.get(), 12.5);
    }

    #[test]
    fn test_register_and_encode() {
        let metrics = ClientMetrics::new();
        metrics.connects.inc();

        let mut registry = Registry::default();
        metrics.register(&mut registry);

        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("bd_connects_total 1"));
        assert!(buffer.contains("broker_publish_rate"));
        assert!(buffer.contains("bd_connection_live 0"));
    }
}
