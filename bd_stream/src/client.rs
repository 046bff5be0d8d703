//! ABOUTME: Reconnecting stream client driving the dashboard pipeline
//! ABOUTME: Single-task actor: typed transport events, one connection, one pending retry

use bd_core::{ConnectionState, MetricsSnapshot};
use bd_series::RateEstimator;
use bd_view::DashboardView;
use std::time::Duration;
use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    metrics::ClientMetrics,
    transport::{Envelope, EventSink, Transport, TransportEvent},
};

/// Fixed delay between a disconnect and the next connection attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1500);

/// Configuration for the stream client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Delay before reconnecting; retries are unbounded and not backed off
    pub reconnect_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Owns at most one live connection to the metrics stream and recovers from drops
pub struct StreamClient<T: Transport, V: DashboardView> {
    transport: T,
    view: V,
    config: ClientConfig,
    metrics: ClientMetrics,
    estimator: RateEstimator,
    /// `None` until the first `start`
    state: Option<ConnectionState>,
    generation: u64,
    connection: Option<T::Connection>,
    reconnect_at: Option<Instant>,
    events_tx: mpsc::UnboundedSender<Envelope>,
    events_rx: mpsc::UnboundedReceiver<Envelope>,
}

impl<T: Transport, V: DashboardView> StreamClient<T, V> {
    /// Create an idle client; nothing connects until `start` or `run`
    pub fn new(transport: T, view: V, config: ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            transport,
            view,
            config,
            metrics: ClientMetrics::new(),
            estimator: RateEstimator::new(),
            state: None,
            generation: 0,
            connection: None,
            reconnect_at: None,
            events_tx,
            events_rx,
        }
    }

    /// Use shared metrics instead of a private set
    pub fn with_metrics(mut self, metrics: ClientMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> Option<ConnectionState> {
        self.state
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    /// Generation of the current (or most recent) connection
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a connection resource is currently held
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether a reconnect is scheduled
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_at.is_some()
    }

    /// Begin a new connection attempt, superseding any current one
    pub fn start(&mut self) {
        // Release first so a superseded connection never overlaps the new one
        self.release_connection();
        self.reconnect_at = None;

        self.generation += 1;
        self.set_state(ConnectionState::Connecting);
        self.metrics.connects.inc();

        info!(generation = self.generation, "Connecting to metrics stream");
        let sink = EventSink::new(self.generation, self.events_tx.clone());
        self.connection = Some(self.transport.connect(sink));
    }

    /// Apply one transport event to the state machine
    pub fn handle(&mut self, envelope: Envelope) {
        if envelope.generation != self.generation || self.connection.is_none() {
            self.metrics.stale_events.inc();
            debug!(
                event_generation = envelope.generation,
                current_generation = self.generation,
                "Ignoring event from superseded connection"
            );
            return;
        }

        match (self.state, envelope.event) {
            (Some(ConnectionState::Connecting), TransportEvent::Opened) => {
                info!(generation = self.generation, "Metrics stream live");
                self.set_state(ConnectionState::Live);
            }
            (_, TransportEvent::Opened) => {
                debug!(generation = self.generation, "Duplicate open signal ignored");
            }
            (state, TransportEvent::Message(payload)) => {
                if state == Some(ConnectionState::Connecting) {
                    // Data proves the connection is open even without a ready signal
                    self.set_state(ConnectionState::Live);
                }
                self.on_message(&payload);
            }
            (_, TransportEvent::Errored(reason)) => self.disconnect(&reason),
        }
    }

    /// Run the event loop until `shutdown` is cancelled, then release the connection
    pub async fn run(mut self, shutdown: CancellationToken) -> V {
        if self.state.is_none() {
            self.start();
        }

        loop {
            let reconnect_at = self.reconnect_at;
            let reconnect = async move {
                match reconnect_at {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,
                Some(envelope) = self.events_rx.recv() => self.handle(envelope),
                _ = reconnect => {
                    debug!(generation = self.generation, "Reconnect delay elapsed");
                    self.start();
                }
            }
        }

        info!(generation = self.generation, "Stream client shutting down");
        self.release_connection();
        self.reconnect_at = None;
        self.metrics.connection_live.set(0);
        self.view
    }

    fn on_message(&mut self, payload: &str) {
        let snapshot = match MetricsSnapshot::parse(payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.metrics.malformed.inc();
                warn!(error = %e, generation = self.generation, "Dropping malformed tick");
                return;
            }
        };

        let rate = self
            .estimator
            .observe(snapshot.publishes_total, std::time::Instant::now());
        debug!(
            clients = snapshot.clients,
            publishes_total = snapshot.publishes_total,
            rate,
            "Tick received"
        );

        self.view.render(&snapshot, rate);
        self.metrics.record_tick(&snapshot, rate);
    }

    fn disconnect(&mut self, reason: &str) {
        if self.state == Some(ConnectionState::Disconnected) {
            return;
        }

        warn!(
            generation = self.generation,
            error = %reason,
            retry_in_ms = self.config.reconnect_delay.as_millis() as u64,
            "Metrics stream disconnected"
        );
        self.metrics.disconnects.inc();
        self.set_state(ConnectionState::Disconnected);
        self.release_connection();
        self.reconnect_at = Some(Instant::now() + self.config.reconnect_delay);
    }

    /// Dropping the connection releases it; this cannot fail
    fn release_connection(&mut self) {
        self.connection = None;
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = Some(state);
        self.metrics
            .connection_live
            .set(i64::from(state == ConnectionState::Live));
        self.view.set_status(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };
    use test_support::{publishes_json, snapshot_json};

    /// Transport whose connections are driven by the test through their sinks
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        sinks: Arc<Mutex<Vec<EventSink>>>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
    }

    struct ScriptedConnection {
        active: Arc<AtomicUsize>,
    }

    impl Drop for ScriptedConnection {
        fn drop(&mut self) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl Transport for ScriptedTransport {
        type Connection = ScriptedConnection;

        fn connect(&self, sink: EventSink) -> ScriptedConnection {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            self.sinks.lock().unwrap().push(sink);
            ScriptedConnection {
                active: self.active.clone(),
            }
        }
    }

    impl ScriptedTransport {
        fn sink(&self, index: usize) -> EventSink {
            self.sinks.lock().unwrap()[index].clone()
        }

        fn connections(&self) -> usize {
            self.sinks.lock().unwrap().len()
        }
    }

    /// View that records every status change and render call
    #[derive(Clone, Default)]
    struct RecordingView {
        statuses: Arc<Mutex<Vec<ConnectionState>>>,
        renders: Arc<Mutex<Vec<(MetricsSnapshot, f64)>>>,
    }

    impl DashboardView for RecordingView {
        fn set_status(&mut self, state: ConnectionState) {
            self.statuses.lock().unwrap().push(state);
        }

        fn render(&mut self, snapshot: &MetricsSnapshot, rate: f64) {
            self.renders.lock().unwrap().push((*snapshot, rate));
        }
    }

    impl RecordingView {
        fn statuses(&self) -> Vec<ConnectionState> {
            self.statuses.lock().unwrap().clone()
        }

        fn render_count(&self) -> usize {
            self.renders.lock().unwrap().len()
        }
    }

    fn envelope(generation: u64, event: TransportEvent) -> Envelope {
        Envelope { generation, event }
    }

    fn client() -> (
        StreamClient<ScriptedTransport, RecordingView>,
        ScriptedTransport,
        RecordingView,
    ) {
        let transport = ScriptedTransport::default();
        let view = RecordingView::default();
        let client = StreamClient::new(transport.clone(), view.clone(), ClientConfig::default());
        (client, transport, view)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_new_client_is_idle() {
        let (client, transport, view) = client();
        assert_eq!(client.state(), None);
        assert!(!client.has_connection());
        assert_eq!(transport.connections(), 0);
        assert!(view.statuses().is_empty());
    }

    #[test]
    fn test_open_then_message_renders() {
        let (mut client, _transport, view) = client();
        client.start();
        client.handle(envelope(1, TransportEvent::Opened));
        client.handle(envelope(
            1,
            TransportEvent::Message(snapshot_json(2, 100, 0, 0, 5)),
        ));

        assert_eq!(
            view.statuses(),
            vec![ConnectionState::Connecting, ConnectionState::Live]
        );
        let renders = view.renders.lock().unwrap().clone();
        assert_eq!(renders.len(), 1);
        assert_eq!(renders[0].0.clients, 2);
        assert_eq!(renders[0].1, 0.0);
        assert_eq!(client.metrics().ticks.get(), 1);
        assert_eq!(client.metrics().connection_live.get(), 1);
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let (mut client, _transport, view) = client();
        client.start();
        client.handle(envelope(1, TransportEvent::Opened));
        client.handle(envelope(1, TransportEvent::Message(publishes_json(100))));
        let baseline = client.estimator.baseline();

        client.handle(envelope(1, TransportEvent::Message("{not json".to_string())));

        assert_eq!(view.render_count(), 1);
        assert_eq!(client.estimator.baseline(), baseline);
        assert_eq!(client.state(), Some(ConnectionState::Live));
        assert_eq!(client.metrics().malformed.get(), 1);
        assert!(client.has_connection());

        client.handle(envelope(1, TransportEvent::Message(publishes_json(150))));
        assert_eq!(view.render_count(), 2);
    }

    #[test]
    fn test_array_payload_counts_as_malformed() {
        let (mut client, _transport, view) = client();
        client.start();
        client.handle(envelope(1, TransportEvent::Opened));

        client.handle(envelope(1, TransportEvent::Message("[5, 999]".to_string())));

        assert_eq!(view.render_count(), 0);
        assert_eq!(client.estimator.baseline(), None);
        assert_eq!(client.metrics().malformed.get(), 1);
        assert_eq!(client.metrics().ticks.get(), 0);
        assert_eq!(client.state(), Some(ConnectionState::Live));
    }

    #[test]
    fn test_error_disconnects_and_schedules_single_retry() {
        let (mut client, transport, view) = client();
        client.start();
        client.handle(envelope(1, TransportEvent::Opened));
        client.handle(envelope(1, TransportEvent::Errored("reset".to_string())));

        assert_eq!(client.state(), Some(ConnectionState::Disconnected));
        assert!(!client.has_connection());
        assert!(client.reconnect_pending());
        assert_eq!(transport.active.load(Ordering::SeqCst), 0);

        // A second error from the dead connection neither re-notifies nor reschedules
        client.handle(envelope(1, TransportEvent::Errored("again".to_string())));
        assert_eq!(
            view.statuses(),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Live,
                ConnectionState::Disconnected
            ]
        );
        assert_eq!(client.metrics().disconnects.get(), 1);
    }

    #[test]
    fn test_start_supersedes_and_ignores_stale_events() {
        let (mut client, transport, view) = client();
        client.start();
        client.handle(envelope(1, TransportEvent::Opened));
        client.start();

        assert_eq!(client.generation(), 2);
        assert_eq!(transport.connections(), 2);
        assert_eq!(transport.active.load(Ordering::SeqCst), 1);
        assert_eq!(transport.max_active.load(Ordering::SeqCst), 1);
        assert!(!client.reconnect_pending());

        // Events from generation 1 no longer reach the pipeline
        client.handle(envelope(1, TransportEvent::Message(publishes_json(10))));
        client.handle(envelope(1, TransportEvent::Errored("late".to_string())));
        assert_eq!(view.render_count(), 0);
        assert_eq!(client.state(), Some(ConnectionState::Connecting));
        assert_eq!(client.metrics().stale_events.get(), 2);
    }

    #[test]
    fn test_message_before_open_goes_live() {
        let (mut client, _transport, view) = client();
        client.start();
        client.handle(envelope(1, TransportEvent::Message(publishes_json(1))));
        assert_eq!(client.state(), Some(ConnectionState::Live));
        assert_eq!(view.render_count(), 1);
    }

    #[test]
    fn test_rate_baseline_survives_reconnect() {
        let (mut client, _transport, view) = client();
        client.start();
        client.handle(envelope(1, TransportEvent::Opened));
        client.handle(envelope(1, TransportEvent::Message(publishes_json(100))));
        client.handle(envelope(1, TransportEvent::Errored("drop".to_string())));

        client.start();
        client.handle(envelope(2, TransportEvent::Opened));
        std::thread::sleep(Duration::from_millis(10));
        client.handle(envelope(2, TransportEvent::Message(publishes_json(200))));

        let renders = view.renders.lock().unwrap().clone();
        assert_eq!(renders.len(), 2);
        assert!(renders[1].1 > 0.0, "rate should use the pre-reconnect baseline");
    }

    #[tokio::test]
    async fn test_reconnect_cycle_transitions() {
        let transport = ScriptedTransport::default();
        let view = RecordingView::default();
        let config = ClientConfig {
            reconnect_delay: Duration::from_millis(50),
        };
        let client = StreamClient::new(transport.clone(), view.clone(), config);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(client.run(shutdown.clone()));

        wait_until(|| transport.connections() == 1).await;
        transport.sink(0).opened();
        wait_until(|| view.statuses().len() == 2).await;

        transport.sink(0).message(publishes_json(100));
        wait_until(|| view.render_count() == 1).await;

        transport.sink(0).errored("connection reset");
        wait_until(|| transport.connections() == 2).await;
        transport.sink(1).opened();
        wait_until(|| view.statuses().len() == 5).await;

        assert_eq!(
            view.statuses(),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Live,
                ConnectionState::Disconnected,
                ConnectionState::Connecting,
                ConnectionState::Live,
            ]
        );
        assert_eq!(transport.max_active.load(Ordering::SeqCst), 1);

        // The superseded sink cannot inject ticks
        transport.sink(0).message(publishes_json(500));
        transport.sink(1).message(publishes_json(150));
        wait_until(|| view.render_count() == 2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(view.render_count(), 2);

        shutdown.cancel();
        let view = task.await.unwrap();
        assert_eq!(view.render_count(), 2);
        assert_eq!(transport.active.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_reconnect() {
        let transport = ScriptedTransport::default();
        let view = RecordingView::default();
        let config = ClientConfig {
            reconnect_delay: Duration::from_secs(60),
        };
        let client = StreamClient::new(transport.clone(), view.clone(), config);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(client.run(shutdown.clone()));

        wait_until(|| transport.connections() == 1).await;
        transport.sink(0).errored("refused");
        wait_until(|| view.statuses().len() == 2).await;

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(transport.connections(), 1);
        assert_eq!(transport.active.load(Ordering::SeqCst), 0);
    }
}
