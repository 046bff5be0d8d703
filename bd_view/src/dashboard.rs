//! ABOUTME: Owned dashboard state updated once per tick
//! ABOUTME: Keeps aligned chart buffers and table history, publishes frames on change

use bd_core::{ConnectionState, MetricsSnapshot};
use bd_series::{RollingBuffer, SERIES_CAPACITY, TABLE_CAPACITY};
use tokio::sync::watch;
use tracing::debug;

use crate::frame::{ChartSeries, DashboardFrame, Readouts, StatusView, TableRow};

/// Sink the stream client pushes connection status and computed values into
pub trait DashboardView: Send {
    /// Update the status indicator
    fn set_status(&mut self, state: ConnectionState);

    /// Record one tick and its derived publish rate, then redraw
    fn render(&mut self, snapshot: &MetricsSnapshot, rate: f64);
}

impl<V: DashboardView + ?Sized> DashboardView for &mut V {
    fn set_status(&mut self, state: ConnectionState) {
        (**self).set_status(state)
    }

    fn render(&mut self, snapshot: &MetricsSnapshot, rate: f64) {
        (**self).render(snapshot, rate)
    }
}

impl<V: DashboardView + ?Sized> DashboardView for Box<V> {
    fn set_status(&mut self, state: ConnectionState) {
        (**self).set_status(state)
    }

    fn render(&mut self, snapshot: &MetricsSnapshot, rate: f64) {
        (**self).render(snapshot, rate)
    }
}

/// Dashboard state constructed once at startup
pub struct Dashboard {
    labels: RollingBuffer<String>,
    rate_series: RollingBuffer<f64>,
    clients_series: RollingBuffer<u64>,
    rows: RollingBuffer<TableRow>,
    state: ConnectionState,
    readouts: Option<Readouts>,
    ticks: u64,
    frames: watch::Sender<DashboardFrame>,
}

impl Dashboard {
    /// Create a dashboard with the given chart and table capacities
    pub fn new(series_capacity: usize, table_capacity: usize) -> Self {
        let mut dashboard = Self {
            labels: RollingBuffer::new(series_capacity),
            rate_series: RollingBuffer::new(series_capacity),
            clients_series: RollingBuffer::new(series_capacity),
            rows: RollingBuffer::new(table_capacity),
            state: ConnectionState::Connecting,
            readouts: None,
            ticks: 0,
            frames: watch::channel(empty_frame()).0,
        };
        dashboard.publish();
        dashboard
    }

    /// Subscribe to rendered frames; the receiver always holds the latest one
    pub fn subscribe(&self) -> watch::Receiver<DashboardFrame> {
        self.frames.subscribe()
    }

    /// Build a frame from the current state
    pub fn frame(&self) -> DashboardFrame {
        DashboardFrame {
            status: StatusView::from(self.state),
            readouts: self.readouts.clone(),
            chart: ChartSeries {
                labels: self.labels.to_vec(),
                rate: self.rate_series.to_vec(),
                clients: self.clients_series.to_vec(),
            },
            table: self.rows.to_vec_newest_first(),
            ticks: self.ticks,
            updated_at: bd_core::now_rfc3339(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Record a tick under an explicit time label
    pub fn render_at(&mut self, label: String, snapshot: &MetricsSnapshot, rate: f64) {
        // All aligned buffers move together so index k refers to the same tick
        self.labels.push(label.clone());
        self.rate_series.push(rate);
        self.clients_series.push(snapshot.clients);
        self.rows.push(TableRow::new(label, snapshot, rate));

        self.readouts = Some(Readouts::new(snapshot, rate));
        self.ticks += 1;

        debug!(
            ticks = self.ticks,
            clients = snapshot.clients,
            publishes_total = snapshot.publishes_total,
            rate,
            "Dashboard tick rendered"
        );
        self.publish();
    }

    fn publish(&mut self) {
        let frame = self.frame();
        self.frames.send_replace(frame);
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(SERIES_CAPACITY, TABLE_CAPACITY)
    }
}

impl DashboardView for Dashboard {
    fn set_status(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Dashboard status changed");
        }
        self.state = state;
        self.publish();
    }

    fn render(&mut self, snapshot: &MetricsSnapshot, rate: f64) {
        self.render_at(bd_core::now_label(), snapshot, rate);
    }
}

fn empty_frame() -> DashboardFrame {
    DashboardFrame {
        status: StatusView::from(ConnectionState::Connecting),
        readouts: None,
        chart: ChartSeries::default(),
        table: Vec::new(),
        ticks: 0,
        updated_at: String::new(),
    }
}
