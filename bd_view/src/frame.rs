//! ABOUTME: Serializable render model handed to presenters
//! ABOUTME: Captures status, readouts, chart series and table rows at one instant

use bd_core::{ConnectionState, MetricsSnapshot};
use serde::{Deserialize, Serialize};

/// Status indicator: healthy flag plus text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub state: ConnectionState,
    pub ok: bool,
    pub text: String,
}

impl From<ConnectionState> for StatusView {
    fn from(state: ConnectionState) -> Self {
        Self {
            state,
            ok: state.is_ok(),
            text: state.status_text().to_string(),
        }
    }
}

/// Scalar readouts from the most recent tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readouts {
    pub clients: u64,
    pub publishes_total: u64,
    /// Derived publishes per second
    pub rate: f64,
    pub uptime_sec: u64,
    /// Uptime rendered for humans, e.g. `1h 2m 5s`
    pub uptime: String,
    pub bytes_in_total: u64,
    pub bytes_out_total: u64,
}

impl Readouts {
    pub fn new(snapshot: &MetricsSnapshot, rate: f64) -> Self {
        Self {
            clients: snapshot.clients,
            publishes_total: snapshot.publishes_total,
            rate,
            uptime_sec: snapshot.uptime_sec,
            uptime: bd_core::time::format_uptime(snapshot.uptime_sec),
            bytes_in_total: snapshot.bytes_in_total,
            bytes_out_total: snapshot.bytes_out_total,
        }
    }
}

/// One row of the recent-ticks table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub time: String,
    pub clients: u64,
    pub publishes_total: u64,
    /// Rate with exactly two decimals
    pub rate: String,
    pub bytes_in_total: u64,
    pub bytes_out_total: u64,
}

impl TableRow {
    pub fn new(time: String, snapshot: &MetricsSnapshot, rate: f64) -> Self {
        Self {
            time,
            clients: snapshot.clients,
            publishes_total: snapshot.publishes_total,
            rate: format!("{:.2}", rate),
            bytes_in_total: snapshot.bytes_in_total,
            bytes_out_total: snapshot.bytes_out_total,
        }
    }
}

/// Index-aligned chart data: `labels[k]`, `rate[k]` and `clients[k]` share a tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub rate: Vec<f64>,
    pub clients: Vec<u64>,
}

/// Everything a presenter needs to draw the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardFrame {
    pub status: StatusView,
    pub readouts: Option<Readouts>,
    pub chart: ChartSeries,
    /// Newest first
    pub table: Vec<TableRow>,
    /// Ticks rendered since startup
    pub ticks: u64,
    pub updated_at: String,
}

impl DashboardFrame {
    /// One-line summary for console output
    pub fn summary(&self) -> String {
        match &self.readouts {
            Some(r) => format!(
                "[{}] clients={} publishes={} rate={:.2}/s uptime={} in={}B out={}B",
                self.status.text,
                r.clients,
                r.publishes_total,
                r.rate,
                r.uptime,
                r.bytes_in_total,
                r.bytes_out_total
            ),
            None => format!("[{}] waiting for first tick", self.status.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            clients: 3,
            publishes_total: 900,
            bytes_in_total: 10,
            bytes_out_total: 20,
            uptime_sec: 65,
        }
    }

    #[test]
    fn test_table_row_rate_has_two_decimals() {
        let row = TableRow::new("12:00:00".to_string(), &snapshot(), 10.0 / 3.0);
        assert_eq!(row.rate, "3.33");

        let row = TableRow::new("12:00:01".to_string(), &snapshot(), 0.0);
        assert_eq!(row.rate, "0.00");
    }

    #[test]
    fn test_readouts_humanize_uptime() {
        let readouts = Readouts::new(&snapshot(), 1.5);
        assert_eq!(readouts.uptime, "1m 5s");
        assert_eq!(readouts.uptime_sec, 65);
    }

    #[test]
    fn test_status_view_from_state() {
        let status = StatusView::from(ConnectionState::Live);
        assert!(status.ok);
        assert_eq!(status.text, "Live");
    }

    #[test]
    fn test_summary_without_readouts() {
        let frame = DashboardFrame {
            status: ConnectionState::Connecting.into(),
            readouts: None,
            chart: ChartSeries::default(),
            table: Vec::new(),
            ticks: 0,
            updated_at: String::new(),
        };
        assert!(frame.summary().contains("waiting for first tick"));
    }
}
