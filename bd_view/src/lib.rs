//! ABOUTME: Dashboard view state fed by the stream client
//! ABOUTME: Owns chart series and table history and publishes render frames

mod dashboard;
mod frame;

pub use dashboard::{Dashboard, DashboardView};
pub use frame::{ChartSeries, DashboardFrame, Readouts, StatusView, TableRow};
