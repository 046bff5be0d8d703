//! ABOUTME: Rate derivation and bounded rolling history for live metrics
//! ABOUTME: Turns cumulative counters into rates and keeps fixed-size windows

mod rate;
mod rolling;

pub use rate::RateEstimator;
pub use rolling::RollingBuffer;

/// Default number of points kept per chart series
pub const SERIES_CAPACITY: usize = 60;

/// Default number of rows kept in the recent-ticks table
pub const TABLE_CAPACITY: usize = 25;
