//! Indicator computations used by the entry filters.
//!
//! Both functions return a series aligned with their input, with `None`
//! during warmup.

pub mod rsi;
pub mod volume;

pub use rsi::calculate_rsi;
pub use volume::trailing_volume_average;

pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_VOLUME_AVG_PERIOD: usize = 20;
