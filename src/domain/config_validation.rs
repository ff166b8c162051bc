//! Configuration validation.
//!
//! Everything a run needs is read and checked here, before any data is
//! loaded, so a bad value fails at startup instead of mid-replay.

use chrono::NaiveDate;

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::ZonetraderError;
use crate::domain::indicator::{DEFAULT_RSI_PERIOD, DEFAULT_VOLUME_AVG_PERIOD};
use crate::domain::strategy::{
    DEFAULT_ALLOCATION_PER_ZONE, DEFAULT_S2_RSI_MAX, DEFAULT_S3_RSI_MAX, TriggerMode,
    ZoneStrategy, parse_flag,
};
use crate::ports::config_port::ConfigPort;

/// Input file locations from `[data]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub prices: String,
    pub pivots: String,
    pub membership: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorPeriods {
    pub rsi_period: usize,
    pub volume_avg_period: usize,
}

/// Fully validated settings for a backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub strategy: ZoneStrategy,
    pub data: DataPaths,
    pub indicators: IndicatorPeriods,
    pub backtest: BacktestConfig,
}

pub fn load_run_config(config: &dyn ConfigPort) -> Result<RunConfig, ZonetraderError> {
    Ok(RunConfig {
        strategy: build_strategy(config)?,
        data: data_paths(config)?,
        indicators: indicator_periods(config)?,
        backtest: backtest_bounds(config)?,
    })
}

/// `[zones]`. `trigger_mode` has no default.
pub fn build_strategy(config: &dyn ConfigPort) -> Result<ZoneStrategy, ZonetraderError> {
    let trigger_mode: TriggerMode = config
        .require_string("zones", "trigger_mode")?
        .parse()
        .map_err(|reason| invalid("zones", "trigger_mode", reason))?;

    let allocation_per_zone =
        parse_number(config, "zones", "allocation_per_zone", DEFAULT_ALLOCATION_PER_ZONE)?;
    if allocation_per_zone <= 0.0 {
        return Err(invalid(
            "zones",
            "allocation_per_zone",
            "allocation_per_zone must be positive",
        ));
    }

    let s2_rsi_max = parse_number(config, "zones", "s2_rsi_max", DEFAULT_S2_RSI_MAX)?;
    validate_rsi_threshold("s2_rsi_max", s2_rsi_max)?;
    let s3_rsi_max = parse_number(config, "zones", "s3_rsi_max", DEFAULT_S3_RSI_MAX)?;
    validate_rsi_threshold("s3_rsi_max", s3_rsi_max)?;

    let max_yearly_cap =
        parse_number(config, "zones", "max_yearly_cap", allocation_per_zone * 4.0)?;
    if max_yearly_cap <= 0.0 {
        return Err(invalid(
            "zones",
            "max_yearly_cap",
            "max_yearly_cap must be positive",
        ));
    }

    let protocol_r = match config.get_string("zones", "protocol_r") {
        None => true,
        Some(v) if v.trim().is_empty() => true,
        Some(v) => parse_flag(&v)
            .ok_or_else(|| invalid("zones", "protocol_r", "protocol_r must be Y or N"))?,
    };

    Ok(ZoneStrategy {
        allocation_per_zone,
        s2_rsi_max,
        s3_rsi_max,
        max_yearly_cap,
        protocol_r,
        trigger_mode,
    })
}

pub fn data_paths(config: &dyn ConfigPort) -> Result<DataPaths, ZonetraderError> {
    Ok(DataPaths {
        prices: config.require_string("data", "prices")?,
        pivots: config.require_string("data", "pivots")?,
        membership: config.require_string("data", "membership")?,
    })
}

pub fn indicator_periods(config: &dyn ConfigPort) -> Result<IndicatorPeriods, ZonetraderError> {
    Ok(IndicatorPeriods {
        rsi_period: parse_period(config, "rsi_period", DEFAULT_RSI_PERIOD)?,
        volume_avg_period: parse_period(config, "volume_avg_period", DEFAULT_VOLUME_AVG_PERIOD)?,
    })
}

/// `[backtest]` start and end dates, both optional and inclusive.
pub fn backtest_bounds(config: &dyn ConfigPort) -> Result<BacktestConfig, ZonetraderError> {
    let start_date = parse_optional_date(config, "start_date")?;
    let end_date = parse_optional_date(config, "end_date")?;
    if let (Some(start), Some(end)) = (start_date, end_date)
        && start > end
    {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(BacktestConfig {
        start_date,
        end_date,
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ZonetraderError {
    ZonetraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// A present but unparseable value is an error, not a silent default.
fn parse_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, ZonetraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => match v.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(n),
            _ => Err(invalid(section, key, format!("{key} must be a number"))),
        },
    }
}

fn validate_rsi_threshold(key: &str, value: f64) -> Result<(), ZonetraderError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(invalid(
            "zones",
            key,
            format!("{key} must be between 0 and 100"),
        ));
    }
    Ok(())
}

fn parse_period(
    config: &dyn ConfigPort,
    key: &str,
    default: usize,
) -> Result<usize, ZonetraderError> {
    match config.get_string("indicators", key) {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => match v.trim().parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(invalid(
                "indicators",
                key,
                format!("{key} must be a positive integer"),
            )),
        },
    }
}

fn parse_optional_date(
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<NaiveDate>, ZonetraderError> {
    match config.get_string("backtest", key) {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                invalid(
                    "backtest",
                    key,
                    format!("invalid {} format, expected YYYY-MM-DD", key),
                )
            }),
    }
}
