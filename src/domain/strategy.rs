//! Zone strategy parameters.

use std::fmt;
use std::str::FromStr;

pub const DEFAULT_ALLOCATION_PER_ZONE: f64 = 25_000.0;
pub const DEFAULT_S2_RSI_MAX: f64 = 40.0;
pub const DEFAULT_S3_RSI_MAX: f64 = 35.0;

/// Band used by [`TriggerMode::CloseWithinPct`].
pub const CLOSE_TRIGGER_BAND_PCT: f64 = 1.0;

/// How a zone level is considered "hit" on a given day.
///
/// Both semantics exist and neither is the default: a configuration must
/// name one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// Close within 1% of the level; fills at the close.
    CloseWithinPct,
    /// Day's low at or below the level; fills at the level.
    LowTouchesLevel,
}

impl TriggerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerMode::CloseWithinPct => "close-within-1pct",
            TriggerMode::LowTouchesLevel => "low-touches-level",
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "close-within-1pct" => Ok(TriggerMode::CloseWithinPct),
            "low-touches-level" => Ok(TriggerMode::LowTouchesLevel),
            other => Err(format!(
                "unknown trigger mode '{other}' (expected close-within-1pct or low-touches-level)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneStrategy {
    pub allocation_per_zone: f64,
    pub s2_rsi_max: f64,
    pub s3_rsi_max: f64,
    /// Per-symbol capital ceiling for open positions within one period.
    pub max_yearly_cap: f64,
    pub protocol_r: bool,
    pub trigger_mode: TriggerMode,
}

impl ZoneStrategy {
    /// Defaults from the zone playbook; the cap covers all four tranches.
    pub fn with_trigger(trigger_mode: TriggerMode) -> Self {
        ZoneStrategy {
            allocation_per_zone: DEFAULT_ALLOCATION_PER_ZONE,
            s2_rsi_max: DEFAULT_S2_RSI_MAX,
            s3_rsi_max: DEFAULT_S3_RSI_MAX,
            max_yearly_cap: DEFAULT_ALLOCATION_PER_ZONE * 4.0,
            protocol_r: true,
            trigger_mode,
        }
    }
}

/// Parse a Y/N style flag.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Some(true),
        "n" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}
