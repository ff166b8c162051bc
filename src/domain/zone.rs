//! Pivot zones, yearly pivot levels and the pivot table.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};

use super::error::ZonetraderError;
use super::ohlcv::DayBar;

/// Yearly tranche period. One position per zone per period.
pub type Period = i32;

pub fn period_of(date: NaiveDate) -> Period {
    date.year()
}

/// Entry zone, in the fixed evaluation order PP → S1 → S2 → S3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Zone {
    Pp,
    S1,
    S2,
    S3,
}

impl Zone {
    pub const ALL: [Zone; 4] = [Zone::Pp, Zone::S1, Zone::S2, Zone::S3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Pp => "PP",
            Zone::S1 => "S1",
            Zone::S2 => "S2",
            Zone::S3 => "S3",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PP" | "P" => Ok(Zone::Pp),
            "S1" => Ok(Zone::S1),
            "S2" => Ok(Zone::S2),
            "S3" => Ok(Zone::S3),
            other => Err(format!("unknown zone: {other}")),
        }
    }
}

/// Resistance level paired with a support zone for normal exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resistance {
    R1,
    R2,
    R3,
}

impl fmt::Display for Resistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resistance::R1 => "R1",
            Resistance::R2 => "R2",
            Resistance::R3 => "R3",
        };
        f.write_str(s)
    }
}

impl Zone {
    /// S1 exits at R1, S2 at R2, S3 at R3. PP is held.
    pub fn exit_resistance(&self) -> Option<Resistance> {
        match self {
            Zone::Pp => None,
            Zone::S1 => Some(Resistance::R1),
            Zone::S2 => Some(Resistance::R2),
            Zone::S3 => Some(Resistance::R3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotLevel {
    pub symbol: String,
    /// Trading year the levels apply to.
    pub year: Period,
    pub pp: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
}

const FIB_1: f64 = 0.382;
const FIB_2: f64 = 0.618;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

impl PivotLevel {
    /// Fibonacci pivots from a period's high, low and last close.
    pub fn fibonacci(symbol: &str, year: Period, high: f64, low: f64, close: f64) -> Self {
        let pp = (high + low + close) / 3.0;
        let range = high - low;
        PivotLevel {
            symbol: symbol.to_string(),
            year,
            pp: round2(pp),
            s1: round2(pp - FIB_1 * range),
            s2: round2(pp - FIB_2 * range),
            s3: round2(pp - range),
            r1: round2(pp + FIB_1 * range),
            r2: round2(pp + FIB_2 * range),
            r3: round2(pp + range),
        }
    }

    pub fn level(&self, zone: Zone) -> f64 {
        match zone {
            Zone::Pp => self.pp,
            Zone::S1 => self.s1,
            Zone::S2 => self.s2,
            Zone::S3 => self.s3,
        }
    }

    pub fn resistance(&self, r: Resistance) -> f64 {
        match r {
            Resistance::R1 => self.r1,
            Resistance::R2 => self.r2,
            Resistance::R3 => self.r3,
        }
    }

    pub fn exit_target(&self, zone: Zone) -> Option<f64> {
        zone.exit_resistance().map(|r| self.resistance(r))
    }

    pub fn min_resistance(&self) -> f64 {
        self.r1.min(self.r2).min(self.r3)
    }

    pub fn validate(&self) -> Result<(), ZonetraderError> {
        let ladder = [
            self.s3, self.s2, self.s1, self.pp, self.r1, self.r2, self.r3,
        ];
        if ladder.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(self.invalid("levels must be positive and finite"));
        }
        if ladder.windows(2).any(|w| w[0] > w[1]) {
            return Err(self.invalid("levels must ascend S3 <= S2 <= S1 <= PP <= R1 <= R2 <= R3"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> ZonetraderError {
        ZonetraderError::InvalidPivots {
            symbol: self.symbol.clone(),
            year: self.year,
            reason: reason.to_string(),
        }
    }
}

/// Pivot levels keyed by (symbol, year).
#[derive(Debug, Clone, Default)]
pub struct PivotTable {
    levels: HashMap<(String, Period), PivotLevel>,
}

impl PivotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and inserts; a later row for the same key replaces the earlier one.
    pub fn insert(&mut self, level: PivotLevel) -> Result<(), ZonetraderError> {
        level.validate()?;
        self.levels
            .insert((level.symbol.clone(), level.year), level);
        Ok(())
    }

    pub fn get(&self, symbol: &str, year: Period) -> Option<&PivotLevel> {
        self.levels.get(&(symbol.to_string(), year))
    }

    pub fn for_date(&self, symbol: &str, date: NaiveDate) -> Option<&PivotLevel> {
        self.get(symbol, period_of(date))
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Levels sorted by symbol then year.
    pub fn sorted(&self) -> Vec<&PivotLevel> {
        let mut rows: Vec<&PivotLevel> = self.levels.values().collect();
        rows.sort_by(|a, b| a.symbol.cmp(&b.symbol).then(a.year.cmp(&b.year)));
        rows
    }
}

/// Build next-year pivots from each symbol's bars in `data_year`.
///
/// Bars must be sorted by date per symbol; the last bar of the year supplies
/// the close. Symbols without bars in `data_year` are skipped.
pub fn generate_pivots(bars: &[DayBar], data_year: Period) -> Vec<PivotLevel> {
    let mut by_symbol: HashMap<&str, (f64, f64, NaiveDate, f64)> = HashMap::new();
    for bar in bars.iter().filter(|b| b.date.year() == data_year) {
        let entry = by_symbol
            .entry(bar.symbol.as_str())
            .or_insert((bar.high, bar.low, bar.date, bar.close));
        entry.0 = entry.0.max(bar.high);
        entry.1 = entry.1.min(bar.low);
        if bar.date >= entry.2 {
            entry.2 = bar.date;
            entry.3 = bar.close;
        }
    }

    let mut levels: Vec<PivotLevel> = by_symbol
        .into_iter()
        .map(|(symbol, (high, low, _, close))| {
            PivotLevel::fibonacci(symbol, data_year + 1, high, low, close)
        })
        .collect();
    levels.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    levels
}
