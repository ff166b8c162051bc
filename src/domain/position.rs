//! Tranche positions and exit records.

use std::fmt;

use chrono::NaiveDate;

use super::zone::{Period, Resistance, Zone, period_of};

/// Lifecycle of a tranche: `Normal → ProtocolRPending → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Normal,
    ProtocolRPending { removed_on: NaiveDate },
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Open,
    Closed,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Open => f.write_str("open"),
            PositionStatus::Closed => f.write_str("closed"),
        }
    }
}

/// Composite key of the one-tranche-per-zone-per-period invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PositionKey {
    pub symbol: String,
    pub zone: Zone,
    pub period: Period,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub entry_zone: Zone,
    pub entry_price: f64,
    pub quantity: i64,
    pub entry_date: NaiveDate,
    pub lifecycle: Lifecycle,
}

impl Position {
    pub fn new(
        symbol: &str,
        entry_zone: Zone,
        entry_price: f64,
        quantity: i64,
        entry_date: NaiveDate,
    ) -> Self {
        Position {
            symbol: symbol.to_string(),
            entry_zone,
            entry_price,
            quantity,
            entry_date,
            lifecycle: Lifecycle::Normal,
        }
    }

    pub fn period(&self) -> Period {
        period_of(self.entry_date)
    }

    pub fn key(&self) -> PositionKey {
        PositionKey {
            symbol: self.symbol.clone(),
            zone: self.entry_zone,
            period: self.period(),
        }
    }

    pub fn status(&self) -> PositionStatus {
        match self.lifecycle {
            Lifecycle::Closed => PositionStatus::Closed,
            _ => PositionStatus::Open,
        }
    }

    pub fn protocol_r_active(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::ProtocolRPending { .. })
    }

    pub fn removed_on(&self) -> Option<NaiveDate> {
        match self.lifecycle {
            Lifecycle::ProtocolRPending { removed_on } => Some(removed_on),
            _ => None,
        }
    }

    /// One-way move into Protocol R. Returns false if already pending or closed.
    pub fn activate_protocol_r(&mut self, removed_on: NaiveDate) -> bool {
        match self.lifecycle {
            Lifecycle::Normal => {
                self.lifecycle = Lifecycle::ProtocolRPending { removed_on };
                true
            }
            _ => false,
        }
    }

    pub fn capital(&self) -> f64 {
        self.quantity as f64 * self.entry_price
    }

    pub fn pnl_at(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.entry_price)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    ZoneTarget { zone: Zone, target: Resistance },
    ProtocolRLevelHit,
    ProtocolRTimeout,
    Open,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::ZoneTarget { zone, target } => write!(f, "{zone} -> {target}"),
            ExitReason::ProtocolRLevelHit => f.write_str("Protocol R — R-level hit"),
            ExitReason::ProtocolRTimeout => f.write_str("Protocol R — 12 months hold"),
            ExitReason::Open => f.write_str("OPEN"),
        }
    }
}

/// Exit date of a realized exit, or `Open` for a mark-to-market row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDate {
    On(NaiveDate),
    Open,
}

impl fmt::Display for ExitDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitDate::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            ExitDate::Open => f.write_str("OPEN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitRecord {
    pub symbol: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_zone: Zone,
    pub entry_date: NaiveDate,
    pub exit_date: ExitDate,
    pub quantity: i64,
    pub pnl: f64,
    pub reason: ExitReason,
}

impl ExitRecord {
    pub fn from_position(
        position: &Position,
        exit_price: f64,
        exit_date: ExitDate,
        reason: ExitReason,
    ) -> Self {
        ExitRecord {
            symbol: position.symbol.clone(),
            entry_price: position.entry_price,
            exit_price,
            entry_zone: position.entry_zone,
            entry_date: position.entry_date,
            exit_date,
            quantity: position.quantity,
            pnl: position.pnl_at(exit_price),
            reason,
        }
    }

    pub fn is_realized(&self) -> bool {
        matches!(self.exit_date, ExitDate::On(_))
    }
}
