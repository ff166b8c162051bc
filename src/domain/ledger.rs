//! Position ledger: open tranches plus the record of zones used per period.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use super::error::ZonetraderError;
use super::position::{Lifecycle, Position, PositionKey, PositionStatus};
use super::zone::{Period, Zone};
use crate::ports::execution_port::{EntryFill, PositionStore, StoredPosition};

/// Exclusively owned by the simulation driver for the lifetime of a run.
///
/// A key stays in `used` after its position exits, so a (symbol, zone,
/// period) can be traded at most once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionLedger {
    open: BTreeMap<PositionKey, Position>,
    used: BTreeSet<PositionKey>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_position(&mut self, position: Position) -> Result<(), ZonetraderError> {
        let key = position.key();
        if self.used.contains(&key) {
            return Err(ZonetraderError::InvariantViolation {
                reason: format!(
                    "{} {} already used in {}",
                    key.symbol, key.zone, key.period
                ),
            });
        }
        self.used.insert(key.clone());
        self.open.insert(key, position);
        Ok(())
    }

    pub fn is_used(&self, symbol: &str, zone: Zone, period: Period) -> bool {
        self.used.contains(&PositionKey {
            symbol: symbol.to_string(),
            zone,
            period,
        })
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn allocated(&self, symbol: &str, period: Period) -> f64 {
        self.open
            .iter()
            .filter(|(k, _)| k.symbol == symbol && k.period == period)
            .map(|(_, p)| p.capital())
            .sum()
    }

    /// Move every `Normal` position of `symbol` into Protocol R. Returns how
    /// many positions changed state.
    pub fn activate_protocol_r(&mut self, symbol: &str, removed_on: NaiveDate) -> usize {
        let mut changed = 0;
        for (key, position) in self.open.iter_mut() {
            if key.symbol == symbol && position.activate_protocol_r(removed_on) {
                changed += 1;
            }
        }
        changed
    }

    /// Remove a position from the active set. The key remains used.
    pub fn close(&mut self, key: &PositionKey) -> Option<Position> {
        let mut position = self.open.remove(key)?;
        position.lifecycle = Lifecycle::Closed;
        Some(position)
    }

    /// Drain every open position, in key order.
    pub fn drain_open(&mut self) -> Vec<Position> {
        std::mem::take(&mut self.open).into_values().collect()
    }
}

impl PositionStore for PositionLedger {
    fn get_open_positions(&self, symbol: &str) -> Result<Vec<StoredPosition>, ZonetraderError> {
        Ok(self
            .open
            .values()
            .filter(|p| p.symbol == symbol)
            .map(|p| StoredPosition {
                symbol: p.symbol.clone(),
                zone: p.entry_zone,
                period: p.period(),
                quantity: p.quantity,
                price: p.entry_price,
                status: PositionStatus::Open,
            })
            .collect())
    }

    fn zones_used(&self, symbol: &str, period: Period) -> Result<Vec<Zone>, ZonetraderError> {
        Ok(self
            .used
            .iter()
            .filter(|k| k.symbol == symbol && k.period == period)
            .map(|k| k.zone)
            .collect())
    }

    fn allocated_capital(&self, symbol: &str, period: Period) -> Result<f64, ZonetraderError> {
        Ok(self.allocated(symbol, period))
    }

    fn log_entry(&mut self, entry: &EntryFill) -> Result<(), ZonetraderError> {
        self.open_position(Position::new(
            &entry.symbol,
            entry.zone,
            entry.price,
            entry.quantity,
            entry.date,
        ))
    }
}
