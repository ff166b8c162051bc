//! Exit rules: zone targets for normal positions and the Protocol R state
//! machine for positions whose symbol left the index.
//!
//! Per position: `Normal → ProtocolRPending → Closed`. The pending transition
//! fires on the first observed member → non-member flip of the symbol; from
//! then on only Protocol R rules apply:
//! 1. price >= min(R1, R2, R3) exits immediately
//! 2. otherwise the position is force-closed 365 days after removal

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};

use super::ledger::PositionLedger;
use super::membership::MembershipOracle;
use super::position::{ExitDate, ExitReason, ExitRecord, Lifecycle, Position, PositionKey};
use super::zone::{PivotLevel, PivotTable};

pub const PROTOCOL_R_HOLD_DAYS: i64 = 365;

/// A member → non-member flip observed for a symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalEvent {
    pub symbol: String,
    pub date: NaiveDate,
    pub positions_affected: usize,
}

/// Exit decision for one position on one day. Levels are the pivots of the
/// position's entry period.
pub fn decide_exit(
    position: &Position,
    price: f64,
    date: NaiveDate,
    levels: &PivotLevel,
) -> Option<ExitReason> {
    match position.lifecycle {
        Lifecycle::Normal => {
            let target = position.entry_zone.exit_resistance()?;
            (price >= levels.resistance(target)).then_some(ExitReason::ZoneTarget {
                zone: position.entry_zone,
                target,
            })
        }
        Lifecycle::ProtocolRPending { removed_on } => {
            if price >= levels.min_resistance() {
                Some(ExitReason::ProtocolRLevelHit)
            } else if date >= removed_on + Duration::days(PROTOCOL_R_HOLD_DAYS) {
                Some(ExitReason::ProtocolRTimeout)
            } else {
                None
            }
        }
        Lifecycle::Closed => None,
    }
}

#[derive(Debug, Clone)]
pub struct ExitEvaluator {
    protocol_r: bool,
    last_seen: HashMap<String, bool>,
    removals: Vec<RemovalEvent>,
}

impl ExitEvaluator {
    pub fn new(protocol_r: bool) -> Self {
        ExitEvaluator {
            protocol_r,
            last_seen: HashMap::new(),
            removals: Vec::new(),
        }
    }

    /// Compare today's membership of each symbol with the last observed value
    /// and move the positions of newly removed symbols into Protocol R.
    /// The first observation of a symbol only sets its baseline.
    pub fn observe_membership<'s>(
        &mut self,
        date: NaiveDate,
        symbols: impl IntoIterator<Item = &'s str>,
        oracle: &MembershipOracle,
        ledger: &mut PositionLedger,
    ) -> Vec<RemovalEvent> {
        if !self.protocol_r {
            return Vec::new();
        }

        let mut events = Vec::new();
        for symbol in symbols {
            let today = oracle.is_member(symbol, date);
            let previous = self.last_seen.insert(symbol.to_string(), today);
            if previous == Some(true) && !today {
                let affected = ledger.activate_protocol_r(symbol, date);
                if affected > 0 {
                    tracing::info!(symbol, %date, positions = affected, "Protocol R activated");
                }
                events.push(RemovalEvent {
                    symbol: symbol.to_string(),
                    date,
                    positions_affected: affected,
                });
            }
        }
        self.removals.extend(events.iter().cloned());
        events
    }

    /// Close every position whose exit rule fires at today's price.
    pub fn execute_exits(
        &self,
        date: NaiveDate,
        prices: &HashMap<String, f64>,
        pivots: &PivotTable,
        ledger: &mut PositionLedger,
    ) -> Vec<ExitRecord> {
        let triggered: Vec<(PositionKey, f64, ExitReason)> = ledger
            .open_positions()
            .filter_map(|pos| {
                let price = *prices.get(&pos.symbol)?;
                let levels = match pivots.get(&pos.symbol, pos.period()) {
                    Some(levels) => levels,
                    None => {
                        tracing::debug!(symbol = %pos.symbol, period = pos.period(), "no exit levels");
                        return None;
                    }
                };
                let reason = decide_exit(pos, price, date, levels)?;
                Some((pos.key(), price, reason))
            })
            .collect();

        let mut exits = Vec::with_capacity(triggered.len());
        for (key, price, reason) in triggered {
            if let Some(position) = ledger.close(&key) {
                tracing::info!(
                    symbol = %position.symbol,
                    zone = %position.entry_zone,
                    price,
                    %reason,
                    "position exited"
                );
                exits.push(ExitRecord::from_position(
                    &position,
                    price,
                    ExitDate::On(date),
                    reason,
                ));
            }
        }
        exits
    }

    /// Report every still-open position as an unrealized exit at its last
    /// known close (entry price if none was seen).
    pub fn mark_open(
        &self,
        last_closes: &HashMap<String, f64>,
        ledger: &mut PositionLedger,
    ) -> Vec<ExitRecord> {
        ledger
            .drain_open()
            .into_iter()
            .map(|position| {
                let price = last_closes
                    .get(&position.symbol)
                    .copied()
                    .unwrap_or(position.entry_price);
                ExitRecord::from_position(&position, price, ExitDate::Open, ExitReason::Open)
            })
            .collect()
    }

    pub fn removals(&self) -> &[RemovalEvent] {
        &self.removals
    }
}
