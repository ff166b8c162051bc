//! Historical replay of the zone strategy.
//!
//! Each trading day, in ascending order:
//! 1. closes for the day update the last-known-close lookup
//! 2. index members with a bar are scanned for entries
//! 3. membership flips move positions into Protocol R
//! 4. exit rules close positions at the day's close
//!
//! Positions still open when the data runs out are reported with exit date
//! `OPEN` at their last close.

use std::collections::HashMap;

use chrono::NaiveDate;

use super::error::OrderError;
use super::exit_evaluator::{ExitEvaluator, RemovalEvent};
use super::ledger::PositionLedger;
use super::membership::MembershipOracle;
use super::position::ExitRecord;
use super::price_history::PriceHistory;
use super::strategy::ZoneStrategy;
use super::zone::PivotTable;
use super::zone_matcher::{EntryResult, ScanContext, scan_multiple};
use crate::ports::execution_port::{AlertSink, Fill, OrderGateway};

/// Optional inclusive bounds on the replayed dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BacktestConfig {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl BacktestConfig {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|start| date >= start)
            && self.end_date.is_none_or(|end| date <= end)
    }
}

/// Fills every order at the trigger price.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedBroker;

impl OrderGateway for SimulatedBroker {
    fn place_market_buy(&self, _symbol: &str, _quantity: i64) -> Result<Fill, OrderError> {
        Ok(Fill { filled_price: None })
    }
}

/// A filled entry and the day it happened.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryEvent {
    pub date: NaiveDate,
    pub result: EntryResult,
}

#[derive(Debug, Clone, Default)]
pub struct BacktestResult {
    /// Realized exits in date order, then unrealized `OPEN` rows.
    pub exits: Vec<ExitRecord>,
    pub entries: Vec<EntryEvent>,
    pub removals: Vec<RemovalEvent>,
    pub days_processed: usize,
    pub skipped: usize,
}

impl BacktestResult {
    pub fn realized(&self) -> impl Iterator<Item = &ExitRecord> {
        self.exits.iter().filter(|e| e.is_realized())
    }

    pub fn unrealized(&self) -> impl Iterator<Item = &ExitRecord> {
        self.exits.iter().filter(|e| !e.is_realized())
    }
}

pub struct BacktestEngine<'a> {
    history: &'a PriceHistory,
    pivots: &'a PivotTable,
    oracle: &'a MembershipOracle,
    strategy: &'a ZoneStrategy,
    config: BacktestConfig,
    gateway: &'a dyn OrderGateway,
    alerts: Option<&'a dyn AlertSink>,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(
        history: &'a PriceHistory,
        pivots: &'a PivotTable,
        oracle: &'a MembershipOracle,
        strategy: &'a ZoneStrategy,
        config: BacktestConfig,
    ) -> Self {
        Self {
            history,
            pivots,
            oracle,
            strategy,
            config,
            gateway: &SimulatedBroker,
            alerts: None,
        }
    }

    pub fn with_gateway(mut self, gateway: &'a dyn OrderGateway) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_alerts(mut self, alerts: &'a dyn AlertSink) -> Self {
        self.alerts = Some(alerts);
        self
    }

    pub fn run_backtest(&self) -> BacktestResult {
        let mut ledger = PositionLedger::new();
        let mut evaluator = ExitEvaluator::new(self.strategy.protocol_r);
        let mut last_closes: HashMap<String, f64> = HashMap::new();
        let mut result = BacktestResult::default();

        let universe: Vec<String> = self.history.symbols().map(str::to_string).collect();
        let timeline: Vec<NaiveDate> = self
            .history
            .timeline()
            .into_iter()
            .filter(|d| self.config.contains(*d))
            .collect();

        tracing::info!(
            days = timeline.len(),
            symbols = universe.len(),
            trigger = %self.strategy.trigger_mode,
            "backtest started"
        );

        for date in timeline {
            let closes = self.history.closes_on(date);
            last_closes.extend(closes.iter().map(|(s, c)| (s.clone(), *c)));

            let candidates: Vec<String> = universe
                .iter()
                .filter(|s| closes.contains_key(*s) && self.oracle.is_member(s, date))
                .cloned()
                .collect();

            let entries = {
                let mut ctx = ScanContext {
                    price_feed: self.history,
                    gateway: self.gateway,
                    store: &mut ledger,
                    alerts: self.alerts,
                };
                scan_multiple(&candidates, self.pivots, self.strategy, date, &mut ctx)
            };
            for entry in entries {
                if entry.is_buy() {
                    result.entries.push(EntryEvent {
                        date,
                        result: entry,
                    });
                } else {
                    result.skipped += 1;
                }
            }

            evaluator.observe_membership(
                date,
                universe.iter().map(String::as_str),
                self.oracle,
                &mut ledger,
            );
            let exits = evaluator.execute_exits(date, &closes, self.pivots, &mut ledger);
            result.exits.extend(exits);
            result.days_processed += 1;
        }

        let open = evaluator.mark_open(&last_closes, &mut ledger);
        result.removals = evaluator.removals().to_vec();
        tracing::info!(
            entries = result.entries.len(),
            exits = result.exits.len(),
            open = open.len(),
            removals = result.removals.len(),
            "backtest finished"
        );
        result.exits.extend(open);
        result
    }
}
