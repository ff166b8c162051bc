//! P&L summary of a backtest: totals, trade statistics and the zone-wise and
//! symbol-wise breakdowns.

use std::collections::BTreeMap;

use super::position::ExitRecord;
use super::zone::Zone;

/// count / sum / mean / min / max of the P&L of one group of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStats {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl GroupStats {
    fn from_pnls(pnls: &[f64]) -> Self {
        let count = pnls.len();
        let sum: f64 = pnls.iter().sum();
        GroupStats {
            count,
            sum,
            mean: if count > 0 { sum / count as f64 } else { 0.0 },
            min: pnls.iter().copied().fold(f64::INFINITY, f64::min),
            max: pnls.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_pnl: f64,
    pub capital_deployed: f64,
    pub open_positions: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Mean calendar days held, realized exits only.
    pub avg_holding_days: f64,
    /// Breakdowns cover every row, realized or still open.
    pub by_zone: BTreeMap<Zone, GroupStats>,
    pub by_symbol: BTreeMap<String, GroupStats>,
}

impl Metrics {
    pub fn compute(exits: &[ExitRecord]) -> Self {
        let mut realized_pnl = 0.0_f64;
        let mut unrealized_pnl = 0.0_f64;
        let mut capital_deployed = 0.0_f64;
        let mut open_positions = 0usize;

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_holding_days = 0i64;

        let mut zone_pnls: BTreeMap<Zone, Vec<f64>> = BTreeMap::new();
        let mut symbol_pnls: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for exit in exits {
            capital_deployed += exit.quantity as f64 * exit.entry_price;
            zone_pnls.entry(exit.entry_zone).or_default().push(exit.pnl);
            symbol_pnls
                .entry(exit.symbol.clone())
                .or_default()
                .push(exit.pnl);

            let exit_date = match exit.exit_date {
                super::position::ExitDate::On(date) => date,
                super::position::ExitDate::Open => {
                    unrealized_pnl += exit.pnl;
                    open_positions += 1;
                    continue;
                }
            };

            realized_pnl += exit.pnl;
            total_holding_days += (exit_date - exit.entry_date).num_days();
            let pnl = exit.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                if pnl > largest_win {
                    largest_win = pnl;
                }
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                if pnl.abs() > largest_loss {
                    largest_loss = pnl.abs();
                }
            } else {
                trades_breakeven += 1;
            }
        }

        let closed = trades_won + trades_lost + trades_breakeven;
        let win_rate = if closed > 0 {
            trades_won as f64 / closed as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let avg_holding_days = if closed > 0 {
            total_holding_days as f64 / closed as f64
        } else {
            0.0
        };

        Metrics {
            realized_pnl,
            unrealized_pnl,
            total_pnl: realized_pnl + unrealized_pnl,
            capital_deployed,
            open_positions,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_holding_days,
            by_zone: zone_pnls
                .into_iter()
                .map(|(zone, pnls)| (zone, GroupStats::from_pnls(&pnls)))
                .collect(),
            by_symbol: symbol_pnls
                .into_iter()
                .map(|(symbol, pnls)| (symbol, GroupStats::from_pnls(&pnls)))
                .collect(),
        }
    }

    pub fn closed_trades(&self) -> usize {
        self.trades_won + self.trades_lost + self.trades_breakeven
    }
}
