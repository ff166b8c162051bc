//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::ZonetraderError;

/// Port for writing the exit ledger of a backtest.
pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), ZonetraderError>;
}
