//! CSV writers for the exit ledger and scan results.

use std::path::Path;

use serde::Serialize;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::ZonetraderError;
use crate::domain::position::ExitRecord;
use crate::domain::zone_matcher::EntryResult;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Serialize)]
struct ExitRow {
    symbol: String,
    entry_price: String,
    exit_price: String,
    entry_zone: String,
    entry_date: String,
    exit_date: String,
    quantity: i64,
    pnl: String,
    reason: String,
}

impl From<&ExitRecord> for ExitRow {
    fn from(exit: &ExitRecord) -> Self {
        ExitRow {
            symbol: exit.symbol.clone(),
            entry_price: format!("{:.2}", exit.entry_price),
            exit_price: format!("{:.2}", exit.exit_price),
            entry_zone: exit.entry_zone.to_string(),
            entry_date: exit.entry_date.format("%Y-%m-%d").to_string(),
            exit_date: exit.exit_date.to_string(),
            quantity: exit.quantity,
            pnl: format!("{:.2}", exit.pnl),
            reason: exit.reason.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EntryRow {
    symbol: String,
    zone: String,
    action: String,
    reason: String,
    quantity: Option<i64>,
    price: String,
    value: String,
}

fn money(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_default()
}

impl From<&EntryResult> for EntryRow {
    fn from(r: &EntryResult) -> Self {
        EntryRow {
            symbol: r.symbol.clone(),
            zone: r.zone.map(|z| z.to_string()).unwrap_or_default(),
            action: r.action.to_string(),
            reason: r.reason.clone(),
            quantity: r.quantity,
            price: money(r.price),
            value: money(r.value),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Serialize exits to any writer, header first.
    pub fn write_exits<W: std::io::Write>(
        exits: &[ExitRecord],
        writer: W,
    ) -> Result<(), ZonetraderError> {
        let mut wtr = csv::Writer::from_writer(writer);
        if exits.is_empty() {
            wtr.write_record([
                "symbol",
                "entry_price",
                "exit_price",
                "entry_zone",
                "entry_date",
                "exit_date",
                "quantity",
                "pnl",
                "reason",
            ])
            .map_err(|e| ZonetraderError::data_format("exits", e))?;
        }
        for exit in exits {
            wtr.serialize(ExitRow::from(exit))
                .map_err(|e| ZonetraderError::data_format("exits", e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Serialize scan results, one row per zone checked.
    pub fn write_entries<W: std::io::Write>(
        results: &[EntryResult],
        writer: W,
    ) -> Result<(), ZonetraderError> {
        let mut wtr = csv::Writer::from_writer(writer);
        if results.is_empty() {
            wtr.write_record([
                "symbol", "zone", "action", "reason", "quantity", "price", "value",
            ])
            .map_err(|e| ZonetraderError::data_format("entries", e))?;
        }
        for result in results {
            wtr.serialize(EntryRow::from(result))
                .map_err(|e| ZonetraderError::data_format("entries", e))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_path: &str) -> Result<(), ZonetraderError> {
        let file = std::fs::File::create(Path::new(output_path))?;
        Self::write_exits(&result.exits, file)?;
        tracing::info!(path = output_path, rows = result.exits.len(), "exit ledger written");
        Ok(())
    }
}
