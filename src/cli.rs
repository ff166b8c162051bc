//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{self, CsvAdapter};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::log_alert_sink::LogAlertSink;
use crate::domain::backtest::{BacktestEngine, BacktestResult, SimulatedBroker};
use crate::domain::config_validation::{RunConfig, load_run_config};
use crate::domain::error::ZonetraderError;
use crate::domain::membership::MembershipOracle;
use crate::domain::metrics::Metrics;
use crate::domain::price_history::PriceHistory;
use crate::domain::zone::{PivotTable, generate_pivots, period_of};
use crate::domain::zone_matcher::{ScanContext, scan_multiple};
use crate::ports::data_port::{MembershipSource, PivotSource};
use crate::ports::execution_port::PositionStore;
use crate::ports::report_port::ReportPort;

/// Prefix of environment variables that override config values.
pub const ENV_PREFIX: &str = "ZONETRADER";

#[derive(Parser, Debug)]
#[command(name = "zonetrader", about = "Pivot zone tranche strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay the strategy over the configured price history
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Exit ledger CSV (default: exits.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Scan index members for entries on one day
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Trading day to scan (default: last day in the price file)
        #[arg(long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
    /// Validate a configuration and its input files
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Generate next-year Fibonacci pivot levels from a price file
    Zones {
        #[arg(long)]
        prices: PathBuf,
        /// Year of the source data (default: last year in the file)
        #[arg(long)]
        year: Option<i32>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List index members on a date
    Members {
        #[arg(long)]
        membership: PathBuf,
        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
    },
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(&config, output.as_deref())
            }
        }
        Command::Scan { config, date } => run_scan(&config, date),
        Command::Validate { config } => run_validate(&config),
        Command::Zones {
            prices,
            year,
            output,
        } => run_zones(&prices, year, output.as_deref()),
        Command::Members { membership, date } => run_members(&membership, date),
    }
}

fn fail(err: ZonetraderError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path)
        .map(|adapter| adapter.with_env_prefix(ENV_PREFIX))
        .map_err(|e| {
            fail(ZonetraderError::ConfigParse {
                file: path.display().to_string(),
                reason: e.to_string(),
            })
        })
}

/// Price history, pivot table and membership oracle of a run.
pub struct RunInputs {
    pub history: PriceHistory,
    pub pivots: PivotTable,
    pub oracle: MembershipOracle,
}

pub fn load_inputs(run: &RunConfig) -> Result<RunInputs, ZonetraderError> {
    let adapter = CsvAdapter::new(
        PathBuf::from(&run.data.prices),
        PathBuf::from(&run.data.pivots),
        PathBuf::from(&run.data.membership),
    );
    let history = adapter.load_price_history(
        run.indicators.rsi_period,
        run.indicators.volume_avg_period,
    )?;
    let pivots = adapter.load_pivots()?;
    let oracle = MembershipOracle::from_intervals(adapter.load_intervals()?)?;
    Ok(RunInputs {
        history,
        pivots,
        oracle,
    })
}

fn run_backtest(config_path: &Path, output_path: Option<&Path>) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let run = match load_run_config(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    // Stage 2: Load data
    let inputs = match load_inputs(&run) {
        Ok(i) => i,
        Err(e) => return fail(e),
    };

    // Stage 3: Replay
    eprintln!(
        "Running backtest: {} symbols, {} pivot rows, trigger {}",
        inputs.history.symbol_count(),
        inputs.pivots.len(),
        run.strategy.trigger_mode,
    );
    let alerts = LogAlertSink;
    let result = BacktestEngine::new(
        &inputs.history,
        &inputs.pivots,
        &inputs.oracle,
        &run.strategy,
        run.backtest,
    )
    .with_alerts(&alerts)
    .run_backtest();

    // Stage 4: Summary and exit ledger
    print_summary(&result);

    let output = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("exits.csv"));
    match CsvReportAdapter::new().write(&result, &output.to_string_lossy()) {
        Ok(()) => {
            eprintln!("\nExit ledger written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

pub fn print_summary(result: &BacktestResult) {
    let metrics = Metrics::compute(&result.exits);

    eprintln!("\n=== Backtest Results ===");
    eprintln!("Days processed:   {}", result.days_processed);
    eprintln!("Entries:          {}", result.entries.len());
    eprintln!("Removals:         {}", result.removals.len());
    eprintln!("Closed trades:    {}", metrics.closed_trades());
    eprintln!("Open positions:   {}", metrics.open_positions);
    eprintln!("Realized P&L:     {:.2}", metrics.realized_pnl);
    eprintln!("Unrealized P&L:   {:.2}", metrics.unrealized_pnl);
    eprintln!("Total P&L:        {:.2}", metrics.total_pnl);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);

    if !metrics.by_zone.is_empty() {
        eprintln!("\n=== Zone-wise P&L ===");
        for (zone, stats) in &metrics.by_zone {
            eprintln!(
                "  {:<3} {:>4} rows  sum {:>12.2}  mean {:>10.2}  min {:>10.2}  max {:>10.2}",
                zone, stats.count, stats.sum, stats.mean, stats.min, stats.max
            );
        }
    }

    if !metrics.by_symbol.is_empty() {
        eprintln!("\n=== Symbol-wise P&L ===");
        for (symbol, stats) in &metrics.by_symbol {
            let pnl_sign = if stats.sum >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {}:  {} rows, {}{:.2}",
                symbol, stats.count, pnl_sign, stats.sum
            );
        }
    }
}

pub fn run_dry_run(config_path: &Path) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let run = match load_run_config(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    eprintln!("Config validated successfully");

    let s = &run.strategy;
    eprintln!("\nZones:");
    eprintln!("  trigger_mode:        {}", s.trigger_mode);
    eprintln!("  allocation_per_zone: {:.2}", s.allocation_per_zone);
    eprintln!("  s2_rsi_max:          {}", s.s2_rsi_max);
    eprintln!("  s3_rsi_max:          {}", s.s3_rsi_max);
    eprintln!("  max_yearly_cap:      {:.2}", s.max_yearly_cap);
    eprintln!("  protocol_r:          {}", if s.protocol_r { "Y" } else { "N" });

    eprintln!("\nData:");
    eprintln!("  prices:     {}", run.data.prices);
    eprintln!("  pivots:     {}", run.data.pivots);
    eprintln!("  membership: {}", run.data.membership);

    let bound = |d: Option<NaiveDate>| d.map_or_else(|| "-".to_string(), |d| d.to_string());
    eprintln!(
        "\nRange: {} to {}",
        bound(run.backtest.start_date),
        bound(run.backtest.end_date)
    );

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let run = match load_run_config(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let inputs = match load_inputs(&run) {
        Ok(i) => i,
        Err(e) => return fail(e),
    };

    let timeline = inputs.history.timeline();
    eprintln!("  symbols with prices: {}", inputs.history.symbol_count());
    if let (Some(first), Some(last)) = (timeline.first(), timeline.last()) {
        eprintln!("  trading days:        {} ({} to {})", timeline.len(), first, last);
    }
    eprintln!("  pivot rows:          {}", inputs.pivots.len());
    eprintln!("  membership symbols:  {}", inputs.oracle.symbol_count());

    let missing: Vec<&str> = inputs
        .history
        .symbols()
        .filter(|s| {
            timeline
                .first()
                .is_some_and(|d| inputs.pivots.get(s, period_of(*d)).is_none())
        })
        .collect();
    if !missing.is_empty() {
        eprintln!(
            "  warning: no pivots for the first period: {}",
            missing.join(", ")
        );
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_scan(config_path: &Path, date: Option<NaiveDate>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let run = match load_run_config(&adapter) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    let inputs = match load_inputs(&run) {
        Ok(i) => i,
        Err(e) => return fail(e),
    };

    let date = match date.or_else(|| inputs.history.timeline().last().copied()) {
        Some(d) => d,
        None => {
            eprintln!("error: no trading days in price data");
            return ExitCode::from(5);
        }
    };
    let members: Vec<String> = inputs.oracle.members_on(date).into_iter().collect();
    eprintln!("Scanning {} members on {}", members.len(), date);

    #[cfg(feature = "sqlite")]
    let mut store: Box<dyn PositionStore> = {
        use crate::adapters::sqlite_adapter::SqlitePositionStore;
        let store = match SqlitePositionStore::from_config(&adapter) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        match close_targets_hit(&store, &inputs, date) {
            Ok(closed) => eprintln!("Closed {} positions at zone targets", closed),
            Err(e) => return fail(e),
        }
        Box::new(store)
    };

    #[cfg(not(feature = "sqlite"))]
    let mut store: Box<dyn PositionStore> = {
        eprintln!("warning: sqlite feature disabled, positions are not persisted");
        Box::new(crate::domain::ledger::PositionLedger::new())
    };

    let broker = SimulatedBroker;
    let alerts = LogAlertSink;
    let mut ctx = ScanContext {
        price_feed: &inputs.history,
        gateway: &broker,
        store: store.as_mut(),
        alerts: Some(&alerts),
    };
    let results = scan_multiple(&members, &inputs.pivots, &run.strategy, date, &mut ctx);

    if let Err(e) = CsvReportAdapter::write_entries(&results, std::io::stdout().lock()) {
        return fail(e);
    }
    let buys = results.iter().filter(|r| r.is_buy()).count();
    eprintln!("{} buys, {} rows", buys, results.len());
    ExitCode::SUCCESS
}

/// Close persisted positions whose zone target is met at `date`'s close.
/// Levels come from the pivots of each position's entry period.
#[cfg(feature = "sqlite")]
fn close_targets_hit(
    store: &crate::adapters::sqlite_adapter::SqlitePositionStore,
    inputs: &RunInputs,
    date: NaiveDate,
) -> Result<usize, ZonetraderError> {
    let mut closed = 0;
    for (symbol, close) in inputs.history.closes_on(date) {
        for position in store.get_open_positions(&symbol)? {
            let Some(target) = position.zone.exit_resistance() else {
                continue;
            };
            let Some(levels) = inputs.pivots.get(&symbol, position.period) else {
                continue;
            };
            if close >= levels.resistance(target)
                && store.close_position(&symbol, position.zone, position.period, close, date)?
            {
                tracing::info!(symbol = %symbol, zone = %position.zone, price = close, "position exited");
                closed += 1;
            }
        }
    }
    Ok(closed)
}

fn run_zones(prices: &Path, year: Option<i32>, output: Option<&Path>) -> ExitCode {
    let bars = match csv_adapter::read_prices(prices) {
        Ok(b) => b,
        Err(e) => return fail(e),
    };
    let year = match year.or_else(|| bars.iter().map(|b| period_of(b.date)).max()) {
        Some(y) => y,
        None => {
            eprintln!("error: no price rows in {}", prices.display());
            return ExitCode::from(5);
        }
    };

    let levels = generate_pivots(&bars, year);
    eprintln!(
        "Generated {} pivot rows for {} from {} data",
        levels.len(),
        year + 1,
        year
    );

    match output {
        Some(path) => match csv_adapter::write_pivots(path, &levels) {
            Ok(()) => {
                eprintln!("Pivots written to: {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(e),
        },
        None => match csv_adapter::write_pivot_rows(std::io::stdout().lock(), &levels) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(e),
        },
    }
}

fn run_members(membership: &Path, date: NaiveDate) -> ExitCode {
    let oracle = match csv_adapter::read_membership(membership)
        .and_then(MembershipOracle::from_intervals)
    {
        Ok(o) => o,
        Err(e) => return fail(e),
    };
    let members = oracle.members_on(date);
    for symbol in &members {
        println!("{}", symbol);
    }
    eprintln!("{} members on {}", members.len(), date);
    ExitCode::SUCCESS
}
