//! CLI integration tests.
//!
//! Tests cover:
//! - Config loading from INI files on disk
//! - Dry-run mode
//! - Full CSV-driven backtest through `cli::run`
//! - Pivot generation through the zones command
//! - Scan persistence and target exits in the SQLite position store

mod common;

use common::*;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zonetrader::adapters::csv_adapter;
use zonetrader::adapters::file_config_adapter::FileConfigAdapter;
use zonetrader::cli::{self, Cli, Command};
use zonetrader::domain::config_validation::load_run_config;
use zonetrader::domain::error::ZonetraderError;
use zonetrader::domain::strategy::TriggerMode;

const PRICES: &str = "\
date,symbol,open,high,low,close,volume
2025-01-02,TCS,95.00,96.00,94.80,95.50,120000
2025-01-02,INFY,100.00,100.90,99.70,100.20,80000
2025-01-03,TCS,96.00,106.50,95.90,106.00,150000
2025-01-03,INFY,100.10,101.20,100.00,101.00,70000
";

const PIVOTS: &str = "\
symbol,year,pp,s1,s2,s3,r1,r2,r3
TCS,2025,100,95,90,85,105,110,115
INFY,2025,100,95,90,85,105,110,115
";

const MEMBERSHIP: &str = "\
symbol,from_date,to_date
TCS,2020-01-01,
INFY,2020-01-01,
";

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let ws = Workspace {
            dir: TempDir::new().unwrap(),
        };
        ws.write("prices.csv", PRICES);
        ws.write("pivots.csv", PIVOTS);
        ws.write("membership.csv", MEMBERSHIP);
        ws
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    /// Config pointing at the workspace CSVs, with `zones` lines spliced in.
    fn config(&self, zones: &str) -> PathBuf {
        let ini = format!(
            "[zones]\n{zones}\n\n[data]\nprices = {}\npivots = {}\nmembership = {}\n\n[sqlite]\npath = {}\n",
            self.path("prices.csv").display(),
            self.path("pivots.csv").display(),
            self.path("membership.csv").display(),
            self.path("positions.db").display(),
        );
        self.write("zonetrader.ini", &ini)
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

mod config_loading {
    use super::*;

    #[test]
    fn loads_run_config_from_disk() {
        let ws = Workspace::new();
        let path = ws.config("trigger_mode = close-within-1pct\nprotocol_r = N\nmax_yearly_cap = 60000");
        let adapter = FileConfigAdapter::from_file(&path).unwrap();
        let run = load_run_config(&adapter).unwrap();

        assert_eq!(run.strategy.trigger_mode, TriggerMode::CloseWithinPct);
        assert!(!run.strategy.protocol_r);
        assert!((run.strategy.max_yearly_cap - 60_000.0).abs() < f64::EPSILON);
        assert!((run.strategy.allocation_per_zone - 25_000.0).abs() < f64::EPSILON);
        assert_eq!(run.data.prices, ws.path("prices.csv").display().to_string());
        assert_eq!(run.indicators.rsi_period, 14);
        assert_eq!(run.indicators.volume_avg_period, 20);
        assert!(run.backtest.start_date.is_none());
    }

    #[test]
    fn missing_trigger_mode_is_config_missing() {
        let ws = Workspace::new();
        let path = ws.config("allocation_per_zone = 25000");
        let adapter = FileConfigAdapter::from_file(&path).unwrap();
        match load_run_config(&adapter) {
            Err(ZonetraderError::ConfigMissing { section, key }) => {
                assert_eq!(section, "zones");
                assert_eq!(key, "trigger_mode");
            }
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }

    #[test]
    fn environment_style_override_supplies_trigger_mode() {
        let ws = Workspace::new();
        let path = ws.config("allocation_per_zone = 10000");
        let adapter = FileConfigAdapter::from_file(&path).unwrap().with_vars(
            "ZONETRADER",
            vec![(
                "ZONETRADER_ZONES_TRIGGER_MODE".to_string(),
                "low-touches-level".to_string(),
            )],
        );
        let run = load_run_config(&adapter).unwrap();
        assert_eq!(run.strategy.trigger_mode, TriggerMode::LowTouchesLevel);
        assert!((run.strategy.max_yearly_cap - 40_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn load_inputs_reads_all_csvs() {
        let ws = Workspace::new();
        let path = ws.config("trigger_mode = close-within-1pct");
        let adapter = FileConfigAdapter::from_file(&path).unwrap();
        let run = load_run_config(&adapter).unwrap();
        let inputs = cli::load_inputs(&run).unwrap();

        assert_eq!(inputs.history.symbol_count(), 2);
        assert_eq!(inputs.history.timeline(), vec![date(2025, 1, 2), date(2025, 1, 3)]);
        assert_eq!(inputs.pivots.len(), 2);
        assert!(inputs.oracle.is_member("tcs", date(2025, 1, 3)));
    }

    #[test]
    fn load_inputs_reports_missing_file() {
        let ws = Workspace::new();
        fs::remove_file(ws.path("pivots.csv")).unwrap();
        let path = ws.config("trigger_mode = close-within-1pct");
        let adapter = FileConfigAdapter::from_file(&path).unwrap();
        let run = load_run_config(&adapter).unwrap();
        assert!(cli::load_inputs(&run).is_err());
    }
}

mod commands {
    use super::*;

    #[test]
    fn dry_run_validates_without_writing() {
        let ws = Workspace::new();
        let config = ws.config("trigger_mode = close-within-1pct");
        let output = ws.path("exits.csv");
        cli::run(Cli {
            command: Command::Backtest {
                config,
                output: Some(output.clone()),
                dry_run: true,
            },
        });
        assert!(!output.exists());
    }

    #[test]
    fn backtest_writes_exit_ledger() {
        let ws = Workspace::new();
        let config = ws.config("trigger_mode = close-within-1pct");
        let output = ws.path("exits.csv");
        cli::run(Cli {
            command: Command::Backtest {
                config,
                output: Some(output.clone()),
                dry_run: false,
            },
        });

        let lines = read_lines(&output);
        assert_eq!(
            lines[0],
            "symbol,entry_price,exit_price,entry_zone,entry_date,exit_date,quantity,pnl,reason"
        );
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[1],
            "TCS,95.50,106.00,S1,2025-01-02,2025-01-03,261,2740.50,S1 -> R1"
        );
        assert_eq!(
            lines[2],
            "INFY,100.20,101.00,PP,2025-01-02,OPEN,249,199.20,OPEN"
        );
    }

    #[test]
    fn backtest_with_invalid_config_writes_nothing() {
        let ws = Workspace::new();
        let config = ws.config("trigger_mode = sometimes");
        let output = ws.path("exits.csv");
        cli::run(Cli {
            command: Command::Backtest {
                config,
                output: Some(output.clone()),
                dry_run: false,
            },
        });
        assert!(!output.exists());
    }

    #[test]
    fn zones_command_writes_next_year_pivots() {
        let ws = Workspace::new();
        let output = ws.path("pivots_2026.csv");
        cli::run(Cli {
            command: Command::Zones {
                prices: ws.path("prices.csv"),
                year: Some(2025),
                output: Some(output.clone()),
            },
        });

        let table = csv_adapter::read_pivots(&output).unwrap();
        assert_eq!(table.len(), 2);
        let tcs = table.get("TCS", 2026).unwrap();
        // H 106.50, L 94.80, C 106.00
        let expected_pp = (106.5 + 94.8 + 106.0) / 3.0;
        assert!((tcs.pp - expected_pp).abs() < 0.01);
        assert!(tcs.s1 < tcs.pp && tcs.pp < tcs.r1);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn scan_persists_fills_between_runs() {
        use zonetrader::adapters::sqlite_adapter::SqlitePositionStore;
        use zonetrader::domain::zone::Zone;
        use zonetrader::ports::execution_port::PositionStore;

        let ws = Workspace::new();
        let config = ws.config("trigger_mode = close-within-1pct");
        for _ in 0..2 {
            cli::run(Cli {
                command: Command::Scan {
                    config: config.clone(),
                    date: Some(date(2025, 1, 2)),
                },
            });
        }

        let adapter = FileConfigAdapter::from_file(&config).unwrap();
        let store = SqlitePositionStore::from_config(&adapter).unwrap();
        assert_eq!(store.zones_used("TCS", 2025).unwrap(), vec![Zone::S1]);
        assert_eq!(store.zones_used("INFY", 2025).unwrap(), vec![Zone::Pp]);
        assert_eq!(store.get_open_positions("TCS").unwrap().len(), 1);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn scan_closes_persisted_positions_at_target() {
        use zonetrader::adapters::sqlite_adapter::SqlitePositionStore;
        use zonetrader::domain::zone::Zone;
        use zonetrader::ports::execution_port::PositionStore;

        let ws = Workspace::new();
        let config = ws.config("trigger_mode = close-within-1pct");
        for day in [date(2025, 1, 2), date(2025, 1, 3)] {
            cli::run(Cli {
                command: Command::Scan {
                    config: config.clone(),
                    date: Some(day),
                },
            });
        }

        let adapter = FileConfigAdapter::from_file(&config).unwrap();
        let store = SqlitePositionStore::from_config(&adapter).unwrap();
        // TCS S1 @ 95.50 exits at R1 on the 106.00 close; INFY PP has no target
        assert!(store.get_open_positions("TCS").unwrap().is_empty());
        assert_eq!(store.zones_used("TCS", 2025).unwrap(), vec![Zone::S1]);
        assert_eq!(store.get_open_positions("INFY").unwrap().len(), 1);
    }
}
