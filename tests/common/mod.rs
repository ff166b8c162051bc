#![allow(dead_code)]

use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashMap;
use zonetrader::domain::error::OrderError;
use zonetrader::domain::membership::{MembershipInterval, MembershipOracle};
pub use zonetrader::domain::ohlcv::DayBar;
use zonetrader::domain::zone::{PivotLevel, PivotTable};
use zonetrader::ports::data_port::PriceFeed;
use zonetrader::ports::execution_port::{AlertSink, Fill, OrderGateway};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Bar with open == close unless overridden, volume 1000, no indicators.
pub fn make_bar(symbol: &str, date: NaiveDate, low: f64, close: f64) -> DayBar {
    DayBar {
        symbol: symbol.to_string(),
        date,
        open: close,
        high: close.max(low) + 1.0,
        low,
        close,
        volume: 1000,
        rsi: None,
        vol_avg: None,
    }
}

/// PP 100 / S1 95 / S2 90 / S3 85 / R1 105 / R2 110 / R3 115.
pub fn standard_pivots(symbol: &str, year: i32) -> PivotLevel {
    PivotLevel {
        symbol: symbol.to_string(),
        year,
        pp: 100.0,
        s1: 95.0,
        s2: 90.0,
        s3: 85.0,
        r1: 105.0,
        r2: 110.0,
        r3: 115.0,
    }
}

pub fn pivot_table(levels: Vec<PivotLevel>) -> PivotTable {
    let mut table = PivotTable::new();
    for level in levels {
        table.insert(level).unwrap();
    }
    table
}

pub fn oracle(intervals: &[(&str, NaiveDate, Option<NaiveDate>)]) -> MembershipOracle {
    MembershipOracle::from_intervals(
        intervals
            .iter()
            .map(|(symbol, from, to)| MembershipInterval {
                symbol: symbol.to_string(),
                from_date: *from,
                to_date: *to,
            })
            .collect(),
    )
    .unwrap()
}

pub struct MockPriceFeed {
    pub bars: HashMap<(String, NaiveDate), DayBar>,
}

impl MockPriceFeed {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
        }
    }

    pub fn with_bar(mut self, bar: DayBar) -> Self {
        self.bars.insert((bar.symbol.clone(), bar.date), bar);
        self
    }
}

impl PriceFeed for MockPriceFeed {
    fn get_price_row(&self, symbol: &str, date: NaiveDate) -> Option<DayBar> {
        self.bars.get(&(symbol.to_string(), date)).cloned()
    }
}

/// Fails every order for the listed symbols, fills the rest at trigger price.
pub struct FailingGateway {
    pub failing: Vec<String>,
    pub calls: RefCell<Vec<(String, i64)>>,
}

impl FailingGateway {
    pub fn for_symbols(symbols: &[&str]) -> Self {
        Self {
            failing: symbols.iter().map(|s| s.to_string()).collect(),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl OrderGateway for FailingGateway {
    fn place_market_buy(&self, symbol: &str, quantity: i64) -> Result<Fill, OrderError> {
        self.calls.borrow_mut().push((symbol.to_string(), quantity));
        if self.failing.iter().any(|s| s == symbol) {
            return Err(OrderError::Unavailable("broker offline".into()));
        }
        Ok(Fill { filled_price: None })
    }
}

/// Fails only the first order it sees.
pub struct FailOnceGateway {
    pub calls: RefCell<usize>,
}

impl FailOnceGateway {
    pub fn new() -> Self {
        Self {
            calls: RefCell::new(0),
        }
    }
}

impl OrderGateway for FailOnceGateway {
    fn place_market_buy(&self, symbol: &str, _quantity: i64) -> Result<Fill, OrderError> {
        let mut calls = self.calls.borrow_mut();
        *calls += 1;
        if *calls == 1 {
            return Err(OrderError::Rejected {
                symbol: symbol.to_string(),
                reason: "price band".into(),
            });
        }
        Ok(Fill { filled_price: None })
    }
}

#[derive(Default)]
pub struct RecordingAlertSink {
    pub messages: RefCell<Vec<String>>,
}

impl AlertSink for RecordingAlertSink {
    fn send(&self, text: &str) -> Result<(), String> {
        self.messages.borrow_mut().push(text.to_string());
        Ok(())
    }
}

pub struct BrokenAlertSink;

impl AlertSink for BrokenAlertSink {
    fn send(&self, _text: &str) -> Result<(), String> {
        Err("channel closed".into())
    }
}
