//! Per-symbol daily bars and the unified trading-day timeline.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use super::error::ZonetraderError;
use super::indicator::{calculate_rsi, trailing_volume_average};
use super::ohlcv::DayBar;
use crate::ports::data_port::PriceFeed;

#[derive(Debug, Clone)]
pub struct SymbolSeries {
    pub symbol: String,
    pub bars: Vec<DayBar>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl SymbolSeries {
    /// `bars` must already be sorted by date.
    pub fn new(symbol: String, bars: Vec<DayBar>) -> Self {
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            symbol,
            bars,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&DayBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    /// Last bar on or before `date`.
    pub fn last_bar_until(&self, date: NaiveDate) -> Option<&DayBar> {
        let idx = self.bars.partition_point(|b| b.date <= date);
        idx.checked_sub(1).map(|i| &self.bars[i])
    }

    /// Fill RSI and trailing volume average where the source left them out.
    /// Values already present are kept.
    pub fn fill_indicators(&mut self, rsi_period: usize, volume_period: usize) {
        let closes: Vec<f64> = self.bars.iter().map(|b| b.close).collect();
        let volumes: Vec<i64> = self.bars.iter().map(|b| b.volume).collect();
        let rsi = calculate_rsi(&closes, rsi_period);
        let vol_avg = trailing_volume_average(&volumes, volume_period);

        for ((bar, rsi), vol_avg) in self.bars.iter_mut().zip(rsi).zip(vol_avg) {
            if bar.rsi.is_none() {
                bar.rsi = rsi;
            }
            if bar.vol_avg.is_none() {
                bar.vol_avg = vol_avg;
            }
        }
    }
}

/// All loaded bars keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    series: BTreeMap<String, SymbolSeries>,
}

impl PriceHistory {
    /// Group bars by symbol and sort them by date. A repeated
    /// (symbol, date) pair is a data error.
    pub fn from_bars(bars: Vec<DayBar>) -> Result<Self, ZonetraderError> {
        let mut grouped: BTreeMap<String, Vec<DayBar>> = BTreeMap::new();
        for bar in bars {
            grouped.entry(bar.symbol.clone()).or_default().push(bar);
        }

        let mut series = BTreeMap::new();
        for (symbol, mut bars) in grouped {
            bars.sort_by_key(|b| b.date);
            if let Some(dup) = bars.windows(2).find(|w| w[0].date == w[1].date) {
                return Err(ZonetraderError::data_format(
                    "prices",
                    format!("duplicate row for {} on {}", symbol, dup[0].date),
                ));
            }
            series.insert(symbol.clone(), SymbolSeries::new(symbol, bars));
        }
        Ok(Self { series })
    }

    pub fn fill_indicators(&mut self, rsi_period: usize, volume_period: usize) {
        for series in self.series.values_mut() {
            series.fill_indicators(rsi_period, volume_period);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn symbol_count(&self) -> usize {
        self.series.len()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn series(&self, symbol: &str) -> Option<&SymbolSeries> {
        self.series.get(symbol)
    }

    /// Sorted distinct dates across every symbol.
    pub fn timeline(&self) -> Vec<NaiveDate> {
        let dates: BTreeSet<NaiveDate> = self
            .series
            .values()
            .flat_map(|s| s.bars.iter().map(|b| b.date))
            .collect();
        dates.into_iter().collect()
    }

    /// Close of every symbol that has a bar on `date`.
    pub fn closes_on(&self, date: NaiveDate) -> HashMap<String, f64> {
        self.series
            .values()
            .filter_map(|s| s.get_bar(date).map(|b| (s.symbol.clone(), b.close)))
            .collect()
    }

    /// Bars of one calendar year, across all symbols.
    pub fn bars_in_year(&self, year: i32) -> Vec<DayBar> {
        self.series
            .values()
            .flat_map(|s| s.bars.iter())
            .filter(|b| super::zone::period_of(b.date) == year)
            .cloned()
            .collect()
    }
}

impl PriceFeed for PriceHistory {
    fn get_price_row(&self, symbol: &str, date: NaiveDate) -> Option<DayBar> {
        self.series.get(symbol)?.get_bar(date).cloned()
    }
}
