//! Daily price bar as consumed by the zone matcher and exit evaluator.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct DayBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub rsi: Option<f64>,
    /// Trailing average volume of the bars preceding this one.
    pub vol_avg: Option<f64>,
}

impl DayBar {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// False when no trailing average is known.
    pub fn volume_above_average(&self) -> bool {
        match self.vol_avg {
            Some(avg) if avg.is_finite() => self.volume as f64 > avg,
            _ => false,
        }
    }

    /// True when RSI is known and strictly below `max`.
    pub fn rsi_below(&self, max: f64) -> bool {
        match self.rsi {
            Some(rsi) if rsi.is_finite() => rsi < max,
            _ => false,
        }
    }
}
