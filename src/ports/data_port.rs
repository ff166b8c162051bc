//! Market and reference data ports.

use chrono::NaiveDate;

use crate::domain::error::ZonetraderError;
use crate::domain::membership::MembershipInterval;
use crate::domain::ohlcv::DayBar;
use crate::domain::zone::PivotTable;

/// Daily price rows. `None` means no data for that symbol and date.
pub trait PriceFeed {
    fn get_price_row(&self, symbol: &str, date: NaiveDate) -> Option<DayBar>;
}

pub trait MembershipSource {
    fn load_intervals(&self) -> Result<Vec<MembershipInterval>, ZonetraderError>;
}

pub trait PivotSource {
    fn load_pivots(&self) -> Result<PivotTable, ZonetraderError>;
}
