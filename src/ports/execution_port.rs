//! Side-effecting collaborators of the zone scan: order placement, position
//! bookkeeping and alerts.

use chrono::NaiveDate;

use crate::domain::error::{OrderError, ZonetraderError};
use crate::domain::position::PositionStatus;
use crate::domain::zone::{Period, Zone};

/// Gateway acknowledgement. `filled_price: None` means the gateway did not
/// report a price and the trigger price stands.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub filled_price: Option<f64>,
}

pub trait OrderGateway {
    fn place_market_buy(&self, symbol: &str, quantity: i64) -> Result<Fill, OrderError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredPosition {
    pub symbol: String,
    pub zone: Zone,
    pub period: Period,
    pub quantity: i64,
    pub price: f64,
    pub status: PositionStatus,
}

/// A filled tranche to be recorded by the position store.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryFill {
    pub symbol: String,
    pub zone: Zone,
    pub quantity: i64,
    pub price: f64,
    pub date: NaiveDate,
    pub capital: f64,
}

pub trait PositionStore {
    fn get_open_positions(&self, symbol: &str) -> Result<Vec<StoredPosition>, ZonetraderError>;

    /// Zones already taken for (symbol, period). Stores that remember closed
    /// tranches must include them so an exited zone is not reopened.
    fn zones_used(&self, symbol: &str, period: Period) -> Result<Vec<Zone>, ZonetraderError> {
        Ok(self
            .get_open_positions(symbol)?
            .into_iter()
            .filter(|p| p.period == period)
            .map(|p| p.zone)
            .collect())
    }

    /// Capital held in open positions of (symbol, period).
    fn allocated_capital(&self, symbol: &str, period: Period) -> Result<f64, ZonetraderError> {
        Ok(self
            .get_open_positions(symbol)?
            .iter()
            .filter(|p| p.period == period && p.status == PositionStatus::Open)
            .map(|p| p.quantity as f64 * p.price)
            .sum())
    }

    fn log_entry(&mut self, entry: &EntryFill) -> Result<(), ZonetraderError>;
}

/// Fire-and-forget notifications.
pub trait AlertSink {
    fn send(&self, text: &str) -> Result<(), String>;
}
