//! Zone entry decisions and the daily multi-symbol scan.
//!
//! Zones are checked PP → S1 → S2 → S3 and the first BUY wins. Every "no
//! trade" outcome is a [`SkipReason`], never an error: a missing bar, a
//! rejected order or an unreachable position store only affects the symbol
//! being scanned.

use std::fmt;

use chrono::NaiveDate;

use super::ohlcv::DayBar;
use super::strategy::{CLOSE_TRIGGER_BAND_PCT, TriggerMode, ZoneStrategy};
use super::zone::{PivotLevel, PivotTable, Zone, period_of};
use crate::ports::data_port::PriceFeed;
use crate::ports::execution_port::{AlertSink, EntryFill, OrderGateway, PositionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyOpen,
    PriceNotInZone,
    RsiFilter,
    NotBullish,
    VolumeFilter,
    NonPositiveQuantity,
    YearlyCapReached,
    OrderFailed,
    NoPriceData,
    NoPivotLevels,
    StoreUnavailable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::AlreadyOpen => "Zone allocation already open",
            SkipReason::PriceNotInZone => "Price not within zone",
            SkipReason::RsiFilter => "RSI filter fail",
            SkipReason::NotBullish => "Not bullish candle",
            SkipReason::VolumeFilter => "Volume filter fail",
            SkipReason::NonPositiveQuantity => "Qty <= 0",
            SkipReason::YearlyCapReached => "Yearly cap reached",
            SkipReason::OrderFailed => "Order placement failed",
            SkipReason::NoPriceData => "No price data",
            SkipReason::NoPivotLevels => "No pivot levels",
            SkipReason::StoreUnavailable => "Position store unavailable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Buy { zone: Zone, quantity: i64, price: f64 },
    Skip(SkipReason),
}

/// Snapshot of a symbol's position state for the current period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneState {
    pub used: Vec<Zone>,
    pub allocated: f64,
}

/// Price at which `level` triggers under `mode`, if it does.
pub fn trigger_price(level: f64, bar: &DayBar, mode: TriggerMode) -> Option<f64> {
    match mode {
        TriggerMode::CloseWithinPct => {
            let band = level.abs() * CLOSE_TRIGGER_BAND_PCT / 100.0;
            ((bar.close - level).abs() <= band).then_some(bar.close)
        }
        TriggerMode::LowTouchesLevel => (bar.low <= level).then_some(level),
    }
}

/// Whole shares purchasable with `allocation` at `price`.
pub fn compute_quantity(allocation: f64, price: f64) -> i64 {
    if price <= 0.0 || !price.is_finite() {
        return 0;
    }
    (allocation / price).floor() as i64
}

fn secondary_filters(zone: Zone, bar: &DayBar, strategy: &ZoneStrategy) -> Option<SkipReason> {
    let rsi_max = match zone {
        Zone::Pp | Zone::S1 => return None,
        Zone::S2 => strategy.s2_rsi_max,
        Zone::S3 => strategy.s3_rsi_max,
    };
    if !bar.rsi_below(rsi_max) {
        return Some(SkipReason::RsiFilter);
    }
    if !bar.is_bullish() {
        return Some(SkipReason::NotBullish);
    }
    if !bar.volume_above_average() {
        return Some(SkipReason::VolumeFilter);
    }
    None
}

/// Decide a single zone.
pub fn check_zone(
    zone: Zone,
    bar: &DayBar,
    pivots: &PivotLevel,
    state: &ZoneState,
    strategy: &ZoneStrategy,
) -> Decision {
    if state.used.contains(&zone) {
        return Decision::Skip(SkipReason::AlreadyOpen);
    }

    let price = match trigger_price(pivots.level(zone), bar, strategy.trigger_mode) {
        Some(p) => p,
        None => return Decision::Skip(SkipReason::PriceNotInZone),
    };

    if let Some(reason) = secondary_filters(zone, bar, strategy) {
        return Decision::Skip(reason);
    }

    let quantity = compute_quantity(strategy.allocation_per_zone, price);
    if quantity <= 0 {
        return Decision::Skip(SkipReason::NonPositiveQuantity);
    }

    if state.allocated + quantity as f64 * price > strategy.max_yearly_cap {
        return Decision::Skip(SkipReason::YearlyCapReached);
    }

    Decision::Buy {
        zone,
        quantity,
        price,
    }
}

/// First BUY across zones; otherwise the skip reason of the first zone whose
/// price trigger fired, or "Price not within zone" if none did.
pub fn evaluate(
    bar: &DayBar,
    pivots: &PivotLevel,
    state: &ZoneState,
    strategy: &ZoneStrategy,
) -> Decision {
    let mut first_triggered: Option<SkipReason> = None;
    for zone in Zone::ALL {
        match check_zone(zone, bar, pivots, state, strategy) {
            buy @ Decision::Buy { .. } => return buy,
            Decision::Skip(SkipReason::AlreadyOpen | SkipReason::PriceNotInZone) => {}
            Decision::Skip(reason) => {
                first_triggered.get_or_insert(reason);
            }
        }
    }
    Decision::Skip(first_triggered.unwrap_or(SkipReason::PriceNotInZone))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    Buy,
    Skip,
}

impl fmt::Display for EntryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryAction::Buy => f.write_str("BUY"),
            EntryAction::Skip => f.write_str("SKIP"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryResult {
    pub symbol: String,
    pub zone: Option<Zone>,
    pub action: EntryAction,
    pub reason: String,
    pub quantity: Option<i64>,
    pub price: Option<f64>,
    pub value: Option<f64>,
}

impl EntryResult {
    fn skip(symbol: &str, zone: Option<Zone>, reason: SkipReason, price: Option<f64>) -> Self {
        EntryResult {
            symbol: symbol.to_string(),
            zone,
            action: EntryAction::Skip,
            reason: reason.to_string(),
            quantity: None,
            price,
            value: None,
        }
    }

    pub fn is_buy(&self) -> bool {
        self.action == EntryAction::Buy
    }
}

/// Collaborators for a scan, constructed once per run and passed in.
pub struct ScanContext<'a> {
    pub price_feed: &'a dyn PriceFeed,
    pub gateway: &'a dyn OrderGateway,
    pub store: &'a mut dyn PositionStore,
    pub alerts: Option<&'a dyn AlertSink>,
}

fn load_zone_state(
    store: &dyn PositionStore,
    symbol: &str,
    date: NaiveDate,
) -> Result<ZoneState, crate::domain::error::ZonetraderError> {
    let period = period_of(date);
    Ok(ZoneState {
        used: store.zones_used(symbol, period)?,
        allocated: store.allocated_capital(symbol, period)?,
    })
}

/// Scan one symbol for `date`. Emits one result per zone checked, stopping
/// after the first filled BUY.
pub fn scan_symbol(
    symbol: &str,
    pivots: &PivotTable,
    strategy: &ZoneStrategy,
    date: NaiveDate,
    ctx: &mut ScanContext<'_>,
) -> Vec<EntryResult> {
    let bar = match ctx.price_feed.get_price_row(symbol, date) {
        Some(bar) => bar,
        None => return vec![EntryResult::skip(symbol, None, SkipReason::NoPriceData, None)],
    };
    let levels = match pivots.for_date(symbol, date) {
        Some(levels) => levels,
        None => {
            tracing::debug!(symbol, %date, "no pivot levels for period");
            return vec![EntryResult::skip(
                symbol,
                None,
                SkipReason::NoPivotLevels,
                Some(bar.close),
            )];
        }
    };
    let state = match load_zone_state(&*ctx.store, symbol, date) {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(symbol, error = %e, "position store lookup failed");
            return vec![EntryResult::skip(
                symbol,
                None,
                SkipReason::StoreUnavailable,
                Some(bar.close),
            )];
        }
    };

    let mut results = Vec::new();
    for zone in Zone::ALL {
        let (quantity, price) = match check_zone(zone, &bar, levels, &state, strategy) {
            Decision::Buy {
                quantity, price, ..
            } => (quantity, price),
            Decision::Skip(reason) => {
                let shown_price = match reason {
                    SkipReason::AlreadyOpen => None,
                    _ => Some(bar.close),
                };
                results.push(EntryResult::skip(symbol, Some(zone), reason, shown_price));
                continue;
            }
        };

        let filled_price = match ctx.gateway.place_market_buy(symbol, quantity) {
            Ok(fill) => fill.filled_price.unwrap_or(price),
            Err(e) => {
                tracing::warn!(symbol, %zone, quantity, error = %e, "order placement failed");
                results.push(EntryResult::skip(
                    symbol,
                    Some(zone),
                    SkipReason::OrderFailed,
                    None,
                ));
                continue;
            }
        };

        let capital = quantity as f64 * filled_price;
        let fill = EntryFill {
            symbol: symbol.to_string(),
            zone,
            quantity,
            price: filled_price,
            date,
            capital,
        };
        if let Err(e) = ctx.store.log_entry(&fill) {
            tracing::warn!(symbol, %zone, error = %e, "failed to log entry");
        }
        tracing::info!(symbol, %zone, quantity, price = filled_price, %date, "tranche filled");

        if let Some(alerts) = ctx.alerts {
            let msg = format!("{symbol} BUY {zone} @ {filled_price:.2} qty={quantity}");
            if let Err(e) = alerts.send(&msg) {
                tracing::debug!(symbol, error = %e, "alert delivery failed");
            }
        }

        results.push(EntryResult {
            symbol: symbol.to_string(),
            zone: Some(zone),
            action: EntryAction::Buy,
            reason: "Order placed".to_string(),
            quantity: Some(quantity),
            price: Some(filled_price),
            value: Some(capital),
        });
        break;
    }
    results
}

/// Scan `symbols` in order; at most one BUY per symbol.
pub fn scan_multiple(
    symbols: &[String],
    pivots: &PivotTable,
    strategy: &ZoneStrategy,
    date: NaiveDate,
    ctx: &mut ScanContext<'_>,
) -> Vec<EntryResult> {
    let mut results = Vec::new();
    for symbol in symbols {
        results.extend(scan_symbol(symbol, pivots, strategy, date, ctx));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn pivots() -> PivotLevel {
        PivotLevel {
            symbol: "TCS".into(),
            year: 2025,
            pp: 100.0,
            s1: 95.0,
            s2: 90.0,
            s3: 85.0,
            r1: 105.0,
            r2: 110.0,
            r3: 115.0,
        }
    }

    fn bar(open: f64, low: f64, close: f64) -> DayBar {
        DayBar {
            symbol: "TCS".into(),
            date: d(2025, 1, 6),
            open,
            high: open.max(close) + 1.0,
            low,
            close,
            volume: 2_000,
            rsi: Some(30.0),
            vol_avg: Some(1_000.0),
        }
    }

    fn backtest_strategy() -> ZoneStrategy {
        ZoneStrategy::with_trigger(TriggerMode::LowTouchesLevel)
    }

    fn used(zones: &[Zone]) -> ZoneState {
        ZoneState {
            used: zones.to_vec(),
            allocated: 0.0,
        }
    }

    #[test]
    fn s1_low_touch_sizes_at_level() {
        let b = bar(99.0, 94.0, 100.0);
        let decision = check_zone(Zone::S1, &b, &pivots(), &used(&[]), &backtest_strategy());
        assert_eq!(
            decision,
            Decision::Buy {
                zone: Zone::S1,
                quantity: 263,
                price: 95.0
            }
        );
    }

    #[test]
    fn pp_wins_first_when_available() {
        let b = bar(99.0, 94.0, 100.0);
        let decision = evaluate(&b, &pivots(), &used(&[]), &backtest_strategy());
        assert_eq!(
            decision,
            Decision::Buy {
                zone: Zone::Pp,
                quantity: 250,
                price: 100.0
            }
        );
    }

    #[test]
    fn used_zone_is_skipped_and_next_zone_matches() {
        let b = bar(99.0, 94.0, 100.0);
        let decision = evaluate(&b, &pivots(), &used(&[Zone::Pp]), &backtest_strategy());
        assert!(matches!(decision, Decision::Buy { zone: Zone::S1, .. }));
        assert_eq!(
            check_zone(Zone::Pp, &b, &pivots(), &used(&[Zone::Pp]), &backtest_strategy()),
            Decision::Skip(SkipReason::AlreadyOpen)
        );
    }

    #[test]
    fn s2_rsi_at_threshold_fails() {
        let mut b = bar(86.0, 89.0, 91.0);
        b.rsi = Some(41.0);
        let decision = check_zone(Zone::S2, &b, &pivots(), &used(&[]), &backtest_strategy());
        assert_eq!(decision, Decision::Skip(SkipReason::RsiFilter));
        b.rsi = Some(40.0);
        let decision = check_zone(Zone::S2, &b, &pivots(), &used(&[]), &backtest_strategy());
        assert_eq!(decision, Decision::Skip(SkipReason::RsiFilter));
    }

    #[test]
    fn evaluate_reports_first_triggered_filter_failure() {
        let mut b = bar(86.0, 89.0, 91.0);
        b.rsi = Some(41.0);
        let decision = evaluate(
            &b,
            &pivots(),
            &used(&[Zone::Pp, Zone::S1]),
            &backtest_strategy(),
        );
        assert_eq!(decision, Decision::Skip(SkipReason::RsiFilter));
    }

    #[test]
    fn s2_requires_bullish_candle_and_volume() {
        let bearish = bar(92.0, 89.0, 91.0);
        assert_eq!(
            check_zone(Zone::S2, &bearish, &pivots(), &used(&[]), &backtest_strategy()),
            Decision::Skip(SkipReason::NotBullish)
        );
        let mut quiet = bar(86.0, 89.0, 91.0);
        quiet.vol_avg = Some(5_000.0);
        assert_eq!(
            check_zone(Zone::S2, &quiet, &pivots(), &used(&[]), &backtest_strategy()),
            Decision::Skip(SkipReason::VolumeFilter)
        );
        quiet.vol_avg = None;
        assert_eq!(
            check_zone(Zone::S2, &quiet, &pivots(), &used(&[]), &backtest_strategy()),
            Decision::Skip(SkipReason::VolumeFilter)
        );
    }

    #[test]
    fn s3_uses_its_own_rsi_threshold() {
        let mut b = bar(80.0, 84.0, 86.0);
        b.rsi = Some(36.0);
        assert_eq!(
            check_zone(Zone::S3, &b, &pivots(), &used(&[]), &backtest_strategy()),
            Decision::Skip(SkipReason::RsiFilter)
        );
        b.rsi = Some(34.0);
        assert!(matches!(
            check_zone(Zone::S3, &b, &pivots(), &used(&[]), &backtest_strategy()),
            Decision::Buy { zone: Zone::S3, .. }
        ));
    }

    #[test]
    fn missing_rsi_fails_filter() {
        let mut b = bar(86.0, 89.0, 91.0);
        b.rsi = None;
        assert_eq!(
            check_zone(Zone::S2, &b, &pivots(), &used(&[]), &backtest_strategy()),
            Decision::Skip(SkipReason::RsiFilter)
        );
    }

    #[test]
    fn close_within_pct_mode() {
        let strategy = ZoneStrategy::with_trigger(TriggerMode::CloseWithinPct);
        // 95.9 is within 1% of S1=95 (band 0.95)
        let near = bar(94.0, 93.0, 95.9);
        assert_eq!(
            check_zone(Zone::S1, &near, &pivots(), &used(&[]), &strategy),
            Decision::Buy {
                zone: Zone::S1,
                quantity: 260,
                price: 95.9
            }
        );
        // low touches S1 but close is far: only the low-touch mode fires
        let far = bar(97.0, 94.0, 98.0);
        assert_eq!(
            check_zone(Zone::S1, &far, &pivots(), &used(&[]), &strategy),
            Decision::Skip(SkipReason::PriceNotInZone)
        );
        assert!(matches!(
            check_zone(Zone::S1, &far, &pivots(), &used(&[]), &backtest_strategy()),
            Decision::Buy { .. }
        ));
    }

    #[test]
    fn untriggered_day_skips_every_zone() {
        let b = bar(120.0, 118.0, 121.0);
        assert_eq!(
            evaluate(&b, &pivots(), &used(&[]), &backtest_strategy()),
            Decision::Skip(SkipReason::PriceNotInZone)
        );
    }

    #[test]
    fn non_positive_quantity_is_a_skip() {
        let mut strategy = backtest_strategy();
        strategy.allocation_per_zone = 50.0;
        let b = bar(99.0, 94.0, 100.0);
        assert_eq!(
            check_zone(Zone::Pp, &b, &pivots(), &used(&[]), &strategy),
            Decision::Skip(SkipReason::NonPositiveQuantity)
        );
        assert_eq!(compute_quantity(25_000.0, 0.0), 0);
        assert_eq!(compute_quantity(25_000.0, 95.0), 263);
    }

    #[test]
    fn yearly_cap_blocks_excess_allocation() {
        let mut strategy = backtest_strategy();
        strategy.max_yearly_cap = 40_000.0;
        let b = bar(99.0, 94.0, 100.0);
        let state = ZoneState {
            used: vec![Zone::Pp],
            allocated: 25_000.0,
        };
        assert_eq!(
            check_zone(Zone::S1, &b, &pivots(), &state, &strategy),
            Decision::Skip(SkipReason::YearlyCapReached)
        );
    }

    #[test]
    fn skip_reason_strings() {
        assert_eq!(SkipReason::RsiFilter.to_string(), "RSI filter fail");
        assert_eq!(SkipReason::OrderFailed.to_string(), "Order placement failed");
        assert_eq!(EntryAction::Buy.to_string(), "BUY");
    }
}
