//! Core domain types and logic.

pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod exit_evaluator;
pub mod indicator;
pub mod ledger;
pub mod membership;
pub mod metrics;
pub mod ohlcv;
pub mod position;
pub mod price_history;
pub mod strategy;
pub mod zone;
pub mod zone_matcher;
