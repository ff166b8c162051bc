//! Index membership intervals and the membership oracle.
//!
//! Answers "was symbol X a member of the reference index on date D". Bounds
//! are inclusive and an interval without `to_date` is open-ended. Lookups are
//! pure, so repeated calls with the same (symbol, date) always agree.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::domain::error::ZonetraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct MembershipInterval {
    pub symbol: String,
    pub from_date: NaiveDate,
    pub to_date: Option<NaiveDate>,
}

impl MembershipInterval {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from_date && self.to_date.is_none_or(|to| date <= to)
    }

    fn overlaps(&self, other: &MembershipInterval) -> bool {
        let self_ends_before = self.to_date.is_some_and(|to| to < other.from_date);
        let other_ends_before = other.to_date.is_some_and(|to| to < self.from_date);
        !(self_ends_before || other_ends_before)
    }

    fn describe(&self) -> String {
        match self.to_date {
            Some(to) => format!("{}..={}", self.from_date, to),
            None => format!("{}..", self.from_date),
        }
    }
}

/// Trim and uppercase a ticker so lookups are case-insensitive.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[derive(Debug, Clone, Default)]
pub struct MembershipOracle {
    intervals: HashMap<String, Vec<MembershipInterval>>,
}

impl MembershipOracle {
    /// Build from raw intervals, rejecting overlaps within a symbol.
    pub fn from_intervals(
        intervals: Vec<MembershipInterval>,
    ) -> Result<Self, ZonetraderError> {
        let mut by_symbol: HashMap<String, Vec<MembershipInterval>> = HashMap::new();
        for mut interval in intervals {
            interval.symbol = normalize_symbol(&interval.symbol);
            if let Some(to) = interval.to_date {
                if to < interval.from_date {
                    return Err(ZonetraderError::data_format(
                        "membership",
                        format!(
                            "{} interval ends before it starts ({})",
                            interval.symbol,
                            interval.describe()
                        ),
                    ));
                }
            }
            by_symbol
                .entry(interval.symbol.clone())
                .or_default()
                .push(interval);
        }

        for (symbol, list) in by_symbol.iter_mut() {
            list.sort_by_key(|i| i.from_date);
            for pair in list.windows(2) {
                if pair[0].overlaps(&pair[1]) {
                    return Err(ZonetraderError::MembershipOverlap {
                        symbol: symbol.clone(),
                        first: pair[0].describe(),
                        second: pair[1].describe(),
                    });
                }
            }
        }

        Ok(Self {
            intervals: by_symbol,
        })
    }

    pub fn is_member(&self, symbol: &str, date: NaiveDate) -> bool {
        self.intervals
            .get(&normalize_symbol(symbol))
            .is_some_and(|list| list.iter().any(|i| i.contains(date)))
    }

    pub fn members_on(&self, date: NaiveDate) -> BTreeSet<String> {
        self.intervals
            .iter()
            .filter(|(_, list)| list.iter().any(|i| i.contains(date)))
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }

    pub fn symbol_count(&self) -> usize {
        self.intervals.len()
    }
}
