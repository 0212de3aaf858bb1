// src/period_log.rs

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use time::{Month, OffsetDateTime};

use crate::ledger::fold;

/// A calendar month used to bucket net stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeriodLabel {
    pub year: i32,
    pub month: Month,
}

impl PeriodLabel {
    pub fn new(year: i32, month: Month) -> Self {
        Self { year, month }
    }

    /// The period containing `at`. Callers pass their own clock reading.
    pub fn containing(at: OffsetDateTime) -> Self {
        Self::new(at.year(), at.month())
    }
}

impl fmt::Display for PeriodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month, self.year)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised period {0:?}; expected e.g. \"March 2025\" or \"2025-03\"")]
pub struct PeriodParseError(pub String);

impl FromStr for PeriodLabel {
    type Err = PeriodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || PeriodParseError(s.to_string());
        let trimmed = s.trim();

        if let Some((year, month)) = trimmed.split_once('-') {
            let year: i32 = year.parse().map_err(|_| err())?;
            let month: u8 = month.parse().map_err(|_| err())?;
            let month = Month::try_from(month).map_err(|_| err())?;
            return Ok(Self::new(year, month));
        }

        let mut parts = trimmed.split_whitespace();
        let (Some(month), Some(year), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(err());
        };
        let month = (1..=12u8)
            .filter_map(|m| Month::try_from(m).ok())
            .find(|m| m.to_string().eq_ignore_ascii_case(month))
            .ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        Ok(Self::new(year, month))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodChangeEntry {
    pub product_name: String,
    pub period: PeriodLabel,
    pub net_change: i64,
}

/// Net change per product per period. Entries are matched on the folded
/// product name; the first spelling seen is kept for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodLog {
    entries: Vec<PeriodChangeEntry>,
}

impl PeriodLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[PeriodChangeEntry] {
        &self.entries
    }

    pub fn record_change(&mut self, product_name: &str, delta: i64, period: PeriodLabel) {
        let name = fold(product_name);
        match self
            .entries
            .iter_mut()
            .find(|e| e.period == period && fold(&e.product_name) == name)
        {
            Some(entry) => entry.net_change += delta,
            None => self.entries.push(PeriodChangeEntry {
                product_name: product_name.trim().to_string(),
                period,
                net_change: delta,
            }),
        }
    }

    /// Entries for `period`, ordered by product name. Empty when nothing moved.
    pub fn entries_for_period(&self, period: PeriodLabel) -> Vec<&PeriodChangeEntry> {
        let mut found: Vec<&PeriodChangeEntry> =
            self.entries.iter().filter(|e| e.period == period).collect();
        found.sort_by_key(|e| fold(&e.product_name));
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MARCH: PeriodLabel = PeriodLabel {
        year: 2025,
        month: Month::March,
    };
    const APRIL: PeriodLabel = PeriodLabel {
        year: 2025,
        month: Month::April,
    };

    #[test]
    fn label_round_trips_through_text() {
        assert_eq!(MARCH.to_string(), "March 2025");
        assert_eq!("march 2025".parse::<PeriodLabel>(), Ok(MARCH));
        assert_eq!("2025-04".parse::<PeriodLabel>(), Ok(APRIL));
        assert!("Smarch 2025".parse::<PeriodLabel>().is_err());
        assert!("2025-13".parse::<PeriodLabel>().is_err());
    }

    #[test]
    fn new_period_starts_from_the_next_delta() {
        let mut log = PeriodLog::new();
        log.record_change("Omega3", 10, MARCH);
        log.record_change("omega3", -4, MARCH);
        log.record_change("Omega3", 2, APRIL);

        assert_eq!(log.entries_for_period(MARCH)[0].net_change, 6);
        assert_eq!(log.entries_for_period(APRIL)[0].net_change, 2);
        assert_eq!(log.entries_for_period(MARCH)[0].product_name, "Omega3");
    }

    #[test]
    fn entries_are_sorted_and_empty_periods_are_fine() {
        let mut log = PeriodLog::new();
        log.record_change("zinc", 1, MARCH);
        log.record_change("Biotin", 1, MARCH);
        let names: Vec<&str> = log
            .entries_for_period(MARCH)
            .iter()
            .map(|e| e.product_name.as_str())
            .collect();
        assert_eq!(names, vec!["Biotin", "zinc"]);
        assert!(log.entries_for_period(APRIL).is_empty());
    }

    proptest! {
        #[test]
        fn net_change_is_the_sum_of_deltas(deltas in prop::collection::vec(-50i64..50, 1..40)) {
            let mut log = PeriodLog::new();
            for d in &deltas {
                log.record_change("Magnesium", *d, MARCH);
            }
            let entries = log.entries_for_period(MARCH);
            prop_assert_eq!(entries.len(), 1);
            prop_assert_eq!(entries[0].net_change, deltas.iter().sum::<i64>());
        }
    }
}
