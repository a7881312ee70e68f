use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::error::WaterBalanceError;

/// A calendar accounting month, immutable once constructed.
///
/// Used throughout the engine as a cache-key component, so equality and
/// ordering are derived rather than computed from the derived dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub struct CalculationPeriod {
    year: i32,
    month: u32,
}

impl CalculationPeriod {
    pub const MIN_YEAR: i32 = 2000;
    pub const MAX_YEAR: i32 = 2100;

    pub fn new(year: i32, month: u32) -> Result<Self, WaterBalanceError> {
        if !(1..=12).contains(&month) {
            return Err(WaterBalanceError::InvariantViolation(format!(
                "month must be in [1,12], got {month}"
            )));
        }
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) {
            return Err(WaterBalanceError::InvariantViolation(format!(
                "year must be in [{},{}], got {year}",
                Self::MIN_YEAR,
                Self::MAX_YEAR
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Result<Self, WaterBalanceError> {
        Self::new(date.year(), date.month())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("validated at construction")
    }

    pub fn end_date(&self) -> NaiveDate {
        let next = self.next();
        next.start_date().pred_opt().expect("valid predecessor date")
    }

    pub fn days_in_period(&self) -> i64 {
        (self.end_date() - self.start_date()).num_days() + 1
    }

    /// The previous calendar month. Saturates at `MIN_YEAR` rather than
    /// underflowing; callers at that boundary treat it as "no previous
    /// period" via the repository lookup returning `None`.
    pub fn previous(&self) -> CalculationPeriod {
        if self.month == 1 {
            CalculationPeriod {
                year: self.year - 1,
                month: 12,
            }
        } else {
            CalculationPeriod {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> CalculationPeriod {
        if self.month == 12 {
            CalculationPeriod {
                year: self.year + 1,
                month: 1,
            }
        } else {
            CalculationPeriod {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn period_label(&self) -> String {
        let name = Self::month_name(self.month);
        format!("{name} {}", self.year)
    }

    pub fn period_short(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    fn month_name(month: u32) -> &'static str {
        const NAMES: [&str; 12] = [
            "January",
            "February",
            "March",
            "April",
            "May",
            "June",
            "July",
            "August",
            "September",
            "October",
            "November",
            "December",
        ];
        NAMES[(month - 1) as usize]
    }
}

impl fmt::Display for CalculationPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.period_short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_month() {
        assert!(CalculationPeriod::new(2026, 13).is_err());
        assert!(CalculationPeriod::new(2026, 0).is_err());
    }

    #[test]
    fn rejects_out_of_range_year() {
        assert!(CalculationPeriod::new(1999, 1).is_err());
        assert!(CalculationPeriod::new(2101, 1).is_err());
    }

    #[test]
    fn end_date_is_last_day_of_month() {
        let p = CalculationPeriod::new(2026, 2).unwrap();
        assert_eq!(p.end_date(), NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
        assert_eq!(p.days_in_period(), 28);
    }

    #[test]
    fn end_date_handles_leap_year() {
        let p = CalculationPeriod::new(2028, 2).unwrap();
        assert_eq!(p.days_in_period(), 29);
    }

    #[test]
    fn previous_wraps_year_boundary() {
        let p = CalculationPeriod::new(2026, 1).unwrap();
        let prev = p.previous();
        assert_eq!(prev.year(), 2025);
        assert_eq!(prev.month(), 12);
    }

    #[test]
    fn next_wraps_year_boundary() {
        let p = CalculationPeriod::new(2026, 12).unwrap();
        let next = p.next();
        assert_eq!(next.year(), 2027);
        assert_eq!(next.month(), 1);
    }

    #[test]
    fn labels_are_human_readable() {
        let p = CalculationPeriod::new(2026, 3).unwrap();
        assert_eq!(p.period_label(), "March 2026");
        assert_eq!(p.period_short(), "2026-03");
    }

    #[test]
    fn ordering_is_chronological() {
        let a = CalculationPeriod::new(2026, 1).unwrap();
        let b = CalculationPeriod::new(2026, 2).unwrap();
        assert!(a < b);
    }
}
