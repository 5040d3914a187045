//! Period Windows - calendar-day ranges for year-to-date comparisons

use crate::error::{DashboardError, Result};
use crate::table::{epoch_days, EventTable};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Inclusive calendar-day window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PeriodWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// 1 January of `today`'s year through `today`
    pub fn year_to_date(today: NaiveDate) -> Self {
        let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
        Self { start, end: today }
    }

    /// 1 January of the prior year through the same calendar day one year back.
    /// 29 February maps to 28 February.
    pub fn prior_year_to_date(today: NaiveDate) -> Self {
        let year = today.year() - 1;
        let start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(today);
        let end = NaiveDate::from_ymd_opt(year, today.month(), today.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, today.month(), today.day() - 1))
            .unwrap_or(start);
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Row predicate for a Date or Datetime column.
    ///
    /// Dates compare on days since epoch, datetimes on milliseconds with the
    /// end day included in full.
    pub fn predicate(&self, table: &EventTable, column: &str) -> Result<Expr> {
        let dtype = table.frame().column(column)?.dtype().clone();
        match dtype {
            DataType::Date => {
                let start = epoch_days(self.start);
                let end = epoch_days(self.end);
                Ok(col(column)
                    .cast(DataType::Int32)
                    .gt_eq(lit(start))
                    .and(col(column).cast(DataType::Int32).lt_eq(lit(end))))
            }
            DataType::Datetime(unit, _) => {
                let per_day: i64 = match unit {
                    TimeUnit::Nanoseconds => 86_400_000_000_000,
                    TimeUnit::Microseconds => 86_400_000_000,
                    TimeUnit::Milliseconds => 86_400_000,
                };
                let start = i64::from(epoch_days(self.start)) * per_day;
                let end_exclusive = (i64::from(epoch_days(self.end)) + 1) * per_day;
                Ok(col(column)
                    .cast(DataType::Int64)
                    .gt_eq(lit(start))
                    .and(col(column).cast(DataType::Int64).lt(lit(end_exclusive))))
            }
            other => Err(DashboardError::Load(format!(
                "column '{}' is {} and cannot be windowed by date",
                column, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_year_to_date_windows() {
        let today = date(2026, 10, 18);
        let current = PeriodWindow::year_to_date(today);
        assert_eq!(current, PeriodWindow::new(date(2026, 1, 1), today));

        let prior = PeriodWindow::prior_year_to_date(today);
        assert_eq!(prior, PeriodWindow::new(date(2025, 1, 1), date(2025, 10, 18)));
        assert!(prior.contains(date(2025, 10, 18)));
        assert!(!prior.contains(date(2025, 10, 19)));
    }

    #[test]
    fn test_prior_window_on_leap_day() {
        let prior = PeriodWindow::prior_year_to_date(date(2024, 2, 29));
        assert_eq!(prior.end, date(2023, 2, 28));
    }
}
