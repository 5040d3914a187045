//! Event Table - the immutable in-memory event log shared by every page
//!
//! Wraps a Polars `DataFrame`. Every page takes a reference (or an `Arc`) to
//! the loaded table and derives its own filtered copies; nothing mutates it.

use crate::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::warn;

/// Well-known column names of the sales/engagement log
pub mod columns {
    pub const TIMESTAMP: &str = "timestamp";
    pub const DATE_OF_SALE: &str = "date_of_sale";
    pub const CUSTOMER_COUNTRY: &str = "customer_country";
    pub const SALESPERSON: &str = "salesperson";
    pub const CUSTOMER_INTERACTION: &str = "customer_interaction";
    pub const PRODUCT_SOLD: &str = "product_sold";
    pub const JOB_TYPE_REQUESTED: &str = "job_type_requested";
    pub const COST: &str = "cost";
    pub const IP_ADDRESS: &str = "ip_address";
}

/// Day-first formats used when dates are written back out
pub const DAY_FIRST_DATE_FORMAT: &str = "%d/%m/%Y";
pub const DAY_FIRST_DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S%.f";

/// Days between 0001-01-01 (CE day 1) and the Unix epoch
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Clone)]
pub struct EventTable {
    frame: DataFrame,
}

impl EventTable {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn empty() -> Self {
        Self { frame: DataFrame::empty() }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    /// True when `name` exists and holds dates or datetimes
    pub fn has_temporal_column(&self, name: &str) -> bool {
        self.frame
            .column(name)
            .map(|s| matches!(s.dtype(), DataType::Date | DataType::Datetime(_, _)))
            .unwrap_or(false)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Same columns, zero rows
    pub fn cleared(&self) -> Self {
        Self { frame: self.frame.clear() }
    }

    pub fn head(&self, n: usize) -> Self {
        Self { frame: self.frame.head(Some(n)) }
    }

    /// Project onto the listed columns, silently dropping any that are absent
    pub fn select_present(&self, wanted: &[&str]) -> Result<Self> {
        let present: Vec<&str> = wanted
            .iter()
            .copied()
            .filter(|c| self.has_column(c))
            .collect();
        Ok(Self { frame: self.frame.select(present)? })
    }

    pub fn has_nulls(&self, column: &str) -> Result<bool> {
        Ok(self.frame.column(column)?.null_count() > 0)
    }

    /// Distinct non-null values in first-appearance order
    pub fn unique_values(&self, column: &str) -> Result<Vec<String>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for value in self.string_values(column)?.into_iter().flatten() {
            if seen.insert(value.clone()) {
                out.push(value);
            }
        }
        Ok(out)
    }

    pub fn string_values(&self, column: &str) -> Result<Vec<Option<String>>> {
        let series = self.frame.column(column)?.cast(&DataType::String)?;
        let values = series.str()?;
        Ok(values.into_iter().map(|v| v.map(str::to_string)).collect())
    }

    pub fn f64_values(&self, column: &str) -> Result<Vec<Option<f64>>> {
        let series = self.frame.column(column)?.cast(&DataType::Float64)?;
        let values = series.f64()?;
        Ok(values.into_iter().collect())
    }

    /// Epoch milliseconds for Date or Datetime columns
    pub fn timestamp_millis(&self, column: &str) -> Result<Vec<Option<i64>>> {
        let series = self.frame.column(column)?;
        match series.dtype() {
            DataType::Date => {
                let days = series.cast(&DataType::Int32)?;
                Ok(days
                    .i32()?
                    .into_iter()
                    .map(|d| d.map(|d| i64::from(d) * 86_400_000))
                    .collect())
            }
            DataType::Datetime(unit, _) => {
                let unit = *unit;
                let raw = series.cast(&DataType::Int64)?;
                Ok(raw
                    .i64()?
                    .into_iter()
                    .map(|v| v.map(|v| to_millis(v, unit)))
                    .collect())
            }
            other => Err(crate::error::DashboardError::Load(format!(
                "column '{}' is {} rather than a date",
                column, other
            ))),
        }
    }

    /// Rows ordered by a date/time column, newest first, nulls last
    pub fn most_recent(&self, column: &str, n: usize) -> Result<Self> {
        if !self.has_column(column) {
            return Ok(self.head(n));
        }
        if !self.has_temporal_column(column) {
            warn!("'{}' is not a date column; keeping file order", column);
            return Ok(self.head(n));
        }
        let keys = self.timestamp_millis(column)?;
        let mut order: Vec<usize> = (0..keys.len()).collect();
        // Reverse comparison keeps None (smallest) at the end
        order.sort_by(|a, b| keys[*b].cmp(&keys[*a]));
        let idx: Vec<IdxSize> = order.into_iter().take(n).map(|i| i as IdxSize).collect();
        let idx = IdxCa::from_vec("idx", idx);
        Ok(Self { frame: self.frame.take(&idx)? })
    }

    /// Every row rendered cell-by-cell with `format_cell`
    pub fn formatted_rows(&self) -> Result<Vec<Vec<String>>> {
        let columns = self.frame.get_columns();
        let mut rows = Vec::with_capacity(self.height());
        for row_idx in 0..self.height() {
            let mut row = Vec::with_capacity(columns.len());
            for series in columns {
                row.push(format_cell(&series.get(row_idx)?));
            }
            rows.push(row);
        }
        Ok(rows)
    }
}

fn to_millis(value: i64, unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Nanoseconds => value / 1_000_000,
        TimeUnit::Microseconds => value / 1_000,
        TimeUnit::Milliseconds => value,
    }
}

pub fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

pub fn epoch_days(date: NaiveDate) -> i32 {
    chrono::Datelike::num_days_from_ce(&date) - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn datetime_from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Render a cell for CSV export and table previews. Dates go out day-first
/// so an exported file loads back to the same table.
pub fn format_cell(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Date(days) => date_from_epoch_days(*days)
            .map(|d| d.format(DAY_FIRST_DATE_FORMAT).to_string())
            .unwrap_or_default(),
        AnyValue::Datetime(v, unit, _) => datetime_from_millis(to_millis(*v, *unit))
            .map(|dt| dt.format(DAY_FIRST_DATETIME_FORMAT).to_string())
            .unwrap_or_default(),
        AnyValue::Float64(f) => f.to_string(),
        AnyValue::Float32(f) => f.to_string(),
        other => other.to_string(),
    }
}
