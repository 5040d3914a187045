//! Aggregation Pipeline - reusable reductions over a (filtered) event table
//!
//! All operations follow the same degrade rules: an empty table yields an
//! empty result, and a missing column logs a warning and yields an empty
//! result rather than an error.

use crate::error::Result;
use crate::kpi::percent_delta;
use crate::table::EventTable;
use crate::time::PeriodWindow;
use chrono::NaiveDate;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::warn;

const KEY: &str = "__key";
const VALUE: &str = "__value";
const BUCKET_YEAR: &str = "__bucket_year";
const BUCKET_MONTH: &str = "__bucket_month";

/// Aggregate function applied to each group/bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "column")]
pub enum Reduction {
    /// Number of rows
    Rows,
    /// Number of non-null values in a column
    Count(String),
    Sum(String),
    Mean(String),
}

impl Reduction {
    pub fn rows() -> Self {
        Reduction::Rows
    }

    pub fn count(column: &str) -> Self {
        Reduction::Count(column.to_string())
    }

    pub fn sum(column: &str) -> Self {
        Reduction::Sum(column.to_string())
    }

    pub fn mean(column: &str) -> Self {
        Reduction::Mean(column.to_string())
    }

    pub fn value_column(&self) -> Option<&str> {
        match self {
            Reduction::Rows => None,
            Reduction::Count(c) | Reduction::Sum(c) | Reduction::Mean(c) => Some(c),
        }
    }

    fn expr(&self) -> Expr {
        let expr = match self {
            Reduction::Rows => len(),
            Reduction::Count(c) => col(c).count(),
            Reduction::Sum(c) => col(c).sum(),
            Reduction::Mean(c) => col(c).mean(),
        };
        expr.cast(DataType::Float64).alias(VALUE)
    }
}

/// One calendar-month bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketValue {
    pub bucket_start: NaiveDate,
    pub value: f64,
}

impl BucketValue {
    /// `YYYY-MM`
    pub fn label(&self) -> String {
        self.bucket_start.format("%Y-%m").to_string()
    }
}

/// One category of a group-by
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupValue {
    pub key: String,
    pub value: f64,
}

/// Totals within a date window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PeriodTotals {
    pub sum: f64,
    /// Non-null values of the summed column
    pub count: usize,
}

/// Year-to-date against the same span of the prior year
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub current_window: PeriodWindow,
    pub prior_window: PeriodWindow,
    pub current: PeriodTotals,
    pub prior: PeriodTotals,
}

impl PeriodComparison {
    pub fn sum_delta(&self) -> f64 {
        self.current.sum - self.prior.sum
    }

    pub fn count_delta(&self) -> i64 {
        self.current.count as i64 - self.prior.count as i64
    }

    /// 0 when the prior sum is 0
    pub fn sum_percent_delta(&self) -> f64 {
        percent_delta(self.current.sum, self.prior.sum)
    }

    pub fn count_percent_delta(&self) -> f64 {
        percent_delta(self.current.count as f64, self.prior.count as f64)
    }
}

fn columns_present(table: &EventTable, wanted: &[&str], operation: &str) -> bool {
    let missing: Vec<&str> = wanted.iter().copied().filter(|c| !table.has_column(c)).collect();
    if missing.is_empty() {
        true
    } else {
        warn!("{}: missing column(s) {:?}, returning empty result", operation, missing);
        false
    }
}

/// A date column must exist and be typed Date or Datetime. Text left
/// unparsed by the load options degrades like a missing column.
fn date_column_usable(table: &EventTable, column: &str, operation: &str) -> bool {
    if !columns_present(table, &[column], operation) {
        return false;
    }
    if !table.has_temporal_column(column) {
        warn!("{}: column '{}' is not a date, returning empty result", operation, column);
        return false;
    }
    true
}

fn required_columns<'a>(first: &'a str, reduction: &'a Reduction) -> Vec<&'a str> {
    let mut wanted = vec![first];
    if let Some(value) = reduction.value_column() {
        wanted.push(value);
    }
    wanted
}

fn value_column(frame: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = frame.column(name)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().map(|v| v.unwrap_or(0.0)).collect())
}

fn i32_column(frame: &DataFrame, name: &str) -> Result<Vec<Option<i32>>> {
    let series = frame.column(name)?.cast(&DataType::Int32)?;
    Ok(series.i32()?.into_iter().collect())
}

/// Calendar-month time series, ascending, one entry per month with at least
/// one contributing row. Rows with no date are ignored.
pub fn monthly(table: &EventTable, date_column: &str, reduction: &Reduction) -> Result<Vec<BucketValue>> {
    if table.is_empty()
        || !columns_present(table, &required_columns(date_column, reduction), "monthly")
        || !date_column_usable(table, date_column, "monthly")
    {
        return Ok(Vec::new());
    }

    let grouped = table
        .frame()
        .clone()
        .lazy()
        .filter(col(date_column).is_not_null())
        .group_by_stable([
            col(date_column).dt().year().cast(DataType::Int32).alias(BUCKET_YEAR),
            col(date_column).dt().month().cast(DataType::Int32).alias(BUCKET_MONTH),
        ])
        .agg([reduction.expr()])
        .collect()?;

    let years = i32_column(&grouped, BUCKET_YEAR)?;
    let months = i32_column(&grouped, BUCKET_MONTH)?;
    let values = value_column(&grouped, VALUE)?;

    let mut buckets: Vec<BucketValue> = years
        .into_iter()
        .zip(months)
        .zip(values)
        .filter_map(|((year, month), value)| {
            let start = NaiveDate::from_ymd_opt(year?, u32::try_from(month?).ok()?, 1)?;
            Some(BucketValue { bucket_start: start, value })
        })
        .collect();
    buckets.sort_by_key(|b| b.bucket_start);
    Ok(buckets)
}

/// Monthly sum of `value_column` for one year, January..December, with
/// months that have no rows filled as 0.
pub fn monthly_by_year(table: &EventTable, date_column: &str, value_column: &str, year: i32) -> Result<Vec<f64>> {
    let mut months = vec![0.0; 12];
    if table.is_empty()
        || !columns_present(table, &[date_column, value_column], "monthly_by_year")
        || !date_column_usable(table, date_column, "monthly_by_year")
    {
        return Ok(months);
    }

    let in_year = table
        .frame()
        .clone()
        .lazy()
        .filter(col(date_column).dt().year().cast(DataType::Int32).eq(lit(year)))
        .collect()?;

    for bucket in monthly(&EventTable::new(in_year), date_column, &Reduction::sum(value_column))? {
        let idx = chrono::Datelike::month0(&bucket.bucket_start) as usize;
        months[idx] = bucket.value;
    }
    Ok(months)
}

/// Reduce per category of `key_column`, sorted by value descending. Ties keep
/// first-appearance order. Rows with no key are dropped.
pub fn group_by(table: &EventTable, key_column: &str, reduction: &Reduction) -> Result<Vec<GroupValue>> {
    if table.is_empty() || !columns_present(table, &required_columns(key_column, reduction), "group_by") {
        return Ok(Vec::new());
    }

    let grouped = table
        .frame()
        .clone()
        .lazy()
        .filter(col(key_column).is_not_null())
        .group_by_stable([col(key_column).cast(DataType::String).alias(KEY)])
        .agg([reduction.expr()])
        .collect()?;

    let key_series = grouped.column(KEY)?;
    let keys = key_series.str()?;
    let values = value_column(&grouped, VALUE)?;

    let mut groups: Vec<GroupValue> = keys
        .into_iter()
        .zip(values)
        .filter_map(|(key, value)| key.map(|k| GroupValue { key: k.to_string(), value }))
        .collect();
    groups.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    Ok(groups)
}

/// Occurrences per value, most frequent first
pub fn value_counts(table: &EventTable, column: &str) -> Result<Vec<GroupValue>> {
    group_by(table, column, &Reduction::Rows)
}

/// First `n` entries; shorter inputs come back whole
pub fn top_n(mut groups: Vec<GroupValue>, n: usize) -> Vec<GroupValue> {
    groups.truncate(n);
    groups
}

/// Count of distinct non-null values
pub fn distinct_count(table: &EventTable, column: &str) -> Result<usize> {
    if !columns_present(table, &[column], "distinct_count") {
        return Ok(0);
    }
    Ok(table.frame().column(column)?.drop_nulls().n_unique()?)
}

/// A single reduction over the whole table
pub fn reduce(table: &EventTable, reduction: &Reduction) -> Result<f64> {
    if let Some(column) = reduction.value_column() {
        if !columns_present(table, &[column], "reduce") {
            return Ok(0.0);
        }
    }
    if table.is_empty() {
        return Ok(0.0);
    }
    let out = table.frame().clone().lazy().select([reduction.expr()]).collect()?;
    Ok(value_column(&out, VALUE)?.first().copied().unwrap_or(0.0))
}

/// Rows whose date falls inside `window`
pub fn within_window(table: &EventTable, date_column: &str, window: &PeriodWindow) -> Result<EventTable> {
    if table.is_empty() || !date_column_usable(table, date_column, "within_window") {
        return Ok(table.cleared());
    }
    let predicate = window.predicate(table, date_column)?;
    let frame = table.frame().clone().lazy().filter(predicate).collect()?;
    Ok(EventTable::new(frame))
}

/// Sum and non-null count of `value_column` inside `window`
pub fn period_totals(
    table: &EventTable,
    date_column: &str,
    value_column: &str,
    window: &PeriodWindow,
) -> Result<PeriodTotals> {
    if !columns_present(table, &[date_column, value_column], "period_totals")
        || !date_column_usable(table, date_column, "period_totals")
    {
        return Ok(PeriodTotals::default());
    }
    let rows = within_window(table, date_column, window)?;
    Ok(PeriodTotals {
        sum: reduce(&rows, &Reduction::sum(value_column))?,
        count: reduce(&rows, &Reduction::count(value_column))? as usize,
    })
}

/// `[1 Jan this year, today]` against `[1 Jan last year, same day last year]`
pub fn period_comparison(
    table: &EventTable,
    date_column: &str,
    value_column: &str,
    today: NaiveDate,
) -> Result<PeriodComparison> {
    let current_window = PeriodWindow::year_to_date(today);
    let prior_window = PeriodWindow::prior_year_to_date(today);
    Ok(PeriodComparison {
        current_window,
        prior_window,
        current: period_totals(table, date_column, value_column, &current_window)?,
        prior: period_totals(table, date_column, value_column, &prior_window)?,
    })
}

/// Rows whose `column` matches `pattern`; nulls never match
pub fn matching(table: &EventTable, column: &str, pattern: &Regex) -> Result<EventTable> {
    if table.is_empty() || !columns_present(table, &[column], "matching") {
        return Ok(table.cleared());
    }
    let mask: BooleanChunked = table
        .string_values(column)?
        .iter()
        .map(|v| v.as_deref().map_or(false, |s| pattern.is_match(s)))
        .collect();
    Ok(EventTable::new(table.frame().filter(&mask)?))
}

/// Rows whose `column` equals `value`
pub fn equal_to(table: &EventTable, column: &str, value: &str) -> Result<EventTable> {
    if table.is_empty() || !columns_present(table, &[column], "equal_to") {
        return Ok(table.cleared());
    }
    let frame = table
        .frame()
        .clone()
        .lazy()
        .filter(col(column).cast(DataType::String).eq(lit(value)))
        .collect()?;
    Ok(EventTable::new(frame))
}

/// Rows whose `column` differs from `value`; rows with no value are kept
pub fn excluding(table: &EventTable, column: &str, value: &str) -> Result<EventTable> {
    if table.is_empty() || !columns_present(table, &[column], "excluding") {
        return Ok(table.clone());
    }
    let frame = table
        .frame()
        .clone()
        .lazy()
        .filter(
            col(column)
                .cast(DataType::String)
                .neq(lit(value))
                .or(col(column).is_null()),
        )
        .collect()?;
    Ok(EventTable::new(frame))
}
