//! Filter Engine - row subsets from sidebar selections
//!
//! A row passes when, for every constrained column, its value is one of the
//! selected values (AND across columns, OR within a column). An empty
//! selection matches nothing; selecting every distinct value is the identity.

use crate::error::Result;
use crate::table::EventTable;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Allowed values for one column
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSelection {
    values: BTreeSet<String>,
    /// Whether rows with no value in this column pass
    include_missing: bool,
}

impl ColumnSelection {
    pub fn of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            include_missing: false,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// The full distinct-value set of `column`, nulls included
    pub fn all_of(table: &EventTable, column: &str) -> Result<Self> {
        if !table.has_column(column) {
            return Ok(Self::none());
        }
        Ok(Self {
            values: table.unique_values(column)?.into_iter().collect(),
            include_missing: table.has_nulls(column)?,
        })
    }

    /// Sidebar "Select All" checkbox: checked selects everything, unchecked
    /// clears the selection.
    pub fn from_toggle(table: &EventTable, column: &str, select_all: bool) -> Result<Self> {
        if select_all {
            Self::all_of(table, column)
        } else {
            Ok(Self::none())
        }
    }

    pub fn with_missing(mut self, include_missing: bool) -> Self {
        self.include_missing = include_missing;
        self
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    pub fn includes_missing(&self) -> bool {
        self.include_missing
    }

    pub fn matches_nothing(&self) -> bool {
        self.values.is_empty() && !self.include_missing
    }

    pub fn contains(&self, value: Option<&str>) -> bool {
        match value {
            Some(v) => self.values.contains(v),
            None => self.include_missing,
        }
    }

    fn predicate(&self, column: &str) -> Expr {
        if self.values.is_empty() {
            return col(column).is_null();
        }
        let allowed: Vec<&str> = self.values().collect();
        let member = col(column)
            .cast(DataType::String)
            .is_in(lit(Series::new("allowed", allowed)));
        if self.include_missing {
            member.or(col(column).is_null())
        } else {
            member
        }
    }
}

/// Per-column constraints, applied as a conjunction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    constraints: BTreeMap<String, ColumnSelection>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select-all on each listed column
    pub fn select_all(table: &EventTable, columns: &[&str]) -> Result<Self> {
        let mut selection = Self::new();
        for column in columns {
            selection.set(column, ColumnSelection::all_of(table, column)?);
        }
        Ok(selection)
    }

    pub fn with(mut self, column: &str, selection: ColumnSelection) -> Self {
        self.set(column, selection);
        self
    }

    pub fn set(&mut self, column: &str, selection: ColumnSelection) {
        self.constraints.insert(column.to_string(), selection);
    }

    pub fn get(&self, column: &str) -> Option<&ColumnSelection> {
        self.constraints.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.constraints.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// Apply every constraint to `table`, returning the passing rows in their
/// original order. Constraints on columns the table lacks are skipped.
pub fn apply_filters(table: &EventTable, selection: &FilterSelection) -> Result<EventTable> {
    let mut predicate: Option<Expr> = None;

    for (column, allowed) in &selection.constraints {
        if !table.has_column(column) {
            warn!("Skipping filter on absent column '{}'", column);
            continue;
        }
        if allowed.matches_nothing() {
            debug!("Empty selection on '{}' clears the table", column);
            return Ok(table.cleared());
        }
        let expr = allowed.predicate(column);
        predicate = Some(match predicate {
            Some(acc) => acc.and(expr),
            None => expr,
        });
    }

    let Some(predicate) = predicate else {
        return Ok(table.clone());
    };

    let frame = table.frame().clone().lazy().filter(predicate).collect()?;
    debug!("Filter kept {} of {} rows", frame.height(), table.height());
    Ok(EventTable::new(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{load_csv_str, LoadOptions};

    fn sample() -> EventTable {
        let csv = "\
customer_country,salesperson,cost,date_of_sale
US,Alice,100,15/01/2024
US,Bob,200,10/02/2024
UK,Alice,50,20/01/2024
,N/A,10,21/01/2024
DE,,70,22/01/2024
";
        load_csv_str(csv, &LoadOptions::default()).unwrap()
    }

    #[test]
    fn test_single_column_membership() {
        let table = sample();
        let selection = FilterSelection::new().with("customer_country", ColumnSelection::of(["US"]));
        let filtered = apply_filters(&table, &selection).unwrap();
        assert_eq!(filtered.height(), 2);
        assert_eq!(filtered.f64_values("cost").unwrap(), vec![Some(100.0), Some(200.0)]);
    }

    #[test]
    fn test_constraints_are_conjunctive() {
        let table = sample();
        let selection = FilterSelection::new()
            .with("customer_country", ColumnSelection::of(["US", "UK"]))
            .with("salesperson", ColumnSelection::of(["Alice"]));
        let filtered = apply_filters(&table, &selection).unwrap();
        assert_eq!(filtered.height(), 2);
        assert_eq!(
            filtered.string_values("customer_country").unwrap(),
            vec![Some("US".to_string()), Some("UK".to_string())]
        );
    }

    #[test]
    fn test_empty_selection_returns_no_rows() {
        let table = sample();
        let selection = FilterSelection::new()
            .with("customer_country", ColumnSelection::all_of(&table, "customer_country").unwrap())
            .with("salesperson", ColumnSelection::none());
        let filtered = apply_filters(&table, &selection).unwrap();
        assert!(filtered.is_empty());
        assert_eq!(filtered.column_names(), table.column_names());
    }

    #[test]
    fn test_full_selection_is_identity() {
        let table = sample();
        let selection =
            FilterSelection::select_all(&table, &["customer_country", "salesperson", "cost"]).unwrap();
        let filtered = apply_filters(&table, &selection).unwrap();
        assert_eq!(filtered.height(), table.height());
        assert!(filtered.frame().equals_missing(table.frame()));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let table = sample();
        let selection = FilterSelection::new()
            .with("customer_country", ColumnSelection::of(["US", "DE"]))
            .with("salesperson", ColumnSelection::of(["Bob"]).with_missing(true));
        let once = apply_filters(&table, &selection).unwrap();
        let twice = apply_filters(&once, &selection).unwrap();
        assert_eq!(once.height(), 2);
        assert!(once.frame().equals_missing(twice.frame()));
    }

    #[test]
    fn test_absent_column_constraint_is_skipped() {
        let table = sample();
        let selection = FilterSelection::new().with("job_type_requested", ColumnSelection::of(["Chatbot"]));
        let filtered = apply_filters(&table, &selection).unwrap();
        assert_eq!(filtered.height(), table.height());
    }

    #[test]
    fn test_toggle_maps_to_full_or_empty() {
        let table = sample();
        let on = ColumnSelection::from_toggle(&table, "customer_country", true).unwrap();
        assert!(on.contains(Some("US")) && on.contains(None));
        let off = ColumnSelection::from_toggle(&table, "customer_country", false).unwrap();
        assert!(off.matches_nothing());
    }
}
