//! KPI Computation - scalar display values derived from aggregation outputs

use crate::aggregate::{self, GroupValue, Reduction};
use crate::error::Result;
use crate::table::EventTable;
use serde::Serialize;
use std::cmp::Ordering;

/// Shown wherever a KPI has no underlying data
pub const NOT_AVAILABLE: &str = "N/A";

/// `(current - prior) / prior * 100`, defined as 0 when `prior` is 0
pub fn percent_delta(current: f64, prior: f64) -> f64 {
    if prior == 0.0 {
        0.0
    } else {
        (current - prior) / prior * 100.0
    }
}

/// `(actual - target) / target * 100`, 0 for a zero target
pub fn delta_vs_target(actual: f64, target: f64) -> f64 {
    percent_delta(actual, target)
}

pub fn total_rows(table: &EventTable) -> usize {
    table.height()
}

pub fn total_sum(table: &EventTable, column: &str) -> Result<f64> {
    aggregate::reduce(table, &Reduction::sum(column))
}

pub fn unique_count(table: &EventTable, column: &str) -> Result<usize> {
    aggregate::distinct_count(table, column)
}

/// Group with the highest reduced value, plus the runner-up for "% vs next"
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestEntity {
    pub name: String,
    pub value: Option<f64>,
    pub runner_up: Option<f64>,
}

impl BestEntity {
    pub fn unavailable() -> Self {
        Self {
            name: NOT_AVAILABLE.to_string(),
            value: None,
            runner_up: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }

    /// Lead over the runner-up in percent; `None` when there is no runner-up
    pub fn lead_over_next(&self) -> Option<f64> {
        match (self.value, self.runner_up) {
            (Some(best), Some(next)) => Some(percent_delta(best, next)),
            _ => None,
        }
    }
}

/// Maximum of a group-by output. Ties go to the earliest group; an empty input
/// yields the "N/A" sentinel.
pub fn best_entity(groups: &[GroupValue]) -> BestEntity {
    let mut ranked: Vec<&GroupValue> = groups.iter().collect();
    ranked.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    match ranked.first() {
        Some(best) => BestEntity {
            name: best.key.clone(),
            value: Some(best.value),
            runner_up: ranked.get(1).map(|g| g.value),
        },
        None => BestEntity::unavailable(),
    }
}

/// `$1,234,567.89`
pub fn format_currency(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let cents = (value.abs() * 100.0).round() as u128;
    format!("{}${}.{:02}", sign, group_thousands(cents / 100), cents % 100)
}

/// `12,345`
pub fn format_count(value: usize) -> String {
    group_thousands(value as u128)
}

/// `+1.5%`
pub fn format_signed_percent(value: f64) -> String {
    format!("{:+.1}%", value)
}

fn group_thousands(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(key: &str, value: f64) -> GroupValue {
        GroupValue { key: key.to_string(), value }
    }

    #[test]
    fn test_percent_delta_guards_zero() {
        assert_eq!(percent_delta(150.0, 100.0), 50.0);
        assert_eq!(percent_delta(500.0, 0.0), 0.0);
        assert_eq!(percent_delta(0.0, 0.0), 0.0);
        assert_eq!(delta_vs_target(800.0, 1000.0), -20.0);
    }

    #[test]
    fn test_best_entity_picks_maximum() {
        let best = best_entity(&[group("Bob", 20.0), group("Alice", 50.0), group("Cara", 40.0)]);
        assert_eq!(best.name, "Alice");
        assert_eq!(best.value, Some(50.0));
        assert_eq!(best.lead_over_next(), Some(25.0));
    }

    #[test]
    fn test_best_entity_on_empty_is_sentinel() {
        let best = best_entity(&[]);
        assert_eq!(best.name, NOT_AVAILABLE);
        assert!(!best.is_available());
        assert_eq!(best.lead_over_next(), None);
    }

    #[test]
    fn test_best_entity_single_group_has_no_runner_up() {
        let best = best_entity(&[group("Chatbot", 10.0)]);
        assert_eq!(best.runner_up, None);
        assert_eq!(best.lead_over_next(), None);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(-50.5), "-$50.50");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_signed_percent(12.34), "+12.3%");
        assert_eq!(format_signed_percent(-4.0), "-4.0%");
    }
}
