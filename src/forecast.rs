//! Forecast Files - pre-computed actuals/forecast CSVs read from disk
//!
//! Nothing here models anything: the files are produced elsewhere and only
//! joined to the dashboard by their period key. A missing file means "no
//! forecast available", not an error.

use crate::error::Result;
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub period_start: NaiveDate,
    /// Period key as written in the file
    pub period: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyForecast {
    pub actuals: Vec<ForecastPoint>,
    /// Only the months inside the requested window
    pub forecast: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyForecast {
    pub recent_actuals: Vec<ForecastPoint>,
    pub upcoming: Vec<ForecastPoint>,
}

impl WeeklyForecast {
    pub fn next_week(&self) -> Option<&ForecastPoint> {
        self.upcoming.first()
    }
}

#[derive(Debug, Deserialize)]
struct PeriodRow {
    #[serde(alias = "week")]
    month: String,
    #[serde(alias = "forecast")]
    cost: Option<f64>,
}

/// `2025-01`, `2025-01-31` or `2025-01-31 00:00:00` → first of that month
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let prefix = trimmed.get(..7)?;
    NaiveDate::parse_from_str(&format!("{}-01", prefix), "%Y-%m-%d").ok()
}

/// Start date of a `"<start>/<end>"` week key
pub fn parse_week_start(raw: &str) -> Option<NaiveDate> {
    let start = raw.split('/').next()?.trim();
    let day = start.get(..10).unwrap_or(start);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn read_points(path: &Path, parse_period: fn(&str) -> Option<NaiveDate>) -> Result<Vec<ForecastPoint>> {
    let mut rdr = ReaderBuilder::new().has_headers(true).trim(csv::Trim::All).from_path(path)?;
    let mut points = Vec::new();
    for row in rdr.deserialize::<PeriodRow>() {
        let row = match row {
            Ok(row) => row,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Deserialize { .. }) => {
                warn!("Skipping malformed row in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let (Some(period_start), Some(value)) = (parse_period(&row.month), row.cost) else {
            warn!("Skipping unusable row '{}' in {}", row.month, path.display());
            continue;
        };
        points.push(ForecastPoint {
            period_start,
            period: row.month,
            value,
        });
    }
    points.sort_by_key(|p| p.period_start);
    Ok(points)
}

/// Directory holding the forecast outputs
#[derive(Debug, Clone)]
pub struct ForecastStore {
    dir: PathBuf,
    weekly_subdir: String,
}

impl ForecastStore {
    pub fn new(dir: PathBuf, weekly_subdir: &str) -> Self {
        Self {
            dir,
            weekly_subdir: weekly_subdir.to_string(),
        }
    }

    /// `(actuals, forecast)` paths, per salesperson when one is given
    pub fn monthly_paths(&self, salesperson: Option<&str>) -> (PathBuf, PathBuf) {
        match salesperson {
            Some(name) => (
                self.dir.join(format!("monthly_actuals_{}.csv", name)),
                self.dir.join(format!("monthly_forecast_{}.csv", name)),
            ),
            None => (
                self.dir.join("monthly_actuals.csv"),
                self.dir.join("monthly_forecast.csv"),
            ),
        }
    }

    pub fn weekly_paths(&self) -> (PathBuf, PathBuf) {
        let weekly = self.dir.join(&self.weekly_subdir);
        (weekly.join("weekly_actuals.csv"), weekly.join("weekly_forecast.csv"))
    }

    /// All actuals plus forecast months within `[window_start, window_end]`.
    /// `None` when either file is missing.
    pub fn load_monthly(
        &self,
        salesperson: Option<&str>,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<Option<MonthlyForecast>> {
        let (actuals_path, forecast_path) = self.monthly_paths(salesperson);
        if !actuals_path.exists() || !forecast_path.exists() {
            debug!("Monthly forecast files not found: {}", forecast_path.display());
            return Ok(None);
        }
        let actuals = read_points(&actuals_path, parse_month)?;
        let forecast = read_points(&forecast_path, parse_month)?
            .into_iter()
            .filter(|p| p.period_start >= window_start && p.period_start <= window_end)
            .collect();
        Ok(Some(MonthlyForecast { actuals, forecast }))
    }

    /// Last `actual_weeks` actuals and first `forecast_weeks` forecasts by
    /// week start. `None` when either file is missing.
    pub fn load_weekly(&self, actual_weeks: usize, forecast_weeks: usize) -> Result<Option<WeeklyForecast>> {
        let (actuals_path, forecast_path) = self.weekly_paths();
        if !actuals_path.exists() || !forecast_path.exists() {
            debug!("Weekly forecast files not found under {}", self.weekly_subdir);
            return Ok(None);
        }
        let actuals = read_points(&actuals_path, parse_week_start)?;
        let skip = actuals.len().saturating_sub(actual_weeks);
        let recent_actuals = actuals.into_iter().skip(skip).collect();
        let upcoming = read_points(&forecast_path, parse_week_start)?
            .into_iter()
            .take(forecast_weeks)
            .collect();
        Ok(Some(WeeklyForecast {
            recent_actuals,
            upcoming,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sales_dashboard_forecast_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!(parse_month("2025-03"), NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(parse_month("2025-03-31"), NaiveDate::from_ymd_opt(2025, 3, 1));
        assert_eq!(parse_month("bad"), None);
        assert_eq!(parse_week_start("2025-01-06/2025-01-12"), NaiveDate::from_ymd_opt(2025, 1, 6));
    }

    #[test]
    fn test_missing_files_are_unavailable() {
        let store = ForecastStore::new(scratch_dir("missing"), "weekly_outputs");
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        assert!(store.load_monthly(None, start, end).unwrap().is_none());
        assert!(store.load_monthly(Some("Alice"), start, end).unwrap().is_none());
        assert!(store.load_weekly(8, 4).unwrap().is_none());
    }

    #[test]
    fn test_monthly_forecast_window() {
        let dir = scratch_dir("monthly");
        fs::write(dir.join("monthly_actuals.csv"), "month,cost\n2024-12,500\n2024-11,400\n").unwrap();
        fs::write(
            dir.join("monthly_forecast.csv"),
            "month,forecast\n2024-12,480\n2025-01,510\n2025-05,530\n2025-06,540\n",
        )
        .unwrap();
        let store = ForecastStore::new(dir, "weekly_outputs");
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let monthly = store.load_monthly(None, start, end).unwrap().unwrap();
        assert_eq!(monthly.actuals.len(), 2);
        assert_eq!(monthly.actuals[0].period, "2024-11");
        let months: Vec<&str> = monthly.forecast.iter().map(|p| p.period.as_str()).collect();
        assert_eq!(months, vec!["2025-01", "2025-05"]);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = scratch_dir("malformed");
        fs::write(dir.join("monthly_actuals.csv"), "month,cost\n2024-11,n/a\n2024-12,500\n").unwrap();
        fs::write(dir.join("monthly_forecast.csv"), "period,value\n2025-01,510\n").unwrap();
        let store = ForecastStore::new(dir, "weekly_outputs");
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let monthly = store.load_monthly(None, start, end).unwrap().unwrap();
        assert_eq!(monthly.actuals.len(), 1);
        assert_eq!(monthly.actuals[0].value, 500.0);
        assert!(monthly.forecast.is_empty());
    }

    #[test]
    fn test_weekly_forecast_tails_and_heads() {
        let dir = scratch_dir("weekly");
        let weekly = dir.join("weekly_outputs");
        fs::create_dir_all(&weekly).unwrap();
        let mut actuals = String::from("week,cost\n");
        for day in 1..=10u32 {
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::weeks(i64::from(day));
            let end = start + chrono::Duration::days(6);
            actuals.push_str(&format!("{}/{},{}\n", start, end, day * 100));
        }
        fs::write(weekly.join("weekly_actuals.csv"), actuals).unwrap();
        fs::write(
            weekly.join("weekly_forecast.csv"),
            "week,forecast\n2024-03-25/2024-03-31,900\n2024-03-18/2024-03-24,800\n2024-04-01/2024-04-07,950\n2024-04-08/2024-04-14,970\n2024-04-15/2024-04-21,990\n",
        )
        .unwrap();
        let store = ForecastStore::new(dir, "weekly_outputs");
        let forecast = store.load_weekly(8, 4).unwrap().unwrap();
        assert_eq!(forecast.recent_actuals.len(), 8);
        assert_eq!(forecast.recent_actuals[0].value, 300.0);
        assert_eq!(forecast.upcoming.len(), 4);
        assert_eq!(forecast.next_week().unwrap().value, 800.0);
    }
}
