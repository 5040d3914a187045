//! Dashboard configuration
//!
//! Layered: built-in defaults, then an optional JSON file, then environment
//! variables (a `.env` file is honoured). CLI flags are applied last by the
//! binary.

use crate::error::{DashboardError, Result};
use crate::forecast::ForecastStore;
use crate::loader::LoadOptions;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const ENV_DATA_PATH: &str = "DASHBOARD_DATA_PATH";
pub const ENV_FORECAST_DIR: &str = "DASHBOARD_FORECAST_DIR";
pub const ENV_SALES_TARGET: &str = "DASHBOARD_SALES_TARGET";
pub const ENV_GEOCODER_URL: &str = "DASHBOARD_GEOCODER_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Event log CSV
    pub data_path: PathBuf,
    pub load: LoadOptions,

    /// Directory holding `monthly_*.csv` and the weekly subdirectory
    pub forecast_dir: PathBuf,
    pub weekly_forecast_subdir: String,
    /// First and last month of forecast shown next to actuals
    pub forecast_window_start: NaiveDate,
    pub forecast_window_end: NaiveDate,
    /// Reported accuracy of the external forecast model, in percent
    pub forecast_accuracy: f64,

    /// Revenue target for the overview "vs Target" delta
    pub sales_target: f64,
    /// Per-salesperson target = mean salesperson total × this
    pub salesperson_target_uplift: f64,

    pub geocoder_url: String,
    pub geocoder_user_agent: String,
    pub geocoder_timeout_secs: u64,

    /// Rows shown in raw-data previews
    pub preview_rows: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("ai_solutions_web_sales_logs.csv"),
            load: LoadOptions::default(),
            forecast_dir: PathBuf::from("."),
            weekly_forecast_subdir: "weekly_outputs".to_string(),
            forecast_window_start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            forecast_window_end: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap_or_default(),
            forecast_accuracy: 89.04,
            sales_target: 1_000_000_000.0,
            salesperson_target_uplift: 1.10,
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
            geocoder_user_agent: "country_locator".to_string(),
            geocoder_timeout_secs: 10,
            preview_rows: 100,
        }
    }
}

impl DashboardConfig {
    /// Defaults, then `path` (if given), then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DashboardError::MissingFile(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `DASHBOARD_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATA_PATH) {
            self.data_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(ENV_FORECAST_DIR) {
            self.forecast_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_SALES_TARGET) {
            self.sales_target = raw.trim().parse().map_err(|_| {
                DashboardError::Config(format!("{} must be a number, got '{}'", ENV_SALES_TARGET, raw))
            })?;
        }
        if let Some(url) = lookup(ENV_GEOCODER_URL) {
            self.geocoder_url = url;
        }
        Ok(())
    }

    pub fn forecast_store(&self) -> ForecastStore {
        ForecastStore::new(self.forecast_dir.clone(), &self.weekly_forecast_subdir)
    }

    pub fn geocoder_timeout(&self) -> Duration {
        Duration::from_secs(self.geocoder_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = DashboardConfig::default();
        assert_eq!(config.sales_target, 1_000_000_000.0);
        assert_eq!(config.forecast_window_start, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(config.load.date_columns, vec!["date_of_sale"]);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(ENV_SALES_TARGET, "250000"), (ENV_DATA_PATH, "logs.csv")].into();
        let mut config = DashboardConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.sales_target, 250_000.0);
        assert_eq!(config.data_path, PathBuf::from("logs.csv"));

        let bad: HashMap<&str, &str> = [(ENV_SALES_TARGET, "lots")].into();
        let err = config.apply_overrides(|k| bad.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(err, DashboardError::Config(_)));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: DashboardConfig =
            serde_json::from_str(r#"{"sales_target": 5000, "forecast_window_end": "2025-03-01"}"#).unwrap();
        assert_eq!(config.sales_target, 5000.0);
        assert_eq!(config.forecast_window_end, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(config.weekly_forecast_subdir, "weekly_outputs");
    }
}
