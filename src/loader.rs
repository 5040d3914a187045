//! Data Loader - reads the CSV event log into an `EventTable`
//!
//! Columns are typed on the way in: configured date columns are parsed
//! day-first (so `03/04/2024` is 3 April), numeric columns become Float64 and
//! everything else stays a string. Empty cells are nulls. The parsed table is
//! held by `DatasetCache` and only re-parsed when the file content changes.

use crate::error::{DashboardError, Result};
use crate::table::{columns, epoch_days, EventTable};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, info, warn};

const DAY_FIRST_DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d"];

const DAY_FIRST_DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// How raw CSV columns are typed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Parsed day-first into calendar dates
    pub date_columns: Vec<String>,
    /// Parsed day-first into millisecond timestamps
    pub datetime_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    /// Load fails when any of these is absent from the header
    pub required_columns: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            date_columns: vec![columns::DATE_OF_SALE.to_string()],
            datetime_columns: vec![columns::TIMESTAMP.to_string()],
            numeric_columns: vec![columns::COST.to_string()],
            required_columns: vec![columns::CUSTOMER_COUNTRY.to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    Date,
    DateTime,
    Numeric,
}

impl LoadOptions {
    fn kind_of(&self, column: &str) -> ColumnKind {
        if self.date_columns.iter().any(|c| c == column) {
            ColumnKind::Date
        } else if self.datetime_columns.iter().any(|c| c == column) {
            ColumnKind::DateTime
        } else if self.numeric_columns.iter().any(|c| c == column) {
            ColumnKind::Numeric
        } else {
            ColumnKind::Text
        }
    }
}

pub fn parse_day_first_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    DAY_FIRST_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DAY_FIRST_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub fn parse_day_first_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DAY_FIRST_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| parse_day_first_datetime(trimmed).map(|dt| dt.date()))
}

fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_start_matches('$').replace(',', "");
    cleaned.parse::<f64>().ok()
}

fn non_blank(cell: Option<&str>) -> Option<&str> {
    cell.map(str::trim).filter(|c| !c.is_empty())
}

fn parse_cells<T>(raw: &StringChunked, parse: impl Fn(&str) -> Option<T>, unparsed: &mut usize) -> Vec<Option<T>> {
    raw.into_iter()
        .map(|cell| {
            let text = non_blank(cell)?;
            let parsed = parse(text);
            if parsed.is_none() {
                *unparsed += 1;
            }
            parsed
        })
        .collect()
}

/// Type one raw string column read by the CSV reader
fn type_column(name: &str, kind: ColumnKind, raw: &StringChunked) -> Result<Series> {
    let mut unparsed = 0usize;
    let series = match kind {
        ColumnKind::Text => Series::new(name, parse_cells(raw, |c| Some(c.to_string()), &mut unparsed)),
        ColumnKind::Numeric => Series::new(name, parse_cells(raw, parse_amount, &mut unparsed)),
        ColumnKind::Date => {
            let days = parse_cells(raw, |c| parse_day_first_date(c).map(epoch_days), &mut unparsed);
            Series::new(name, days).cast(&DataType::Date)?
        }
        ColumnKind::DateTime => {
            let millis = parse_cells(
                raw,
                |c| parse_day_first_datetime(c).map(|dt| dt.and_utc().timestamp_millis()),
                &mut unparsed,
            );
            Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        }
    };
    if unparsed > 0 {
        warn!("Column '{}': {} value(s) could not be parsed and were set to null", name, unparsed);
    }
    Ok(series)
}

/// Every column comes back as a string; typing happens in `type_column`
/// because dates are day-first across several layouts.
fn read_raw_frame(bytes: Vec<u8>) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| DashboardError::Load(format!("Failed to read CSV: {}", e)))
}

/// Parse CSV from any reader into a typed table
pub fn load_from_reader<R: Read>(mut reader: R, options: &LoadOptions) -> Result<EventTable> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        if let Some(required) = options.required_columns.first() {
            return Err(DashboardError::MissingColumn(required.clone()));
        }
        return Ok(EventTable::empty());
    }

    let raw = read_raw_frame(bytes)?;
    let headers: Vec<String> = raw.get_columns().iter().map(|c| c.name().trim().to_string()).collect();
    for required in &options.required_columns {
        if !headers.iter().any(|h| h == required) {
            return Err(DashboardError::MissingColumn(required.clone()));
        }
    }

    let mut series = Vec::with_capacity(headers.len());
    for (name, column) in headers.iter().zip(raw.get_columns()) {
        let text = column.cast(&DataType::String)?;
        series.push(type_column(name, options.kind_of(name), text.str()?)?);
    }

    let frame = DataFrame::new(series)
        .map_err(|e| DashboardError::Load(format!("Failed to assemble event table: {}", e)))?;
    Ok(EventTable::new(frame))
}

pub fn load_csv_str(text: &str, options: &LoadOptions) -> Result<EventTable> {
    load_from_reader(text.as_bytes(), options)
}

pub fn load_csv(path: &Path, options: &LoadOptions) -> Result<EventTable> {
    if !path.exists() {
        return Err(DashboardError::MissingFile(path.display().to_string()));
    }
    let file = std::fs::File::open(path)?;
    load_from_reader(file, options)
}

struct CachedDataset {
    content_hash: u64,
    table: Arc<EventTable>,
}

/// Once-per-process dataset holder
///
/// `get` hands out the same `Arc` until the file content changes or
/// `invalidate` is called.
pub struct DatasetCache {
    source: PathBuf,
    options: LoadOptions,
    state: RwLock<Option<CachedDataset>>,
}

impl DatasetCache {
    pub fn new(source: PathBuf, options: LoadOptions) -> Self {
        Self {
            source,
            options,
            state: RwLock::new(None),
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn get(&self) -> Result<Arc<EventTable>> {
        if !self.source.exists() {
            return Err(DashboardError::MissingFile(self.source.display().to_string()));
        }
        let bytes = std::fs::read(&self.source)?;
        let content_hash = hash_bytes(&bytes);

        {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = state.as_ref() {
                if cached.content_hash == content_hash {
                    debug!("Dataset cache hit for {}", self.source.display());
                    return Ok(Arc::clone(&cached.table));
                }
            }
        }

        let start = Instant::now();
        let table = Arc::new(load_from_reader(bytes.as_slice(), &self.options)?);
        info!(
            "Loaded {} rows x {} columns from {} in {:.2?}",
            table.height(),
            table.column_names().len(),
            self.source.display(),
            start.elapsed()
        );

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = Some(CachedDataset {
            content_hash,
            table: Arc::clone(&table),
        });
        Ok(table)
    }

    pub fn invalidate(&self) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.take().is_some() {
            debug!("Dataset cache invalidated for {}", self.source.display());
        }
    }
}

fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"timestamp,date_of_sale,customer_country,salesperson,cost
03/04/2024 10:15:00,03/04/2024,US,Alice,100
15/01/2024 08:00,15/01/2024,UK,,
,2024-02-10,US,Bob,"$1,200.50"
"#;

    #[test]
    fn test_day_first_resolves_ambiguous_dates() {
        let date = parse_day_first_date("03/04/2024").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 4, 3).unwrap());
        let iso = parse_day_first_date("2024-02-10").unwrap();
        assert_eq!(iso, NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
        let dt = parse_day_first_datetime("03/04/2024 10:15").unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2024, 4, 3).unwrap());
        let precise = parse_day_first_datetime("03/04/2024 10:15:00.250").unwrap();
        assert_eq!(precise.and_utc().timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_load_types_columns() {
        let table = load_csv_str(SAMPLE, &LoadOptions::default()).unwrap();
        assert_eq!(table.height(), 3);
        assert_eq!(table.frame().column("date_of_sale").unwrap().dtype(), &DataType::Date);
        assert_eq!(table.frame().column("cost").unwrap().dtype(), &DataType::Float64);
        assert!(matches!(
            table.frame().column("timestamp").unwrap().dtype(),
            DataType::Datetime(TimeUnit::Milliseconds, None)
        ));

        let costs = table.f64_values("cost").unwrap();
        assert_eq!(costs, vec![Some(100.0), None, Some(1200.5)]);
        let sellers = table.string_values("salesperson").unwrap();
        assert_eq!(sellers[1], None);
    }

    #[test]
    fn test_missing_required_column_fails() {
        let err = load_csv_str("cost,date_of_sale\n1,01/01/2024\n", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn(c) if c == "customer_country"));
    }

    #[test]
    fn test_padded_headers_and_cells_are_trimmed() {
        let csv = " customer_country , cost ,date_of_sale\n US , 12.5 , 03/04/2024 \n UK ,  ,\n";
        let table = load_csv_str(csv, &LoadOptions::default()).unwrap();
        assert_eq!(table.column_names(), vec!["customer_country", "cost", "date_of_sale"]);
        assert_eq!(
            table.string_values("customer_country").unwrap(),
            vec![Some("US".to_string()), Some("UK".to_string())]
        );
        assert_eq!(table.f64_values("cost").unwrap(), vec![Some(12.5), None]);
        assert_eq!(table.frame().column("date_of_sale").unwrap().null_count(), 1);
    }

    #[test]
    fn test_empty_input_reports_required_column() {
        let err = load_csv_str("", &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DashboardError::MissingColumn(c) if c == "customer_country"));
        let options = LoadOptions {
            required_columns: vec![],
            ..LoadOptions::default()
        };
        assert!(load_csv_str("\n", &options).unwrap().is_empty());
    }

    #[test]
    fn test_header_only_file_loads_empty() {
        let table = load_csv_str("customer_country,cost,date_of_sale\n", &LoadOptions::default()).unwrap();
        assert!(table.is_empty());
        assert!(table.has_column("cost"));
    }
}
