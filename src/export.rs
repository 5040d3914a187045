//! CSV export of the currently filtered table
//!
//! Header set and row order follow the table as given. Dates are written
//! day-first so the file loads back through `loader` unchanged.

use crate::error::{DashboardError, Result};
use crate::table::EventTable;
use csv::WriterBuilder;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Write `table` as CSV, returning the number of data rows written
pub fn write_csv<W: Write>(table: &EventTable, writer: W) -> Result<usize> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    let headers = table.column_names();
    if headers.is_empty() {
        return Ok(0);
    }
    wtr.write_record(&headers)?;
    let rows = table.formatted_rows()?;
    for row in &rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(rows.len())
}

pub fn to_csv_string(table: &EventTable) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    String::from_utf8(buf).map_err(|e| DashboardError::Load(format!("export produced invalid UTF-8: {}", e)))
}

pub fn export_to_path(table: &EventTable, path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path)?;
    let rows = write_csv(table, file)?;
    info!("Exported {} rows to {}", rows, path.display());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{apply_filters, ColumnSelection, FilterSelection};
    use crate::loader::{load_csv_str, LoadOptions};

    const SOURCE: &str = "\
timestamp,date_of_sale,customer_country,salesperson,customer_interaction,cost
03/04/2024 10:15:00,03/04/2024,US,Alice,\"Demo, scheduled\",100.5
15/01/2024 08:00:00,15/01/2024,UK,,Website Visit,
2024-02-10T09:30:00.250,10/02/2024,US,Bob,Promotional Event,200
";

    #[test]
    fn test_export_round_trips_filtered_rows() {
        let options = LoadOptions::default();
        let table = load_csv_str(SOURCE, &options).unwrap();
        let selection = FilterSelection::new().with("customer_country", ColumnSelection::of(["US"]));
        let filtered = apply_filters(&table, &selection).unwrap();

        let csv = to_csv_string(&filtered).unwrap();
        let first_line = csv.lines().next().unwrap();
        assert_eq!(first_line, "timestamp,date_of_sale,customer_country,salesperson,customer_interaction,cost");
        assert!(csv.contains("03/04/2024 10:15:00,03/04/2024,US,Alice,\"Demo, scheduled\",100.5"));
        assert!(csv.contains("10/02/2024 09:30:00.250,10/02/2024,US,Bob,Promotional Event,200"));

        let reloaded = load_csv_str(&csv, &options).unwrap();
        assert_eq!(reloaded.column_names(), filtered.column_names());
        assert!(reloaded.frame().equals_missing(filtered.frame()));
    }

    #[test]
    fn test_export_of_empty_selection_keeps_header() {
        let table = load_csv_str(SOURCE, &LoadOptions::default()).unwrap();
        let csv = to_csv_string(&table.cleared()).unwrap();
        assert_eq!(csv.trim_end(), "timestamp,date_of_sale,customer_country,salesperson,customer_interaction,cost");
    }
}
