//! Spreadsheet export (CSV, opened directly by Excel and friends)

use std::io::Write;
use std::path::Path;
use tracing::info;

use super::{ExportOutcome, ExportTable};
use crate::errors::ExportError;

/// Byte order mark so spreadsheet tools pick UTF-8 instead of the locale codepage
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn export_spreadsheet(table: &ExportTable, path: &Path) -> Result<ExportOutcome, ExportError> {
    if table.is_empty() {
        info!("{}: nothing to export", table.title);
        return Ok(ExportOutcome::NothingToExport);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(&table.headers)?;
    for record in table.records() {
        writer.write_record(record.iter().map(|(_, value)| *value))?;
    }
    writer.flush()?;

    info!(
        "Exported {} rows of {} to {}",
        table.rows.len(),
        table.title,
        path.display()
    );
    Ok(ExportOutcome::Written {
        path: path.to_path_buf(),
        rows: table.rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(rows: usize) -> ExportTable {
        ExportTable::new(
            "Products",
            vec!["Name".to_string(), "Price".to_string()],
            (0..rows)
                .map(|i| vec![format!("Item, {}", i), format!("{}.50", i)])
                .collect(),
        )
    }

    #[test]
    fn test_writes_one_line_per_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("products.csv");

        let outcome = export_spreadsheet(&table(3), &path).unwrap();
        assert_eq!(
            outcome,
            ExportOutcome::Written {
                path: path.clone(),
                rows: 3
            }
        );

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let mut reader = csv::Reader::from_reader(&bytes[UTF8_BOM.len()..]);
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["Name", "Price"]);
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(&records[1][0], "Item, 1");
    }

    #[test]
    fn test_empty_page_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");

        let outcome = export_spreadsheet(&table(0), &path).unwrap();
        assert_eq!(outcome, ExportOutcome::NothingToExport);
        assert!(!path.exists());
    }
}
