//! Export of the currently loaded page
//!
//! Writers only ever see the rows a list view has on screen; exporting a whole
//! collection would need its own unpaginated fetch.

pub mod pdf;
pub mod spreadsheet;

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

pub use pdf::{export_pdf, Letterhead};
pub use spreadsheet::export_spreadsheet;

/// Header/value matrix handed to the writers.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    pub fn new(title: &str, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            title: title.to_string(),
            headers,
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as `(header, value)` pairs in column order
    pub fn records(&self) -> Vec<Vec<(&str, &str)>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .map(String::as_str)
                    .zip(row.iter().map(String::as_str))
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Written { path: PathBuf, rows: usize },
    /// The loaded page was empty, no file was created
    NothingToExport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Spreadsheet,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &str {
        match self {
            ExportFormat::Spreadsheet => "csv",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "csv" | "excel" | "xls" | "spreadsheet" => Some(ExportFormat::Spreadsheet),
            "pdf" => Some(ExportFormat::Pdf),
            _ => None,
        }
    }
}

/// `<dir>/<title-slug>-<YYYYmmdd-HHMMSS>.<ext>`
pub fn export_path(dir: &Path, title: &str, format: ExportFormat, at: DateTime<Local>) -> PathBuf {
    let slug: String = title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "export" } else { slug };
    dir.join(format!(
        "{}-{}.{}",
        slug,
        at.format("%Y%m%d-%H%M%S"),
        format.extension()
    ))
}
