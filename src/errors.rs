//! Error types for the list view, its transport and the export writers

use thiserror::Error;

/// Failure of a single collection fetch.
///
/// `Clone` because one in-flight fetch can be awaited by several callers
/// through the query cache.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Network(String),

    #[error("Server error (status {status}): {message}")]
    Status { status: u16, message: String },

    #[error("Authentication required")]
    Unauthorized,
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => FetchError::Network(err.to_string()),
        }
    }
}

/// Invalid input handed to the list view controller.
#[derive(Error, Debug, PartialEq)]
pub enum ListViewError {
    #[error("A list view needs at least one column")]
    NoColumns,

    #[error("Rows per page must be greater than zero")]
    InvalidPageSize,

    #[error("Resource URL must not be empty")]
    MissingResourceUrl,

    #[error("Date range start {start} is after end {end}")]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("Column {0} does not exist")]
    UnknownColumn(usize),
}

/// Failure while writing an export file.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Unsupported logo image {path}: {reason}")]
    Logo { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mentions_code() {
        let err = FetchError::Status {
            status: 503,
            message: "maintenance".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503") && msg.contains("maintenance"));
    }

    #[test]
    fn test_date_range_error_shows_both_bounds() {
        let err = ListViewError::InvalidDateRange {
            start: chrono::NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            end: chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Date range start 2024-05-02 is after end 2024-05-01"
        );
    }
}
