use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;

use stockroom::export::ExportFormat;
use stockroom::models::{SortDirection, SortSpec};
use stockroom::resources::Resource;

#[derive(Parser)]
#[command(name = "stockroom")]
#[command(about = "Browse and export back-office collections (inventory, sales, invoices, loans, staff) from the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the collections that can be browsed
    Resources,

    /// Open a collection in the interactive table
    Browse {
        /// Collection name (products, sales, purchases, invoices, receipts, loans, employees)
        resource: String,

        /// Rows per page
        #[arg(long)]
        page_size: Option<usize>,

        /// Fixed server-side filter, repeatable (key=value)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Shell command run by the new-record key; the table reloads when it succeeds
        #[arg(long)]
        create_command: Option<String>,
    },

    /// Export one page of a collection to CSV or PDF
    Export {
        /// Collection name
        resource: String,

        /// Output format (csv, excel, pdf)
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Page to export
        #[arg(long, default_value = "1")]
        page: usize,

        /// Rows per page
        #[arg(long)]
        page_size: Option<usize>,

        /// Search keyword
        #[arg(short, long)]
        search: Option<String>,

        /// Sort as field:asc or field:desc
        #[arg(long)]
        sort: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Fixed server-side filter, repeatable (key=value)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Output file (defaults to a timestamped file in the export directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Store the bearer token used for API requests
    Login {
        #[arg(long)]
        token: String,
    },

    /// Forget the stored bearer token
    Logout,
}

impl Commands {
    pub fn parse_resource(name: &str) -> Result<Resource> {
        Resource::parse(name).ok_or_else(|| {
            let known: Vec<&str> = Resource::ALL.iter().map(|r| r.as_str()).collect();
            anyhow!("Unknown collection: {}. Available: {}", name, known.join(", "))
        })
    }

    pub fn parse_format(format: &str) -> Result<ExportFormat> {
        ExportFormat::parse(format).ok_or_else(|| {
            anyhow!("Unsupported export format: {}. Supported formats: csv, excel, pdf", format)
        })
    }

    /// `field:asc` / `field:desc`; a bare field sorts descending.
    pub fn parse_sort(sort: &str) -> Result<SortSpec> {
        let (field, direction) = match sort.split_once(':') {
            Some((field, direction)) => {
                let direction = SortDirection::parse(direction)
                    .ok_or_else(|| anyhow!("Invalid sort direction: {}", direction))?;
                (field, direction)
            }
            None => (sort, SortDirection::Desc),
        };
        if field.trim().is_empty() {
            return Err(anyhow!("Sort field is empty"));
        }
        Ok(SortSpec::new(field.trim(), direction))
    }

    /// `key=value` pairs into the fixed filter object. Values that parse as
    /// JSON (numbers, booleans, null) keep their type, anything else is a string.
    pub fn parse_filters(filters: &[String]) -> Result<Map<String, Value>> {
        let mut map = Map::new();
        for filter in filters {
            let (key, value) = filter
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid filter '{}', expected key=value", filter))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(anyhow!("Invalid filter '{}', key is empty", filter));
            }
            let value = match serde_json::from_str::<Value>(value) {
                Ok(v @ (Value::Number(_) | Value::Bool(_) | Value::Null)) => v,
                _ => Value::String(value.to_string()),
            };
            map.insert(key.to_string(), value);
        }
        Ok(map)
    }
}
