use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Default row shape: the associative map the REST API returns per document.
pub type Row = serde_json::Map<String, Value>;

/// Field the collections are sorted on until the user picks a column.
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Some(SortDirection::Asc),
            "desc" | "descending" => Some(SortDirection::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(field: &str, direction: SortDirection) -> Self {
        Self {
            field: field.to_string(),
            direction,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Paging, sort, search and filter parameters of one list view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    /// 1-based page number
    pub page: usize,
    pub rows_per_page: usize,
    pub sort: Option<SortSpec>,
    /// Applied (debounced) search term
    pub search_term: String,
    pub date_range: DateRange,
}

impl QueryState {
    pub fn new(rows_per_page: usize, sort: Option<SortSpec>) -> Self {
        Self {
            page: 1,
            rows_per_page,
            sort,
            search_term: String::new(),
            date_range: DateRange::default(),
        }
    }

    /// Zero-based index of the first row on the current page
    pub fn offset(&self) -> usize {
        (self.page - 1) * self.rows_per_page
    }
}

/// Number of pages needed for `total_docs` rows, zero for an empty collection.
pub fn total_pages(total_docs: usize, rows_per_page: usize) -> usize {
    if rows_per_page == 0 {
        return 0;
    }
    (total_docs + rows_per_page - 1) / rows_per_page
}

/// Highest page a query may ask for; an empty collection still has page 1.
pub fn last_valid_page(total_docs: usize, rows_per_page: usize) -> usize {
    total_pages(total_docs, rows_per_page).max(1)
}

/// One page of a remote collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEnvelope<R> {
    pub docs: Vec<R>,
    pub total_docs: usize,
}

impl<R> Default for ResultEnvelope<R> {
    fn default() -> Self {
        Self {
            docs: Vec::new(),
            total_docs: 0,
        }
    }
}

impl<R: DeserializeOwned> ResultEnvelope<R> {
    /// Unwrap a `{ data: { docs, totalDocs } }` response body.
    ///
    /// Anything that does not have that shape is treated as an empty result.
    pub fn from_response(body: &Value) -> Self {
        let Some(data) = body.get("data") else {
            warn!("Collection response has no `data` field, treating as empty");
            return Self::default();
        };

        let docs = match data.get("docs") {
            Some(docs) => match serde_json::from_value::<Vec<R>>(docs.clone()) {
                Ok(docs) => docs,
                Err(e) => {
                    warn!("Failed to decode collection rows: {}", e);
                    return Self::default();
                }
            },
            None => {
                warn!("Collection response has no `docs` array, treating as empty");
                return Self::default();
            }
        };

        let total_docs = data
            .get("totalDocs")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(docs.len());

        Self { docs, total_docs }
    }
}

pub type Selector<R> = Arc<dyn Fn(&R) -> Value + Send + Sync>;
pub type CellRenderer<R> = Arc<dyn Fn(&R) -> String + Send + Sync>;

/// Column of a list view. Only the selector and cell closures know the row shape.
#[derive(Clone)]
pub struct ColumnSpec<R = Row> {
    pub name: String,
    pub sort_field: Option<String>,
    pub selector: Selector<R>,
    pub cell: CellRenderer<R>,
    pub sortable: bool,
}

impl<R: 'static> ColumnSpec<R> {
    pub fn new<F>(name: &str, selector: F) -> Self
    where
        F: Fn(&R) -> Value + Send + Sync + 'static,
    {
        let selector: Selector<R> = Arc::new(selector);
        let cell_selector = Arc::clone(&selector);
        Self {
            name: name.to_string(),
            sort_field: None,
            selector,
            cell: Arc::new(move |row| display_value(&cell_selector(row))),
            sortable: false,
        }
    }

    pub fn sortable_by(mut self, field: &str) -> Self {
        self.sort_field = Some(field.to_string());
        self.sortable = true;
        self
    }

    pub fn with_cell<F>(mut self, cell: F) -> Self
    where
        F: Fn(&R) -> String + Send + Sync + 'static,
    {
        self.cell = Arc::new(cell);
        self
    }
}

impl<R> ColumnSpec<R> {
    /// Whether header interaction changes the sort
    pub fn is_sortable(&self) -> bool {
        self.sortable && self.sort_field.is_some()
    }

    pub fn value(&self, row: &R) -> Value {
        (self.selector)(row)
    }

    pub fn render(&self, row: &R) -> String {
        (self.cell)(row)
    }
}

impl ColumnSpec<Row> {
    /// Column reading a (possibly dotted, e.g. `customer.name`) field path.
    pub fn field(name: &str, path: &str) -> Self {
        let path = path.to_string();
        Self::new(name, move |row: &Row| lookup_path(row, &path))
    }
}

impl<R> fmt::Debug for ColumnSpec<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("name", &self.name)
            .field("sort_field", &self.sort_field)
            .field("sortable", &self.sortable)
            .finish()
    }
}

/// Resolve a dotted path against a row, `Value::Null` when any segment is missing.
pub fn lookup_path(row: &Row, path: &str) -> Value {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return Value::Null;
    };
    let mut current = match row.get(first) {
        Some(value) => value,
        None => return Value::Null,
    };
    for segment in segments {
        current = match current.get(segment) {
            Some(value) => value,
            None => return Value::Null,
        };
    }
    current.clone()
}

pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        other => other.to_string(),
    }
}
