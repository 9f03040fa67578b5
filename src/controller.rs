//! Server-driven list view controller
//!
//! A [`ListViewController`] owns the paging, sort, search and date filter state
//! of one table, turns every change of that state into exactly one
//! [`FetchRequest`], and applies [`FetchOutcome`]s as they come back. Outcomes
//! are matched against the sequence number of the latest request, so a slow
//! response for an older query can never overwrite a newer one.
//!
//! The controller never performs I/O on its own: callers either hand requests
//! to [`Fetcher::fetch`] (on spawned tasks, as the terminal UI does) or use the
//! async helpers [`ListViewController::fetch_once`] and
//! [`ListViewController::run_to_idle`].

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::errors::{FetchError, ListViewError};
use crate::export::ExportTable;
use crate::fetch::{FetchOutcome, FetchRequest, Fetcher};
use crate::models::{
    display_value, last_valid_page, total_pages, ColumnSpec, DateRange, QueryState,
    ResultEnvelope, Row, SortDirection, SortSpec, DEFAULT_SORT_FIELD,
};
use crate::query::{QueryKey, RemoteQuery};

/// Default quiescence window for the search box
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// Page sizes offered by the pagination footer
pub const ROWS_PER_PAGE_OPTIONS: [usize; 6] = [5, 10, 15, 20, 25, 30];

/// Upper bound on clamp re-queries while settling a non-interactive load
const MAX_SETTLE_ROUNDS: usize = 4;

pub type CreateHook = Arc<dyn Fn() + Send + Sync>;

/// What a screen hands to its list view
#[derive(Clone)]
pub struct ListViewConfig<R = Row> {
    pub title: String,
    pub resource_url: String,
    pub columns: Vec<ColumnSpec<R>>,
    /// Merged verbatim into every query
    pub static_filter: Map<String, Value>,
    pub relations_to_expand: Vec<String>,
    /// Fields the free-text search applies to; empty disables search
    pub searchable_fields: Vec<String>,
    pub on_create_requested: Option<CreateHook>,
    pub default_page_size: usize,
    pub default_sort: Option<SortSpec>,
    pub search_debounce: Duration,
}

impl<R> ListViewConfig<R> {
    pub fn new(title: &str, resource_url: &str, columns: Vec<ColumnSpec<R>>) -> Self {
        Self {
            title: title.to_string(),
            resource_url: resource_url.to_string(),
            columns,
            static_filter: Map::new(),
            relations_to_expand: Vec::new(),
            searchable_fields: Vec::new(),
            on_create_requested: None,
            default_page_size: 10,
            default_sort: Some(SortSpec::new(DEFAULT_SORT_FIELD, SortDirection::Desc)),
            search_debounce: SEARCH_DEBOUNCE,
        }
    }

    pub fn with_static_filter(mut self, filter: Map<String, Value>) -> Self {
        self.static_filter = filter;
        self
    }

    pub fn with_relations(mut self, relations: &[&str]) -> Self {
        self.relations_to_expand = relations.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_search_fields(mut self, fields: &[&str]) -> Self {
        self.searchable_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_create_hook(mut self, hook: CreateHook) -> Self {
        self.on_create_requested = Some(hook);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.default_page_size = page_size;
        self
    }

    pub fn with_default_sort(mut self, sort: Option<SortSpec>) -> Self {
        self.default_sort = sort;
        self
    }

    pub fn with_search_debounce(mut self, window: Duration) -> Self {
        self.search_debounce = window;
        self
    }
}

/// Lifecycle of the most recent request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// Search box contents that have not been applied to the query yet
#[derive(Debug, Clone, Default)]
struct SearchDraft {
    text: String,
    last_changed: Option<Instant>,
}

pub struct ListViewController<R = Row> {
    config: ListViewConfig<R>,
    fetcher: Fetcher<R>,
    state: QueryState,
    status: FetchStatus,
    /// Last successfully applied page, kept visible while a new one loads
    page: ResultEnvelope<R>,
    /// Query state that produced `page`
    shown: QueryState,
    known_total: Option<usize>,
    last_error: Option<FetchError>,
    draft: SearchDraft,
    latest_seq: u64,
    selection: BTreeSet<usize>,
}

impl<R> ListViewController<R>
where
    R: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(config: ListViewConfig<R>, fetcher: Fetcher<R>) -> Result<Self, ListViewError> {
        if config.columns.is_empty() {
            return Err(ListViewError::NoColumns);
        }
        if config.default_page_size == 0 {
            return Err(ListViewError::InvalidPageSize);
        }
        if config.resource_url.trim().is_empty() {
            return Err(ListViewError::MissingResourceUrl);
        }

        let state = QueryState::new(config.default_page_size, config.default_sort.clone());

        Ok(Self {
            config,
            fetcher,
            shown: state.clone(),
            state,
            status: FetchStatus::Idle,
            page: ResultEnvelope::default(),
            known_total: None,
            last_error: None,
            draft: SearchDraft::default(),
            latest_seq: 0,
            selection: BTreeSet::new(),
        })
    }

    pub fn title(&self) -> &str {
        &self.config.title
    }

    pub fn resource_url(&self) -> &str {
        &self.config.resource_url
    }

    pub fn columns(&self) -> &[ColumnSpec<R>] {
        &self.config.columns
    }

    pub fn query_state(&self) -> &QueryState {
        &self.state
    }

    /// Paging state of the rows on screen, which lags `query_state` while a
    /// request is in flight.
    pub fn shown_query_state(&self) -> &QueryState {
        &self.shown
    }

    pub fn status(&self) -> FetchStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status == FetchStatus::Loading
    }

    pub fn docs(&self) -> &[R] {
        &self.page.docs
    }

    pub fn total_docs(&self) -> usize {
        self.page.total_docs
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.page.total_docs, self.shown.rows_per_page)
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn fetcher(&self) -> Fetcher<R> {
        self.fetcher.clone()
    }

    pub fn search_enabled(&self) -> bool {
        !self.config.searchable_fields.is_empty()
    }

    /// Text currently in the search box, applied or not
    pub fn search_draft(&self) -> &str {
        if self.draft.last_changed.is_some() {
            &self.draft.text
        } else {
            &self.state.search_term
        }
    }

    pub fn search_pending(&self) -> bool {
        self.draft.last_changed.is_some()
    }

    /// Build the request for the current state and make it the latest one.
    fn issue(&mut self, bypass_cache: bool) -> FetchRequest {
        self.latest_seq += 1;
        self.status = FetchStatus::Loading;

        let query = RemoteQuery::build(
            &self.state,
            &self.config.static_filter,
            &self.config.relations_to_expand,
            &self.config.searchable_fields,
        );
        let key = QueryKey::new(&self.config.resource_url, &query);

        debug!(
            "{}: issuing request #{} (page {}, {} per page)",
            self.config.title, self.latest_seq, self.state.page, self.state.rows_per_page
        );

        FetchRequest {
            seq: self.latest_seq,
            url: self.config.resource_url.clone(),
            query,
            key,
            bypass_cache,
        }
    }

    /// Initial query when the screen opens
    pub fn load(&mut self) -> FetchRequest {
        self.issue(false)
    }

    /// Re-query the current state, skipping the cached page
    pub fn refresh(&mut self) -> FetchRequest {
        self.issue(true)
    }

    /// Move to `page`, clamped into the range known from the last response.
    pub fn set_page(&mut self, page: usize) -> Option<FetchRequest> {
        let mut page = page.max(1);
        if let Some(total) = self.known_total {
            page = page.min(last_valid_page(total, self.state.rows_per_page));
        }
        if page == self.state.page {
            return None;
        }
        self.state.page = page;
        Some(self.issue(false))
    }

    pub fn next_page(&mut self) -> Option<FetchRequest> {
        self.set_page(self.state.page + 1)
    }

    pub fn previous_page(&mut self) -> Option<FetchRequest> {
        self.set_page(self.state.page.saturating_sub(1))
    }

    pub fn first_page(&mut self) -> Option<FetchRequest> {
        self.set_page(1)
    }

    pub fn last_page(&mut self) -> Option<FetchRequest> {
        let total = self.known_total.unwrap_or(0);
        self.set_page(last_valid_page(total, self.state.rows_per_page))
    }

    /// Change the page size; always goes back to page 1.
    pub fn set_rows_per_page(
        &mut self,
        rows_per_page: usize,
    ) -> Result<Option<FetchRequest>, ListViewError> {
        if rows_per_page == 0 {
            return Err(ListViewError::InvalidPageSize);
        }
        if rows_per_page == self.state.rows_per_page {
            return Ok(None);
        }
        self.state.rows_per_page = rows_per_page;
        self.state.page = 1;
        Ok(Some(self.issue(false)))
    }

    /// Step through [`ROWS_PER_PAGE_OPTIONS`] (`forward` picks the next larger size).
    pub fn cycle_rows_per_page(&mut self, forward: bool) -> Option<FetchRequest> {
        let current = self.state.rows_per_page;
        let next = if forward {
            ROWS_PER_PAGE_OPTIONS.iter().copied().find(|&n| n > current)
        } else {
            ROWS_PER_PAGE_OPTIONS.iter().rev().copied().find(|&n| n < current)
        };
        next.and_then(|n| self.set_rows_per_page(n).ok().flatten())
    }

    /// Header interaction on column `index`.
    ///
    /// The active column flips direction; any other sortable column becomes the
    /// single active sort, ascending. Non-sortable columns are ignored.
    pub fn toggle_sort(&mut self, index: usize) -> Result<Option<FetchRequest>, ListViewError> {
        let column = self
            .config
            .columns
            .get(index)
            .ok_or(ListViewError::UnknownColumn(index))?;

        if !column.is_sortable() {
            return Ok(None);
        }
        let Some(field) = column.sort_field.clone() else {
            return Ok(None);
        };

        let next = match &self.state.sort {
            Some(active) if active.field == field => SortSpec {
                field,
                direction: active.direction.toggled(),
            },
            _ => SortSpec::new(&field, SortDirection::Asc),
        };
        self.state.sort = Some(next);
        Ok(Some(self.issue(false)))
    }

    /// Record a search box edit at `now`. Nothing is fetched until the input
    /// has been quiet for the debounce window; see [`Self::poll_search`].
    pub fn input_search(&mut self, text: &str, now: Instant) {
        if !self.search_enabled() {
            return;
        }
        self.draft.text = text.to_string();
        self.draft.last_changed = Some(now);
    }

    /// Apply the search draft once it has been quiet long enough.
    pub fn poll_search(&mut self, now: Instant) -> Option<FetchRequest> {
        let last_changed = self.draft.last_changed?;
        if now.saturating_duration_since(last_changed) < self.config.search_debounce {
            return None;
        }
        self.draft.last_changed = None;

        let term = self.draft.text.clone();
        self.apply_search_term(&term)
    }

    /// Apply `term` right away, skipping the debounce window.
    pub fn set_search(&mut self, term: &str) -> Option<FetchRequest> {
        if !self.search_enabled() {
            return None;
        }
        self.draft = SearchDraft::default();
        self.apply_search_term(term)
    }

    fn apply_search_term(&mut self, term: &str) -> Option<FetchRequest> {
        let term = term.trim();
        if term == self.state.search_term {
            return None;
        }
        info!("{}: searching for '{}'", self.config.title, term);
        self.state.search_term = term.to_string();
        self.state.page = 1;
        Some(self.issue(false))
    }

    pub fn apply_date_range(
        &mut self,
        range: DateRange,
    ) -> Result<Option<FetchRequest>, ListViewError> {
        if let (Some(start), Some(end)) = (range.start, range.end) {
            if start > end {
                return Err(ListViewError::InvalidDateRange { start, end });
            }
        }
        if range == self.state.date_range {
            return Ok(None);
        }
        self.state.date_range = range;
        self.state.page = 1;
        Ok(Some(self.issue(false)))
    }

    pub fn clear_date_range(&mut self) -> Option<FetchRequest> {
        self.apply_date_range(DateRange::default()).ok().flatten()
    }

    /// Apply a finished fetch.
    ///
    /// Outcomes of superseded requests are dropped. A response whose total no
    /// longer reaches the current page clamps the page and returns the one
    /// follow-up request for it; the previous rows stay visible meanwhile.
    pub fn apply(&mut self, outcome: FetchOutcome<R>) -> Option<FetchRequest> {
        if outcome.seq != self.latest_seq {
            debug!(
                "{}: discarding response #{} (latest is #{})",
                self.config.title, outcome.seq, self.latest_seq
            );
            return None;
        }

        match outcome.result {
            Ok(page) => {
                let total = page.total_docs;
                self.known_total = Some(total);

                let last_page = last_valid_page(total, self.state.rows_per_page);
                if self.state.page > last_page {
                    info!(
                        "{}: page {} is past the end ({} rows), clamping to {}",
                        self.config.title, self.state.page, total, last_page
                    );
                    self.state.page = last_page;
                    return Some(self.issue(false));
                }

                self.page = Arc::try_unwrap(page).unwrap_or_else(|shared| (*shared).clone());
                self.shown = self.state.clone();
                self.selection.clear();
                self.last_error = None;
                self.status = FetchStatus::Succeeded;
                None
            }
            Err(e) => {
                warn!("{}: fetch failed: {}", self.config.title, e);
                self.last_error = Some(e);
                self.status = FetchStatus::Failed;
                None
            }
        }
    }

    /// Run one request to completion and apply it, returning any follow-up.
    pub async fn fetch_once(&mut self, request: FetchRequest) -> Option<FetchRequest> {
        let outcome = self.fetcher.fetch(request).await;
        self.apply(outcome)
    }

    /// Run `request` and any clamp follow-ups until the view settles.
    pub async fn run_to_idle(&mut self, request: FetchRequest) {
        let mut next = Some(request);
        let mut rounds = 0;
        while let Some(request) = next {
            if rounds == MAX_SETTLE_ROUNDS {
                warn!("{}: result set kept shrinking, giving up", self.config.title);
                break;
            }
            rounds += 1;
            next = self.fetch_once(request).await;
        }
    }

    pub fn toggle_selection(&mut self, index: usize) {
        if index >= self.page.docs.len() {
            return;
        }
        if !self.selection.remove(&index) {
            self.selection.insert(index);
        }
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selection.contains(&index)
    }

    pub fn selected_rows(&self) -> Vec<&R> {
        self.selection
            .iter()
            .filter_map(|&i| self.page.docs.get(i))
            .collect()
    }

    pub fn can_create(&self) -> bool {
        self.config.on_create_requested.is_some()
    }

    /// Invoke the create hook, `false` when the screen has none.
    pub fn request_create(&self) -> bool {
        match &self.config.on_create_requested {
            Some(hook) => {
                hook();
                true
            }
            None => false,
        }
    }

    /// The loaded page as a header/value matrix for the export writers.
    pub fn export_table(&self) -> ExportTable {
        let headers = self
            .config
            .columns
            .iter()
            .map(|c| c.name.clone())
            .collect();
        let rows = self
            .page
            .docs
            .iter()
            .map(|row| {
                self.config
                    .columns
                    .iter()
                    .map(|c| display_value(&c.value(row)))
                    .collect()
            })
            .collect();
        ExportTable::new(&self.config.title, headers, rows)
    }
}
