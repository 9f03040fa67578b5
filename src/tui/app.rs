//! Terminal application state and event loop for one list view

use anyhow::Result;
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};
use std::io::Stdout;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info, warn};

use super::components::{DataTable, DateFilterForm, InputField, StatusDisplay};
use super::ui::{centered_rect, Styles};
use crate::config::Config;
use crate::controller::{ListViewConfig, ListViewController};
use crate::export::{
    export_path, export_pdf, export_spreadsheet, ExportFormat, ExportOutcome, Letterhead,
};
use crate::fetch::{FetchOutcome, FetchRequest, Fetcher};
use crate::models::Row;

const TICK: Duration = Duration::from_millis(100);
const STATUS_TIMEOUT: Duration = Duration::from_secs(5);

const HINT: &str =
    "q Quit | ←/→ Page | +/- Rows | 1-9 Sort | / Search | f Dates | e CSV | p PDF | ? Help";

const HELP: &[(&str, &str)] = &[
    ("↑/↓ j/k", "Move cursor"),
    ("←/→ h/l", "Previous / next page"),
    ("Home/End", "First / last page"),
    ("+ / -", "More / fewer rows per page"),
    ("1-9", "Sort by column (again to reverse)"),
    ("/", "Search"),
    ("f", "Filter by date range"),
    ("x", "Clear date range"),
    ("Space", "Mark row"),
    ("r", "Reload from server"),
    ("e", "Export page to CSV"),
    ("p", "Export page to PDF"),
    ("n", "New record"),
    ("q / Esc", "Quit"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browse,
    Search,
    DateFilter,
    Help,
}

/// Why the table was left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuiExit {
    Quit,
    /// The server rejected the stored token
    SessionExpired,
}

pub struct App {
    pub config: Config,
    pub view: ListViewController,
    pub table: DataTable,
    pub mode: Mode,
    pub search: InputField,
    pub date_filter: DateFilterForm,
    pub status: StatusDisplay,
    session_expired: Arc<AtomicBool>,
    create_requested: Arc<AtomicBool>,
    create_command: Option<String>,
    outcomes_tx: UnboundedSender<FetchOutcome<Row>>,
    outcomes_rx: UnboundedReceiver<FetchOutcome<Row>>,
    should_quit: bool,
}

impl App {
    /// `session_expired` is raised by the transport on a 401. With a
    /// `create_command`, the new-record key suspends the table and runs it.
    pub fn new(
        config: Config,
        list: ListViewConfig,
        fetcher: Fetcher<Row>,
        session_expired: Arc<AtomicBool>,
        create_command: Option<String>,
    ) -> Result<Self> {
        let create_requested = Arc::new(AtomicBool::new(false));
        let list = match &create_command {
            Some(_) => {
                let flag = Arc::clone(&create_requested);
                list.with_create_hook(Arc::new(move || flag.store(true, Ordering::SeqCst)))
            }
            None => list,
        };

        let view = ListViewController::new(list, fetcher)?;
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let search_label = if view.search_enabled() {
            "Search (/)"
        } else {
            "Search unavailable"
        };

        Ok(Self {
            config,
            view,
            table: DataTable::new(),
            mode: Mode::Browse,
            search: InputField::new(search_label).with_placeholder("Type / to search"),
            date_filter: DateFilterForm::new(),
            status: StatusDisplay::new(STATUS_TIMEOUT),
            session_expired,
            create_requested,
            create_command,
            outcomes_tx,
            outcomes_rx,
            should_quit: false,
        })
    }

    pub async fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> Result<TuiExit> {
        info!("Opening {}", self.view.title());
        let first = self.view.load();
        self.dispatch(first);

        loop {
            terminal.draw(|f| self.draw(f))?;

            if self.session_expired.load(Ordering::SeqCst) {
                warn!("Session expired while browsing {}", self.view.title());
                return Ok(TuiExit::SessionExpired);
            }

            if event::poll(TICK)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        if let Some(request) = self.handle_key(key, Instant::now()) {
                            self.dispatch(request);
                        }
                    }
                }
            }

            if self.create_requested.swap(false, Ordering::SeqCst) {
                if let Some(request) = self.run_create_command(terminal).await? {
                    self.dispatch(request);
                }
            }

            if let Some(request) = self.view.poll_search(Instant::now()) {
                self.dispatch(request);
            }

            while let Ok(outcome) = self.outcomes_rx.try_recv() {
                if let Some(request) = self.on_outcome(outcome) {
                    self.dispatch(request);
                }
            }

            self.status.expire(Local::now());

            if self.should_quit {
                return Ok(TuiExit::Quit);
            }
        }
    }

    /// Run a request on its own task; the outcome comes back through the channel.
    fn dispatch(&self, request: FetchRequest) {
        let fetcher = self.view.fetcher();
        let tx = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let outcome = fetcher.fetch(request).await;
            let _ = tx.send(outcome);
        });
    }

    pub fn on_outcome(&mut self, outcome: FetchOutcome<Row>) -> Option<FetchRequest> {
        let follow_up = self.view.apply(outcome);
        self.table.clamp(self.view.docs().len());
        follow_up
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Option<FetchRequest> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return None;
        }

        match self.mode {
            Mode::Browse => self.handle_browse_key(key),
            Mode::Search => {
                self.handle_search_key(key, now);
                None
            }
            Mode::DateFilter => self.handle_date_filter_key(key),
            Mode::Help => {
                self.mode = Mode::Browse;
                None
            }
        }
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> Option<FetchRequest> {
        let rows = self.view.docs().len();
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.table.up(rows);
                None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.table.down(rows);
                None
            }
            KeyCode::Right | KeyCode::Char('l') | KeyCode::PageDown => self.view.next_page(),
            KeyCode::Left | KeyCode::Char('h') | KeyCode::PageUp => self.view.previous_page(),
            KeyCode::Home | KeyCode::Char('g') => self.view.first_page(),
            KeyCode::End | KeyCode::Char('G') => self.view.last_page(),
            KeyCode::Char('+') | KeyCode::Char(']') => self.view.cycle_rows_per_page(true),
            KeyCode::Char('-') | KeyCode::Char('[') => self.view.cycle_rows_per_page(false),
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                match self.view.toggle_sort(index) {
                    Ok(Some(request)) => Some(request),
                    Ok(None) => {
                        self.status
                            .set_info(format!("Column {} cannot be sorted", index + 1));
                        None
                    }
                    Err(e) => {
                        self.status.set_warning(e.to_string());
                        None
                    }
                }
            }
            KeyCode::Char('/') => {
                if self.view.search_enabled() {
                    self.mode = Mode::Search;
                    self.search.set_focus(true);
                } else {
                    self.status
                        .set_info(format!("{} cannot be searched", self.view.title()));
                }
                None
            }
            KeyCode::Char('f') => {
                self.date_filter.open(&self.view.query_state().date_range);
                self.mode = Mode::DateFilter;
                None
            }
            KeyCode::Char('x') => self.view.clear_date_range(),
            KeyCode::Char(' ') => {
                if let Some(i) = self.table.cursor() {
                    self.view.toggle_selection(i);
                }
                None
            }
            KeyCode::Char('r') => Some(self.view.refresh()),
            KeyCode::Char('e') => {
                self.export(ExportFormat::Spreadsheet);
                None
            }
            KeyCode::Char('p') => {
                self.export(ExportFormat::Pdf);
                None
            }
            KeyCode::Char('n') => {
                if !self.view.request_create() {
                    self.status
                        .set_info(format!("New {} records are not enabled", self.view.title()));
                }
                None
            }
            KeyCode::Char('?') => {
                self.mode = Mode::Help;
                None
            }
            _ => None,
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Tab => {
                self.search.set_focus(false);
                self.mode = Mode::Browse;
                return;
            }
            KeyCode::Char(c) => self.search.insert_char(c),
            KeyCode::Backspace => self.search.delete_char(),
            KeyCode::Delete => self.search.delete_char_forward(),
            KeyCode::Left => self.search.move_cursor_left(),
            KeyCode::Right => self.search.move_cursor_right(),
            KeyCode::Home => self.search.move_cursor_to_start(),
            KeyCode::End => self.search.move_cursor_to_end(),
            _ => return,
        }
        if self.search.value != self.view.search_draft() {
            self.view.input_search(&self.search.value, now);
        }
    }

    fn handle_date_filter_key(&mut self, key: KeyEvent) -> Option<FetchRequest> {
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Browse;
                None
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.date_filter.toggle_focus();
                None
            }
            KeyCode::Enter => {
                let range = self.date_filter.submit()?;
                match self.view.apply_date_range(range) {
                    Ok(request) => {
                        self.mode = Mode::Browse;
                        request
                    }
                    Err(e) => {
                        self.status.set_error(e.to_string());
                        None
                    }
                }
            }
            KeyCode::Char(c) => {
                self.date_filter.current_mut().insert_char(c);
                None
            }
            KeyCode::Backspace => {
                self.date_filter.current_mut().delete_char();
                None
            }
            KeyCode::Left => {
                self.date_filter.current_mut().move_cursor_left();
                None
            }
            KeyCode::Right => {
                self.date_filter.current_mut().move_cursor_right();
                None
            }
            _ => None,
        }
    }

    /// Write the loaded page to the export directory
    pub fn export(&mut self, format: ExportFormat) {
        let now = Local::now();
        let table = self.view.export_table();
        let path = export_path(&self.config.export_dir, self.view.title(), format, now);

        let result = match format {
            ExportFormat::Spreadsheet => export_spreadsheet(&table, &path),
            ExportFormat::Pdf => {
                let letterhead = Letterhead::new(now)
                    .with_company_name(self.config.letterhead.company_name.clone())
                    .with_logo(self.config.letterhead.logo_path.clone());
                export_pdf(&table, &letterhead, &path)
            }
        };

        match result {
            Ok(ExportOutcome::Written { path, rows }) => {
                self.status
                    .set_success(format!("Exported {} rows to {}", rows, path.display()));
            }
            Ok(ExportOutcome::NothingToExport) => {
                self.status.set_warning("Nothing to export".to_string());
            }
            Err(e) => {
                error!("Export of {} failed: {}", self.view.title(), e);
                self.status.set_error(format!("Export failed: {}", e));
            }
        }
    }

    /// Leave the alternate screen, run the create command, then reload.
    async fn run_create_command(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> Result<Option<FetchRequest>> {
        let Some(command) = self.create_command.clone() else {
            return Ok(None);
        };
        info!("Running create command for {}: {}", self.view.title(), command);

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

        let result = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .env("STOCKROOM_RESOURCE_URL", self.view.resource_url())
            .status()
            .await;

        enable_raw_mode()?;
        execute!(terminal.backend_mut(), EnterAlternateScreen)?;
        terminal.clear()?;

        match result {
            Ok(status) if status.success() => {
                self.status.set_success("Record created, reloading".to_string());
                Ok(Some(self.view.refresh()))
            }
            Ok(status) => {
                warn!("Create command exited with {}", status);
                self.status
                    .set_warning(format!("Create command exited with {}", status));
                Ok(None)
            }
            Err(e) => {
                error!("Could not run create command: {}", e);
                self.status.set_error(format!("Could not run create command: {}", e));
                Ok(None)
            }
        }
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let size = f.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(size);

        self.search.render(f, chunks[0]);
        self.table.render(f, chunks[1], &self.view);
        self.status.render(f, chunks[2], HINT);

        match self.mode {
            Mode::DateFilter => self.date_filter.render(f, size),
            Mode::Help => draw_help(f, size),
            Mode::Browse | Mode::Search => {}
        }
    }
}

fn draw_help(f: &mut Frame, area: Rect) {
    let popup = centered_rect(60, 70, area);
    f.render_widget(Clear, popup);

    let lines: Vec<Line> = HELP
        .iter()
        .map(|(keys, action)| Line::from(format!("{:<10} {}", keys, action)))
        .collect();

    let block = Block::default()
        .title("Keys (any key to close)")
        .borders(Borders::ALL)
        .border_style(Styles::active_border());
    f.render_widget(Paragraph::new(lines).block(block), popup);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryCache;
    use crate::errors::FetchError;
    use crate::models::ColumnSpec;
    use crate::transport::Transport;
    use crate::tui::components::data_table::view_footer;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::path::Path;
    use tempfile::TempDir;

    struct FixedTransport {
        total: usize,
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn get_json(
            &self,
            _url: &str,
            params: &[(String, String)],
        ) -> Result<Value, FetchError> {
            let options: Value = params
                .iter()
                .find(|(k, _)| k == "options")
                .map(|(_, v)| serde_json::from_str(v).unwrap())
                .unwrap_or(Value::Null);
            let page = options["page"].as_u64().unwrap_or(1) as usize;
            let limit = options["limit"].as_u64().unwrap_or(10) as usize;
            let docs: Vec<Value> = ((page - 1) * limit..(page * limit).min(self.total))
                .map(|i| json!({"name": format!("Item {}", i + 1), "createdAt": "2024-05-01"}))
                .collect();
            Ok(json!({"data": {"docs": docs, "totalDocs": self.total}}))
        }
    }

    fn app(export_dir: &Path, create_command: Option<String>) -> App {
        let mut config = Config::default();
        config.export_dir = export_dir.to_path_buf();
        let list = ListViewConfig::new(
            "Products",
            "http://localhost:5000/api/products",
            vec![
                ColumnSpec::field("Name", "name").sortable_by("name"),
                ColumnSpec::field("Notes", "notes"),
                ColumnSpec::field("Added", "createdAt").sortable_by("createdAt"),
            ],
        )
        .with_search_fields(&["name"]);
        let fetcher = Fetcher::new(
            Arc::new(FixedTransport { total: 23 }),
            Arc::new(QueryCache::new(Duration::from_secs(30))),
        );
        App::new(
            config,
            list,
            fetcher,
            Arc::new(AtomicBool::new(false)),
            create_command,
        )
        .unwrap()
    }

    fn press(app: &mut App, code: KeyCode) -> Option<FetchRequest> {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE), Instant::now())
    }

    async fn settle(app: &mut App, request: FetchRequest) {
        let mut next = Some(request);
        while let Some(request) = next {
            let outcome = app.view.fetcher().fetch(request).await;
            next = app.on_outcome(outcome);
        }
    }

    #[tokio::test]
    async fn test_paging_keys_issue_requests() {
        let dir = TempDir::new().unwrap();
        let mut app = app(dir.path(), None);
        let first = app.view.load();
        settle(&mut app, first).await;
        assert_eq!(app.view.docs().len(), 10);
        assert_eq!(app.table.cursor(), Some(0));

        let request = press(&mut app, KeyCode::End).unwrap();
        assert_eq!(request.query.options.page, 3);
        assert!(view_footer(&app.view).starts_with("1-10 of 23 | Page 1 of 3"));
        settle(&mut app, request).await;
        assert_eq!(app.view.docs().len(), 3);
        assert!(view_footer(&app.view).starts_with("21-23 of 23 | Page 3 of 3"));

        assert!(press(&mut app, KeyCode::Right).is_none());
        let request = press(&mut app, KeyCode::Left).unwrap();
        assert_eq!(request.query.options.page, 2);
    }

    #[tokio::test]
    async fn test_sort_keys() {
        let dir = TempDir::new().unwrap();
        let mut app = app(dir.path(), None);

        let request = press(&mut app, KeyCode::Char('1')).unwrap();
        assert_eq!(
            request.query.options.sort,
            Some(("name".to_string(), "asc".to_string()))
        );

        assert!(press(&mut app, KeyCode::Char('2')).is_none());
        assert!(app.status.current().is_some());

        assert!(press(&mut app, KeyCode::Char('9')).is_none());
    }

    #[tokio::test]
    async fn test_search_mode_feeds_debounced_search() {
        let dir = TempDir::new().unwrap();
        let mut app = app(dir.path(), None);

        press(&mut app, KeyCode::Char('/'));
        assert_eq!(app.mode, Mode::Search);
        let start = Instant::now();
        for c in "item".chars() {
            assert!(app
                .handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE), start)
                .is_none());
        }
        assert_eq!(app.view.search_draft(), "item");
        assert!(app.view.poll_search(start).is_none());

        let request = app
            .view
            .poll_search(start + Duration::from_millis(600))
            .unwrap();
        assert_eq!(request.query.search.unwrap().keyword, "item");

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Browse);
    }

    #[tokio::test]
    async fn test_date_filter_form() {
        let dir = TempDir::new().unwrap();
        let mut app = app(dir.path(), None);

        press(&mut app, KeyCode::Char('f'));
        assert_eq!(app.mode, Mode::DateFilter);
        for c in "2024-02-01".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Tab);
        for c in "2024-01-01".chars() {
            press(&mut app, KeyCode::Char(c));
        }

        // start after end stays in the form with an error
        assert!(press(&mut app, KeyCode::Enter).is_none());
        assert_eq!(app.mode, Mode::DateFilter);
        assert!(app.status.current().is_some());

        for _ in 0..2 {
            press(&mut app, KeyCode::Backspace);
        }
        for c in "28".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        press(&mut app, KeyCode::Tab);
        for _ in 0..5 {
            press(&mut app, KeyCode::Backspace);
        }
        for c in "01-01".chars() {
            press(&mut app, KeyCode::Char(c));
        }
        let request = press(&mut app, KeyCode::Enter).unwrap();
        assert_eq!(app.mode, Mode::Browse);
        assert!(!request.query.filters.is_empty());

        assert!(press(&mut app, KeyCode::Char('x')).is_some());
    }

    #[tokio::test]
    async fn test_export_keys_write_files() {
        let dir = TempDir::new().unwrap();
        let mut app = app(dir.path(), None);

        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.status.current().unwrap().message, "Nothing to export");

        let first = app.view.load();
        settle(&mut app, first).await;
        press(&mut app, KeyCode::Char('e'));
        press(&mut app, KeyCode::Char('p'));

        let mut extensions: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .extension()
                    .unwrap()
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        extensions.sort();
        assert_eq!(extensions, vec!["csv", "pdf"]);
    }

    #[tokio::test]
    async fn test_create_key_needs_command() {
        let dir = TempDir::new().unwrap();
        let mut app_without = app(dir.path(), None);
        press(&mut app_without, KeyCode::Char('n'));
        assert!(!app_without.create_requested.load(Ordering::SeqCst));
        assert!(app_without.status.current().is_some());

        let mut app_with = app(dir.path(), Some("true".to_string()));
        assert!(app_with.view.can_create());
        press(&mut app_with, KeyCode::Char('n'));
        assert!(app_with.create_requested.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_selection_and_quit() {
        let dir = TempDir::new().unwrap();
        let mut app = app(dir.path(), None);
        let first = app.view.load();
        settle(&mut app, first).await;

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char(' '));
        assert!(app.view.is_selected(1));

        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.mode, Mode::Help);
        press(&mut app, KeyCode::Char('q'));
        assert_eq!(app.mode, Mode::Browse);
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }
}
