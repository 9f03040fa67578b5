//! Grid renderer for a list view controller

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::controller::{ListViewController, ROWS_PER_PAGE_OPTIONS};
use crate::models::{ColumnSpec, QueryState, SortDirection, SortSpec};
use crate::tui::ui::{fit_width, Styles};

const MAX_COLUMN_WIDTH: usize = 30;
const MIN_COLUMN_WIDTH: usize = 4;
const SEPARATOR: &str = " │ ";
const MARK_WIDTH: usize = 2;

/// Cursor over the rows of the loaded page
#[derive(Debug, Default)]
pub struct DataTable {
    pub state: ListState,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.state.selected()
    }

    /// Keep the cursor on an existing row after the page changed
    pub fn clamp(&mut self, rows: usize) {
        let selected = match (rows, self.state.selected()) {
            (0, _) => None,
            (_, None) => Some(0),
            (n, Some(i)) => Some(i.min(n - 1)),
        };
        self.state.select(selected);
    }

    pub fn up(&mut self, rows: usize) {
        if rows == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => rows - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn down(&mut self, rows: usize) {
        if rows == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => (i + 1) % rows,
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn render(&mut self, f: &mut Frame, area: Rect, view: &ListViewController) {
        let block = Block::default()
            .title(table_title(view))
            .borders(Borders::ALL)
            .border_style(Styles::active_border());
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(inner);

        let state = view.query_state();
        let headers: Vec<String> = view
            .columns()
            .iter()
            .enumerate()
            .map(|(i, column)| header_label(i, column, state.sort.as_ref()))
            .collect();
        let cells: Vec<Vec<String>> = view
            .docs()
            .iter()
            .map(|row| view.columns().iter().map(|c| c.render(row)).collect())
            .collect();
        let widths = column_widths(&headers, &cells, inner.width as usize);

        f.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!("{}{}", " ".repeat(MARK_WIDTH), join_cells(&headers, &widths)),
                Styles::title(),
            ))),
            chunks[0],
        );

        if cells.is_empty() {
            let (text, style) = if view.is_loading() {
                ("Loading…", Styles::warning())
            } else if view.last_error().is_some() {
                ("Could not load records", Styles::error())
            } else {
                ("No records found", Styles::inactive())
            };
            f.render_widget(Paragraph::new(text).style(style), chunks[1]);
        } else {
            let row_style = if view.is_loading() {
                Styles::stale()
            } else {
                Style::default()
            };
            let items: Vec<ListItem> = cells
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    let (mark, mark_style) = if view.is_selected(i) {
                        ("● ", Styles::marked())
                    } else {
                        ("  ", row_style)
                    };
                    ListItem::new(Line::from(vec![
                        Span::styled(mark, mark_style),
                        Span::styled(join_cells(row, &widths), row_style),
                    ]))
                })
                .collect();
            let list = List::new(items).highlight_style(Styles::selected());
            f.render_stateful_widget(list, chunks[1], &mut self.state);
        }

        let footer_style = if view.is_loading() {
            Styles::stale()
        } else {
            Styles::info()
        };
        f.render_widget(
            Paragraph::new(view_footer(view)).style(footer_style),
            chunks[2],
        );
    }
}

fn table_title(view: &ListViewController) -> String {
    let mut title = format!(" {} ", view.title());
    let range = &view.query_state().date_range;
    if !range.is_empty() {
        let show = |d: Option<chrono::NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "…".to_string())
        };
        title.push_str(&format!("[{} → {}] ", show(range.start), show(range.end)));
    }
    if view.is_loading() {
        title.push_str("⟳ Loading… ");
    }
    if let Some(error) = view.last_error() {
        title.push_str(&format!("✗ {} ", error));
    }
    if view.can_create() {
        title.push_str("[n] New ");
    }
    title
}

/// Footer for the rows on screen, not the page being requested.
pub fn view_footer(view: &ListViewController) -> String {
    footer_text(view.shown_query_state(), view.total_docs(), view.total_pages())
}

/// Header text: the sort key for sortable columns, then the name and a
/// direction arrow on the active sort column.
pub fn header_label<R>(index: usize, column: &ColumnSpec<R>, sort: Option<&SortSpec>) -> String {
    let key = match (column.is_sortable(), index) {
        (true, i) if i < 9 => format!("{} ", i + 1),
        _ => String::new(),
    };
    let marker = match (sort, column.sort_field.as_deref()) {
        (Some(sort), Some(field)) if sort.field == field => match sort.direction {
            SortDirection::Asc => " ▲",
            SortDirection::Desc => " ▼",
        },
        _ => "",
    };
    format!("{}{}{}", key, column.name, marker)
}

/// "11-20 of 37 | Page 2 of 4 | Rows per page: 10 (5/10/15/20/25/30)"
pub fn footer_text(state: &QueryState, total_docs: usize, total_pages: usize) -> String {
    let range = if total_docs == 0 {
        "0 of 0".to_string()
    } else {
        let first = (state.offset() + 1).min(total_docs);
        let last = (state.offset() + state.rows_per_page).min(total_docs);
        format!("{}-{} of {}", first, last, total_docs)
    };
    let options: Vec<String> = ROWS_PER_PAGE_OPTIONS.iter().map(|n| n.to_string()).collect();
    format!(
        "{} | Page {} of {} | Rows per page: {} ({})",
        range,
        state.page,
        total_pages.max(1),
        state.rows_per_page,
        options.join("/")
    )
}

/// Natural width of every column, capped, then shrunk from the widest until
/// the row fits in `available` cells.
pub fn column_widths(headers: &[String], rows: &[Vec<String>], available: usize) -> Vec<usize> {
    let mut widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.width())
                .chain(std::iter::once(header.width()))
                .max()
                .unwrap_or(0)
                .clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect();

    let overhead = MARK_WIDTH + SEPARATOR.width() * widths.len().saturating_sub(1);
    let budget = available.saturating_sub(overhead);
    while widths.iter().sum::<usize>() > budget {
        let Some((widest, &width)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else {
            break;
        };
        if width <= MIN_COLUMN_WIDTH {
            break;
        }
        widths[widest] -= 1;
    }
    widths
}

fn join_cells(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| fit_width(cell, width))
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Row;

    fn columns() -> Vec<ColumnSpec<Row>> {
        vec![
            ColumnSpec::field("Name", "name").sortable_by("name"),
            ColumnSpec::field("Notes", "notes"),
            ColumnSpec::field("Date", "createdAt").sortable_by("createdAt"),
        ]
    }

    #[test]
    fn test_header_marks_active_sort() {
        let columns = columns();
        let sort = SortSpec::new("createdAt", SortDirection::Desc);
        assert_eq!(header_label(0, &columns[0], Some(&sort)), "1 Name");
        assert_eq!(header_label(1, &columns[1], Some(&sort)), "Notes");
        assert_eq!(header_label(2, &columns[2], Some(&sort)), "3 Date ▼");

        let sort = SortSpec::new("name", SortDirection::Asc);
        assert_eq!(header_label(0, &columns[0], Some(&sort)), "1 Name ▲");
        assert_eq!(header_label(2, &columns[2], None), "3 Date");
    }

    struct Sku {
        code: String,
    }

    #[test]
    fn test_header_for_typed_rows() {
        let column = ColumnSpec::new("Code", |sku: &Sku| serde_json::Value::String(sku.code.clone()))
            .sortable_by("code");
        let sort = SortSpec::new("code", SortDirection::Asc);
        assert_eq!(header_label(0, &column, Some(&sort)), "1 Code ▲");
        assert_eq!(column.render(&Sku { code: "A-7".to_string() }), "A-7");
    }

    #[test]
    fn test_footer_text() {
        let mut state = QueryState::new(10, None);
        state.page = 2;
        assert_eq!(
            footer_text(&state, 37, 4),
            "11-20 of 37 | Page 2 of 4 | Rows per page: 10 (5/10/15/20/25/30)"
        );

        state.page = 4;
        assert!(footer_text(&state, 37, 4).starts_with("31-37 of 37 | Page 4 of 4"));

        state.page = 1;
        assert!(footer_text(&state, 0, 0).starts_with("0 of 0 | Page 1 of 1"));
    }

    #[test]
    fn test_column_widths_fit_available_space() {
        let headers = vec!["Name".to_string(), "Description".to_string()];
        let rows = vec![vec![
            "Widget".to_string(),
            "A very long description that would never fit".to_string(),
        ]];

        let widths = column_widths(&headers, &rows, 200);
        assert_eq!(widths, vec![6, MAX_COLUMN_WIDTH]);

        let widths = column_widths(&headers, &rows, 25);
        let used: usize = widths.iter().sum::<usize>() + MARK_WIDTH + SEPARATOR.width();
        assert!(used <= 25);
        assert!(widths.iter().all(|w| *w >= MIN_COLUMN_WIDTH));
    }

    #[test]
    fn test_cursor_wraps_and_clamps() {
        let mut table = DataTable::new();
        table.clamp(3);
        assert_eq!(table.cursor(), Some(0));
        table.up(3);
        assert_eq!(table.cursor(), Some(2));
        table.down(3);
        assert_eq!(table.cursor(), Some(0));

        table.state.select(Some(2));
        table.clamp(2);
        assert_eq!(table.cursor(), Some(1));
        table.clamp(0);
        assert_eq!(table.cursor(), None);
    }
}
