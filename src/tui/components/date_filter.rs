//! From/to form for the date range filter

use chrono::NaiveDate;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::input_field::InputField;
use crate::models::DateRange;
use crate::tui::ui::{centered_rect, Styles};

pub struct DateFilterForm {
    pub from: InputField,
    pub to: InputField,
    focus_to: bool,
}

impl Default for DateFilterForm {
    fn default() -> Self {
        Self::new()
    }
}

impl DateFilterForm {
    pub fn new() -> Self {
        let mut form = Self {
            from: InputField::new("From").with_placeholder("YYYY-MM-DD"),
            to: InputField::new("To").with_placeholder("YYYY-MM-DD"),
            focus_to: false,
        };
        form.update_focus();
        form
    }

    /// Prefill with the range currently applied
    pub fn open(&mut self, current: &DateRange) {
        let show = |d: Option<NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
        };
        self.from.set_value(&show(current.start));
        self.to.set_value(&show(current.end));
        self.focus_to = false;
        self.update_focus();
    }

    fn update_focus(&mut self) {
        self.from.set_focus(!self.focus_to);
        self.to.set_focus(self.focus_to);
    }

    pub fn toggle_focus(&mut self) {
        self.focus_to = !self.focus_to;
        self.update_focus();
    }

    pub fn current_mut(&mut self) -> &mut InputField {
        if self.focus_to {
            &mut self.to
        } else {
            &mut self.from
        }
    }

    /// Both fields as a range, or `None` when either one is malformed. The
    /// malformed field carries the message.
    pub fn submit(&mut self) -> Option<DateRange> {
        let start = check(&mut self.from)?;
        let end = check(&mut self.to)?;
        Some(DateRange::new(start, end))
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let popup = centered_rect(50, 40, area);
        f.render_widget(Clear, popup);

        let block = Block::default()
            .title("Date range")
            .borders(Borders::ALL)
            .border_style(Styles::active_border());
        let inner = block.inner(popup);
        f.render_widget(block, popup);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(1),
            ])
            .split(inner);

        self.from.render(f, chunks[0]);
        self.to.render(f, chunks[1]);
        f.render_widget(
            Paragraph::new("Tab: switch field  Enter: apply  Esc: cancel")
                .style(Styles::inactive()),
            chunks[2],
        );
    }
}

/// `Some(bound)` for a blank or valid field, `None` after flagging a bad one.
fn check(field: &mut InputField) -> Option<Option<NaiveDate>> {
    match field.parse_date() {
        None => Some(None),
        Some(Ok(date)) => Some(Some(date)),
        Some(Err(message)) => {
            field.validation_error = Some(message);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_into(field: &mut InputField, text: &str) {
        for c in text.chars() {
            field.insert_char(c);
        }
    }

    #[test]
    fn test_submit_both_bounds() {
        let mut form = DateFilterForm::new();
        type_into(form.current_mut(), "2024-01-01");
        form.toggle_focus();
        type_into(form.current_mut(), "2024-01-31");

        let range = form.submit().unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 1, 31));
    }

    #[test]
    fn test_blank_fields_give_open_range() {
        let mut form = DateFilterForm::new();
        form.toggle_focus();
        type_into(form.current_mut(), "2024-06-30");

        let range = form.submit().unwrap();
        assert_eq!(range.start, None);
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 6, 30));
    }

    #[test]
    fn test_malformed_field_blocks_submit() {
        let mut form = DateFilterForm::new();
        type_into(form.current_mut(), "yesterday");
        assert!(form.submit().is_none());
        assert_eq!(
            form.from.validation_error.as_deref(),
            Some("Invalid date format (YYYY-MM-DD)")
        );
        assert!(form.to.validation_error.is_none());
    }

    #[test]
    fn test_open_prefills_current_range() {
        let mut form = DateFilterForm::new();
        form.open(&DateRange::new(NaiveDate::from_ymd_opt(2023, 12, 1), None));
        assert_eq!(form.from.value, "2023-12-01");
        assert_eq!(form.to.value, "");
        assert!(form.from.is_focused);
    }
}
