//! Single line text input used by the search box and the date filter form

use chrono::NaiveDate;
use ratatui::{
    layout::Rect,
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::tui::ui::Styles;

#[derive(Debug, Clone, Default)]
pub struct InputField {
    pub label: String,
    pub value: String,
    pub placeholder: String,
    pub is_focused: bool,
    /// Cursor position in characters, not bytes
    pub cursor_position: usize,
    pub validation_error: Option<String>,
}

impl InputField {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Default::default()
        }
    }

    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = placeholder.to_string();
        self
    }

    pub fn set_value(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor_position = self.value.chars().count();
        self.validation_error = None;
    }

    pub fn set_focus(&mut self, focused: bool) {
        self.is_focused = focused;
    }

    fn byte_index(&self) -> usize {
        self.value
            .char_indices()
            .nth(self.cursor_position)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_index();
        self.value.insert(at, c);
        self.cursor_position += 1;
        self.validation_error = None;
    }

    pub fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let at = self.byte_index();
            self.value.remove(at);
            self.validation_error = None;
        }
    }

    pub fn delete_char_forward(&mut self) {
        if self.cursor_position < self.value.chars().count() {
            let at = self.byte_index();
            self.value.remove(at);
            self.validation_error = None;
        }
    }

    pub fn move_cursor_left(&mut self) {
        self.cursor_position = self.cursor_position.saturating_sub(1);
    }

    pub fn move_cursor_right(&mut self) {
        if self.cursor_position < self.value.chars().count() {
            self.cursor_position += 1;
        }
    }

    pub fn move_cursor_to_start(&mut self) {
        self.cursor_position = 0;
    }

    pub fn move_cursor_to_end(&mut self) {
        self.cursor_position = self.value.chars().count();
    }

    /// Parse the value as `YYYY-MM-DD`; blank means "no bound".
    pub fn parse_date(&self) -> Option<Result<NaiveDate, String>> {
        let text = self.value.trim();
        if text.is_empty() {
            return None;
        }
        Some(
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map_err(|_| "Invalid date format (YYYY-MM-DD)".to_string()),
        )
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let showing_placeholder = self.value.is_empty() && !self.placeholder.is_empty();
        let display_text = if showing_placeholder {
            &self.placeholder
        } else {
            &self.value
        };

        let border_style = if self.validation_error.is_some() {
            Styles::error()
        } else if self.is_focused {
            Styles::active_border()
        } else {
            Styles::inactive_border()
        };

        let title = match &self.validation_error {
            Some(error) => format!("{} - {}", self.label, error),
            None => self.label.clone(),
        };

        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(border_style);

        let text_style = if showing_placeholder {
            Styles::inactive()
        } else {
            Styles::default()
        };

        f.render_widget(
            Paragraph::new(display_text.to_string())
                .style(text_style)
                .block(block),
            area,
        );

        if self.is_focused {
            let before: String = self.value.chars().take(self.cursor_position).collect();
            let cursor_x = area.x + 1 + before.width() as u16;
            let cursor_y = area.y + 1;
            if cursor_x < area.x + area.width.saturating_sub(1) {
                f.set_cursor(cursor_x, cursor_y);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_in_the_middle() {
        let mut field = InputField::new("Search");
        field.set_value("acm");
        field.move_cursor_left();
        field.insert_char('x');
        assert_eq!(field.value, "acxm");
        field.delete_char();
        field.delete_char_forward();
        assert_eq!(field.value, "ac");
        field.move_cursor_to_start();
        field.delete_char();
        assert_eq!(field.value, "ac");
    }

    #[test]
    fn test_multibyte_input() {
        let mut field = InputField::new("Search");
        field.insert_char('é');
        field.insert_char('t');
        field.move_cursor_left();
        field.delete_char();
        assert_eq!(field.value, "t");
        assert_eq!(field.cursor_position, 0);
    }

    #[test]
    fn test_parse_date() {
        let mut field = InputField::new("From");
        assert_eq!(field.parse_date(), None);
        field.set_value("   ");
        assert_eq!(field.parse_date(), None);

        field.set_value("2024-02-29");
        assert_eq!(
            field.parse_date(),
            Some(Ok(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );

        field.set_value("29/02/2024");
        assert_eq!(
            field.parse_date(),
            Some(Err("Invalid date format (YYYY-MM-DD)".to_string()))
        );
        assert!(field.validation_error.is_none());

        field.validation_error = Some("stale".to_string());
        field.insert_char(' ');
        assert!(field.validation_error.is_none());
    }
}
