//! One-line status bar for export results, errors and hints

use chrono::{DateTime, Local};
use ratatui::{
    layout::Rect,
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use std::time::Duration;

use crate::tui::ui::Styles;

#[derive(Debug, Clone, PartialEq)]
pub enum StatusType {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub status_type: StatusType,
    pub timestamp: DateTime<Local>,
}

impl StatusMessage {
    pub fn new(message: String, status_type: StatusType) -> Self {
        Self {
            message,
            status_type,
            timestamp: Local::now(),
        }
    }
}

pub struct StatusDisplay {
    current: Option<StatusMessage>,
    auto_clear: Duration,
}

impl StatusDisplay {
    pub fn new(auto_clear: Duration) -> Self {
        Self {
            current: None,
            auto_clear,
        }
    }

    pub fn set_info(&mut self, message: String) {
        self.current = Some(StatusMessage::new(message, StatusType::Info));
    }

    pub fn set_success(&mut self, message: String) {
        self.current = Some(StatusMessage::new(message, StatusType::Success));
    }

    pub fn set_warning(&mut self, message: String) {
        self.current = Some(StatusMessage::new(message, StatusType::Warning));
    }

    pub fn set_error(&mut self, message: String) {
        self.current = Some(StatusMessage::new(message, StatusType::Error));
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.current.as_ref()
    }

    /// Drop the message once it has been shown long enough. Errors stay.
    pub fn expire(&mut self, now: DateTime<Local>) {
        let expired = match &self.current {
            Some(message) if message.status_type != StatusType::Error => now
                .signed_duration_since(message.timestamp)
                .to_std()
                .map(|elapsed| elapsed > self.auto_clear)
                .unwrap_or(false),
            _ => false,
        };
        if expired {
            self.current = None;
        }
    }

    pub fn render(&self, f: &mut Frame, area: Rect, hint: &str) {
        let (content, style) = match &self.current {
            Some(message) => {
                let (prefix, style) = match message.status_type {
                    StatusType::Info => ("ℹ", Styles::info()),
                    StatusType::Success => ("✓", Styles::success()),
                    StatusType::Warning => ("⚠", Styles::warning()),
                    StatusType::Error => ("✗", Styles::error()),
                };
                (format!("{} {}", prefix, message.message), style)
            }
            None => (hint.to_string(), Styles::inactive()),
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Styles::inactive_border());

        f.render_widget(Paragraph::new(content).style(style).block(block), area);
    }
}
