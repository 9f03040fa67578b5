//! Interactive terminal table for one back-office collection

pub mod app;
pub mod components;
pub mod ui;

pub use app::{App, Mode, TuiExit};

use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use tracing::{error, info};

/// Take over the terminal, run `app` until it exits, then restore the terminal.
pub async fn run(app: &mut App) -> Result<TuiExit> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app.run(&mut terminal).await;

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    match &result {
        Ok(exit) => info!("Terminal table closed: {:?}", exit),
        Err(e) => error!("Terminal table failed: {}", e),
    }
    result
}
