//! Terminal user interface for the dashboard.

pub mod app;
pub mod events;
pub mod ui;

pub use app::{App, AppTab};
pub use events::{Event, EventHandler};

use std::io;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::error;

use hadash_core::{DashConfig, DashError, DashResult};

/// Run the dashboard until the user quits.
///
/// The terminal is restored on every exit path, including errors from the
/// event loop, so a crash never leaves the shell in raw mode.
pub async fn run(config: DashConfig) -> DashResult<()> {
    let (mut app, mut handler) = App::connect(config).await?;

    enable_raw_mode().map_err(terminal_error)?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(terminal_error)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(terminal_error)?;

    let result = event_loop(&mut terminal, &mut app, &mut handler).await;

    app.shutdown().await;
    if let Err(e) = restore_terminal(&mut terminal) {
        error!("failed to restore terminal: {e}");
    }
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    handler: &mut EventHandler,
) -> DashResult<()> {
    while !app.should_quit {
        terminal
            .draw(|f| ui::render(f, app))
            .map_err(terminal_error)?;
        let event = handler.next().await?;
        app.handle_event(event).await?;
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

fn terminal_error(e: io::Error) -> DashError {
    DashError::Internal {
        message: format!("terminal error: {e}"),
    }
}
