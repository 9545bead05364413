use anyhow::{Context, Result};
use crossterm::{
    cursor,
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io;

/// Raw mode, alternate screen and mouse capture for as long as it lives
pub struct TerminalGuard {
    _private: (),
}

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        terminal::enable_raw_mode().context("failed to enable raw mode")?;
        // Built before the screen switch so a failure below still restores raw mode
        let guard = TerminalGuard { _private: () };
        execute!(
            io::stdout(),
            EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide
        )
        .context("failed to prepare the terminal screen")?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let errors = restore(
            || {
                execute!(
                    io::stdout(),
                    cursor::Show,
                    DisableMouseCapture,
                    LeaveAlternateScreen
                )
            },
            terminal::disable_raw_mode,
        );
        for err in errors {
            log::warn!("Failed to restore the terminal: {:#}", err);
        }
    }
}

/// Runs both teardown steps; raw mode is left even if the screen restore fails
fn restore(
    leave_screen: impl FnOnce() -> io::Result<()>,
    leave_raw_mode: impl FnOnce() -> io::Result<()>,
) -> Vec<anyhow::Error> {
    let steps = [
        leave_screen().context("failed to leave the alternate screen"),
        leave_raw_mode().context("failed to disable raw mode"),
    ];
    steps.into_iter().filter_map(Result::err).collect()
}

/// Terminal size in cells as (columns, rows)
pub fn terminal_size() -> (u16, u16) {
    termsize::get()
        .map(|size| (size.cols, size.rows))
        .or_else(|| terminal::size().ok())
        .filter(|&(columns, rows)| columns > 0 && rows > 0)
        .unwrap_or((80, 24))
}

/// Blocks until a key is pressed
pub fn wait_for_keypress() -> Result<()> {
    terminal::enable_raw_mode().context("failed to enable raw mode")?;
    let result = loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break Ok(()),
            Ok(_) => continue,
            Err(err) => break Err(err).context("failed to read a key press"),
        }
    };
    terminal::disable_raw_mode().context("failed to disable raw mode")?;
    result
}
