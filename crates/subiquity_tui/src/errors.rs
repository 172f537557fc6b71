use std::panic;

use error_stack::Report;
use log::error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("unable to start the TUI")]
    UnableToStartTui,
    #[error("server call failed: {0}")]
    Transport(#[from] subiquity_core::WireError),
    #[error("server reported an error: {0}")]
    ServerError(String),
    #[error("render loop failed: {0}")]
    RenderLoop(String),
}

/// Crossterm leaves the terminal in raw/alternate-screen mode if the
/// process panics mid-render; this hook restores it before the default
/// panic message prints, mirroring the TUI's own `restore_terminal`.
pub fn init_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show
        );

        let report = Report::new(TuiError::RenderLoop(panic_info.to_string()));
        error!("panic occurred: {report:?}");
        original_hook(panic_info);
    }));
}
