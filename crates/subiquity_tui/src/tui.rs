use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use iocraft::prelude::*;
use subiquity_core::UnixSocketTransport;
use subiquity_core::api::{Transport, paths};

use crate::app::{App, AppContext};
use crate::errors::TuiError;
use crate::screens::{EndpointScreenController, ScreenController, ScreenOrchestrator};

/// The controllers offered in order (spec.md §6 "Endpoint surface" minus
/// the install-only stages, which the install-progress screen owns
/// separately once confirmed).
fn build_controllers(transport: Arc<dyn Transport>) -> Vec<Box<dyn ScreenController>> {
    let endpoints: &[(&'static str, &'static str)] = &[
        ("keyboard", paths::KEYBOARD.path),
        ("network", paths::NETWORK.path),
        ("proxy", paths::PROXY.path),
        ("mirror", paths::MIRROR.path),
        ("identity", paths::IDENTITY.path),
        ("ssh", paths::SSH.path),
    ];
    endpoints
        .iter()
        .map(|&(name, path)| {
            Box::new(EndpointScreenController::new(name, path, transport.clone())) as Box<dyn ScreenController>
        })
        .collect()
}

fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
}

pub async fn start_tui_app(socket_path: String, state_dir: PathBuf) -> Result<(), TuiError> {
    let transport: Arc<dyn Transport> = Arc::new(UnixSocketTransport::new(socket_path));
    let controllers = build_controllers(transport.clone());
    let orchestrator = ScreenOrchestrator::new(controllers, state_dir);

    let context = AppContext { orchestrator, transport, commands: None };

    crate::errors::init_panic_hook();

    enable_raw_mode().map_err(|_| TuiError::UnableToStartTui)?;
    execute!(io::stdout(), EnterAlternateScreen, Hide).map_err(|_| TuiError::UnableToStartTui)?;

    let result = tokio::task::spawn(async move {
        let _ = element! {
            App(context: Some(context))
        }
        .render_loop()
        .await;
    })
    .await;

    restore_terminal();

    if let Err(e) = result {
        return Err(TuiError::RenderLoop(e.to_string()));
    }

    Ok(())
}

