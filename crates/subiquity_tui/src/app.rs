//! The render surface for the screen orchestrator in `screens.rs`. Navigation
//! runs on a spawned future and reports back into the component through
//! `State` handles shared via `Arc<Mutex<_>>`.

use std::sync::{Arc, Mutex};

use iocraft::prelude::*;
use log::error;
use subiquity_core::api::Transport;
use subiquity_core::api::{Verb, paths};
use subiquity_core::types::ErrorReportRef;
use tokio::sync::mpsc;

use crate::screens::{Direction, NavOutcome, ScreenOrchestrator, block_with_progress_policy};

pub enum NavCommand {
    Forward,
    Back,
    AcceptConfirm,
}

type ScreenNameState = Arc<Mutex<State<Option<String>>>>;
type ShowProgressState = Arc<Mutex<State<bool>>>;
type ConfirmPendingState = Arc<Mutex<State<bool>>>;
type ErrorState = Arc<Mutex<State<Option<String>>>>;

pub struct AppContext {
    pub orchestrator: ScreenOrchestrator,
    pub transport: Arc<dyn Transport>,
    pub commands: Option<mpsc::Receiver<NavCommand>>,
}

/// Runs the orchestrator on its own future, translating every
/// `navigate()`/confirm outcome into the hook state the component reads.
async fn drive(
    mut ctx: AppContext,
    screen_name: ScreenNameState,
    show_progress: ShowProgressState,
    confirm_pending: ConfirmPendingState,
    error: ErrorState,
) {
    let handle_outcome = |outcome: Result<NavOutcome, ErrorReportRef>,
                          screen_name: &ScreenNameState,
                          confirm_pending: &ConfirmPendingState,
                          error: &ErrorState| match outcome {
        Ok(NavOutcome::Entered(name)) => {
            screen_name.lock().unwrap().set(Some(name));
            confirm_pending.lock().unwrap().set(false);
        }
        Ok(NavOutcome::Confirm) => {
            confirm_pending.lock().unwrap().set(true);
        }
        Ok(NavOutcome::Exhausted) => {}
        Err(r) => {
            error!("install aborted: {}", r.base);
            error.lock().unwrap().set(Some(r.base));
        }
    };

    // Entering the first screen happens the moment the TUI starts, same as
    // a real subiquity client walking its controller list from a blank
    // cursor (spec.md §4.6).
    {
        let fut = ctx.orchestrator.navigate(Direction::Forward);
        let show_progress = show_progress.clone();
        let outcome = block_with_progress_policy(fut, || show_progress.lock().unwrap().set(true)).await;
        show_progress.lock().unwrap().set(false);
        handle_outcome(outcome, &screen_name, &confirm_pending, &error);
    }

    let mut commands = ctx.commands.take().expect("drive() requires a commands receiver");
    while let Some(command) = commands.recv().await {
        match command {
            NavCommand::Forward => {
                let fut = ctx.orchestrator.navigate(Direction::Forward);
                let show_progress = show_progress.clone();
                let outcome = block_with_progress_policy(fut, || show_progress.lock().unwrap().set(true)).await;
                show_progress.lock().unwrap().set(false);
                handle_outcome(outcome, &screen_name, &confirm_pending, &error);
            }
            NavCommand::Back => {
                let fut = ctx.orchestrator.navigate(Direction::Back);
                let show_progress = show_progress.clone();
                let outcome = block_with_progress_policy(fut, || show_progress.lock().unwrap().set(true)).await;
                show_progress.lock().unwrap().set(false);
                handle_outcome(outcome, &screen_name, &confirm_pending, &error);
            }
            NavCommand::AcceptConfirm => {
                if let Err(e) = ctx.transport.call(Verb::Post, paths::META_CONFIRM.path, &[], None).await {
                    error!("failed to confirm: {e}");
                    continue;
                }
                let fut = ctx.orchestrator.navigate(Direction::Forward);
                let show_progress = show_progress.clone();
                let outcome = block_with_progress_policy(fut, || show_progress.lock().unwrap().set(true)).await;
                show_progress.lock().unwrap().set(false);
                handle_outcome(outcome, &screen_name, &confirm_pending, &error);
            }
        }
    }
}

#[derive(Default, Props)]
pub struct AppProps {
    pub context: Option<AppContext>,
}

#[component]
pub fn App(props: &mut AppProps, mut hooks: Hooks) -> impl Into<AnyElement<'static>> {
    let mut system = hooks.use_context_mut::<SystemContext>();
    let mut should_exit = hooks.use_state(|| false);

    let screen_name: ScreenNameState = Arc::new(Mutex::new(hooks.use_state(|| None)));
    let show_progress: ShowProgressState = Arc::new(Mutex::new(hooks.use_state(|| false)));
    let confirm_pending: ConfirmPendingState = Arc::new(Mutex::new(hooks.use_state(|| false)));
    let error: ErrorState = Arc::new(Mutex::new(hooks.use_state(|| None)));

    let (tx, rx) = mpsc::channel::<NavCommand>(8);
    let commands_tx = hooks.use_state(|| Some(tx));

    hooks.use_future({
        let screen_name = screen_name.clone();
        let show_progress = show_progress.clone();
        let confirm_pending = confirm_pending.clone();
        let error = error.clone();
        let context = props.context.take();
        async move {
            if let Some(mut context) = context {
                context.commands = Some(rx);
                drive(context, screen_name, show_progress, confirm_pending, error).await;
            }
        }
    });

    hooks.use_terminal_events({
        let confirm_pending = confirm_pending.clone();
        move |event| {
            if let TerminalEvent::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) = event {
                match code {
                    KeyCode::Char('q') => should_exit.set(true),
                    KeyCode::Char('n') => {
                        if let Some(tx) = commands_tx.read().as_ref() {
                            let _ = tx.try_send(NavCommand::Forward);
                        }
                    }
                    KeyCode::Char('p') => {
                        if let Some(tx) = commands_tx.read().as_ref() {
                            let _ = tx.try_send(NavCommand::Back);
                        }
                    }
                    KeyCode::Char('y') if confirm_pending.lock().unwrap().get() => {
                        if let Some(tx) = commands_tx.read().as_ref() {
                            let _ = tx.try_send(NavCommand::AcceptConfirm);
                        }
                    }
                    _ => {}
                }
            }
        }
    });

    if should_exit.get() {
        system.exit();
    }

    let (width, height) = hooks.use_terminal_size();
    let screen = screen_name.lock().unwrap().read().clone();
    let body = if let Some(message) = error.lock().unwrap().read().clone() {
        format!("install aborted: {message}")
    } else if show_progress.lock().unwrap().get() {
        "working…".to_string()
    } else if confirm_pending.lock().unwrap().get() {
        "Ready to install. Press 'y' to confirm.".to_string()
    } else {
        match screen {
            Some(name) => format!("screen: {name}  ['n' next / 'p' prev / 'q' quit]"),
            None => "connecting…".to_string(),
        }
    };

    element! {
        View(
            width,
            height,
            flex_direction: FlexDirection::Column,
            align_items: AlignItems::Center,
            justify_content: JustifyContent::Center,
        ) {
            Text(content: body)
        }
    }
}
