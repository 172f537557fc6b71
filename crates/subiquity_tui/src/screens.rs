//! The client-side screen orchestrator (spec.md §4.6): a linear list of
//! controllers with a cursor, translating the server's distinguished
//! responses into forward/back navigation rather than into widget state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use subiquity_core::api::{ClientEffect, Transport, Verb, apply_response_hook};
use subiquity_core::types::ErrorReportRef;
use tokio::time::{Instant, sleep, timeout};

pub const MAX_BLOCK_TIME: Duration = Duration::from_millis(100);
pub const MIN_SHOW_PROGRESS_TIME: Duration = Duration::from_secs(1);

/// One controller in the orchestrator's list. Mirrors the endpoint-tree
/// trait a server binder implements directly (spec.md §4.2), except a
/// screen controller implements it against a `Transport` and a response
/// hook instead of owning model state.
#[async_trait::async_trait]
pub trait ScreenController: Send + Sync {
    fn name(&self) -> &str;
    async fn select_screen(&self) -> Result<(), ClientEffect>;
}

/// A screen controller bound to a single `GET` endpoint: dials it, then
/// runs the response through `apply_response_hook` to decide whether the
/// screen was entered, should be skipped, or requires confirmation.
pub struct EndpointScreenController {
    name: &'static str,
    path: &'static str,
    transport: Arc<dyn Transport>,
}

impl EndpointScreenController {
    pub fn new(name: &'static str, path: &'static str, transport: Arc<dyn Transport>) -> Self {
        Self { name, path, transport }
    }
}

#[async_trait::async_trait]
impl ScreenController for EndpointScreenController {
    fn name(&self) -> &str {
        self.name
    }

    async fn select_screen(&self) -> Result<(), ClientEffect> {
        let envelope = self
            .transport
            .call(Verb::Get, self.path, &[], None)
            .await
            .map_err(|e| {
                warn!("{} failed to reach the server: {e}", self.name);
                ClientEffect::Abort(ErrorReportRef {
                    base: "transport_error".to_string(),
                })
            })?;
        let envelope: subiquity_core::types::ResponseEnvelope =
            serde_json::from_value(envelope).map_err(|_| {
                ClientEffect::Abort(ErrorReportRef {
                    base: "malformed_response".to_string(),
                })
            })?;
        apply_response_hook(envelope).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Back,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// A screen was entered; the cursor sits on it.
    Entered(String),
    /// The server asked for confirmation; navigation stops here until the
    /// user confirms (spec.md §4.6 "show the InstallConfirmation overlay").
    Confirm,
    /// The list was exhausted in this direction.
    Exhausted,
}

pub struct ScreenOrchestrator {
    controllers: Vec<Box<dyn ScreenController>>,
    index: Option<usize>,
    state_dir: PathBuf,
}

impl ScreenOrchestrator {
    pub fn new(controllers: Vec<Box<dyn ScreenController>>, state_dir: PathBuf) -> Self {
        Self { controllers, index: None, state_dir }
    }

    pub fn current_name(&self) -> Option<&str> {
        self.index.and_then(|i| self.controllers.get(i)).map(|c| c.name())
    }

    /// spec.md §4.6 `next_screen(awaitable?)`/`prev_screen(awaitable?)`:
    /// walks the cursor by ±1, calling `select_screen` on each controller
    /// until one succeeds, raises Skip (keep walking) or the list is
    /// exhausted.
    pub async fn navigate(&mut self, direction: Direction) -> Result<NavOutcome, ErrorReportRef> {
        loop {
            let next_index = match (direction, self.index) {
                (Direction::Forward, None) => 0,
                (Direction::Forward, Some(i)) => i + 1,
                (Direction::Back, None) => return Ok(NavOutcome::Exhausted),
                (Direction::Back, Some(0)) => return Ok(NavOutcome::Exhausted),
                (Direction::Back, Some(i)) => i - 1,
            };
            if next_index >= self.controllers.len() {
                return Ok(NavOutcome::Exhausted);
            }

            match self.controllers[next_index].select_screen().await {
                Ok(()) => {
                    self.index = Some(next_index);
                    self.persist_last_screen();
                    return Ok(NavOutcome::Entered(self.controllers[next_index].name().to_string()));
                }
                Err(ClientEffect::Skip) => {
                    self.index = Some(next_index);
                    continue;
                }
                Err(ClientEffect::Confirm) => {
                    self.index = Some(next_index);
                    return Ok(NavOutcome::Confirm);
                }
                Err(ClientEffect::Abort(r)) => return Err(r),
            }
        }
    }

    fn persist_last_screen(&self) {
        let Some(name) = self.current_name() else { return };
        let path = self.state_dir.join("last-screen");
        if let Err(e) = std::fs::write(&path, name) {
            warn!("failed to persist last-screen: {e}");
        }
    }
}

/// Runs `fut`, switching to a progress indicator if it hasn't resolved
/// within `MAX_BLOCK_TIME`, and holding the progress view up for at least
/// `MIN_SHOW_PROGRESS_TIME` once shown so it never flashes (spec.md §4.6
/// step 1).
pub async fn block_with_progress_policy<F, T>(fut: F, mut on_show_progress: impl FnMut()) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::pin!(fut);
    match timeout(MAX_BLOCK_TIME, &mut fut).await {
        Ok(result) => result,
        Err(_) => {
            on_show_progress();
            let shown_at = Instant::now();
            let result = fut.await;
            let elapsed = shown_at.elapsed();
            if elapsed < MIN_SHOW_PROGRESS_TIME {
                sleep(MIN_SHOW_PROGRESS_TIME - elapsed).await;
            }
            result
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedController {
        name: &'static str,
        outcome: std::sync::Mutex<Option<Result<(), ClientEffect>>>,
    }

    #[async_trait::async_trait]
    impl ScreenController for FixedController {
        fn name(&self) -> &str {
            self.name
        }

        async fn select_screen(&self) -> Result<(), ClientEffect> {
            self.outcome.lock().unwrap().take().expect("called more than once")
        }
    }

    fn fixed(name: &'static str, outcome: Result<(), ClientEffect>) -> Box<dyn ScreenController> {
        Box::new(FixedController { name, outcome: std::sync::Mutex::new(Some(outcome)) })
    }

    #[tokio::test]
    async fn forward_navigation_enters_first_screen() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = ScreenOrchestrator::new(
            vec![fixed("keyboard", Ok(())), fixed("network", Ok(()))],
            dir.path().to_path_buf(),
        );
        let outcome = orch.navigate(Direction::Forward).await.unwrap();
        assert_eq!(outcome, NavOutcome::Entered("keyboard".to_string()));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("last-screen")).unwrap(),
            "keyboard"
        );
    }

    #[tokio::test]
    async fn skip_advances_past_a_noninteractive_screen() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = ScreenOrchestrator::new(
            vec![fixed("keyboard", Err(ClientEffect::Skip)), fixed("network", Ok(()))],
            dir.path().to_path_buf(),
        );
        let outcome = orch.navigate(Direction::Forward).await.unwrap();
        assert_eq!(outcome, NavOutcome::Entered("network".to_string()));
    }

    #[tokio::test]
    async fn confirm_stops_navigation_without_persisting() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = ScreenOrchestrator::new(
            vec![fixed("install_confirm", Err(ClientEffect::Confirm))],
            dir.path().to_path_buf(),
        );
        let outcome = orch.navigate(Direction::Forward).await.unwrap();
        assert_eq!(outcome, NavOutcome::Confirm);
    }

    #[tokio::test]
    async fn exhausting_the_list_reports_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = ScreenOrchestrator::new(vec![fixed("only", Ok(()))], dir.path().to_path_buf());
        orch.navigate(Direction::Forward).await.unwrap();
        let outcome = orch.navigate(Direction::Forward).await.unwrap();
        assert_eq!(outcome, NavOutcome::Exhausted);
    }

    #[tokio::test]
    async fn back_past_the_first_screen_is_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mut orch = ScreenOrchestrator::new(vec![fixed("only", Ok(()))], dir.path().to_path_buf());
        let outcome = orch.navigate(Direction::Back).await.unwrap();
        assert_eq!(outcome, NavOutcome::Exhausted);
    }

    #[tokio::test]
    async fn progress_policy_skips_the_indicator_for_fast_futures() {
        let mut shown = false;
        let result = block_with_progress_policy(async { 42 }, || shown = true).await;
        assert_eq!(result, 42);
        assert!(!shown);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_policy_shows_the_indicator_for_slow_futures() {
        let mut shown = false;
        let result = block_with_progress_policy(
            async {
                sleep(Duration::from_millis(500)).await;
                7
            },
            || shown = true,
        )
        .await;
        assert_eq!(result, 7);
        assert!(shown);
    }
}
