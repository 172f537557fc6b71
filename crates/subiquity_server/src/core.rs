//! Top-level server application (spec.md §4.7 "Server boot sequence").

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use fs2::FileExt;
use log::{info, warn};
use subiquity_core::types::{ApplicationStatus, AutoinstallDocument};
use subiquity_model::InstallModel;

use crate::context::ContextManager;
use crate::error::ServerError;
use crate::errorreport::ErrorReporter;
use crate::eventbus::{EventBus, SubscriptionRegistry};
use crate::install::{InstallTask, run_install_pipeline};
use crate::router::{AppState, AtomicApplicationStatus, build_router};

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub dry_run: bool,
    pub socket_path: PathBuf,
    pub state_dir: PathBuf,
    pub root: PathBuf,
    pub autoinstall_path: Option<PathBuf>,
    pub curtin_config_path: PathBuf,
}

impl ServerOptions {
    fn crash_dir(&self) -> PathBuf {
        self.root.join("var/log/crash")
    }
}

/// Holds the handles a running server needs to keep alive; dropping it
/// tears the server down.
pub struct Server {
    pub state: Arc<AppState>,
    pub opts: ServerOptions,
}

impl Server {
    /// spec.md §4.7 steps 1-5.
    pub async fn boot(opts: ServerOptions) -> Result<Self, ServerError> {
        std::fs::create_dir_all(&opts.state_dir)?;

        let model = InstallModel::default();
        let event_bus = Arc::new(EventBus::default());
        let ctx_mgr = Arc::new(ContextManager::default().with_listener(event_bus.clone()));
        let reporter = Arc::new(ErrorReporter::new(opts.crash_dir()));
        if let Ok(n) = reporter.recover() {
            if n > 0 {
                info!("recovered {n} pending crash report(s) from a previous run");
            }
        }

        let doc = load_autoinstall(&opts)?;
        let status = if let Some(doc) = &doc {
            validate_base_schema(doc)?;
            run_early_commands(&opts, doc, &event_bus)?;
            model.settle_controllers(Some(doc)).await?;
            if doc.is_wildcard_interactive() {
                ApplicationStatus::INTERACTIVE
            } else {
                ApplicationStatus::NON_INTERACTIVE
            }
        } else {
            model.settle_controllers(None).await?;
            ApplicationStatus::INTERACTIVE
        };

        let model = Arc::new(model);
        let install_task = Arc::new(InstallTask::default());
        let subscriptions = Arc::new(SubscriptionRegistry::default());

        let state = Arc::new(AppState {
            model: model.clone(),
            install_task: install_task.clone(),
            event_bus: event_bus.clone(),
            subscriptions,
            app_status: AtomicApplicationStatus::new(status),
            restart_requested: AtomicBool::new(false),
        });

        // spec.md §4.7 step 5: the install task runs for the lifetime of the
        // server, independent of any particular HTTP request. It shares the
        // same `Arc<InstallModel>` the router writes through; each
        // sub-model's own lock (not a lock over the whole model) is what
        // keeps its long waits on `install_events`/`postinstall_events` from
        // blocking a handler reporting `configured()`.
        {
            let install_task = install_task.clone();
            let model = model.clone();
            let event_bus = event_bus.clone();
            let ctx_mgr = ctx_mgr.clone();
            let reporter = reporter.clone();
            let curtin_config_path = opts.curtin_config_path.clone();
            let dry_run = opts.dry_run;
            tokio::spawn(async move {
                run_install_pipeline(
                    install_task,
                    model,
                    event_bus,
                    ctx_mgr,
                    reporter,
                    curtin_config_path,
                    dry_run,
                )
                .await;
            });
        }

        Ok(Self { state, opts })
    }

    /// spec.md §6 "Unix-socket HTTP": binds and serves until the listener
    /// errors or the process is signalled to stop.
    pub async fn serve(self) -> Result<(), ServerError> {
        if self.opts.socket_path.exists() {
            std::fs::remove_file(&self.opts.socket_path).map_err(|source| ServerError::Bind {
                path: self.opts.socket_path.display().to_string(),
                source,
            })?;
        }
        let listener =
            tokio::net::UnixListener::bind(&self.opts.socket_path).map_err(|source| {
                ServerError::Bind {
                    path: self.opts.socket_path.display().to_string(),
                    source,
                }
            })?;
        info!("listening on {}", self.opts.socket_path.display());

        let app = build_router(self.state);
        axum::serve(listener, app.into_make_service())
            .await
            .map_err(|source| ServerError::Bind {
                path: self.opts.socket_path.display().to_string(),
                source,
            })
    }
}

fn load_autoinstall(opts: &ServerOptions) -> Result<Option<AutoinstallDocument>, ServerError> {
    let candidate = opts
        .autoinstall_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("/autoinstall.yaml"));
    if !candidate.exists() {
        return Ok(None);
    }
    Ok(Some(subiquity_model::autoinstall::load_from_path(
        &candidate,
    )?))
}

fn validate_base_schema(doc: &AutoinstallDocument) -> Result<(), ServerError> {
    subiquity_model::autoinstall::validate_base_schema(doc)?;
    Ok(())
}

/// spec.md §4.7 step 3: run exactly once across peer server processes,
/// using a file lock plus a stamp file so a second peer that wins the race
/// to start up does not repeat the commands.
fn run_early_commands(
    opts: &ServerOptions,
    doc: &AutoinstallDocument,
    event_bus: &EventBus,
) -> Result<(), ServerError> {
    let Some(commands) = &doc.early_commands else {
        return Ok(());
    };

    let lock_path = opts.state_dir.join("early-commands.lock");
    let stamp_path = opts.state_dir.join("early-commands.stamp");
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;
    lock_file.lock_exclusive()?;

    if stamp_path.exists() {
        info!("early-commands already ran on another peer, skipping");
        let _ = FileExt::unlock(&lock_file);
        return Ok(());
    }

    for command in commands {
        let (program, args): (&str, Vec<String>) = match command {
            subiquity_core::types::Command::Shell(s) => ("sh", vec!["-c".to_string(), s.clone()]),
            subiquity_core::types::Command::Argv(argv) => {
                let Some(program) = argv.first() else {
                    return Err(ServerError::EarlyCommands(
                        "early-commands entry is an empty argv list".to_string(),
                    ));
                };
                (program.as_str(), argv[1..].to_vec())
            }
        };
        event_bus.publish_log("early-commands", format!("running: {program} {args:?}"));
        match std::process::Command::new(program).args(&args).status() {
            Ok(status) if !status.success() => {
                return Err(ServerError::EarlyCommands(format!(
                    "{program} exited with {status}"
                )));
            }
            Err(e) => {
                return Err(ServerError::EarlyCommands(format!(
                    "failed to run {program}: {e}"
                )));
            }
            Ok(_) => {}
        }
    }

    if let Err(e) = std::fs::write(&stamp_path, b"") {
        warn!("failed to write early-commands stamp: {e}");
    }
    let _ = FileExt::unlock(&lock_file);
    Ok(())
}

pub fn default_socket_path(dry_run: bool, root: &Path) -> PathBuf {
    if dry_run {
        root.join(".subiquity/socket")
    } else {
        PathBuf::from("/run/subiquity/socket")
    }
}

pub fn default_state_dir(dry_run: bool, root: &Path) -> PathBuf {
    if dry_run {
        root.join(".subiquity/run/subiquity")
    } else {
        PathBuf::from("/run/subiquity")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_the_dry_run_root_when_dry_run() {
        let root = PathBuf::from("/tmp/sandbox");
        assert_eq!(
            default_socket_path(true, &root),
            PathBuf::from("/tmp/sandbox/.subiquity/socket")
        );
        assert_eq!(
            default_state_dir(true, &root),
            PathBuf::from("/tmp/sandbox/.subiquity/run/subiquity")
        );
    }

    #[test]
    fn default_paths_are_absolute_when_not_dry_run() {
        let root = PathBuf::from("/tmp/sandbox");
        assert_eq!(default_socket_path(false, &root), PathBuf::from("/run/subiquity/socket"));
        assert_eq!(default_state_dir(false, &root), PathBuf::from("/run/subiquity"));
    }

    #[tokio::test]
    async fn boot_without_an_autoinstall_document_starts_interactive() {
        let dir = tempfile::tempdir().unwrap();
        let opts = ServerOptions {
            dry_run: true,
            socket_path: dir.path().join("socket"),
            state_dir: dir.path().join("run"),
            root: dir.path().to_path_buf(),
            autoinstall_path: Some(dir.path().join("missing-autoinstall.yaml")),
            curtin_config_path: dir.path().join("curtin.yaml"),
        };
        let server = Server::boot(opts).await.unwrap();
        assert_eq!(server.state.app_status.get(), ApplicationStatus::INTERACTIVE);
    }
}
