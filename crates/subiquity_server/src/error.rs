use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind Unix socket at {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("autoinstall document error: {0}")]
    Autoinstall(#[from] subiquity_model::AutoinstallError),
    #[error("early-commands failed: {0}")]
    EarlyCommands(String),
    #[error(transparent)]
    Wire(#[from] subiquity_core::WireError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("curtin exited with status {0}")]
    CurtinFailed(std::process::ExitStatus),
    #[error("failed to spawn curtin: {0}")]
    CurtinSpawn(std::io::Error),
    #[error("post-install step '{step}' failed: {reason}")]
    PostInstall { step: String, reason: String },
}
