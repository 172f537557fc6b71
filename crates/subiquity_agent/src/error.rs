use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to bind agent socket at {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to register subscription with server: {0}")]
    Subscribe(#[from] subiquity_core::WireError),
}
