use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutoinstallError {
    #[error("autoinstall document is missing the required 'version' key")]
    MissingVersion,
    #[error("autoinstall document declares unsupported version {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("autoinstall slice '{key}' failed validation: {reason}")]
    SliceValidation { key: String, reason: String },
    #[error("autoinstall slice '{0}' is not valid JSON for its controller")]
    Malformed(String),
    #[error("unable to read autoinstall document: {0}")]
    Io(#[from] std::io::Error),
    #[error("autoinstall document is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller '{0}' has no autoinstall slice and no default")]
    NoAutoinstallData(String),
    #[error("controller '{0}' cannot apply its autoinstall config: {1}")]
    ApplyFailed(String, String),
}
