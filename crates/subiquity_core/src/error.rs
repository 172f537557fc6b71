use thiserror::Error;

/// Raised by the Serializer when a wire value doesn't match the annotated
/// Rust type. Mirrors `subiquity.common.serialize`'s informal exceptions,
/// but carries the field path so a validation failure can be reported
/// precisely instead of as a bare 500.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("expected {expected} at {path}, got {got}")]
pub struct SchemaError {
    pub expected: String,
    pub got: String,
    pub path: String,
}

impl SchemaError {
    pub fn new(expected: impl Into<String>, got: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            got: got.into(),
            path: path.into(),
        }
    }

    pub fn at(&self, segment: impl std::fmt::Display) -> Self {
        let path = if self.path.is_empty() {
            segment.to_string()
        } else {
            format!("{}.{}", segment, self.path)
        };
        Self { path, ..self.clone() }
    }
}

/// Errors that can occur while marshaling a request or response across the
/// Unix-socket HTTP transport (spec.md §4.2).
#[derive(Debug, Error)]
pub enum WireError {
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("missing required query parameter {0}")]
    MissingParameter(String),
    #[error("no payload argument was supplied for this endpoint")]
    MissingPayload,
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}
