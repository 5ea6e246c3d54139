use std::path::PathBuf;

/// Errors raised by a [`GraphicsDevice`](crate::GraphicsDevice) backend.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("malformed byte-code for '{label}': {reason}")]
    MalformedBytecode { label: String, reason: String },
    #[error("failed to create {object} '{label}': {reason}")]
    Creation {
        object: &'static str,
        label: String,
        reason: String,
    },
    #[error("failed to map buffer '{label}': {reason}")]
    Map { label: String, reason: String },
    #[error("pipeline state incomplete: {0}")]
    Incomplete(String),
}

/// Errors from pipeline initialization. Any of these is fatal to startup.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to read shader resource {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("shader resource not found: {0}")]
    MissingResource(String),
    #[error("failed to initialize {what}: {source}")]
    Device {
        what: String,
        #[source]
        source: DeviceError,
    },
    #[error("invalid shader config {path}: {reason}")]
    Config { path: PathBuf, reason: String },
}

impl PipelineError {
    pub(crate) fn device(what: impl Into<String>, source: DeviceError) -> Self {
        Self::Device {
            what: what.into(),
            source,
        }
    }
}
