use std::path::PathBuf;

/// Setup and enqueue failures, surfaced synchronously to the caller
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Upload endpoint URL is empty")]
    MissingEndpoint,

    #[error("Descriptor extension is empty")]
    MissingExtension,

    #[error("Queue path {0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("Invalid descriptor field: {0}")]
    InvalidField(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build upload runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Failed to spawn upload thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Failure of a single probe or submission
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Cannot read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
