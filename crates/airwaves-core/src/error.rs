//! Error taxonomy. None of these is fatal: every variant maps to an
//! empty state, an inline message, a toast, or a log line.

/// One mirror could not serve a request.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid mirror URL: {0}")]
    InvalidUrl(String),
}

/// A directory lookup failed on every configured mirror.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("station directory unavailable for {operation} ({attempts} mirror(s) tried)")]
    Unavailable { operation: String, attempts: usize },
}

impl DirectoryError {
    pub fn unavailable(operation: impl Into<String>, attempts: usize) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            attempts,
        }
    }
}

/// Rejected custom-station input. Rendered next to the form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter a station name.")]
    EmptyName,

    #[error("Please enter a valid stream URL.")]
    InvalidUrl(String),
}

/// The host could not start a track.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlaybackError {
    #[error("Player control not available")]
    HostUnavailable,

    #[error("Could not play station. Check the stream URL. ({0})")]
    Rejected(String),
}

/// A storage write failed. The in-memory change is kept.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("could not encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PersistenceError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
