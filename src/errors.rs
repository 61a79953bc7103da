/// Strato Error Types
#[derive(Debug, thiserror::Error)]
pub enum StratoError {
    /// Bad input rejected before any side effect (empty names, malformed keys)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Required ambient state could not be determined (e.g. current branch)
    #[error("State error: {0}")]
    State(String),

    /// Operation target is not tracked in the stack tree
    #[error("Not found: {0}")]
    NotFound(String),

    /// The external git tool reported a non-conflict failure
    #[error("Git error: {0}")]
    Vcs(String),

    /// A conflict resolution was aborted by the user or policy
    #[error("Conflict aborted: {0}")]
    ConflictAborted(String),

    /// Stack tree file could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StratoError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        StratoError::Validation(msg.into())
    }

    pub fn state<S: Into<String>>(msg: S) -> Self {
        StratoError::State(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        StratoError::NotFound(msg.into())
    }

    pub fn vcs<S: Into<String>>(msg: S) -> Self {
        StratoError::Vcs(msg.into())
    }

    pub fn conflict_aborted<S: Into<String>>(msg: S) -> Self {
        StratoError::ConflictAborted(msg.into())
    }

    pub fn storage<S: Into<String>>(msg: S) -> Self {
        StratoError::Storage(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        StratoError::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StratoError>;
