use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while loading, synchronizing or persisting
/// the registry.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("registry file not found: {0}")]
    RegistryNotFound(PathBuf),

    #[error("registry {path} is corrupt: {reason}")]
    RegistryCorrupt { path: PathBuf, reason: String },

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("model already registered: {0}")]
    DuplicateModel(String),

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("no files specified for model {0}")]
    NoFilesSpecified(String),

    #[error("not found: {url}")]
    FetchNotFound { url: String },

    #[error("failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("model {model_id} is missing required files: {}", failed.join(", "))]
    PartialDownload { model_id: String, failed: Vec<String> },

    #[error("cancelled")]
    Cancelled,

    #[error("model {model_id} lists a file outside its directory: {file}")]
    UnsafeFilePath { model_id: String, file: String },

    #[error("invalid model source: {0}")]
    InvalidSource(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SyncError::RegistryCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn fetch_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        SyncError::FetchFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// A remote 404. Callers treat this as non-fatal for optional files.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::FetchNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
