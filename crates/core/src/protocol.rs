use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Progress notifications emitted while a file streams in. Purely
/// observational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferEvent {
    /// A request was issued; total size when the server reported one
    Started(String, Option<u64>),
    /// Bytes received so far (file, current, total)
    Progress(String, u64, Option<u64>),
    /// File is in place
    Complete(String),
    /// Transfer aborted (file, reason)
    Error(String, String),
}

/// One file of one model, resolved and ready to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub file: String,
    pub required: bool,
    pub url: String,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    Downloaded(u64),
    AlreadyPresent,
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub task: DownloadTask,
    pub result: Result<Fetched, SyncError>,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn message(&self) -> String {
        match &self.result {
            Ok(Fetched::Downloaded(bytes)) => {
                format!("Downloaded: {} ({} bytes)", self.task.file, bytes)
            }
            Ok(Fetched::AlreadyPresent) => format!("Already exists: {}", self.task.file),
            Err(e) if e.is_not_found() => format!("Not found: {}", self.task.file),
            Err(e) => format!("Failed to download {}: {}", self.task.file, e),
        }
    }
}
