//! In-memory fetcher and fixtures for unit tests.

use crate::fetcher::Fetch;
use async_trait::async_trait;
use modelsync_core::manifest::{FileManifest, ModelRecord, ModelStatus, ModelType, Platform, Source};
use modelsync_core::protocol::{DownloadTask, Fetched};
use modelsync_core::{Result, SyncError};
use serde_json::Map;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Pretends to download; never touches the disk or the network.
#[derive(Default)]
pub struct StubFetcher {
    latency: Duration,
    not_found: HashSet<String>,
    failing: HashSet<String>,
    fetched: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn not_found(mut self, files: &[&str]) -> Self {
        self.not_found.extend(files.iter().map(|f| f.to_string()));
        self
    }

    pub fn failing(mut self, files: &[&str]) -> Self {
        self.failing.extend(files.iter().map(|f| f.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for StubFetcher {
    async fn fetch(&self, task: &DownloadTask, _overwrite: bool) -> Result<Fetched> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.fetched.lock().unwrap().push(task.file.clone());

        if !self.latency.is_zero() {
            async_std::task::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.not_found.contains(&task.file) {
            Err(SyncError::FetchNotFound {
                url: task.url.clone(),
            })
        } else if self.failing.contains(&task.file) {
            Err(SyncError::fetch_failed(&task.url, "connection reset"))
        } else {
            Ok(Fetched::Downloaded(42))
        }
    }
}

/// A Hugging Face record `test/<id>` with the given manifest.
pub fn record(id: &str, required: &[&str], optional: &[&str]) -> ModelRecord {
    ModelRecord {
        id: id.to_string(),
        name: None,
        model_type: ModelType::Asr,
        source: Source {
            platform: Platform::Huggingface,
            author: "test".to_string(),
            repository: id.to_string(),
            branch: None,
            release: None,
            url: None,
            extra: Map::new(),
        },
        local_path: format!("huggingface/test/{}", id),
        description: None,
        features: None,
        specs: None,
        performance: None,
        files: FileManifest {
            required: required.iter().map(|f| f.to_string()).collect(),
            optional: optional.iter().map(|f| f.to_string()).collect(),
        },
        status: ModelStatus::default(),
        tags: Vec::new(),
        extra: Map::new(),
    }
}
