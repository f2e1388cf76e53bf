use crate::cancel::Cancellation;
use crate::fetcher::Fetch;
use crate::resolver::UrlResolver;
use futures::stream::{self, StreamExt};
use modelsync_core::manifest::{FileManifest, ModelRecord, Registry};
use modelsync_core::protocol::{DownloadTask, FetchOutcome, Fetched};
use modelsync_core::{Result, SyncError};
use std::path::PathBuf;
use std::sync::Arc;

pub const DEFAULT_WORKERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Sync even when the record already says downloaded.
    pub force: bool,
    pub include_optional: bool,
    /// Re-fetch files that already exist on disk.
    pub overwrite: bool,
    /// Upper bound on concurrent fetches for one model.
    pub workers: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            force: false,
            include_optional: false,
            overwrite: false,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Every file outcome of one model run, in manifest order.
#[derive(Debug)]
pub struct SyncReport {
    pub model_id: String,
    pub outcomes: Vec<FetchOutcome>,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn downloaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Ok(Fetched::Downloaded(_))))
            .count()
    }

    pub fn failed_required(&self) -> Vec<String> {
        self.failed(true)
    }

    pub fn failed_optional(&self) -> Vec<String> {
        self.failed(false)
    }

    fn failed(&self, required: bool) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.task.required == required && !o.is_success())
            .map(|o| o.task.file.clone())
            .collect()
    }

    /// e.g. `5 of 7 files ready, 2 failed (required: a.onnx; optional: b.json)`
    pub fn summary(&self) -> String {
        let failed = self.total() - self.succeeded();
        let mut line = format!("{} of {} files ready", self.succeeded(), self.total());
        if failed > 0 {
            line.push_str(&format!(", {} failed", failed));
            let mut parts = Vec::new();
            let required = self.failed_required();
            if !required.is_empty() {
                parts.push(format!("required: {}", required.join(", ")));
            }
            let optional = self.failed_optional();
            if !optional.is_empty() {
                parts.push(format!("optional: {}", optional.join(", ")));
            }
            line.push_str(&format!(" ({})", parts.join("; ")));
        }
        line
    }
}

#[derive(Debug)]
pub enum SyncOutcome {
    /// Record was already downloaded and the run was not forced; nothing
    /// touched the network.
    AlreadySynced,
    Complete(SyncReport),
    Failed {
        failed_required: Vec<String>,
        report: SyncReport,
    },
    Cancelled(SyncReport),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::AlreadySynced | SyncOutcome::Complete(_))
    }

    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::AlreadySynced => None,
            SyncOutcome::Complete(report)
            | SyncOutcome::Failed { report, .. }
            | SyncOutcome::Cancelled(report) => Some(report),
        }
    }

    /// The model-level error for a failed run.
    pub fn error(&self, model_id: &str) -> Option<SyncError> {
        match self {
            SyncOutcome::Failed {
                failed_required, ..
            } => Some(SyncError::PartialDownload {
                model_id: model_id.to_string(),
                failed: failed_required.clone(),
            }),
            SyncOutcome::Cancelled(_) => Some(SyncError::Cancelled),
            _ => None,
        }
    }
}

/// Runs one model's file fetches under a bounded pool and decides whether the
/// model as a whole made it.
#[derive(Clone)]
pub struct Orchestrator {
    fetcher: Arc<dyn Fetch>,
    resolver: UrlResolver,
    models_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<dyn Fetch>, resolver: UrlResolver, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            resolver,
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &PathBuf {
        &self.models_dir
    }

    /// Required files first, then optional ones when asked for.
    pub fn plan(&self, model: &ModelRecord, include_optional: bool) -> Result<Vec<DownloadTask>> {
        let local = self.models_dir.join(&model.local_path);
        let optional: &[String] = if include_optional {
            &model.files.optional
        } else {
            &[]
        };

        let entries = model
            .files
            .required
            .iter()
            .map(|f| (f, true))
            .chain(optional.iter().map(|f| (f, false)));

        // Required entries come first, so a file listed twice keeps its
        // required tag and is fetched once.
        let mut tasks: Vec<DownloadTask> = Vec::new();
        for (file, required) in entries {
            let relative = FileManifest::relative_path(file).ok_or_else(|| {
                SyncError::UnsafeFilePath {
                    model_id: model.id.clone(),
                    file: file.clone(),
                }
            })?;
            let destination = local.join(relative);
            if tasks.iter().any(|task| task.destination == destination) {
                log::debug!("{}: skipping duplicate entry {}", model.id, file);
                continue;
            }
            tasks.push(DownloadTask {
                file: file.clone(),
                required,
                url: self.resolver.resolve(&model.source, file)?,
                destination,
            });
        }

        if tasks.is_empty() {
            return Err(SyncError::NoFilesSpecified(model.id.clone()));
        }
        Ok(tasks)
    }

    pub async fn sync_id(
        &self,
        registry: &Registry,
        model_id: &str,
        options: &SyncOptions,
        cancel: &Cancellation,
    ) -> Result<SyncOutcome> {
        let model = registry.get(model_id)?;
        self.sync(model, options, cancel).await
    }

    pub async fn sync(
        &self,
        model: &ModelRecord,
        options: &SyncOptions,
        cancel: &Cancellation,
    ) -> Result<SyncOutcome> {
        if model.status.downloaded && !options.force {
            log::info!("{} already downloaded, skipping", model.id);
            return Ok(SyncOutcome::AlreadySynced);
        }

        let tasks = self.plan(model, options.include_optional)?;
        log::info!(
            "Syncing {} ({} files, {} workers)",
            model.id,
            tasks.len(),
            options.workers.max(1)
        );

        let fetcher = &self.fetcher;
        let mut outcomes: Vec<(usize, FetchOutcome)> = stream::iter(tasks.into_iter().enumerate())
            .map(|(index, task)| async move {
                if cancel.is_cancelled() {
                    return (
                        index,
                        FetchOutcome {
                            task,
                            result: Err(SyncError::Cancelled),
                        },
                    );
                }
                let result = fetcher.fetch(&task, options.overwrite).await;
                (index, FetchOutcome { task, result })
            })
            .buffer_unordered(options.workers.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let report = SyncReport {
            model_id: model.id.clone(),
            outcomes: outcomes.into_iter().map(|(_, o)| o).collect(),
        };

        for outcome in &report.outcomes {
            match (&outcome.result, outcome.task.required) {
                (Ok(_), _) => log::debug!("{}: {}", model.id, outcome.message()),
                (Err(_), true) => log::warn!("{}: {}", model.id, outcome.message()),
                (Err(_), false) => log::warn!(
                    "{}: {} (optional, continuing)",
                    model.id,
                    outcome.message()
                ),
            }
        }

        if report
            .outcomes
            .iter()
            .any(|o| matches!(o.result, Err(SyncError::Cancelled)))
        {
            return Ok(SyncOutcome::Cancelled(report));
        }

        let failed_required = report.failed_required();
        if failed_required.is_empty() {
            Ok(SyncOutcome::Complete(report))
        } else {
            Ok(SyncOutcome::Failed {
                failed_required,
                report,
            })
        }
    }
}
