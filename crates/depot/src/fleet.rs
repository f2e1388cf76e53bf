use crate::cancel::Cancellation;
use crate::orchestrator::{Orchestrator, SyncOptions, SyncOutcome};
use crate::updater::RegistryUpdater;
use modelsync_core::manifest::{ModelFilter, Registry};
use modelsync_core::{Result, SyncError};
use std::time::Duration;

pub const DEFAULT_FLEET_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFailure {
    pub model_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FleetSummary {
    pub attempted: usize,
    pub succeeded: usize,
    /// Subset of `succeeded` that needed no work.
    pub already_synced: usize,
    pub failures: Vec<ModelFailure>,
    pub cancelled: bool,
}

/// Walks a filtered slice of the registry one model at a time, pausing
/// between models so remote hosts are not hammered.
pub struct Fleet {
    orchestrator: Orchestrator,
    updater: RegistryUpdater,
    delay: Duration,
}

impl Fleet {
    pub fn new(orchestrator: Orchestrator, updater: RegistryUpdater) -> Self {
        Self {
            orchestrator,
            updater,
            delay: DEFAULT_FLEET_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// A single model failing is recorded and the batch moves on. Errors
    /// persisting the registry stop the run.
    pub async fn run<F>(
        &self,
        registry: &mut Registry,
        filter: &ModelFilter,
        options: &SyncOptions,
        cancel: &Cancellation,
        mut on_model: F,
    ) -> Result<FleetSummary>
    where
        F: FnMut(&str, &Result<SyncOutcome>),
    {
        let ids: Vec<String> = registry
            .filter(filter)
            .into_iter()
            .map(|m| m.id.clone())
            .collect();
        log::info!("Fleet run over {} models", ids.len());

        let mut summary = FleetSummary::default();
        for (i, id) in ids.iter().enumerate() {
            if i > 0 && !cancel.sleep(self.delay).await {
                summary.cancelled = true;
                break;
            }
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            summary.attempted += 1;
            let outcome = match registry.find(id) {
                Some(model) => self.orchestrator.sync(model, options, cancel).await,
                None => Err(SyncError::ModelNotFound(id.clone())),
            };

            if let Ok(outcome) = &outcome {
                self.updater.record(registry, id, outcome)?;
            }
            on_model(id, &outcome);

            match outcome {
                Ok(SyncOutcome::AlreadySynced) => {
                    summary.succeeded += 1;
                    summary.already_synced += 1;
                }
                Ok(SyncOutcome::Complete(_)) => summary.succeeded += 1,
                Ok(SyncOutcome::Cancelled(_)) => {
                    summary.cancelled = true;
                    break;
                }
                Ok(failed) => {
                    let reason = failed
                        .error(id)
                        .map(|e| e.to_string())
                        .unwrap_or_default();
                    summary.failures.push(ModelFailure {
                        model_id: id.clone(),
                        reason,
                    });
                }
                Err(e) => summary.failures.push(ModelFailure {
                    model_id: id.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        log::info!(
            "Fleet run finished: {}/{} succeeded",
            summary.succeeded,
            summary.attempted
        );
        Ok(summary)
    }
}
