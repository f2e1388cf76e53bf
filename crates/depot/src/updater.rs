use crate::orchestrator::SyncOutcome;
use crate::registry::RegistryStore;
use chrono::{Local, NaiveDate};
use modelsync_core::manifest::Registry;
use modelsync_core::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Nothing ran, nothing written.
    Untouched,
    MarkedDownloaded,
    /// A file from the last good manifest went missing.
    MarkedPending,
    /// Failure recorded; the downloaded flag kept its previous value.
    FailureRecorded,
}

/// Folds a sync outcome into the model's status. Pure apart from `registry`.
///
/// A failed run clears `downloaded` only when one of the failing files was
/// part of the manifest that last synced successfully (or no such snapshot
/// exists). Failures limited to files added to the manifest since then keep
/// the earlier verdict.
pub fn apply_outcome(
    registry: &mut Registry,
    model_id: &str,
    outcome: &SyncOutcome,
    today: NaiveDate,
) -> Result<StatusChange> {
    let model = registry
        .find_mut(model_id)
        .ok_or_else(|| SyncError::ModelNotFound(model_id.to_string()))?;
    let status = &mut model.status;

    let change = match outcome {
        SyncOutcome::AlreadySynced | SyncOutcome::Cancelled(_) => StatusChange::Untouched,
        SyncOutcome::Complete(_) => {
            status.downloaded = true;
            status.verified = true;
            status.download_date = Some(today);
            status.synced_files = Some(model.files.required.clone());
            StatusChange::MarkedDownloaded
        }
        SyncOutcome::Failed {
            failed_required, ..
        } => {
            let regressed = match &status.synced_files {
                Some(synced) => failed_required.iter().any(|f| synced.contains(f)),
                None => true,
            };
            if status.downloaded && regressed {
                status.downloaded = false;
                status.verified = false;
                StatusChange::MarkedPending
            } else {
                StatusChange::FailureRecorded
            }
        }
    };

    if change != StatusChange::Untouched {
        registry.recompute_statistics();
    }
    Ok(change)
}

/// Applies outcomes and persists the registry right after.
#[derive(Debug, Clone)]
pub struct RegistryUpdater {
    store: RegistryStore,
}

impl RegistryUpdater {
    pub fn new(store: RegistryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    pub fn record(
        &self,
        registry: &mut Registry,
        model_id: &str,
        outcome: &SyncOutcome,
    ) -> Result<StatusChange> {
        let change = apply_outcome(registry, model_id, outcome, Local::now().date_naive())?;
        if change != StatusChange::Untouched {
            self.store.save(registry)?;
            log::info!("{}: {:?}, registry saved", model_id, change);
        }
        Ok(change)
    }
}
