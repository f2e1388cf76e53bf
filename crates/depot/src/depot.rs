use crate::cancel::Cancellation;
use crate::fetcher::{Fetch, HttpFetcher};
use crate::fleet::{Fleet, FleetSummary};
use crate::orchestrator::{Orchestrator, SyncOptions, SyncOutcome};
use crate::registry::RegistryStore;
use crate::settings::Settings;
use crate::updater::{RegistryUpdater, StatusChange};
use crate::verify::{verify_model, verify_record, Verification};
use futures::channel::mpsc::UnboundedSender;
use modelsync_core::hub::HubReference;
use modelsync_core::manifest::{ModelFilter, ModelType, Registry};
use modelsync_core::protocol::TransferEvent;
use modelsync_core::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Owns the wiring between the registry file, the fetcher and the models
/// directory. Each call reloads the registry from disk.
pub struct Depot {
    store: RegistryStore,
    orchestrator: Orchestrator,
    updater: RegistryUpdater,
    fleet_delay: Duration,
}

impl Depot {
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::with_fetcher(settings, Arc::new(settings.fetcher()?))
    }

    /// Same as [`new`](Self::new) but transfer events are forwarded to `events`.
    pub fn with_events(settings: &Settings, events: UnboundedSender<TransferEvent>) -> Result<Self> {
        let fetcher: HttpFetcher = settings.fetcher()?.with_events(events);
        Self::with_fetcher(settings, Arc::new(fetcher))
    }

    pub fn with_fetcher(settings: &Settings, fetcher: Arc<dyn Fetch>) -> Result<Self> {
        let store = settings.store();
        Ok(Self {
            orchestrator: Orchestrator::new(fetcher, settings.resolver(), &settings.models_dir),
            updater: RegistryUpdater::new(store.clone()),
            store,
            fleet_delay: settings.fleet_delay,
        })
    }

    pub fn store(&self) -> &RegistryStore {
        &self.store
    }

    pub fn models_dir(&self) -> &Path {
        self.orchestrator.models_dir()
    }

    pub fn registry(&self) -> Result<Registry> {
        self.store.load()
    }

    /// Syncs one model and records the outcome in the registry file.
    pub async fn sync_model(
        &self,
        model_id: &str,
        options: &SyncOptions,
        cancel: &Cancellation,
    ) -> Result<(SyncOutcome, StatusChange)> {
        let mut registry = self.store.load()?;
        let outcome = self
            .orchestrator
            .sync_id(&registry, model_id, options, cancel)
            .await?;
        let change = self.updater.record(&mut registry, model_id, &outcome)?;
        Ok((outcome, change))
    }

    pub async fn sync_all<F>(
        &self,
        filter: &ModelFilter,
        options: &SyncOptions,
        cancel: &Cancellation,
        on_model: F,
    ) -> Result<FleetSummary>
    where
        F: FnMut(&str, &Result<SyncOutcome>),
    {
        let mut registry = self.store.load()?;
        let fleet = Fleet::new(self.orchestrator.clone(), self.updater.clone())
            .with_delay(self.fleet_delay);
        fleet.run(&mut registry, filter, options, cancel, on_model).await
    }

    pub fn verify(&self, model_id: &str) -> Result<Verification> {
        let registry = self.store.load()?;
        verify_model(&registry, self.models_dir(), model_id)
    }

    pub fn verify_all(&self, filter: &ModelFilter) -> Result<Vec<Verification>> {
        let registry = self.store.load()?;
        Ok(registry
            .filter(filter)
            .into_iter()
            .map(|model| verify_record(model, self.models_dir()))
            .collect())
    }

    /// Adds a Hugging Face repository to the registry, creating the registry
    /// file if needed. Returns the id the model was stored under.
    pub fn register_hub(
        &self,
        reference: &HubReference,
        model_type: ModelType,
        required: Vec<String>,
        optional: Vec<String>,
        replace: bool,
    ) -> Result<String> {
        let mut registry = self.store.load_or_default()?;
        let record = reference.to_record(model_type, required, optional);
        let id = record.id.clone();
        registry.register(record, replace)?;
        self.store.save(&mut registry)?;
        log::info!(
            "Registered {}/{} as {}",
            reference.owner,
            reference.repository,
            id
        );
        Ok(id)
    }
}
