//! # Depot: The Synchronizer
//!
//! **Model registry persistence, URL resolution and concurrent file sync.**
//!
//! Depot keeps a local models directory in step with the catalog in
//! `global_registry.json`. It resolves each listed file to a download URL on
//! Hugging Face or GitHub, fetches the files of one model through a bounded
//! worker pool, and writes the outcome back into the registry.
//!
//! ## Core Features
//!
//! - **Registry Store**: Loads the catalog and saves it atomically, keeping unknown keys intact.
//! - **URL Resolution**: Hugging Face `resolve` URLs, GitHub raw files and release assets.
//! - **Streaming Downloads**: Files stream to `<name>.part` and only appear once complete.
//! - **Status Tracking**: Outcomes update each model's status and the catalog statistics.
//!
//! ## Usage
//!
//! ### 1. Sync One Model
//!
//! ```no_run
//! use modelsync_depot::{Cancellation, Depot, Settings, SyncOptions};
//!
//! #[async_std::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load()?;
//!     let depot = Depot::new(&settings)?;
//!
//!     let (outcome, _) = depot
//!         .sync_model("whisper-tiny", &SyncOptions::default(), &Cancellation::new())
//!         .await?;
//!
//!     println!("success: {}", outcome.is_success());
//!     Ok(())
//! }
//! ```
//!
//! ### 2. Progress Events
//!
//! Byte-level progress is pushed through an unbounded channel while the sync runs.
//!
//! ```no_run
//! use futures::channel::mpsc;
//! use futures::StreamExt;
//! use modelsync_core::protocol::TransferEvent;
//! use modelsync_depot::{Cancellation, Depot, Settings, SyncOptions};
//!
//! #[async_std::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load()?;
//!     let (tx, mut rx) = mpsc::unbounded();
//!     let depot = Depot::with_events(&settings, tx)?;
//!
//!     async_std::task::spawn(async move {
//!         while let Some(event) = rx.next().await {
//!             if let TransferEvent::Progress(file, done, total) = event {
//!                 println!("{}: {}/{:?}", file, done, total);
//!             }
//!         }
//!     });
//!
//!     depot
//!         .sync_model("whisper-tiny", &SyncOptions::default(), &Cancellation::new())
//!         .await?;
//!     Ok(())
//! }
//! ```

/// Cooperative stop flag for long runs.
pub mod cancel;

/// Facade tying settings, registry and fetcher together.
pub mod depot;

/// HTTP transfer of single files.
pub mod fetcher;

/// Sequential sync over many models.
pub mod fleet;

/// Per-model concurrent sync.
pub mod orchestrator;

/// Loading and atomically saving the registry document.
pub mod registry;

/// Mapping manifest entries to download URLs.
pub mod resolver;

/// Layered configuration: defaults, config file, environment.
pub mod settings;

/// Folding sync outcomes into model status.
pub mod updater;

/// On-disk presence checks.
pub mod verify;

#[cfg(test)]
mod testing;

pub use cancel::Cancellation;
pub use depot::Depot;
pub use fetcher::{Fetch, HttpFetcher};
pub use fleet::{Fleet, FleetSummary, ModelFailure};
pub use orchestrator::{Orchestrator, SyncOptions, SyncOutcome, SyncReport};
pub use registry::RegistryStore;
pub use resolver::{Hosts, UrlResolver};
pub use settings::Settings;
pub use updater::{RegistryUpdater, StatusChange};
pub use verify::Verification;
