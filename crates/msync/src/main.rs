//! # msync: The Courier
//! The `msync` CLI lists, downloads and verifies the models catalogued in a
//! `global_registry.json`, fetching their files from Hugging Face or GitHub.

mod progress;
mod render;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::*;
use futures::channel::mpsc;
use modelsync_core::hub::HubReference;
use modelsync_core::manifest::{ModelFilter, ModelType, StatusFilter};
use modelsync_depot::{Cancellation, Depot, Settings, SyncOptions, SyncOutcome};
use progress::TransferProgress;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Registry document (default: models/global_registry.json)
    #[arg(long, global = true, value_name = "PATH")]
    registry: Option<PathBuf>,
    /// Root directory for model files (default: models)
    #[arg(long, global = true, value_name = "DIR")]
    models_dir: Option<PathBuf>,
    /// Concurrent file downloads per model
    #[arg(long, global = true)]
    workers: Option<usize>,
    /// Hugging Face access token (overrides HF_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct FilterArgs {
    /// Only models of this type (asr, wakeword, vad, tts, nlp)
    #[arg(long = "type", value_name = "TYPE")]
    model_type: Option<ModelType>,
    /// Only downloaded or pending models
    #[arg(long)]
    status: Option<StatusFilter>,
}

impl FilterArgs {
    fn filter(&self) -> ModelFilter {
        ModelFilter {
            model_type: self.model_type,
            status: self.status,
        }
    }
}

#[derive(Args)]
struct SyncArgs {
    /// Sync even if the registry says the model is downloaded
    #[arg(long)]
    force: bool,
    /// Also fetch optional files
    #[arg(long)]
    optional: bool,
    /// Re-download files that already exist locally
    #[arg(long)]
    overwrite: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered models
    List {
        #[command(flatten)]
        filter: FilterArgs,
        /// Print the matching records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Download the files of one model
    Download {
        /// Model id from the registry
        id: String,
        #[command(flatten)]
        sync: SyncArgs,
    },
    /// Download every model matching a filter, one after another
    DownloadAll {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        sync: SyncArgs,
        /// Pause between models in milliseconds
        #[arg(long, value_name = "MS")]
        delay_ms: Option<u64>,
    },
    /// Check that required files exist on disk
    Verify {
        /// Model id; all matching models when omitted
        id: Option<String>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Show registry statistics
    Stats,
    /// Register a Hugging Face repository
    Add {
        /// owner/model or https://huggingface.co/owner/model
        repo: String,
        #[arg(long = "type", value_name = "TYPE")]
        model_type: ModelType,
        /// Required file (repeatable); defaults to the standard ONNX layout
        #[arg(long = "required", value_name = "FILE")]
        required: Vec<String>,
        /// Optional file (repeatable)
        #[arg(long = "optional", value_name = "FILE")]
        optional: Vec<String>,
        /// Replace an existing entry for the same model
        #[arg(long)]
        replace: bool,
    },
}

impl Cli {
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load().context("Failed to load settings")?;
        if let Some(registry) = &self.registry {
            settings.registry_path = registry.clone();
        }
        if let Some(models_dir) = &self.models_dir {
            settings.models_dir = models_dir.clone();
        }
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(token) = &self.token {
            settings.hf_token = Some(token.clone());
        }
        log::debug!("{:?}", settings);
        Ok(settings)
    }
}

fn sync_options(args: &SyncArgs, settings: &Settings) -> SyncOptions {
    SyncOptions {
        force: args.force,
        include_optional: args.optional,
        overwrite: args.overwrite,
        workers: settings.workers,
    }
}

fn install_ctrlc() -> Result<Cancellation> {
    let cancel = Cancellation::new();
    let trigger = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 Cancelling, waiting for in-flight downloads...");
        trigger.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;
    Ok(cancel)
}

#[async_std::main]
async fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let mut settings = cli.settings()?;

    match &cli.command {
        Commands::List { filter, json } => {
            let registry = settings.store().load().context("Failed to load registry")?;
            let models = registry.filter(&filter.filter());
            if *json {
                println!("{}", serde_json::to_string_pretty(&models)?);
            } else if models.is_empty() {
                println!("No models match.");
            } else {
                for model in models {
                    println!("{}", render::model_line(model));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Download { id, sync } => {
            let cancel = install_ctrlc()?;
            let options = sync_options(sync, &settings);
            let (tx, rx) = mpsc::unbounded();
            let progress = TransferProgress::start(rx);

            println!("📥 Syncing {}", id.cyan());
            let depot = Depot::with_events(&settings, tx)?;
            let result = depot.sync_model(id, &options, &cancel).await;
            drop(depot);
            progress.finish().await;

            let (outcome, _) = result.with_context(|| format!("Failed to sync {}", id))?;
            Ok(print_outcome(id, &outcome))
        }
        Commands::DownloadAll {
            filter,
            sync,
            delay_ms,
        } => {
            if let Some(ms) = delay_ms {
                settings.fleet_delay = Duration::from_millis(*ms);
            }
            let cancel = install_ctrlc()?;
            let options = sync_options(sync, &settings);
            let (tx, rx) = mpsc::unbounded();
            let progress = TransferProgress::start(rx);

            let depot = Depot::with_events(&settings, tx)?;
            let result = depot
                .sync_all(&filter.filter(), &options, &cancel, |id, outcome| {
                    let line = match outcome {
                        Ok(SyncOutcome::AlreadySynced) => {
                            format!("⏭️  {}: already downloaded", id)
                        }
                        Ok(outcome) => match outcome.report() {
                            Some(report) if outcome.is_success() => {
                                format!("✅ {}: {}", id.green(), report.summary())
                            }
                            Some(report) => format!("❌ {}: {}", id.red(), report.summary()),
                            None => format!("❌ {}", id.red()),
                        },
                        Err(e) => format!("❌ {}: {}", id.red(), e),
                    };
                    progress.println(line);
                })
                .await;
            drop(depot);
            progress.finish().await;

            let summary = result.context("Batch sync aborted")?;
            println!("{}", render::fleet_summary_line(&summary));
            if summary.failures.is_empty() && !summary.cancelled {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Verify { id, filter } => {
            let depot = Depot::new(&settings)?;
            let verifications = match id {
                Some(id) => vec![depot.verify(id).with_context(|| format!("Failed to verify {}", id))?],
                None => depot.verify_all(&filter.filter())?,
            };

            let mut complete = true;
            for verification in &verifications {
                complete &= verification.is_complete();
                for line in render::verification_lines(verification) {
                    println!("{}", line);
                }
            }
            Ok(if complete {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Stats => {
            let mut registry = settings.store().load().context("Failed to load registry")?;
            registry.recompute_statistics();
            for line in render::statistics_lines(&registry.statistics) {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Add {
            repo,
            model_type,
            required,
            optional,
            replace,
        } => {
            let reference = HubReference::parse(repo)?;
            let depot = Depot::new(&settings)?;
            let id = depot.register_hub(
                &reference,
                *model_type,
                required.clone(),
                optional.clone(),
                *replace,
            )?;
            println!(
                "✅ Registered {} as {} in {}",
                repo.cyan(),
                id.green(),
                depot.store().path().display()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_outcome(id: &str, outcome: &SyncOutcome) -> ExitCode {
    match outcome {
        SyncOutcome::AlreadySynced => {
            println!("⏭️  {} is already downloaded (use --force to re-check)", id);
            return ExitCode::SUCCESS;
        }
        SyncOutcome::Complete(report)
        | SyncOutcome::Failed { report, .. }
        | SyncOutcome::Cancelled(report) => {
            for line in render::report_lines(report) {
                println!("{}", line);
            }
            println!("{}", report.summary());
        }
    }

    match outcome.error(id) {
        None => {
            println!("✅ {} is ready", id.green());
            ExitCode::SUCCESS
        }
        Some(e) => {
            eprintln!("❌ {}", e.to_string().red());
            ExitCode::FAILURE
        }
    }
}
