use chrono::{SecondsFormat, Utc};
use modelsync_core::manifest::Registry;
use modelsync_core::{Result, SyncError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Loads and persists the registry document at a fixed path.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<Registry> {
        if !self.path.exists() {
            return Err(SyncError::RegistryNotFound(self.path.clone()));
        }

        let content = fs::read_to_string(&self.path)?;
        let mut registry: Registry = serde_json::from_str(&content)
            .map_err(|e| SyncError::corrupt(&self.path, e))?;
        registry
            .validate()
            .map_err(|reason| SyncError::corrupt(&self.path, reason))?;
        registry.recompute_statistics();

        log::debug!(
            "Loaded {} models from {}",
            registry.models.len(),
            self.path.display()
        );
        Ok(registry)
    }

    /// Like [`load`](Self::load) but starts from [`Registry::empty`] when
    /// the file does not exist yet.
    pub fn load_or_default(&self) -> Result<Registry> {
        match self.load() {
            Err(SyncError::RegistryNotFound(_)) => Ok(Registry::empty()),
            other => other,
        }
    }

    /// Refreshes statistics, stamps `last_updated` and replaces the file in
    /// one rename so readers only ever see a complete document.
    pub fn save(&self, registry: &mut Registry) -> Result<()> {
        registry.recompute_statistics();
        registry.last_updated = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));

        let mut bytes = serde_json::to_vec_pretty(registry)
            .map_err(|e| SyncError::corrupt(&self.path, e))?;
        bytes.push(b'\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.temp_path();
        let written = write_synced(&tmp, &bytes).and_then(|_| replace(&tmp, &self.path));
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written?;

        log::debug!("Saved registry to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "registry.json".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(windows))]
fn replace(from: &Path, to: &Path) -> std::io::Result<()> {
    fs::rename(from, to)
}

// Windows refuses to rename over an existing file.
#[cfg(windows)]
fn replace(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) if to.exists() => {
            fs::remove_file(to)?;
            fs::rename(from, to)
        }
        Err(e) => Err(e),
    }
}
