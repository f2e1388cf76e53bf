use crate::fetcher::{HttpFetcher, DEFAULT_TIMEOUT};
use crate::fleet::DEFAULT_FLEET_DELAY;
use crate::orchestrator::DEFAULT_WORKERS;
use crate::registry::RegistryStore;
use crate::resolver::{Hosts, UrlResolver};
use modelsync_core::{Result, SyncError};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Optional on-disk configuration. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SettingsFile {
    registry: Option<PathBuf>,
    models_dir: Option<PathBuf>,
    workers: Option<usize>,
    hf_token: Option<String>,
    fleet_delay_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    release_repositories: Option<Vec<String>>,
    hosts: Option<Hosts>,
}

#[derive(Clone)]
pub struct Settings {
    pub registry_path: PathBuf,
    pub models_dir: PathBuf,
    pub workers: usize,
    pub hf_token: Option<String>,
    pub hosts: Hosts,
    pub release_repositories: Vec<String>,
    pub fleet_delay: Duration,
    pub request_timeout: Duration,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("registry_path", &self.registry_path)
            .field("models_dir", &self.models_dir)
            .field("workers", &self.workers)
            .field("hf_token", &self.hf_token.as_ref().map(|_| "***"))
            .field("hosts", &self.hosts)
            .field("release_repositories", &self.release_repositories)
            .field("fleet_delay", &self.fleet_delay)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from("models/global_registry.json"),
            models_dir: PathBuf::from("models"),
            workers: DEFAULT_WORKERS,
            hf_token: None,
            hosts: Hosts::default(),
            release_repositories: vec!["openWakeWord".to_string()],
            fleet_delay: DEFAULT_FLEET_DELAY,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Settings {
    /// Defaults, then the config file, then the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with an injectable environment.
    pub fn load_with<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        let config_path = env("MODELSYNC_CONFIG").map(PathBuf::from).or_else(|| {
            dirs::config_dir().map(|dir| dir.join("modelsync").join("config.toml"))
        });
        if let Some(path) = config_path {
            if path.exists() {
                settings.apply_file(&path)?;
            }
        }

        settings.apply_env(env)?;
        Ok(settings)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)?;
        let file: SettingsFile = toml::from_str(&content)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        log::debug!("Applying settings from {}", path.display());

        if let Some(registry) = file.registry {
            self.registry_path = registry;
        }
        if let Some(models_dir) = file.models_dir {
            self.models_dir = models_dir;
        }
        if let Some(workers) = file.workers {
            self.workers = workers;
        }
        if file.hf_token.is_some() {
            self.hf_token = file.hf_token;
        }
        if let Some(ms) = file.fleet_delay_ms {
            self.fleet_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(repos) = file.release_repositories {
            self.release_repositories = repos;
        }
        if let Some(hosts) = file.hosts {
            self.hosts = hosts;
        }
        Ok(())
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(registry) = env("MODELSYNC_REGISTRY") {
            self.registry_path = PathBuf::from(registry);
        }
        if let Some(models_dir) = env("MODELSYNC_MODELS_DIR") {
            self.models_dir = PathBuf::from(models_dir);
        }
        if let Some(workers) = env("MODELSYNC_WORKERS") {
            self.workers = workers
                .parse()
                .map_err(|_| SyncError::Config(format!("MODELSYNC_WORKERS: '{}' is not a number", workers)))?;
        }
        if let Some(token) = env("HF_TOKEN").filter(|t| !t.is_empty()) {
            self.hf_token = Some(token);
        }
        if let Some(endpoint) = env("HF_ENDPOINT") {
            self.hosts.huggingface = endpoint;
        }
        Ok(())
    }

    pub fn store(&self) -> RegistryStore {
        RegistryStore::new(&self.registry_path)
    }

    pub fn resolver(&self) -> UrlResolver {
        UrlResolver::new(self.hosts.clone(), self.release_repositories.clone())
    }

    /// HTTP fetcher carrying the Hugging Face token, if any.
    pub fn fetcher(&self) -> Result<HttpFetcher> {
        let fetcher = HttpFetcher::new(self.request_timeout)?;
        match &self.hf_token {
            Some(token) => fetcher.with_token(token.clone(), &self.hosts.huggingface),
            None => Ok(fetcher),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const NO_CONFIG: (&str, &str) = ("MODELSYNC_CONFIG", "/nonexistent/modelsync.toml");

    #[test]
    fn defaults_match_the_documented_layout() {
        let settings = Settings::load_with(env(&[NO_CONFIG])).unwrap();
        assert_eq!(settings.registry_path, PathBuf::from("models/global_registry.json"));
        assert_eq!(settings.models_dir, PathBuf::from("models"));
        assert_eq!(settings.workers, 3);
        assert_eq!(settings.fleet_delay, Duration::from_secs(1));
        assert_eq!(settings.request_timeout, Duration::from_secs(30));
        assert!(settings.hf_token.is_none());
    }

    #[test]
    fn file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
registry = "/srv/registry.json"
workers = 8
fleet_delay_ms = 250
release_repositories = ["openWakeWord", "piper-voices"]

[hosts]
huggingface = "https://hf-mirror.example"
"#,
        )
        .unwrap();
        let path_str = path.to_string_lossy().into_owned();

        let settings = Settings::load_with(env(&[
            ("MODELSYNC_CONFIG", path_str.as_str()),
            ("MODELSYNC_WORKERS", "2"),
            ("HF_TOKEN", "hf_abc"),
        ]))
        .unwrap();

        assert_eq!(settings.registry_path, PathBuf::from("/srv/registry.json"));
        assert_eq!(settings.workers, 2);
        assert_eq!(settings.fleet_delay, Duration::from_millis(250));
        assert_eq!(settings.hosts.huggingface, "https://hf-mirror.example");
        assert_eq!(settings.hosts.github, "https://github.com");
        assert_eq!(settings.release_repositories.len(), 2);
        assert_eq!(settings.hf_token.as_deref(), Some("hf_abc"));
        assert!(!format!("{:?}", settings).contains("hf_abc"));
    }

    #[test]
    fn bad_values_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "wrokers = 4\n").unwrap();
        let path_str = path.to_string_lossy().into_owned();
        assert!(matches!(
            Settings::load_with(env(&[("MODELSYNC_CONFIG", path_str.as_str())])),
            Err(SyncError::Config(_))
        ));

        assert!(matches!(
            Settings::load_with(env(&[NO_CONFIG, ("MODELSYNC_WORKERS", "many")])),
            Err(SyncError::Config(_))
        ));
    }
}
