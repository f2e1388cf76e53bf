use modelsync_core::manifest::{Platform, Source};
use modelsync_core::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Base URLs for the supported platforms, without trailing slashes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hosts {
    pub huggingface: String,
    pub github: String,
    pub github_raw: String,
}

impl Default for Hosts {
    fn default() -> Self {
        Self {
            huggingface: "https://huggingface.co".to_string(),
            github: "https://github.com".to_string(),
            github_raw: "https://raw.githubusercontent.com".to_string(),
        }
    }
}

/// Maps a model source plus a relative file path to a download URL.
/// No I/O happens here.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    hosts: Hosts,
    release_repositories: Vec<String>,
}

impl Default for UrlResolver {
    fn default() -> Self {
        Self::new(Hosts::default(), vec!["openWakeWord".to_string()])
    }
}

impl UrlResolver {
    /// `release_repositories` names the GitHub repositories that ship their
    /// artifacts as release assets rather than tree content.
    pub fn new(hosts: Hosts, release_repositories: Vec<String>) -> Self {
        let hosts = Hosts {
            huggingface: hosts.huggingface.trim_end_matches('/').to_string(),
            github: hosts.github.trim_end_matches('/').to_string(),
            github_raw: hosts.github_raw.trim_end_matches('/').to_string(),
        };
        Self {
            hosts,
            release_repositories,
        }
    }

    pub fn hosts(&self) -> &Hosts {
        &self.hosts
    }

    pub fn resolve(&self, source: &Source, file: &str) -> Result<String> {
        let file = file.trim_start_matches('/');
        match source.platform {
            Platform::Huggingface => Ok(format!(
                "{}/{}/{}/resolve/{}/{}",
                self.hosts.huggingface,
                source.author,
                source.repository,
                source.branch(),
                file
            )),
            Platform::Github if self.is_release_repository(&source.repository) => {
                match source.release.as_deref() {
                    Some(tag) if tag != "latest" => {
                        let asset = Path::new(file)
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| file.to_string());
                        Ok(format!(
                            "{}/{}/{}/releases/download/{}/{}",
                            self.hosts.github, source.author, source.repository, tag, asset
                        ))
                    }
                    _ => Ok(format!(
                        "{}/{}/{}/raw/{}/models/{}",
                        self.hosts.github,
                        source.author,
                        source.repository,
                        source.branch(),
                        file
                    )),
                }
            }
            Platform::Github => Ok(format!(
                "{}/{}/{}/{}/{}",
                self.hosts.github_raw,
                source.author,
                source.repository,
                source.branch(),
                file
            )),
            Platform::Local => Err(SyncError::UnsupportedPlatform(
                source.platform.to_string(),
            )),
        }
    }

    fn is_release_repository(&self, repository: &str) -> bool {
        self.release_repositories.iter().any(|r| r == repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn source(platform: Platform, author: &str, repository: &str) -> Source {
        Source {
            platform,
            author: author.to_string(),
            repository: repository.to_string(),
            branch: None,
            release: None,
            url: None,
            extra: Map::new(),
        }
    }

    #[test]
    fn huggingface_defaults_to_main() {
        let resolver = UrlResolver::default();
        let src = source(Platform::Huggingface, "Xenova", "whisper-tiny");
        for file in ["config.json", "onnx/encoder_model.onnx"] {
            assert_eq!(
                resolver.resolve(&src, file).unwrap(),
                format!("https://huggingface.co/Xenova/whisper-tiny/resolve/main/{}", file)
            );
        }
    }

    #[test]
    fn huggingface_honours_branch() {
        let resolver = UrlResolver::default();
        let mut src = source(Platform::Huggingface, "Xenova", "whisper-tiny");
        src.branch = Some("refs/pr/3".to_string());
        assert_eq!(
            resolver.resolve(&src, "config.json").unwrap(),
            "https://huggingface.co/Xenova/whisper-tiny/resolve/refs/pr/3/config.json"
        );
    }

    #[test]
    fn github_uses_raw_content() {
        let resolver = UrlResolver::default();
        let mut src = source(Platform::Github, "snakers4", "silero-vad");
        assert_eq!(
            resolver.resolve(&src, "files/silero_vad.onnx").unwrap(),
            "https://raw.githubusercontent.com/snakers4/silero-vad/main/files/silero_vad.onnx"
        );
        src.branch = Some("v4.0".to_string());
        assert_eq!(
            resolver.resolve(&src, "files/silero_vad.onnx").unwrap(),
            "https://raw.githubusercontent.com/snakers4/silero-vad/v4.0/files/silero_vad.onnx"
        );
    }

    #[test]
    fn release_family_targets_release_assets() {
        let resolver = UrlResolver::default();
        let mut src = source(Platform::Github, "dscripka", "openWakeWord");
        src.release = Some("v0.5.1".to_string());
        assert_eq!(
            resolver.resolve(&src, "models/hey_jarvis_v0.1.onnx").unwrap(),
            "https://github.com/dscripka/openWakeWord/releases/download/v0.5.1/hey_jarvis_v0.1.onnx"
        );
    }

    #[test]
    fn release_family_falls_back_to_tree_models_dir() {
        let resolver = UrlResolver::default();
        let mut src = source(Platform::Github, "dscripka", "openWakeWord");
        assert_eq!(
            resolver.resolve(&src, "alexa_v0.1.onnx").unwrap(),
            "https://github.com/dscripka/openWakeWord/raw/main/models/alexa_v0.1.onnx"
        );
        src.release = Some("latest".to_string());
        assert_eq!(
            resolver.resolve(&src, "alexa_v0.1.onnx").unwrap(),
            "https://github.com/dscripka/openWakeWord/raw/main/models/alexa_v0.1.onnx"
        );
    }

    #[test]
    fn local_platform_is_unsupported() {
        let resolver = UrlResolver::default();
        let src = source(Platform::Local, "", "");
        assert!(matches!(
            resolver.resolve(&src, "model.onnx"),
            Err(SyncError::UnsupportedPlatform(p)) if p == "local"
        ));
    }

    #[test]
    fn custom_hosts_lose_trailing_slashes() {
        let hosts = Hosts {
            huggingface: "http://127.0.0.1:9000/".to_string(),
            ..Hosts::default()
        };
        let resolver = UrlResolver::new(hosts, vec![]);
        let src = source(Platform::Huggingface, "a", "b");
        assert_eq!(
            resolver.resolve(&src, "c.json").unwrap(),
            "http://127.0.0.1:9000/a/b/resolve/main/c.json"
        );
    }
}
