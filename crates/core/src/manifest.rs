use crate::error::{Result, SyncError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Asr,
    Wakeword,
    Vad,
    Tts,
    Nlp,
}

impl ModelType {
    pub const ALL: [ModelType; 5] = [
        ModelType::Asr,
        ModelType::Wakeword,
        ModelType::Vad,
        ModelType::Tts,
        ModelType::Nlp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Asr => "asr",
            ModelType::Wakeword => "wakeword",
            ModelType::Vad => "vad",
            ModelType::Tts => "tts",
            ModelType::Nlp => "nlp",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ModelType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown model type '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Huggingface,
    Github,
    Local,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Huggingface, Platform::Github, Platform::Local];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Huggingface => "huggingface",
            Platform::Github => "github",
            Platform::Local => "local",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a model's files live upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub platform: Platform,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub repository: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Source {
    pub fn branch(&self) -> &str {
        self.branch.as_deref().unwrap_or(DEFAULT_BRANCH)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileManifest {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

impl FileManifest {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }

    /// Maps a file entry to a path below the model directory. A leading `/`
    /// is dropped, matching how the entry is joined onto a download URL.
    /// Entries with `..`, `.`, a root or a drive prefix yield `None`.
    pub fn relative_path(file: &str) -> Option<PathBuf> {
        let path = Path::new(file.trim_start_matches('/'));
        let mut components = path.components().peekable();
        components.peek()?;
        components
            .all(|component| matches!(component, Component::Normal(_)))
            .then(|| path.to_path_buf())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelStatus {
    #[serde(default)]
    pub downloaded: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_date: Option<NaiveDate>,
    /// Required-file manifest as it stood at the last successful sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_files: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub model_type: ModelType,
    pub source: Source,
    pub local_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance: Option<Value>,
    #[serde(default)]
    pub files: FileManifest,
    #[serde(default)]
    pub status: ModelStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelRecord {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Declared size from `specs.size_mb`; zero when absent.
    pub fn size_mb(&self) -> f64 {
        self.specs
            .as_ref()
            .and_then(|specs| specs.get("size_mb"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }
}

/// Aggregate counters over `models`. Never edited by hand, see
/// [`Statistics::from_models`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub total_models: usize,
    #[serde(default)]
    pub by_type: BTreeMap<ModelType, usize>,
    #[serde(default)]
    pub by_source: BTreeMap<Platform, usize>,
    #[serde(default, serialize_with = "serialize_megabytes")]
    pub total_size_mb: f64,
    #[serde(default)]
    pub downloaded_models: usize,
    #[serde(default)]
    pub pending_models: usize,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::from_models(&[])
    }
}

impl Statistics {
    pub fn from_models(models: &[ModelRecord]) -> Self {
        let mut by_type: BTreeMap<ModelType, usize> =
            ModelType::ALL.into_iter().map(|t| (t, 0)).collect();
        let mut by_source: BTreeMap<Platform, usize> =
            Platform::ALL.into_iter().map(|p| (p, 0)).collect();
        let mut total_size_mb = 0.0;
        let mut downloaded_models = 0;

        for model in models {
            *by_type.entry(model.model_type).or_default() += 1;
            *by_source.entry(model.source.platform).or_default() += 1;
            total_size_mb += model.size_mb();
            if model.status.downloaded {
                downloaded_models += 1;
            }
        }

        Self {
            total_models: models.len(),
            by_type,
            by_source,
            total_size_mb,
            downloaded_models,
            pending_models: models.len() - downloaded_models,
        }
    }
}

/// Whole megabyte totals are written as integers so documents produced by
/// other tooling keep their exact bytes.
fn serialize_megabytes<S>(value: &f64, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if value.is_finite() && value.fract() == 0.0 && (0.0..=u64::MAX as f64).contains(value) {
        serializer.serialize_u64(*value as u64)
    } else {
        serializer.serialize_f64(*value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Downloaded,
    Pending,
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "downloaded" => Ok(StatusFilter::Downloaded),
            "pending" => Ok(StatusFilter::Pending),
            other => Err(format!(
                "unknown status '{}' (expected downloaded or pending)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelFilter {
    pub model_type: Option<ModelType>,
    pub status: Option<StatusFilter>,
}

impl ModelFilter {
    pub fn matches(&self, model: &ModelRecord) -> bool {
        let type_ok = self.model_type.map_or(true, |t| model.model_type == t);
        let status_ok = match self.status {
            None => true,
            Some(StatusFilter::Downloaded) => model.status.downloaded,
            Some(StatusFilter::Pending) => !model.status.downloaded,
        };
        type_ok && status_ok
    }
}

/// The catalog document. Top-level keys this crate does not model are kept
/// in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_types: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Value>,
    #[serde(default)]
    pub models: Vec<ModelRecord>,
    /// Derived data: whatever the file holds is ignored on read and
    /// rebuilt by [`Registry::recompute_statistics`].
    #[serde(default, skip_deserializing)]
    pub statistics: Statistics,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Registry {
    /// A fresh document with the standard type and source descriptions.
    pub fn empty() -> Self {
        Self {
            version: Some("1.0.0".to_string()),
            last_updated: None,
            description: Some("Global model registry for voice assistant models".to_string()),
            model_types: Some(json!({
                "asr": {"name": "Automatic Speech Recognition", "description": "Speech-to-text models"},
                "wakeword": {"name": "Wake Word Detection", "description": "Keyword spotting models"},
                "vad": {"name": "Voice Activity Detection", "description": "Speech presence detection models"},
                "tts": {"name": "Text-to-Speech", "description": "Speech synthesis models"},
                "nlp": {"name": "Natural Language Processing", "description": "Language understanding models"}
            })),
            sources: Some(json!({
                "huggingface": {"base_url": "https://huggingface.co", "api_url": "https://huggingface.co/api"},
                "github": {"base_url": "https://github.com", "raw_url": "https://raw.githubusercontent.com"},
                "local": {"base_path": "./models"}
            })),
            models: Vec::new(),
            statistics: Statistics::default(),
            extra: Map::new(),
        }
    }

    /// Document-level checks that serde cannot express.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = HashSet::new();
        for model in &self.models {
            if model.id.trim().is_empty() {
                return Err("model with empty id".to_string());
            }
            if !seen.insert(model.id.as_str()) {
                return Err(format!("duplicate model id '{}'", model.id));
            }
        }
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<&ModelRecord> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut ModelRecord> {
        self.models.iter_mut().find(|m| m.id == id)
    }

    pub fn get(&self, id: &str) -> Result<&ModelRecord> {
        self.find(id)
            .ok_or_else(|| SyncError::ModelNotFound(id.to_string()))
    }

    pub fn recompute_statistics(&mut self) {
        self.statistics = Statistics::from_models(&self.models);
    }

    pub fn filter(&self, filter: &ModelFilter) -> Vec<&ModelRecord> {
        self.models.iter().filter(|m| filter.matches(m)).collect()
    }

    /// Adds a record. An existing entry with the same id or the same
    /// upstream repository is replaced in place when `replace` is set.
    pub fn register(&mut self, record: ModelRecord, replace: bool) -> Result<()> {
        let existing = self.models.iter().position(|m| {
            m.id == record.id
                || (m.source.platform == record.source.platform
                    && !m.source.repository.is_empty()
                    && m.source.author == record.source.author
                    && m.source.repository == record.source.repository)
        });

        match existing {
            Some(_) if !replace => Err(SyncError::DuplicateModel(record.id)),
            Some(pos) => {
                self.models[pos] = record;
                self.recompute_statistics();
                Ok(())
            }
            None => {
                self.models.push(record);
                self.recompute_statistics();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_entries_stay_below_the_model_directory() {
        assert_eq!(
            FileManifest::relative_path("onnx/encoder.onnx"),
            Some(PathBuf::from("onnx/encoder.onnx"))
        );
        assert_eq!(
            FileManifest::relative_path("/onnx/encoder.onnx"),
            Some(PathBuf::from("onnx/encoder.onnx"))
        );
        assert_eq!(FileManifest::relative_path("../../.bashrc"), None);
        assert_eq!(FileManifest::relative_path("onnx/../../escape"), None);
        assert_eq!(FileManifest::relative_path("./config.json"), None);
        assert_eq!(FileManifest::relative_path(""), None);
        assert_eq!(FileManifest::relative_path("/"), None);
    }

    const DOC: &str = r#"{
        "version": "1.0.0",
        "last_updated": "2024-05-01",
        "owner": "voice-team",
        "models": [
            {
                "id": "whisper-tiny",
                "name": "Whisper Tiny",
                "type": "asr",
                "source": {"platform": "huggingface", "author": "Xenova", "repository": "whisper-tiny"},
                "local_path": "huggingface/Xenova/whisper-tiny",
                "specs": {"size_mb": 39},
                "files": {"required": ["config.json", "tokenizer.json"], "optional": ["vocab.json"]},
                "status": {"downloaded": true, "verified": true, "download_date": "2024-05-01"},
                "license": "apache-2.0"
            },
            {
                "id": "hey-jarvis",
                "type": "wakeword",
                "source": {"platform": "github", "author": "dscripka", "repository": "openWakeWord", "release": "v0.5.1"},
                "local_path": "github/openWakeWord",
                "specs": {"size_mb": 1.6},
                "files": {"required": ["hey_jarvis_v0.1.onnx"]},
                "status": {"downloaded": false, "verified": false}
            }
        ],
        "statistics": {"total_models": 99}
    }"#;

    fn registry() -> Registry {
        serde_json::from_str(DOC).unwrap()
    }

    #[test]
    fn statistics_are_derived_from_models() {
        let mut reg = registry();
        reg.recompute_statistics();
        let stats = &reg.statistics;
        assert_eq!(stats.total_models, 2);
        assert_eq!(stats.by_type[&ModelType::Asr], 1);
        assert_eq!(stats.by_type[&ModelType::Wakeword], 1);
        assert_eq!(stats.by_type[&ModelType::Tts], 0);
        assert_eq!(stats.by_source[&Platform::Github], 1);
        assert_eq!(stats.by_source[&Platform::Local], 0);
        assert!((stats.total_size_mb - 40.6).abs() < 1e-9);
        assert_eq!(stats.downloaded_models, 1);
        assert_eq!(stats.pending_models, 1);
        assert_eq!(
            stats.downloaded_models + stats.pending_models,
            reg.models.len()
        );
    }

    #[test]
    fn stored_statistics_never_block_a_load() {
        let doc = DOC.replace(
            r#""statistics": {"total_models": 99}"#,
            r#""statistics": {"total_size_mb": 40.6, "by_type": {"vision": 3}, "pending_models": -1}"#,
        );
        let mut reg: Registry = serde_json::from_str(&doc).unwrap();
        reg.recompute_statistics();
        assert_eq!(reg.statistics.total_models, 2);
        assert!((reg.statistics.total_size_mb - 40.6).abs() < 1e-9);
    }

    #[test]
    fn whole_megabyte_totals_serialize_as_integers() {
        let mut reg = registry();
        reg.models.truncate(1);
        reg.recompute_statistics();
        let out = serde_json::to_value(&reg).unwrap();
        assert_eq!(out["statistics"]["total_size_mb"], serde_json::json!(39));
        assert!(out["statistics"]["total_size_mb"].is_u64());

        let fractional = serde_json::to_value(Statistics::from_models(&registry().models)).unwrap();
        let total = fractional["total_size_mb"].as_f64().unwrap();
        assert!(!fractional["total_size_mb"].is_u64());
        assert!((total - 40.6).abs() < 1e-9);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut reg = registry();
        reg.recompute_statistics();
        let first = reg.statistics.clone();
        reg.recompute_statistics();
        assert_eq!(first, reg.statistics);
    }

    #[test]
    fn statistics_serialize_every_type_in_order() {
        let json = serde_json::to_value(Statistics::default()).unwrap();
        let keys: Vec<_> = json["by_type"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["asr", "wakeword", "vad", "tts", "nlp"]);
    }

    #[test]
    fn unknown_keys_survive_a_round_trip() {
        let reg = registry();
        let out = serde_json::to_value(&reg).unwrap();
        assert_eq!(out["owner"], "voice-team");
        assert_eq!(out["models"][0]["license"], "apache-2.0");
    }

    #[test]
    fn unknown_model_type_is_rejected() {
        let doc = DOC.replace("\"wakeword\"", "\"vision\"");
        assert!(serde_json::from_str::<Registry>(&doc).is_err());
    }

    #[test]
    fn unknown_platform_is_rejected() {
        let doc = DOC.replace("\"github\"", "\"gitlab\"");
        assert!(serde_json::from_str::<Registry>(&doc).is_err());
    }

    #[test]
    fn duplicate_ids_fail_validation() {
        let mut reg = registry();
        let dup = reg.models[0].clone();
        reg.models.push(dup);
        assert!(reg.validate().unwrap_err().contains("whisper-tiny"));
    }

    #[test]
    fn branch_defaults_to_main() {
        let reg = registry();
        assert_eq!(reg.models[0].source.branch(), "main");
    }

    #[test]
    fn filter_by_type_and_status() {
        let reg = registry();
        let pending = ModelFilter {
            status: Some(StatusFilter::Pending),
            ..Default::default()
        };
        let ids: Vec<_> = reg.filter(&pending).iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["hey-jarvis"]);

        let asr_downloaded = ModelFilter {
            model_type: Some(ModelType::Asr),
            status: Some(StatusFilter::Downloaded),
        };
        assert_eq!(reg.filter(&asr_downloaded).len(), 1);

        let tts = ModelFilter {
            model_type: Some(ModelType::Tts),
            status: None,
        };
        assert!(reg.filter(&tts).is_empty());
    }

    #[test]
    fn register_rejects_duplicates_unless_replacing() {
        let mut reg = registry();
        let mut again = reg.models[0].clone();
        again.id = "whisper-tiny-copy".to_string();

        let err = reg.register(again.clone(), false).unwrap_err();
        assert!(matches!(err, SyncError::DuplicateModel(_)));

        reg.register(again, true).unwrap();
        assert_eq!(reg.models.len(), 2);
        assert_eq!(reg.models[0].id, "whisper-tiny-copy");
    }

    #[test]
    fn get_reports_unknown_ids() {
        let reg = registry();
        assert!(matches!(
            reg.get("nope"),
            Err(SyncError::ModelNotFound(id)) if id == "nope"
        ));
    }
}
