//! Building catalog entries for Hugging Face repositories.

use crate::error::{Result, SyncError};
use crate::manifest::{FileManifest, ModelRecord, ModelStatus, ModelType, Platform, Source};
use serde_json::Map;

pub const HUGGINGFACE_HOST: &str = "https://huggingface.co";

/// The standard ONNX export layout.
pub const STANDARD_REQUIRED_FILES: &[&str] = &[
    "onnx/encoder_model.onnx",
    "onnx/decoder_model_merged.onnx",
    "config.json",
    "tokenizer.json",
    "vocab.json",
    "merges.txt",
    "preprocessor_config.json",
    "generation_config.json",
];

pub const STANDARD_OPTIONAL_FILES: &[&str] = &[
    "onnx/encoder_model_quantized.onnx",
    "onnx/decoder_model_merged_quantized.onnx",
    "model_info.json",
    "normalizer.json",
    "added_tokens.json",
    "special_tokens_map.json",
    "tokenizer_config.json",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubReference {
    pub owner: String,
    pub repository: String,
}

impl HubReference {
    /// Accepts `owner/model` or a `https://huggingface.co/owner/model[/...]` URL.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let path = if input.starts_with("http://") || input.starts_with("https://") {
            let without_scheme = input.split_once("://").map(|(_, rest)| rest).unwrap_or(input);
            match without_scheme.split_once('/') {
                Some((_, path)) => path,
                None => return Err(SyncError::InvalidSource(input.to_string())),
            }
        } else {
            input
        };

        let parts: Vec<&str> = path.trim_matches('/').split('/').collect();
        let valid_len = if input.contains("://") {
            parts.len() >= 2
        } else {
            parts.len() == 2
        };
        if !valid_len || parts[0].is_empty() || parts[1].is_empty() {
            return Err(SyncError::InvalidSource(input.to_string()));
        }

        Ok(Self {
            owner: parts[0].to_string(),
            repository: parts[1].to_string(),
        })
    }

    /// Ids are the repository name with dots flattened, e.g.
    /// `whisper-tiny.en` becomes `whisper-tiny-en`.
    pub fn model_id(&self) -> String {
        self.repository.replace('.', "-")
    }

    pub fn local_path(&self) -> String {
        format!("huggingface/{}/{}", self.owner, self.repository)
    }

    pub fn page_url(&self) -> String {
        format!("{}/{}/{}", HUGGINGFACE_HOST, self.owner, self.repository)
    }

    /// A pending record for this repository. Empty file lists fall back to
    /// the standard layout.
    pub fn to_record(
        &self,
        model_type: ModelType,
        required: Vec<String>,
        optional: Vec<String>,
    ) -> ModelRecord {
        let required = if required.is_empty() {
            STANDARD_REQUIRED_FILES.iter().map(|f| f.to_string()).collect()
        } else {
            required
        };
        let optional = if optional.is_empty() {
            STANDARD_OPTIONAL_FILES.iter().map(|f| f.to_string()).collect()
        } else {
            optional
        };

        ModelRecord {
            id: self.model_id(),
            name: Some(self.repository.clone()),
            model_type,
            source: Source {
                platform: Platform::Huggingface,
                author: self.owner.clone(),
                repository: self.repository.clone(),
                branch: None,
                release: None,
                url: Some(self.page_url()),
                extra: Map::new(),
            },
            local_path: self.local_path(),
            description: None,
            features: None,
            specs: None,
            performance: None,
            files: FileManifest { required, optional },
            status: ModelStatus::default(),
            tags: Vec::new(),
            extra: Map::new(),
        }
    }
}
