use modelsync_core::manifest::{FileManifest, ModelRecord, Registry};
use modelsync_core::Result;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub model_id: String,
    pub missing: Vec<String>,
}

impl Verification {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Checks the disk only. The registry's own `downloaded` flag is neither
/// consulted nor changed. Entries that point outside the model directory
/// count as missing.
pub fn verify_record(model: &ModelRecord, models_dir: &Path) -> Verification {
    let local = models_dir.join(&model.local_path);
    let missing = model
        .files
        .required
        .iter()
        .filter(|file| match FileManifest::relative_path(file) {
            Some(relative) => !local.join(relative).is_file(),
            None => true,
        })
        .cloned()
        .collect();

    Verification {
        model_id: model.id.clone(),
        missing,
    }
}

pub fn verify_model(registry: &Registry, models_dir: &Path, model_id: &str) -> Result<Verification> {
    Ok(verify_record(registry.get(model_id)?, models_dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;
    use modelsync_core::SyncError;
    use std::fs;

    #[test]
    fn reports_missing_required_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = record("whisper-tiny", &["config.json", "onnx/encoder.onnx"], &["extra.json"]);
        model.status.downloaded = true;
        let local = dir.path().join(&model.local_path);
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join("config.json"), "{}").unwrap();

        let result = verify_record(&model, dir.path());
        assert!(!result.is_complete());
        assert_eq!(result.missing, ["onnx/encoder.onnx"]);

        fs::create_dir_all(local.join("onnx")).unwrap();
        fs::write(local.join("onnx/encoder.onnx"), "bytes").unwrap();
        assert!(verify_record(&model, dir.path()).is_complete());
    }

    #[test]
    fn entries_outside_the_model_directory_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let model = record("m", &["/config.json", "../outside.txt"], &[]);
        let local = dir.path().join(&model.local_path);
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join("config.json"), "{}").unwrap();
        fs::write(local.parent().unwrap().join("outside.txt"), "x").unwrap();

        let result = verify_record(&model, dir.path());
        assert_eq!(result.missing, ["../outside.txt"]);
    }

    #[test]
    fn unknown_model_is_an_error() {
        let registry = Registry::empty();
        let err = verify_model(&registry, Path::new("models"), "ghost").unwrap_err();
        assert!(matches!(err, SyncError::ModelNotFound(_)));
    }
}
