//! Process-wide model cache, created once at startup and shared through router state.
//!
//! Loads are lazy and not single-flight: the map lock is released while an artifact is
//! read, so concurrent first requests may each load a copy. The last insert wins and
//! every caller keeps the handle it loaded.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::LoadError;
use crate::model::{self, ModelHandle};

pub const DEFAULT_KEY: &str = "default";

pub struct ModelRegistry {
    model_dir: PathBuf,
    default_model_file: String,
    models: RwLock<HashMap<String, ModelHandle>>,
}

impl ModelRegistry {
    pub fn new(model_dir: impl Into<PathBuf>, default_model_file: impl Into<String>) -> Self {
        Self { model_dir: model_dir.into(), default_model_file: default_model_file.into(), models: RwLock::new(HashMap::new()) }
    }

    pub fn model_dir(&self) -> &Path { &self.model_dir }

    pub fn artifact_path(&self, key: &str) -> PathBuf {
        if key == DEFAULT_KEY { self.model_dir.join(&self.default_model_file) } else { self.model_dir.join(key) }
    }

    /// Cached handle for `key`, loading it from disk on a miss.
    ///
    /// `Ok(None)` means no artifact exists yet; a present but unreadable artifact is an error.
    pub fn get_or_load(&self, key: &str) -> Result<Option<ModelHandle>, LoadError> {
        if let Some(handle) = self.models.read().get(key) { return Ok(Some(handle.clone())); }
        let path = self.artifact_path(key);
        if !path.exists() {
            warn!(model=%key, path=%path.display(), "model_artifact_missing");
            return Ok(None);
        }
        info!(model=%key, path=%path.display(), "model_load_started");
        let start = Instant::now();
        let handle = match model::load_model(&path) {
            Ok(h) => h,
            Err(e) => { error!(model=%key, path=%path.display(), error=%e, "model_load_failed"); return Err(e); }
        };
        info!(model=%key, elapsed_ms=start.elapsed().as_millis() as u64, input_width=?handle.input_width(), output_width=?handle.output_width(), "model_loaded");
        self.models.write().insert(key.to_string(), handle.clone());
        Ok(Some(handle))
    }

    /// Startup load of the default model. Never fails; the service stays up for `/health`.
    pub fn preload(&self) {
        match self.get_or_load(DEFAULT_KEY) {
            Ok(Some(_)) => info!("default_model_preloaded"),
            Ok(None) => warn!(path=%self.artifact_path(DEFAULT_KEY).display(), "default model not found, predictions will fail until it is present"),
            Err(e) => error!(error=%e, "default_model_preload_failed"),
        }
    }

    pub fn contains(&self, key: &str) -> bool { self.models.read().contains_key(key) }
    pub fn len(&self) -> usize { self.models.read().len() }
    pub fn is_empty(&self) -> bool { self.models.read().is_empty() }

    pub fn clear(&self) {
        let n = { let mut w = self.models.write(); let n = w.len(); w.clear(); n };
        info!(unloaded=n, "models_unloaded");
    }

    /// Entry names under the model directory, sorted. An absent directory lists as empty.
    pub fn list_artifacts(&self) -> std::io::Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.model_dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e),
        };
        let mut names = entries
            .map(|e| e.map(|e| e.file_name().to_string_lossy().into_owned()))
            .collect::<std::io::Result<Vec<_>>>()?;
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Activation, DenseLayer, DenseModel};
    use std::sync::Arc;

    fn write_model(dir: &Path, name: &str) {
        let m = DenseModel::new(2, vec![DenseLayer { weights: vec![vec![1.0], vec![1.0]], bias: vec![0.0], activation: Activation::Linear }]).unwrap();
        m.save(&dir.join(name)).unwrap();
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let reg = ModelRegistry::new(dir.path(), "model.json");
        assert!(reg.get_or_load(DEFAULT_KEY).unwrap().is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn second_lookup_returns_cached_handle() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "model.json");
        let reg = ModelRegistry::new(dir.path(), "model.json");
        let a = reg.get_or_load(DEFAULT_KEY).unwrap().unwrap();
        let b = reg.get_or_load(DEFAULT_KEY).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn cached_handle_survives_artifact_removal() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "model.json");
        let reg = ModelRegistry::new(dir.path(), "model.json");
        reg.preload();
        assert!(reg.contains(DEFAULT_KEY));
        std::fs::remove_file(dir.path().join("model.json")).unwrap();
        assert!(reg.get_or_load(DEFAULT_KEY).unwrap().is_some());
    }

    #[test]
    fn artifact_appearing_later_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let reg = ModelRegistry::new(dir.path(), "model.json");
        reg.preload();
        assert!(!reg.contains(DEFAULT_KEY));
        write_model(dir.path(), "model.json");
        assert!(reg.get_or_load(DEFAULT_KEY).unwrap().is_some());
    }

    #[test]
    fn corrupt_artifact_is_a_load_error_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("model.json"), "garbage").unwrap();
        let reg = ModelRegistry::new(dir.path(), "model.json");
        assert!(reg.get_or_load(DEFAULT_KEY).is_err());
        assert!(reg.is_empty());
        reg.preload();
    }

    #[test]
    fn clear_drops_entries() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "model.json");
        let reg = ModelRegistry::new(dir.path(), "model.json");
        reg.preload();
        reg.clear();
        assert!(reg.is_empty());
    }

    #[test]
    fn non_default_keys_resolve_inside_model_dir() {
        let reg = ModelRegistry::new("/models", "model.json");
        assert_eq!(reg.artifact_path(DEFAULT_KEY), PathBuf::from("/models/model.json"));
        assert_eq!(reg.artifact_path("other.json"), PathBuf::from("/models/other.json"));
    }

    #[test]
    fn list_artifacts_sorted_and_empty_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), "b.json");
        write_model(dir.path(), "a.json");
        std::fs::create_dir(dir.path().join("saved_model")).unwrap();
        let reg = ModelRegistry::new(dir.path(), "model.json");
        assert_eq!(reg.list_artifacts().unwrap(), vec!["a.json", "b.json", "saved_model"]);
        let gone = ModelRegistry::new(dir.path().join("nope"), "model.json");
        assert!(gone.list_artifacts().unwrap().is_empty());
    }
}
