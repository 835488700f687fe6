//! Shared calibration model registry with JSON persistence.
//!
//! Readers get `Arc` handles to immutable models. Writers replace whole
//! entries under the write lock; a model is never modified in place.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use super::types::{CalibrationKey, CalibrationModel, CalibrationResult};

/// Process-wide store of calibration models keyed by `reference|target|condition`.
#[derive(Debug, Default)]
pub struct CalibrationRegistry {
    models: RwLock<HashMap<String, Arc<CalibrationModel>>>,
}

impl CalibrationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a JSON file.
    ///
    /// A missing file yields an empty registry.
    pub fn load(path: &Path) -> CalibrationResult<Self> {
        if !path.exists() {
            tracing::debug!("No calibration file at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let stored: BTreeMap<String, CalibrationModel> = serde_json::from_str(&content)?;

        let models: HashMap<String, Arc<CalibrationModel>> = stored
            .into_values()
            .map(|model| (model.id(), Arc::new(model)))
            .collect();

        tracing::info!(
            "Loaded {} calibration(s) from {}",
            models.len(),
            path.display()
        );

        Ok(Self {
            models: RwLock::new(models),
        })
    }

    /// Persist the registry to a JSON file.
    pub fn save(&self, path: &Path) -> CalibrationResult<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let snapshot = self.snapshot();
        let json = serde_json::to_string_pretty(&snapshot)?;

        // Write atomically via temp file
        let temp_file = path.with_extension("json.tmp");
        fs::write(&temp_file, &json)?;
        fs::rename(&temp_file, path)?;

        tracing::debug!("Saved {} calibration(s) to {}", snapshot.len(), path.display());
        Ok(())
    }

    /// Get a model by key.
    pub fn get(&self, key: &CalibrationKey) -> Option<Arc<CalibrationModel>> {
        self.get_by_id(&key.id())
    }

    /// Get a model by its `reference|target|condition` id.
    pub fn get_by_id(&self, id: &str) -> Option<Arc<CalibrationModel>> {
        self.models.read().get(id).cloned()
    }

    /// Insert a model, returning the one it replaced.
    pub fn put(&self, model: CalibrationModel) -> Option<Arc<CalibrationModel>> {
        self.put_arc(Arc::new(model))
    }

    /// Insert a shared model, returning the one it replaced.
    pub fn put_arc(&self, model: Arc<CalibrationModel>) -> Option<Arc<CalibrationModel>> {
        self.models.write().insert(model.id(), model)
    }

    /// Remove a model.
    pub fn remove(&self, key: &CalibrationKey) -> Option<Arc<CalibrationModel>> {
        self.models.write().remove(&key.id())
    }

    /// Number of stored models.
    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }

    /// Sorted model ids.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.models.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Point-in-time copy of all models, ordered by id.
    pub fn snapshot(&self) -> BTreeMap<String, CalibrationModel> {
        self.models
            .read()
            .iter()
            .map(|(id, model)| (id.clone(), model.as_ref().clone()))
            .collect()
    }
}
