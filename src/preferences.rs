//! Durable user preferences.
//!
//! The parameter model (without its file) is stored as one JSON blob under
//! [`PARAMS_KEY`], but only once the user has opted in; the opt-in itself is
//! stored under [`CONSENT_KEY`]. Loading merges the stored record over the
//! built-in defaults field by field, so records written by older or newer
//! versions still load: unknown keys are ignored, missing or malformed
//! fields keep their defaults.
//!
//! The substrate is a plain string get/set behind [`KeyValueStore`]. Two are
//! provided: [`MemoryStore`] and the directory-backed [`FileStore`].

use crate::error::ExtendError;
use crate::model::ParameterModel;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Key of the serialized parameter record.
pub const PARAMS_KEY: &str = "params";
/// Key of the persisted consent flag.
pub const CONSENT_KEY: &str = "allow";

/// Scoped string get/set. Last write wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ExtendError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ExtendError>;
}

/// In-process store; forgets everything at drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ExtendError> {
        let entries = self.entries.lock().map_err(|_| poisoned(key))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ExtendError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned(key))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

fn poisoned(key: &str) -> ExtendError {
    ExtendError::PreferenceStore {
        key: key.to_string(),
        detail: "store lock poisoned".to_string(),
    }
}

/// One file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store in the platform config directory.
    ///
    /// Default locations:
    /// - **Linux**: `~/.config/pdfextend/`
    /// - **macOS**: `~/Library/Application Support/pdfextend/`
    /// - **Windows**: `%APPDATA%\pdfextend\`
    ///
    /// Override by setting `PDFEXTEND_CONFIG_DIR`.
    pub fn default_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("PDFEXTEND_CONFIG_DIR") {
            return PathBuf::from(dir);
        }
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(std::env::temp_dir)
            .join("pdfextend")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ExtendError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ExtendError::PreferenceStore {
                key: key.to_string(),
                detail: e.to_string(),
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ExtendError> {
        let failed = |e: std::io::Error| ExtendError::PreferenceStore {
            key: key.to_string(),
            detail: e.to_string(),
        };
        std::fs::create_dir_all(&self.dir).map_err(failed)?;
        let path = self.path_for(key);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(failed)?;
        tmp.write_all(value.as_bytes()).map_err(failed)?;
        tmp.persist(&path).map_err(|e| failed(e.error))?;
        debug!("Wrote preference '{}' to {}", key, path.display());
        Ok(())
    }
}

/// Whether the user allowed preferences to be persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceConfig {
    pub consent: bool,
}

/// Saves and restores the parameter model through a [`KeyValueStore`].
pub struct PreferenceStore {
    store: Box<dyn KeyValueStore>,
}

impl PreferenceStore {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// A store that persists nothing across processes.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// The persisted consent flag. Unreadable storage counts as no consent.
    pub fn config(&self) -> PersistenceConfig {
        let consent = match self.store.get(CONSENT_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!("Could not read consent flag: {}", e);
                false
            }
        };
        PersistenceConfig { consent }
    }

    /// Record the user's opt-in.
    pub fn grant_consent(&self) -> Result<(), ExtendError> {
        self.store.set(CONSENT_KEY, "true")
    }

    /// Persist `model` if `config` carries consent.
    ///
    /// Returns `true` when the record was written.
    pub fn save(
        &self,
        config: &PersistenceConfig,
        model: &ParameterModel,
    ) -> Result<bool, ExtendError> {
        if !config.consent {
            debug!("Persistence not allowed; preferences not saved");
            return Ok(false);
        }
        let record = serde_json::to_string(model).map_err(|e| ExtendError::PreferenceStore {
            key: PARAMS_KEY.to_string(),
            detail: e.to_string(),
        })?;
        self.store.set(PARAMS_KEY, &record)?;
        Ok(true)
    }

    /// The default model with any stored fields merged over it.
    ///
    /// Never fails: unreadable or corrupt records yield the defaults. The
    /// returned model never carries a file.
    pub fn load(&self) -> ParameterModel {
        let stored = match self.store.get(PARAMS_KEY) {
            Ok(Some(s)) => s,
            Ok(None) => return ParameterModel::default(),
            Err(e) => {
                warn!("Could not read preferences: {}", e);
                return ParameterModel::default();
            }
        };
        match serde_json::from_str::<Value>(&stored) {
            Ok(Value::Object(record)) => merge_over_defaults(&record),
            Ok(_) | Err(_) => {
                warn!("Stored preferences are not a JSON object; using defaults");
                ParameterModel::default()
            }
        }
    }
}

/// Copy each known key from `record` onto the defaults, keeping it only if
/// the model still deserializes with it.
fn merge_over_defaults(record: &Map<String, Value>) -> ParameterModel {
    let defaults = ParameterModel::default();
    let mut merged = match serde_json::to_value(&defaults) {
        Ok(Value::Object(map)) => map,
        _ => return defaults,
    };

    let known: Vec<String> = merged.keys().cloned().collect();
    for key in known {
        let Some(value) = record.get(&key) else {
            continue;
        };
        let previous = merged.insert(key.clone(), value.clone());
        if serde_json::from_value::<ParameterModel>(Value::Object(merged.clone())).is_err() {
            warn!("Ignoring stored preference '{}': unexpected value {}", key, value);
            if let Some(previous) = previous {
                merged.insert(key, previous);
            }
        }
    }

    serde_json::from_value(Value::Object(merged)).unwrap_or(defaults)
}
