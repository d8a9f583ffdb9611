//! Ontoread Storage
//!
//! The persistence adapter: three independent JSON records under fixed keys.
//!
//! ```text
//!   ontology_reading_ontology   current graph (validated before every write)
//!   ontology_reading_history    newest-first log, capped at 100 items
//!   ontology_reading_settings   generator settings
//! ```
//!
//! No operation raises past this boundary. Read and parse failures come back
//! as `None` or an empty default, write failures as `false`; both are logged.

pub mod persistence;
pub mod settings;


use chrono::{DateTime, Utc};
use ontoread_core::{generate_id, validate, ChangeSet, Ontology};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub use persistence::{FileStore, KeyValueStore, MemoryStore};
pub use settings::Settings;

pub const GRAPH_KEY: &str = "ontology_reading_ontology";
pub const HISTORY_KEY: &str = "ontology_reading_history";
pub const SETTINGS_KEY: &str = "ontology_reading_settings";

/// Maximum number of history items kept.
pub const MAX_HISTORY: usize = 100;

pub const ENV_DATA_DIR: &str = "ONTOREAD_DATA_DIR";

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Build,
    Update,
}

impl std::fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryKind::Build => f.write_str("build"),
            HistoryKind::Update => f.write_str("update"),
        }
    }
}

/// One processed submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub input: String,
    /// Formatted reply shown to the user.
    pub output: String,
    pub ontology_version: u64,
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeSet>,
}

impl HistoryItem {
    pub fn new(
        kind: HistoryKind,
        input: impl Into<String>,
        output: impl Into<String>,
        ontology_version: u64,
    ) -> Self {
        Self {
            id: generate_id("history"),
            timestamp: Utc::now(),
            input: input.into(),
            output: output.into(),
            ontology_version,
            kind,
            changes: None,
        }
    }

    pub fn with_changes(mut self, changes: ChangeSet) -> Self {
        self.changes = Some(changes);
        self
    }
}

/// Everything in the store, as written by `backup export`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    #[serde(default)]
    pub ontology: Option<Ontology>,
    #[serde(default)]
    pub history: Option<Vec<HistoryItem>>,
    #[serde(default)]
    pub settings: Option<Settings>,
    pub export_date: DateTime<Utc>,
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding one JSON file per record.
    pub data_dir: PathBuf,
    pub history_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./.ontoread"),
            history_limit: MAX_HISTORY,
        }
    }
}

impl StoreConfig {
    /// Default config with `ONTOREAD_DATA_DIR` applied when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(ENV_DATA_DIR).filter(|d| !d.is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }
}

// ============================================================================
// Ontology Store
// ============================================================================

pub struct OntologyStore {
    backend: Arc<dyn KeyValueStore>,
    config: StoreConfig,
    /// Fallbacks for settings fields the saved record leaves empty.
    settings_defaults: Settings,
}

impl OntologyStore {
    /// File-backed store in `config.data_dir`.
    pub fn open(config: StoreConfig) -> Self {
        let backend = Arc::new(FileStore::new(config.data_dir.clone()));
        Self::with_backend(backend, config)
    }

    pub fn with_backend(backend: Arc<dyn KeyValueStore>, config: StoreConfig) -> Self {
        Self {
            backend,
            config,
            settings_defaults: Settings::from_env(),
        }
    }

    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryStore::new()), StoreConfig::default())
    }

    /// Replace the environment-derived settings fallbacks.
    pub fn with_settings_defaults(mut self, defaults: Settings) -> Self {
        self.settings_defaults = defaults;
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ========================================================================
    // Graph
    // ========================================================================

    pub fn get_graph(&self) -> Option<Ontology> {
        self.read(GRAPH_KEY)
    }

    /// The stored graph, only if it still passes validation.
    pub fn load_graph_validated(&self) -> Option<Ontology> {
        let graph = self.get_graph()?;
        match validate(&graph) {
            Ok(()) => Some(graph),
            Err(err) => {
                tracing::warn!(error = %err, "stored graph failed validation");
                None
            }
        }
    }

    /// Persist `graph` if it validates. Nothing is written otherwise.
    pub fn save_graph(&self, graph: &Ontology) -> bool {
        if let Err(err) = validate(graph) {
            tracing::warn!(error = %err, "refusing to save invalid graph");
            return false;
        }
        self.write(GRAPH_KEY, graph)
    }

    pub fn clear_graph(&self) -> bool {
        self.remove(GRAPH_KEY)
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Newest first.
    pub fn get_history(&self) -> Vec<HistoryItem> {
        self.read(HISTORY_KEY).unwrap_or_default()
    }

    pub fn history_item(&self, id: &str) -> Option<HistoryItem> {
        self.get_history().into_iter().find(|item| item.id == id)
    }

    /// Prepend `item`, evicting the oldest entries beyond the limit.
    pub fn append_history(&self, item: HistoryItem) -> bool {
        let mut history = self.get_history();
        history.insert(0, item);
        self.save_history(history)
    }

    /// Replace the whole log, truncated to the limit.
    pub fn save_history(&self, mut history: Vec<HistoryItem>) -> bool {
        if history.len() > self.config.history_limit {
            let evicted = history.len() - self.config.history_limit;
            history.truncate(self.config.history_limit);
            tracing::debug!(evicted, "history limit reached");
        }
        self.write(HISTORY_KEY, &history)
    }

    pub fn clear_history(&self) -> bool {
        self.remove(HISTORY_KEY)
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Saved settings merged over the defaults. Never fails.
    pub fn get_settings(&self) -> Settings {
        Settings::resolve(self.read(SETTINGS_KEY), self.settings_defaults.clone())
    }

    pub fn save_settings(&self, settings: &Settings) -> bool {
        self.write(SETTINGS_KEY, settings)
    }

    // ========================================================================
    // Backup
    // ========================================================================

    pub fn export_all(&self) -> Backup {
        Backup {
            ontology: self.get_graph(),
            history: Some(self.get_history()),
            settings: Some(self.get_settings()),
            export_date: Utc::now(),
        }
    }

    /// Write each section present in `backup`. True iff every write succeeded.
    pub fn import_all(&self, backup: &Backup) -> bool {
        let mut ok = true;
        if let Some(graph) = &backup.ontology {
            ok &= self.save_graph(graph);
        }
        if let Some(history) = &backup.history {
            ok &= self.save_history(history.clone());
        }
        if let Some(settings) = &backup.settings {
            ok &= self.save_settings(settings);
        }
        ok
    }

    /// Clear graph and history. Settings are kept.
    pub fn clear_all(&self) -> bool {
        let graph = self.clear_graph();
        let history = self.clear_history();
        graph && history
    }

    // ========================================================================
    // Record I/O
    // ========================================================================

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = match self.backend.get(key) {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to read record");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to parse record");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let text = match serde_json::to_string(value) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to serialize record");
                return false;
            }
        };
        match self.backend.set(key, &text) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to write record");
                false
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        match self.backend.remove(key) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to remove record");
                false
            }
        }
    }
}
