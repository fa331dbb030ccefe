//! Config entry store
//!
//! Owns every config entry, guards `(domain, unique_id)` uniqueness,
//! persists changes to `.storage/core.config_entries` and runs the setup
//! handler each integration registers for its domain.

use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::storage::{Storage, StorageError, StorageFile, StorageResult};

pub const STORAGE_KEY: &str = "core.config_entries";
pub const STORAGE_VERSION: u32 = 1;
pub const STORAGE_MINOR_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("no config entry with id {0}")]
    NotFound(String),

    #[error("{domain} already has an entry with unique id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("entry setup failed: {0}")]
    SetupFailed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Payload of the storage file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    pub entries: Vec<ConfigEntry>,
}

/// Called with an entry when it is set up; `Err` carries the reason
pub type SetupHandler = Arc<dyn Fn(&ConfigEntry) -> Result<(), String> + Send + Sync + 'static>;

type UniqueKey = (String, String);

fn unique_key(domain: &str, unique_id: &str) -> UniqueKey {
    (domain.to_string(), unique_id.to_string())
}

pub struct ConfigEntries {
    storage: Arc<Storage>,
    /// entry_id -> entry
    entries: DashMap<String, ConfigEntry>,
    /// (domain, unique_id) -> entry_id
    unique_ids: DashMap<UniqueKey, String>,
    handlers: DashMap<String, SetupHandler>,
    /// Held across storage writes and setup runs
    write_lock: Mutex<()>,
}

impl ConfigEntries {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            entries: DashMap::new(),
            unique_ids: DashMap::new(),
            handlers: DashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Read entries from storage; a missing file leaves the store empty
    pub async fn load(&self) -> StorageResult<()> {
        let Some(file) = self.storage.load::<ConfigEntriesData>(STORAGE_KEY).await? else {
            debug!("No stored config entries");
            return Ok(());
        };

        if file.version > STORAGE_VERSION {
            return Err(StorageError::VersionMismatch {
                key: STORAGE_KEY.to_string(),
                expected: STORAGE_VERSION,
                found: file.version,
            });
        }

        info!(
            count = file.data.entries.len(),
            version = file.version,
            minor_version = file.minor_version,
            "Loaded config entries"
        );
        for entry in file.data.entries {
            if let Some(unique_id) = &entry.unique_id {
                self.unique_ids
                    .insert(unique_key(&entry.domain, unique_id), entry.entry_id.clone());
            }
            self.entries.insert(entry.entry_id.clone(), entry);
        }
        Ok(())
    }

    /// Write every entry, oldest first
    pub async fn save(&self) -> StorageResult<()> {
        let mut entries: Vec<ConfigEntry> = self.entries.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.created_at);

        let file = StorageFile::new(
            STORAGE_KEY,
            ConfigEntriesData { entries },
            STORAGE_VERSION,
            STORAGE_MINOR_VERSION,
        );
        self.storage.save(&file).await
    }

    async fn persist(&self) -> ConfigEntriesResult<()> {
        let _guard = self.write_lock.lock().await;
        self.save().await?;
        Ok(())
    }

    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|e| e.value().clone())
    }

    /// Entries of one domain, oldest first
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let mut entries: Vec<ConfigEntry> = self
            .entries
            .iter()
            .filter(|e| e.domain == domain)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| e.created_at);
        entries
    }

    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        let entry_id = self.unique_ids.get(&unique_key(domain, unique_id))?;
        self.get(entry_id.value())
    }

    /// Insert a new entry and persist it
    ///
    /// The unique id is claimed atomically, so of two concurrent adds with
    /// the same `(domain, unique_id)` exactly one succeeds.
    #[instrument(skip(self, entry), fields(domain = %entry.domain, title = %entry.title))]
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(unique_id) = &entry.unique_id {
            match self.unique_ids.entry(unique_key(&entry.domain, unique_id)) {
                Entry::Occupied(_) => {
                    return Err(ConfigEntriesError::AlreadyExists {
                        domain: entry.domain.clone(),
                        unique_id: unique_id.clone(),
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert(entry.entry_id.clone());
                }
            }
        }

        self.entries.insert(entry.entry_id.clone(), entry.clone());
        if let Err(err) = self.persist().await {
            self.entries.remove(&entry.entry_id);
            if let Some(unique_id) = &entry.unique_id {
                self.unique_ids.remove(&unique_key(&entry.domain, unique_id));
            }
            warn!(entry_id = %entry.entry_id, error = %err, "Could not store new config entry");
            return Err(err);
        }

        info!(entry_id = %entry.entry_id, "Added config entry");
        Ok(entry)
    }

    /// Replace an entry's options wholesale and persist
    ///
    /// The previous options are restored when the write fails.
    pub async fn update_options(
        &self,
        entry_id: &str,
        options: Map<String, Value>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let (previous, updated) = {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
            let previous = (std::mem::replace(&mut entry.options, options), entry.modified_at);
            entry.modified_at = Utc::now();
            (previous, entry.clone())
        };

        if let Err(err) = self.persist().await {
            if let Some(mut entry) = self.entries.get_mut(entry_id) {
                (entry.options, entry.modified_at) = previous;
            }
            return Err(err);
        }
        debug!(entry_id = %entry_id, "Updated config entry options");
        Ok(updated)
    }

    /// Drop an entry and free its unique id
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let (_, entry) = self
            .entries
            .remove(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        if let Some(unique_id) = &entry.unique_id {
            self.unique_ids.remove(&unique_key(&entry.domain, unique_id));
        }

        if let Err(err) = self.persist().await {
            if let Some(unique_id) = &entry.unique_id {
                self.unique_ids
                    .insert(unique_key(&entry.domain, unique_id), entry.entry_id.clone());
            }
            self.entries.insert(entry.entry_id.clone(), entry);
            return Err(err);
        }
        info!(entry_id = %entry_id, domain = %entry.domain, "Removed config entry");
        Ok(entry)
    }

    pub fn register_setup_handler(&self, domain: &str, handler: SetupHandler) {
        debug!(domain = %domain, "Registering setup handler");
        self.handlers.insert(domain.to_string(), handler);
    }

    fn mark(&self, entry_id: &str, state: ConfigEntryState, reason: Option<String>) {
        if let Some(mut entry) = self.entries.get_mut(entry_id) {
            entry.state = state;
            entry.reason = reason;
        }
    }

    /// Run the domain's setup handler for an entry
    ///
    /// An entry whose domain has no handler is considered loaded.
    #[instrument(skip(self))]
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _guard = self.write_lock.lock().await;
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        self.mark(entry_id, ConfigEntryState::SetupInProgress, None);

        let handler = self.handlers.get(&entry.domain).map(|h| h.value().clone());
        let outcome = match handler {
            Some(handler) => handler(&entry),
            None => {
                debug!(domain = %entry.domain, "No setup handler registered");
                Ok(())
            }
        };

        match outcome {
            Ok(()) => {
                self.mark(entry_id, ConfigEntryState::Loaded, None);
                info!(title = %entry.title, "Config entry loaded");
                Ok(())
            }
            Err(reason) => {
                warn!(title = %entry.title, "Config entry setup failed: {}", reason);
                self.mark(entry_id, ConfigEntryState::SetupError, Some(reason.clone()));
                Err(ConfigEntriesError::SetupFailed(reason))
            }
        }
    }

    /// Set up every entry, oldest first; one result per entry
    pub async fn setup_all(&self) -> Vec<ConfigEntriesResult<()>> {
        let mut ids: Vec<(chrono::DateTime<Utc>, String)> = self
            .entries
            .iter()
            .map(|e| (e.created_at, e.entry_id.clone()))
            .collect();
        ids.sort();

        let mut results = Vec::with_capacity(ids.len());
        for (_, entry_id) in ids {
            results.push(self.setup(&entry_id).await);
        }
        results
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
