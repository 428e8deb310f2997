//! Local dedupe store
//!
//! Remembers which activities have already been emitted, keyed by the concrete value
//! of every dedupe tuple. An activity matching ANY stored key is a duplicate, so a
//! re-run over the same backup only emits what is new.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::{Activity, Dedupable};

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    provider_id: String,
    end_at: DateTime<Utc>,
    stored_at: DateTime<Utc>,
}

/// Result of offering an activity to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No key matched; the activity's keys are now recorded
    Inserted,
    /// At least one key was already known
    Duplicate,
}

/// Dedupe keys of emitted activities, persisted with sled
pub struct RecordStore {
    db: sled::Db,
}

impl RecordStore {
    /// Open (or create) the store at `path`
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open a throwaway in-memory store
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// True when any of the activity's dedupe keys is already stored
    pub fn contains(&self, activity: &Activity) -> Result<bool> {
        for key in activity.dedupe_keys() {
            if self.db.contains_key(key.as_bytes())? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Record the activity unless one of its keys is already known.
    ///
    /// Keys are only ever added, never rewritten: a duplicate leaves the store as is.
    pub fn upsert(&self, activity: &Activity) -> Result<UpsertOutcome> {
        if self.contains(activity)? {
            debug!(provider_id = %activity.provider_id, "Activity already stored");
            return Ok(UpsertOutcome::Duplicate);
        }

        let record = StoredRecord {
            provider_id: activity.provider_id.clone(),
            end_at: activity.end_at,
            stored_at: Utc::now(),
        };
        let data = bincode::serialize(&record)?;

        for key in activity.dedupe_keys() {
            self.db.insert(key.as_bytes(), data.as_slice())?;
        }

        Ok(UpsertOutcome::Inserted)
    }

    /// Provider id of the activity first stored under `key`
    pub fn lookup(&self, key: &str) -> Result<Option<String>> {
        match self.db.get(key.as_bytes())? {
            Some(data) => {
                let record: StoredRecord = bincode::deserialize(&data)?;
                Ok(Some(record.provider_id))
            },
            None => Ok(None),
        }
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.db.len()
    }

    /// True when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Persist pending writes
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Forget every stored key
    pub fn clear(&self) -> Result<()> {
        self.db.clear()?;
        self.db.flush()?;
        Ok(())
    }
}
