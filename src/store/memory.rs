//! In-memory state store implementation using `DashMap`.
//!
//! Emulates the remote contract end to end: saves decode the envelope,
//! mint ids, and file the blob under both the experiment head and its own
//! revision key. Data is lost on process restart.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::{SaveReceipt, StateStore};
use crate::error::{Error, Result};
use crate::state::{SaveEnvelope, StoredEnvelope};

/// In-process state store.
///
/// Credentials are accepted but not verified; the experiment layer is
/// responsible for refusing to call any store without one.
pub struct MemoryStateStore {
    experiments: DashMap<String, Vec<u8>>,
    revisions: DashMap<String, Vec<u8>>,
    experiment_counter: AtomicU64,
    revision_counter: AtomicU64,
}

impl MemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            experiments: DashMap::new(),
            revisions: DashMap::new(),
            experiment_counter: AtomicU64::new(0),
            revision_counter: AtomicU64::new(0),
        }
    }

    /// Number of experiment heads stored.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Number of revisions stored.
    #[must_use]
    pub fn revision_count(&self) -> usize {
        self.revisions.len()
    }

    /// Whether nothing has been saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.revisions.is_empty()
    }

    fn next_experiment_id(&self) -> String {
        let n = self.experiment_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("exp-{n}")
    }

    fn next_revision_id(&self) -> String {
        let n = self.revision_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("rev-{n}")
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStateStore {
    async fn save(&self, _credential: &str, blob: &[u8]) -> Result<SaveReceipt> {
        let envelope = SaveEnvelope::from_bytes(blob)?;
        let experiment_id = envelope
            .experiment_id
            .clone()
            .unwrap_or_else(|| self.next_experiment_id());
        let revision_id = self.next_revision_id();

        let stored = StoredEnvelope {
            experiment_id: experiment_id.clone(),
            revision_id: revision_id.clone(),
            experiment_type: envelope.experiment_type,
            state: envelope.state,
        };
        let bytes = stored.to_bytes()?;
        self.experiments.insert(experiment_id.clone(), bytes.clone());
        self.revisions.insert(revision_id.clone(), bytes);

        Ok(SaveReceipt {
            experiment_id,
            revision_id,
        })
    }

    async fn fetch_experiment(&self, _credential: &str, experiment_id: &str) -> Result<Vec<u8>> {
        self.experiments
            .get(experiment_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::RemoteStore {
                status: 404,
                body: format!("experiment {experiment_id} not found"),
            })
    }

    async fn fetch_revision(&self, _credential: &str, revision_id: &str) -> Result<Vec<u8>> {
        self.revisions
            .get(revision_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::RemoteStore {
                status: 404,
                body: format!("revision {revision_id} not found"),
            })
    }
}
