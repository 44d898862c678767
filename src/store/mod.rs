//! Remote state store boundary
//!
//! Experiments checkpoint themselves as opaque byte blobs keyed by
//! server-assigned experiment and revision ids. Two backends:
//! - [`HttpStateStore`]: the real store, reachable over HTTP with an
//!   `Authorization` credential
//! - [`MemoryStateStore`]: in-process emulation of the same contract for
//!   tests and offline work

mod http;
mod memory;

pub use http::HttpStateStore;
pub use memory::MemoryStateStore;

use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::Result;

/// Ids assigned by the store on a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    /// Id of the experiment head this save belongs to
    pub experiment_id: String,
    /// Id of the revision this save created
    pub revision_id: String,
}

/// Store contract for experiment state blobs.
///
/// The blob is opaque to the transport; a save creates a new revision and
/// moves the experiment head to it, while old revisions stay addressable by
/// their own ids.
pub trait StateStore: Send + Sync {
    /// Persist a blob, returning the assigned ids.
    fn save(
        &self,
        credential: &str,
        blob: &[u8],
    ) -> impl Future<Output = Result<SaveReceipt>> + Send;

    /// Fetch the head blob of an experiment.
    fn fetch_experiment(
        &self,
        credential: &str,
        experiment_id: &str,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Fetch one pinned revision blob.
    fn fetch_revision(
        &self,
        credential: &str,
        revision_id: &str,
    ) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::param::{ParamValue, ParameterSet};
    use crate::state::{ExperimentState, SaveEnvelope, StoredEnvelope};
    use crate::table::ResultTable;
    use chrono::Utc;
    use rustc_hash::FxHashMap;
    use serde_json::json;

    fn blob(name: &str, experiment_id: Option<&str>) -> Vec<u8> {
        let mut params = ParameterSet::new();
        params
            .insert("model", vec![ParamValue::Given(json!(name))])
            .unwrap();
        let envelope = SaveEnvelope {
            name: Some(name.to_string()),
            experiment_id: experiment_id.map(String::from),
            experiment_type: "RawExperiment".to_string(),
            state: ExperimentState {
                params,
                prompt_keys: FxHashMap::default(),
                table: ResultTable::new(),
                partial_cols: vec![],
                score_cols: vec![],
                created_at: Utc::now(),
            },
        };
        envelope.to_bytes().unwrap()
    }

    #[tokio::test]
    async fn test_memory_save_assigns_both_ids() {
        let store = MemoryStateStore::new();
        let receipt = store.save("token", &blob("first", None)).await.unwrap();
        assert!(!receipt.experiment_id.is_empty());
        assert!(!receipt.revision_id.is_empty());
        assert_eq!(store.experiment_count(), 1);
        assert_eq!(store.revision_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_resave_keeps_experiment_id_new_revision() {
        let store = MemoryStateStore::new();
        let first = store.save("token", &blob("first", None)).await.unwrap();
        let second = store
            .save("token", &blob("second", Some(&first.experiment_id)))
            .await
            .unwrap();

        assert_eq!(second.experiment_id, first.experiment_id);
        assert_ne!(second.revision_id, first.revision_id);
        assert_eq!(store.experiment_count(), 1);
        assert_eq!(store.revision_count(), 2);
    }

    #[tokio::test]
    async fn test_memory_fetch_experiment_returns_head() {
        let store = MemoryStateStore::new();
        let first = store.save("token", &blob("first", None)).await.unwrap();
        store
            .save("token", &blob("second", Some(&first.experiment_id)))
            .await
            .unwrap();

        let head = store
            .fetch_experiment("token", &first.experiment_id)
            .await
            .unwrap();
        let envelope = StoredEnvelope::from_bytes(&head).unwrap();
        assert_eq!(envelope.experiment_id, first.experiment_id);
        assert_eq!(
            envelope.state.params.get("model").unwrap(),
            &[ParamValue::Given(json!("second"))]
        );
    }

    #[tokio::test]
    async fn test_memory_fetch_revision_pins_old_state() {
        let store = MemoryStateStore::new();
        let first = store.save("token", &blob("first", None)).await.unwrap();
        store
            .save("token", &blob("second", Some(&first.experiment_id)))
            .await
            .unwrap();

        let pinned = store
            .fetch_revision("token", &first.revision_id)
            .await
            .unwrap();
        let envelope = StoredEnvelope::from_bytes(&pinned).unwrap();
        assert_eq!(envelope.revision_id, first.revision_id);
        assert_eq!(
            envelope.state.params.get("model").unwrap(),
            &[ParamValue::Given(json!("first"))]
        );
    }

    #[tokio::test]
    async fn test_memory_fetch_missing_is_not_found() {
        let store = MemoryStateStore::new();
        let err = store
            .fetch_experiment("token", "exp-missing")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteStore { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_memory_rejects_undecodable_blob() {
        let store = MemoryStateStore::new();
        let err = store.save("token", b"garbage").await.unwrap_err();
        assert!(matches!(err, Error::StateShape(_)));
        assert!(store.is_empty());
    }
}
