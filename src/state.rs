//! Persisted experiment snapshots and wire envelopes
//!
//! The state store moves opaque byte blobs; both envelope shapes are encoded
//! as JSON bytes on this side of the wire. A save carries
//! `(name, experiment_id, experiment_type, state)`; a fetch returns
//! `(experiment_id, revision_id, experiment_type, state)` with the ids the
//! server assigned.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::param::ParameterSet;
use crate::table::ResultTable;

/// Everything needed to reconstruct an experiment wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentState {
    /// Master parameter set, including values added by partial runs
    pub params: ParameterSet,
    /// Prompt-key map: final-message content to alternate rendering
    pub prompt_keys: FxHashMap<String, String>,
    /// The full result table
    pub table: ResultTable,
    /// Column names of the partial view at save time
    pub partial_cols: Vec<String>,
    /// Column names of the score view at save time
    pub score_cols: Vec<String>,
    /// When the experiment was created
    pub created_at: DateTime<Utc>,
}

/// Envelope POSTed to the state store on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveEnvelope {
    /// Experiment name; may be absent when re-saving a loaded experiment
    pub name: Option<String>,
    /// Previously assigned experiment id, if any
    pub experiment_id: Option<String>,
    /// Type tag verified on load
    pub experiment_type: String,
    /// The snapshot itself
    pub state: ExperimentState,
}

impl SaveEnvelope {
    /// Encode as the opaque blob the store transports.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a blob produced by [`to_bytes`](Self::to_bytes).
    ///
    /// # Errors
    ///
    /// Returns a state-shape error when the blob does not decode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::StateShape(e.to_string()))
    }
}

/// Envelope returned by the state store on fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEnvelope {
    /// Experiment this blob belongs to
    pub experiment_id: String,
    /// Revision this blob represents
    pub revision_id: String,
    /// Type tag of the experiment that saved it
    pub experiment_type: String,
    /// The snapshot itself
    pub state: ExperimentState,
}

impl StoredEnvelope {
    /// Encode as the opaque blob the store transports.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a blob fetched from the store.
    ///
    /// # Errors
    ///
    /// Returns a state-shape error when the blob does not decode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::StateShape(e.to_string()))
    }
}
