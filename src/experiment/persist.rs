//! Persistence: checkpointing experiments through a state store
//!
//! A save snapshots the master parameter set, the prompt-key map, the full
//! result table, and the view partitions into one envelope. A load rebuilds
//! the experiment around that snapshot: restored rows become the base the
//! next fold appends to, and score columns flow back into the score
//! registry.

use indexmap::IndexMap;

use crate::client::{ChatCompletionClient, MockChatClient, OpenAiCompatClient, DEFAULT_BASE_URL};
use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::queue::RequestQueue;
use crate::state::{ExperimentState, SaveEnvelope, StoredEnvelope};
use crate::store::{SaveReceipt, StateStore};

use super::ChatExperiment;

impl ChatExperiment {
    /// Persist the current state, returning the ids the store assigned.
    ///
    /// The first save of a fresh experiment needs a `name`; re-saves of a
    /// named or loaded experiment may pass `None` and revise in place.
    ///
    /// # Errors
    ///
    /// Returns an error when the experiment has neither a name nor a prior
    /// id, when there are no results to save, when no credential is
    /// configured, or when the store rejects the blob.
    pub async fn save<S: StateStore>(
        &mut self,
        store: &S,
        name: Option<&str>,
    ) -> Result<SaveReceipt> {
        if name.is_none() && self.experiment_id.is_none() {
            return Err(Error::UnnamedExperiment);
        }
        if self.table.is_empty() {
            return Err(Error::EmptyExperiment);
        }
        let credential = self
            .config
            .credential()
            .ok_or_else(|| Error::MissingCredential("save an experiment".to_string()))?
            .to_string();

        let envelope = SaveEnvelope {
            name: name.map(String::from),
            experiment_id: self.experiment_id.clone(),
            experiment_type: Self::EXPERIMENT_TYPE.to_string(),
            state: self.snapshot_state(),
        };
        let blob = envelope.to_bytes()?;
        tracing::info!(bytes = blob.len(), "saving experiment state");

        let receipt = store.save(&credential, &blob).await?;
        self.experiment_id = Some(receipt.experiment_id.clone());
        self.revision_id = Some(receipt.revision_id.clone());
        tracing::info!(
            experiment_id = %receipt.experiment_id,
            revision_id = %receipt.revision_id,
            "experiment saved"
        );
        Ok(receipt)
    }

    /// Load the head revision of a saved experiment.
    ///
    /// # Errors
    ///
    /// Returns an error when no credential is configured, the store cannot
    /// produce the blob, the blob decodes to a different experiment id or
    /// type, or the snapshot partitions do not match its table.
    pub async fn load<S: StateStore>(
        store: &S,
        config: ExperimentConfig,
        experiment_id: &str,
    ) -> Result<Self> {
        let credential = config
            .credential()
            .ok_or_else(|| Error::MissingCredential("load an experiment".to_string()))?
            .to_string();
        let blob = store.fetch_experiment(&credential, experiment_id).await?;
        let envelope = StoredEnvelope::from_bytes(&blob)?;
        if envelope.experiment_id != experiment_id {
            return Err(Error::ExperimentIdMismatch {
                requested: experiment_id.to_string(),
                returned: envelope.experiment_id,
            });
        }
        Self::from_envelope(envelope, config)
    }

    /// Load one pinned revision of a saved experiment.
    ///
    /// # Errors
    ///
    /// Same conditions as [`load`](Self::load), with the id check applied to
    /// the revision id.
    pub async fn load_revision<S: StateStore>(
        store: &S,
        config: ExperimentConfig,
        revision_id: &str,
    ) -> Result<Self> {
        let credential = config
            .credential()
            .ok_or_else(|| Error::MissingCredential("load a revision".to_string()))?
            .to_string();
        let blob = store.fetch_revision(&credential, revision_id).await?;
        let envelope = StoredEnvelope::from_bytes(&blob)?;
        if envelope.revision_id != revision_id {
            return Err(Error::RevisionIdMismatch {
                requested: revision_id.to_string(),
                returned: envelope.revision_id,
            });
        }
        Self::from_envelope(envelope, config)
    }

    /// Snapshot everything a load needs to reconstruct this experiment.
    fn snapshot_state(&self) -> ExperimentState {
        ExperimentState {
            params: self.params.clone(),
            prompt_keys: self.prompt_keys.clone(),
            table: self.table.clone(),
            partial_cols: self.partial_cols.clone(),
            score_cols: self.scores.keys().cloned().collect(),
            created_at: self.created_at,
        }
    }

    /// Rebuild an experiment around a fetched envelope.
    fn from_envelope(envelope: StoredEnvelope, config: ExperimentConfig) -> Result<Self> {
        if envelope.experiment_type != Self::EXPERIMENT_TYPE {
            return Err(Error::TypeMismatch {
                expected: Self::EXPERIMENT_TYPE.to_string(),
                found: envelope.experiment_type,
            });
        }
        let state = envelope.state;

        // both persisted partitions must name columns the table actually
        // has, and every persisted column must hold one cell per row
        state.table.project(&state.partial_cols)?;
        state.table.project(&state.score_cols)?;
        state.table.check_aligned()?;

        let mut scores = IndexMap::new();
        for name in &state.score_cols {
            if let Some(cells) = state.table.column(name) {
                scores.insert(name.clone(), cells.to_vec());
            }
        }

        let client: Box<dyn ChatCompletionClient> = if config.mock_mode() {
            Box::new(MockChatClient::new())
        } else {
            Box::new(OpenAiCompatClient::new(DEFAULT_BASE_URL))
        };

        let mut experiment = Self {
            config,
            client,
            params: state.params,
            prompt_keys: state.prompt_keys,
            argument_combos: Vec::new(),
            queue: RequestQueue::new(),
            base_table: Some(state.table.clone()),
            table: state.table,
            scores,
            partial_cols: state.partial_cols,
            experiment_id: Some(envelope.experiment_id),
            revision_id: Some(envelope.revision_id),
            created_at: state.created_at,
        };
        experiment.prepare();
        tracing::info!(
            experiment_id = experiment.experiment_id.as_deref().unwrap_or(""),
            rows = experiment.table.row_count(),
            "experiment loaded"
        );
        Ok(experiment)
    }
}
