//! Chat-completion sweep experiments
//!
//! A [`ChatExperiment`] owns the master [`ParameterSet`], the request queue,
//! and the folded [`ResultTable`]. Construction goes through the builder;
//! execution through [`run`](ChatExperiment::run),
//! [`run_one`](ChatExperiment::run_one), and
//! [`run_partial`](ChatExperiment::run_partial); persistence through
//! [`save`](ChatExperiment::save) and the `load` constructors.
//!
//! ## Usage
//!
//! ```rust
//! use promptgrid::{ChatExperiment, ChatMessage, ExperimentConfig};
//!
//! # async fn example() -> promptgrid::Result<()> {
//! let mut experiment = ChatExperiment::builder()
//!     .config(ExperimentConfig::new().with_mock_mode(true))
//!     .models(["llama3.1", "phi3"])
//!     .message_lists([vec![ChatMessage::user("Who was the first president?")]])
//!     .temperatures([0.0, 1.0])
//!     .build()?;
//!
//! experiment.run().await?;
//! assert_eq!(experiment.full_table().row_count(), 4);
//! println!("{}", experiment.get_table(false));
//! # Ok(())
//! # }
//! ```

mod builder;
mod persist;
mod runs;

pub use builder::ChatExperimentBuilder;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::client::{ChatCompletionClient, ChatMessage};
use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::param::{ArgumentCombo, ParamValue, ParameterSet};
use crate::queue::RequestQueue;
use crate::table::ResultTable;

/// Columns hidden by the curated table view regardless of variance.
const BOOKKEEPING_COLUMNS: &[&str] = &[
    "stream",
    "response_id",
    "response_object",
    "response_created",
    "response_model",
    "response_system_fingerprint",
];

/// A parameter-sweep experiment against a chat-completion API.
pub struct ChatExperiment {
    config: ExperimentConfig,
    client: Box<dyn ChatCompletionClient>,
    params: ParameterSet,
    prompt_keys: FxHashMap<String, String>,
    argument_combos: Vec<ArgumentCombo>,
    queue: RequestQueue,
    // rows restored from a loaded snapshot; folds append after them
    base_table: Option<ResultTable>,
    table: ResultTable,
    scores: IndexMap<String, Vec<Value>>,
    partial_cols: Vec<String>,
    experiment_id: Option<String>,
    revision_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl ChatExperiment {
    /// Type tag persisted with every save and verified on load.
    pub const EXPERIMENT_TYPE: &'static str = "RawExperiment";

    /// Create a builder.
    #[must_use]
    pub fn builder() -> ChatExperimentBuilder {
        ChatExperimentBuilder::new()
    }

    /// The experiment id assigned by the state store, if saved or loaded.
    #[must_use]
    pub fn experiment_id(&self) -> Option<&str> {
        self.experiment_id.as_deref()
    }

    /// The revision id of the last save or load.
    #[must_use]
    pub fn revision_id(&self) -> Option<&str> {
        self.revision_id.as_deref()
    }

    /// When this experiment was created.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The configuration this experiment was built with.
    #[must_use]
    pub const fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// The master parameter set, including values added by partial runs.
    #[must_use]
    pub const fn parameter_set(&self) -> &ParameterSet {
        &self.params
    }

    /// The prepared combinations the next full run will execute.
    #[must_use]
    pub fn argument_combos(&self) -> &[ArgumentCombo] {
        &self.argument_combos
    }

    /// The full result table.
    #[must_use]
    pub const fn full_table(&self) -> &ResultTable {
        &self.table
    }

    /// The partial view: varied input columns only.
    ///
    /// # Errors
    ///
    /// Returns a state-shape error if the partition names a missing column.
    pub fn partial_table(&self) -> Result<ResultTable> {
        self.table.project(&self.partial_cols)
    }

    /// The score view: external-evaluator columns only.
    ///
    /// # Errors
    ///
    /// Returns a state-shape error if the partition names a missing column.
    pub fn score_table(&self) -> Result<ResultTable> {
        let names: Vec<String> = self.scores.keys().cloned().collect();
        self.table.project(&names)
    }

    /// The full table, or a curated view.
    ///
    /// The curated view hides bookkeeping columns and every input-parameter
    /// column that was never varied across the current partial view.
    #[must_use]
    pub fn get_table(&self, get_all_cols: bool) -> ResultTable {
        if get_all_cols {
            return self.table.clone();
        }
        let mut hidden: Vec<String> = BOOKKEEPING_COLUMNS
            .iter()
            .map(|&name| name.to_string())
            .collect();
        for name in self.table.input_columns() {
            if !self.partial_cols.iter().any(|c| c == name) {
                hidden.push(name.to_string());
            }
        }
        self.table.hiding(&hidden)
    }

    /// Model names of the prepared combinations, in expansion order.
    #[must_use]
    pub fn model_names(&self) -> Vec<String> {
        self.argument_combos
            .iter()
            .filter_map(|combo| {
                combo
                    .get("model")
                    .and_then(ParamValue::as_value)
                    .and_then(Value::as_str)
                    .map(String::from)
            })
            .collect()
    }

    /// Alternate-format prompts of the prepared combinations.
    ///
    /// Looks each combination's message list up in the prompt-key map; the
    /// map is consulted, never recomputed.
    ///
    /// # Errors
    ///
    /// Returns an error when a message list has no registered prompt key.
    pub fn prompts(&self) -> Result<Vec<String>> {
        self.argument_combos
            .iter()
            .map(|combo| {
                let key = combo
                    .get("messages")
                    .and_then(ParamValue::as_value)
                    .and_then(message_key)
                    .ok_or_else(|| Error::PromptKeyMissing("<no messages>".to_string()))?;
                self.prompt_keys
                    .get(&key)
                    .cloned()
                    .ok_or(Error::PromptKeyMissing(key))
            })
            .collect()
    }

    /// Attach an external-evaluator score column.
    ///
    /// The column persists across folds; rows appended later are padded with
    /// null.
    ///
    /// # Errors
    ///
    /// Returns an error when `values` does not match the current row count.
    pub fn add_score_column(&mut self, name: impl Into<String>, values: Vec<Value>) -> Result<()> {
        let name = name.into();
        let rows = self.table.row_count();
        if values.len() != rows {
            return Err(Error::ScoreLength {
                name,
                given: values.len(),
                rows,
            });
        }
        self.table.attach_score(&name, values.clone());
        self.scores.insert(name, values);
        Ok(())
    }

    /// Replace the chat-completion client.
    ///
    /// Useful after a load, which wires up the default client for the
    /// configured mode.
    pub fn set_client(&mut self, client: impl ChatCompletionClient + 'static) {
        self.client = Box::new(client);
    }

    /// Re-expand the prepared combinations from the master parameter set.
    fn prepare(&mut self) {
        self.argument_combos = self.params.expand();
    }
}

impl std::fmt::Debug for ChatExperiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatExperiment")
            .field("config", &self.config)
            .field("params", &self.params)
            .field("experiment_id", &self.experiment_id)
            .field("revision_id", &self.revision_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Canonical prompt key of a rendered message list: the final message's
/// content.
fn message_key(messages: &Value) -> Option<String> {
    messages
        .as_array()?
        .last()?
        .get("content")?
        .as_str()
        .map(String::from)
}

/// Render typed chat messages as the JSON value the wire format expects.
fn render_messages(messages: &[ChatMessage]) -> Value {
    Value::Array(
        messages
            .iter()
            .map(|message| {
                let mut object = serde_json::Map::new();
                object.insert("role".to_string(), Value::String(message.role.clone()));
                object.insert(
                    "content".to_string(),
                    Value::String(message.content.clone()),
                );
                Value::Object(object)
            })
            .collect(),
    )
}
