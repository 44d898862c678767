//! Execution: full sweeps, single combinations, and partial runs
//!
//! Every run path dispatches through the request queue, checks that the
//! queue recorded exactly one outcome per attempted combination, and folds
//! the queue into the result table. Folding is append-only with respect to
//! rows restored from a loaded snapshot.

use crate::error::{Error, Result};
use crate::param::{ArgumentCombo, ParamValue};
use crate::selector::PromptSelector;
use crate::table::ResultTable;

use super::{message_key, render_messages, ChatExperiment};

impl ChatExperiment {
    /// Execute every prepared combination, then fold the results.
    ///
    /// Re-running appends a fresh pass over all combinations; rows are never
    /// replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue recorded a different number of outcomes
    /// than combinations attempted.
    pub async fn run(&mut self) -> Result<()> {
        if self.argument_combos.is_empty() {
            self.prepare();
        }
        let combos = self.argument_combos.clone();
        let attempted = combos.len();
        tracing::info!(combinations = attempted, "running full sweep");
        let before = self.queue.get_results().len();
        for combo in combos {
            self.queue.enqueue(self.client.as_ref(), combo).await;
        }
        self.verify_recorded(before, attempted)?;
        self.fold_results();
        Ok(())
    }

    /// Execute one ad-hoc combination without touching the master
    /// parameter set.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue did not record exactly one outcome.
    pub async fn run_one(&mut self, combo: ArgumentCombo) -> Result<()> {
        tracing::info!("running single combination");
        let before = self.queue.get_results().len();
        self.queue.enqueue(self.client.as_ref(), combo).await;
        self.verify_recorded(before, 1)?;
        self.fold_results();
        Ok(())
    }

    /// Execute the combinations one new candidate value adds.
    ///
    /// Substitutes `[value]` for `name`'s candidate list, runs that product,
    /// and then appends `value` to the master set so later full runs include
    /// it. Combinations for the already-known values of `name` are not
    /// re-run.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown names, values of the wrong shape, or a
    /// queue-recording mismatch.
    pub async fn run_partial(&mut self, name: &str, value: ParamValue) -> Result<()> {
        self.run_partial_inner(name, value, None).await
    }

    /// Partial run over the `messages` parameter, rendered from a selector.
    ///
    /// Registers the selector's alternate prompt under its prompt key so
    /// [`prompts`](ChatExperiment::prompts) covers the new conversation.
    ///
    /// # Errors
    ///
    /// Same conditions as [`run_partial`](ChatExperiment::run_partial).
    pub async fn run_partial_with_selector(
        &mut self,
        selector: &dyn PromptSelector,
    ) -> Result<()> {
        let rendered = render_messages(&selector.chat_messages());
        let entry = (selector.prompt_key(), selector.alternate_prompt());
        self.run_partial_inner("messages", ParamValue::Given(rendered), Some(entry))
            .await
    }

    async fn run_partial_inner(
        &mut self,
        name: &str,
        value: ParamValue,
        prompt_entry: Option<(String, String)>,
    ) -> Result<()> {
        let substituted = self.params.with_substitution(name, value.clone())?;
        let combos = substituted.expand();
        let attempted = combos.len();
        tracing::info!(parameter = name, combinations = attempted, "running partial sweep");
        let before = self.queue.get_results().len();
        for combo in combos {
            self.queue.enqueue(self.client.as_ref(), combo).await;
        }
        self.verify_recorded(before, attempted)?;
        self.fold_results();

        if self.params.push_value(name, value.clone())? {
            if name == "messages" {
                let entry = match prompt_entry {
                    Some(entry) => Some(entry),
                    None => value
                        .as_value()
                        .and_then(message_key)
                        .map(|key| (key.clone(), key)),
                };
                if let Some((key, alternate)) = entry {
                    self.prompt_keys.insert(key, alternate);
                }
            }
            self.prepare();
        }
        Ok(())
    }

    /// Check that the queue grew by exactly one outcome per attempt.
    fn verify_recorded(&self, before: usize, attempted: usize) -> Result<()> {
        let recorded = self.queue.get_results().len() - before;
        if recorded != attempted {
            tracing::error!(attempted, recorded, "queue outcome count mismatch, aborting");
            return Err(Error::ExecutionIntegrity {
                attempted,
                recorded,
            });
        }
        Ok(())
    }

    /// Rebuild the result table from the queue, re-attach score columns,
    /// and refresh the varied-input partition.
    fn fold_results(&mut self) {
        let mut table = ResultTable::rebuild(
            self.base_table.as_ref(),
            self.queue.get_input_args(),
            self.queue.get_results(),
            self.queue.get_latencies(),
        );
        for (name, cells) in &self.scores {
            table.attach_score(name, cells.clone());
        }
        self.partial_cols = table.varied_input_columns();
        self.table = table;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChatResponse, MockChatClient};
    use crate::config::ExperimentConfig;
    use crate::param::ParameterSet;
    use serde_json::{json, Value};

    /// Client whose response text encodes the model and temperature it saw.
    fn echoing_client() -> MockChatClient {
        MockChatClient::with_responder(|request| {
            let model = request
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or("?");
            let temperature = request
                .get("temperature")
                .and_then(Value::as_f64)
                .unwrap_or(-1.0);
            Ok(ChatResponse::from_text(format!("{model}@{temperature}")))
        })
    }

    fn sweep() -> ChatExperiment {
        ChatExperiment::builder()
            .config(ExperimentConfig::new().with_mock_mode(true))
            .client(echoing_client())
            .models(["a", "b"])
            .message_lists([vec![crate::client::ChatMessage::user("hello")]])
            .temperatures([0.0, 1.0])
            .build()
            .unwrap()
    }

    fn response_cells(experiment: &ChatExperiment) -> Vec<String> {
        experiment
            .full_table()
            .column("response")
            .unwrap()
            .iter()
            .map(|cell| cell.as_str().unwrap_or_default().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_run_folds_one_row_per_combination() {
        let mut experiment = sweep();
        experiment.run().await.unwrap();

        assert_eq!(experiment.full_table().row_count(), 4);
        assert_eq!(
            response_cells(&experiment),
            vec!["a@0", "a@1", "b@0", "b@1"]
        );
    }

    #[tokio::test]
    async fn test_rerun_appends_a_second_pass() {
        let mut experiment = sweep();
        experiment.run().await.unwrap();
        experiment.run().await.unwrap();
        assert_eq!(experiment.full_table().row_count(), 8);
    }

    #[tokio::test]
    async fn test_run_partial_adds_only_new_combinations() {
        let mut experiment = sweep();
        experiment.run().await.unwrap();

        experiment
            .run_partial("model", ParamValue::Given(json!("c")))
            .await
            .unwrap();

        // two temperatures for the one new model
        assert_eq!(experiment.full_table().row_count(), 6);
        assert_eq!(
            response_cells(&experiment)[4..],
            ["c@0".to_string(), "c@1".to_string()]
        );

        // the master set now includes the new value for future full runs
        let models = experiment.parameter_set().get("model").unwrap();
        assert_eq!(models.len(), 3);
        assert_eq!(experiment.argument_combos().len(), 6);
    }

    #[tokio::test]
    async fn test_run_partial_known_value_reruns_without_growing_the_set() {
        let mut experiment = sweep();
        experiment.run().await.unwrap();

        experiment
            .run_partial("model", ParamValue::Given(json!("a")))
            .await
            .unwrap();

        // rows append, candidates do not duplicate
        assert_eq!(experiment.full_table().row_count(), 6);
        let models = experiment.parameter_set().get("model").unwrap();
        assert_eq!(models.len(), 2);
    }

    #[tokio::test]
    async fn test_run_partial_unknown_parameter_errors() {
        let mut experiment = sweep();
        let err = experiment
            .run_partial("beam_width", ParamValue::Given(json!(4)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParameter(name) if name == "beam_width"));
        assert!(experiment.full_table().is_empty());
    }

    #[tokio::test]
    async fn test_run_one_leaves_parameter_set_untouched() {
        let mut experiment = sweep();
        experiment.run().await.unwrap();
        let before: ParameterSet = experiment.parameter_set().clone();

        let mut combo = ArgumentCombo::new();
        combo.set("model", ParamValue::Given(json!("z"))).unwrap();
        combo
            .set(
                "messages",
                ParamValue::Given(json!([{"role": "user", "content": "hi"}])),
            )
            .unwrap();
        experiment.run_one(combo).await.unwrap();

        assert_eq!(experiment.full_table().row_count(), 5);
        assert_eq!(experiment.parameter_set(), &before);
    }

    #[tokio::test]
    async fn test_failed_requests_fold_as_error_rows() {
        let mut experiment = ChatExperiment::builder()
            .config(ExperimentConfig::new().with_mock_mode(true))
            .client(MockChatClient::failing("model not found"))
            .models(["a"])
            .message_lists([vec![crate::client::ChatMessage::user("hello")]])
            .build()
            .unwrap();

        experiment.run().await.unwrap();

        let table = experiment.full_table();
        assert_eq!(table.row_count(), 1);
        assert_eq!(table.column("response").unwrap()[0], Value::Null);
        let error = table.column("error").unwrap()[0].clone();
        assert!(error.as_str().unwrap_or_default().contains("model not found"));
    }

    #[tokio::test]
    async fn test_partial_with_selector_registers_prompt_key() {
        let mut experiment = sweep();
        experiment.run().await.unwrap();

        let selector = crate::selector::TemplateSelector::new("Answer briefly.", "What is Rust?");
        experiment
            .run_partial_with_selector(&selector)
            .await
            .unwrap();

        // 2 models x 2 temperatures for the one new message list
        assert_eq!(experiment.full_table().row_count(), 8);
        let prompts = experiment.prompts().unwrap();
        assert_eq!(prompts.len(), 8);
        assert!(prompts
            .iter()
            .any(|p| p == "[INST] Answer briefly. What is Rust? [/INST]"));
    }
}
