//! Builder for [`ChatExperiment`]
//!
//! Stages candidate lists per parameter, fills schema defaults at build
//! time, and wires up the client for the configured mode. Every schema
//! parameter gets exactly one default candidate when unset; `messages` is
//! the one parameter that must be staged explicitly.

use chrono::Utc;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::client::{
    ChatCompletionClient, ChatMessage, MockChatClient, OpenAiCompatClient, DEFAULT_BASE_URL,
};
use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::param::{param_kind, ParamValue, ParameterSet, PARAM_SCHEMA};
use crate::queue::RequestQueue;
use crate::selector::PromptSelector;
use crate::table::ResultTable;

use super::{message_key, render_messages, ChatExperiment};

/// Model requested when no candidates are staged.
const DEFAULT_MODEL: &str = "llama3.1";

/// Staged configuration for a [`ChatExperiment`].
#[derive(Default)]
pub struct ChatExperimentBuilder {
    config: ExperimentConfig,
    client: Option<Box<dyn ChatCompletionClient>>,
    staged: IndexMap<String, Vec<ParamValue>>,
    prompt_keys: FxHashMap<String, String>,
}

impl ChatExperimentBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the experiment configuration.
    #[must_use]
    pub fn config(mut self, config: ExperimentConfig) -> Self {
        self.config = config;
        self
    }

    /// Provide an explicit chat-completion client.
    ///
    /// Without one, build wires up a mock client in mock mode and the
    /// default HTTP client otherwise.
    #[must_use]
    pub fn client(mut self, client: impl ChatCompletionClient + 'static) -> Self {
        self.client = Some(Box::new(client));
        self
    }

    /// Candidate model names.
    #[must_use]
    pub fn models<I, S>(self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stage(
            "model",
            models.into_iter().map(|model| Value::String(model.into())),
        )
    }

    /// Candidate message lists, given directly as typed chat messages.
    ///
    /// Each list registers an identity prompt key, so [`ChatExperiment::prompts`]
    /// returns the final message's content verbatim.
    #[must_use]
    pub fn message_lists<I>(mut self, lists: I) -> Self
    where
        I: IntoIterator<Item = Vec<ChatMessage>>,
    {
        let mut candidates = Vec::new();
        for list in lists {
            let rendered = render_messages(&list);
            if let Some(key) = message_key(&rendered) {
                self.prompt_keys.insert(key.clone(), key);
            }
            candidates.push(ParamValue::Given(rendered));
        }
        self.staged.insert("messages".to_string(), candidates);
        self
    }

    /// Candidate message lists rendered from prompt selectors.
    ///
    /// Each selector also registers its alternate-format prompt under its
    /// prompt key.
    #[must_use]
    pub fn selectors<P, I>(mut self, selectors: I) -> Self
    where
        P: PromptSelector,
        I: IntoIterator<Item = P>,
    {
        let mut candidates = Vec::new();
        for selector in selectors {
            let rendered = render_messages(&selector.chat_messages());
            self.prompt_keys
                .insert(selector.prompt_key(), selector.alternate_prompt());
            candidates.push(ParamValue::Given(rendered));
        }
        self.staged.insert("messages".to_string(), candidates);
        self
    }

    /// Candidate sampling temperatures.
    #[must_use]
    pub fn temperatures<I>(self, temperatures: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        self.stage("temperature", temperatures)
    }

    /// Candidate nucleus-sampling thresholds.
    #[must_use]
    pub fn top_ps<I>(self, top_ps: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        self.stage("top_p", top_ps)
    }

    /// Candidate completion counts per request.
    #[must_use]
    pub fn ns<I>(self, ns: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        self.stage("n", ns)
    }

    /// Candidate streaming flags.
    #[must_use]
    pub fn streams<I>(self, streams: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        self.stage("stream", streams)
    }

    /// Candidate stop-sequence lists.
    #[must_use]
    pub fn stops<I>(self, stops: I) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        self.stage("stop", stops)
    }

    /// Candidate completion-length caps.
    #[must_use]
    pub fn max_tokens<I>(self, max_tokens: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        self.stage("max_tokens", max_tokens)
    }

    /// Candidate presence penalties.
    #[must_use]
    pub fn presence_penalties<I>(self, penalties: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        self.stage("presence_penalty", penalties)
    }

    /// Candidate frequency penalties.
    #[must_use]
    pub fn frequency_penalties<I>(self, penalties: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        self.stage("frequency_penalty", penalties)
    }

    /// Candidate sampling seeds.
    #[must_use]
    pub fn seeds<I>(self, seeds: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        self.stage("seed", seeds)
    }

    /// Candidate function declaration lists, in the wire JSON shape.
    #[must_use]
    pub fn functions<I>(self, functions: I) -> Self
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        self.stage("functions", functions)
    }

    /// Candidate function-call directives (`"auto"`, `"none"`, or a target
    /// object).
    #[must_use]
    pub fn function_calls<I>(self, directives: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.stage("function_call", directives)
    }

    /// Candidate logit-bias maps.
    #[must_use]
    pub fn logit_biases<I>(self, biases: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.stage("logit_bias", biases)
    }

    /// Candidate response-format objects.
    #[must_use]
    pub fn response_formats<I>(self, formats: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        self.stage("response_format", formats)
    }

    /// Stage raw candidates for any schema parameter.
    ///
    /// Candidates may include [`ParamValue::Omit`] to sweep a parameter's
    /// absence. Names and value shapes are checked at build time; message
    /// lists staged this way receive identity prompt keys there.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, candidates: Vec<ParamValue>) -> Self {
        self.staged.insert(name.into(), candidates);
        self
    }

    fn stage<I, V>(mut self, name: &str, candidates: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.staged.insert(
            name.to_string(),
            candidates
                .into_iter()
                .map(|value| ParamValue::Given(value.into()))
                .collect(),
        );
        self
    }

    /// Validate the staged candidates and assemble the experiment.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown parameter names, missing `messages`
    /// candidates, empty candidate lists, or candidates of the wrong shape.
    pub fn build(self) -> Result<ChatExperiment> {
        for name in self.staged.keys() {
            if param_kind(name).is_none() {
                return Err(Error::UnknownParameter(name.clone()));
            }
        }
        if !self.staged.contains_key("messages") {
            return Err(Error::EmptyCandidates("messages".to_string()));
        }

        let mut params = ParameterSet::new();
        for &(name, _) in PARAM_SCHEMA {
            let candidates = match self.staged.get(name) {
                Some(candidates) => candidates.clone(),
                None => default_candidates(name),
            };
            params.insert(name, candidates)?;
        }

        // message lists staged through the raw hatch still need prompt keys;
        // alternates registered by the dedicated setters win
        let mut prompt_keys = self.prompt_keys;
        if let Some(candidates) = self.staged.get("messages") {
            for candidate in candidates {
                if let Some(key) = candidate.as_value().and_then(message_key) {
                    prompt_keys.entry(key.clone()).or_insert(key);
                }
            }
        }

        let client: Box<dyn ChatCompletionClient> = match self.client {
            Some(client) => client,
            None if self.config.mock_mode() => Box::new(MockChatClient::new()),
            None => Box::new(OpenAiCompatClient::new(DEFAULT_BASE_URL)),
        };

        let mut experiment = ChatExperiment {
            config: self.config,
            client,
            params,
            prompt_keys,
            argument_combos: Vec::new(),
            queue: RequestQueue::new(),
            base_table: None,
            table: ResultTable::new(),
            scores: IndexMap::new(),
            partial_cols: Vec::new(),
            experiment_id: None,
            revision_id: None,
            created_at: Utc::now(),
        };
        experiment.prepare();
        tracing::debug!(
            combinations = experiment.argument_combos.len(),
            "experiment built"
        );
        Ok(experiment)
    }
}

impl std::fmt::Debug for ChatExperimentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatExperimentBuilder")
            .field("config", &self.config)
            .field("staged", &self.staged)
            .finish_non_exhaustive()
    }
}

/// The single default candidate for an unset schema parameter.
fn default_candidates(name: &str) -> Vec<ParamValue> {
    let default = match name {
        "model" => Some(Value::String(DEFAULT_MODEL.to_string())),
        "temperature" | "top_p" => Some(Value::from(1.0)),
        "n" => Some(Value::from(1)),
        "stream" => Some(Value::Bool(false)),
        "presence_penalty" | "frequency_penalty" => Some(Value::from(0.0)),
        _ => None,
    };
    vec![default.map_or(ParamValue::Omit, ParamValue::Given)]
}
