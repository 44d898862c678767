//! Chat-completion client boundary
//!
//! The experiment core depends only on [`ChatCompletionClient`]: one method
//! taking a JSON request payload and returning a structured response. Two
//! implementations ship with the crate:
//! - [`OpenAiCompatClient`]: HTTP calls against an OpenAI-compatible
//!   `/v1/chat/completions` endpoint (Ollama, vLLM, OpenAI)
//! - [`MockChatClient`]: canned or closure-driven responses for offline use

mod http;
mod mock;

pub use http::{OpenAiCompatClient, DEFAULT_BASE_URL};
pub use mock::MockChatClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// JSON request payload sent to a chat-completion endpoint.
pub type RequestPayload = serde_json::Map<String, Value>;

/// A chat message with role and content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role: `system`, `user`, or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message with an arbitrary role.
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Create a `system` message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// Create a `user` message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Create an `assistant` message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// A function invocation produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function the model chose
    pub name: String,
    /// Arguments as a JSON-encoded string
    pub arguments: String,
}

/// The assistant message inside a response choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    /// Speaker role, normally `assistant`
    pub role: String,
    /// Plain text completion, absent when a function was invoked
    #[serde(default)]
    pub content: Option<String>,
    /// Structured function invocation, if the model produced one
    #[serde(default)]
    pub function_call: Option<FunctionCall>,
}

/// A single choice in a chat-completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Position of this choice among `n` generations
    #[serde(default)]
    pub index: Option<u32>,
    /// The generated message
    pub message: ResponseMessage,
    /// Why generation stopped (`stop`, `length`, `function_call`, ...)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token accounting reported by the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
    /// Sum of prompt and completion tokens
    pub total_tokens: u32,
}

/// Response from `/v1/chat/completions`.
///
/// Identifier fields are optional because not every OpenAI-compatible server
/// fills them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Server-assigned response id
    #[serde(default)]
    pub id: Option<String>,
    /// Object tag, normally `chat.completion`
    #[serde(default)]
    pub object: Option<String>,
    /// Unix timestamp of creation
    #[serde(default)]
    pub created: Option<i64>,
    /// Model that produced the response
    #[serde(default)]
    pub model: Option<String>,
    /// Backend configuration fingerprint
    #[serde(default)]
    pub system_fingerprint: Option<String>,
    /// Generated choices, at least one on success
    pub choices: Vec<ChatChoice>,
    /// Token accounting, when the server reports it
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Build a minimal single-choice response around plain text.
    #[must_use]
    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            id: None,
            object: Some("chat.completion".to_string()),
            created: None,
            model: None,
            system_fingerprint: None,
            choices: vec![ChatChoice {
                index: Some(0),
                message: ResponseMessage {
                    role: "assistant".to_string(),
                    content: Some(content.into()),
                    function_call: None,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        }
    }

    /// Extract the textual completion from the first choice.
    ///
    /// Structured function-call arguments win over plain message content:
    /// they are parsed and re-serialized compactly, falling back to the raw
    /// argument string when the model emitted invalid JSON.
    #[must_use]
    pub fn extracted_text(&self) -> Option<String> {
        let choice = self.choices.first()?;
        if let Some(call) = &choice.message.function_call {
            if let Ok(parsed) = serde_json::from_str::<Value>(&call.arguments) {
                return serde_json::to_string(&parsed).ok();
            }
            return Some(call.arguments.clone());
        }
        choice.message.content.clone()
    }
}

/// Capability interface for issuing one chat-completion request.
///
/// Implementors encapsulate transport and vendor details; the experiment
/// core depends only on this shape.
#[async_trait]
pub trait ChatCompletionClient: Send + Sync {
    /// Execute one request and return the structured response.
    async fn complete(&self, request: &RequestPayload) -> Result<ChatResponse>;
}
