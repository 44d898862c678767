//! Mock chat-completion client for offline runs and tests.

use super::{
    ChatChoice, ChatCompletionClient, ChatResponse, FunctionCall, RequestPayload, ResponseMessage,
    Usage,
};
use crate::error::{Error, Result};

type Responder = dyn Fn(&RequestPayload) -> Result<ChatResponse> + Send + Sync;

/// Chat-completion client that never touches the network.
///
/// The default instance returns a fixed completion; [`with_responder`] lets a
/// test derive the response from the request payload.
///
/// [`with_responder`]: MockChatClient::with_responder
pub struct MockChatClient {
    responder: Box<Responder>,
}

impl MockChatClient {
    /// Create a mock returning a canned text completion.
    #[must_use]
    pub fn new() -> Self {
        Self::with_responder(|request| {
            let mut response = ChatResponse::from_text("This is a mock response.");
            response.model = request
                .get("model")
                .and_then(serde_json::Value::as_str)
                .map(String::from);
            response.usage = Some(Usage {
                prompt_tokens: 9,
                completion_tokens: 6,
                total_tokens: 15,
            });
            Ok(response)
        })
    }

    /// Create a mock whose responses are computed from the request payload.
    #[must_use]
    pub fn with_responder(
        responder: impl Fn(&RequestPayload) -> Result<ChatResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
        }
    }

    /// Create a mock returning a canned function invocation.
    #[must_use]
    pub fn function_call() -> Self {
        Self::with_responder(|_| {
            let mut response = ChatResponse::from_text("");
            response.choices = vec![ChatChoice {
                index: Some(0),
                message: ResponseMessage {
                    role: "assistant".to_string(),
                    content: None,
                    function_call: Some(FunctionCall {
                        name: "get_current_weather".to_string(),
                        arguments: "{\"location\": \"Toronto\", \"unit\": \"celsius\"}"
                            .to_string(),
                    }),
                },
                finish_reason: Some("function_call".to_string()),
            }];
            Ok(response)
        })
    }

    /// Create a mock that fails every request with the given message.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::with_responder(move |_| {
            Err(Error::ChatCompletion {
                status: 500,
                body: message.clone(),
            })
        })
    }
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChatCompletionClient for MockChatClient {
    async fn complete(&self, request: &RequestPayload) -> Result<ChatResponse> {
        (self.responder)(request)
    }
}
