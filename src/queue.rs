//! Request queue: sequential execution with aligned bookkeeping
//!
//! The queue executes one chat-completion call at a time and accumulates
//! three parallel sequences in submission order: the argument combination,
//! the outcome, and the wall-clock latency. A failed call is recorded as a
//! failure marker at the same position, so the three sequences never fall
//! out of step. Memory grows linearly with executed combinations; nothing is
//! ever evicted.

use std::time::{Duration, Instant};

use crate::client::{ChatCompletionClient, ChatResponse};
use crate::param::ArgumentCombo;

/// Outcome of one executed request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    /// The endpoint returned a structured response
    Success(ChatResponse),
    /// The call failed; the marker carries the error text
    Failure(String),
}

impl RequestOutcome {
    /// Whether the request produced a response.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The response, if the request succeeded.
    #[must_use]
    pub const fn response(&self) -> Option<&ChatResponse> {
        match self {
            Self::Success(response) => Some(response),
            Self::Failure(_) => None,
        }
    }
}

/// Accumulates executed requests in submission order.
#[derive(Default)]
pub struct RequestQueue {
    input_args: Vec<ArgumentCombo>,
    results: Vec<RequestOutcome>,
    latencies: Vec<Duration>,
}

impl RequestQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute one combination and record the triple.
    ///
    /// The omitted-field filter is applied to the emitted payload only; the
    /// combination is stored unfiltered for bookkeeping. The call blocks
    /// until the outcome is recorded, keeping execution strictly sequential.
    pub async fn enqueue(&mut self, client: &dyn ChatCompletionClient, combo: ArgumentCombo) {
        let payload = combo.to_payload();
        let started = Instant::now();
        let outcome = match client.complete(&payload).await {
            Ok(response) => RequestOutcome::Success(response),
            Err(err) => {
                tracing::warn!(error = %err, "chat completion failed, recording marker");
                RequestOutcome::Failure(err.to_string())
            }
        };
        let latency = started.elapsed();
        tracing::debug!(
            position = self.results.len(),
            latency_ms = latency.as_millis() as u64,
            success = outcome.is_success(),
            "request recorded"
        );
        self.input_args.push(combo);
        self.results.push(outcome);
        self.latencies.push(latency);
    }

    /// All argument combinations executed so far, in submission order.
    #[must_use]
    pub fn get_input_args(&self) -> &[ArgumentCombo] {
        &self.input_args
    }

    /// All outcomes recorded so far, in submission order.
    #[must_use]
    pub fn get_results(&self) -> &[RequestOutcome] {
        &self.results
    }

    /// All latencies recorded so far, in submission order.
    #[must_use]
    pub fn get_latencies(&self) -> &[Duration] {
        &self.latencies
    }

    /// Number of executed requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing has been executed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
