//! # Promptgrid: Parameter-Sweep Harness for Chat-Completion APIs
//!
//! **Version**: 0.2.1
//!
//! Promptgrid expands cartesian grids of chat-completion parameters, runs
//! every combination against an OpenAI-compatible endpoint (Ollama, vLLM,
//! OpenAI), and folds the outcomes into a column-major result table with
//! deterministic row order.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Muda elimination**: Partial runs execute only the combinations a new
//!   candidate value adds
//! - **Poka-Yoke safety**: Parameter names and value shapes are validated at
//!   staging time, never discovered on the wire
//! - **Genchi Genbutsu**: Latency and token usage are measured per request,
//!   not estimated
//! - **Jidoka**: Every run checks that the queue recorded exactly one
//!   outcome per attempted combination
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use promptgrid::{ChatExperiment, ChatMessage, ExperimentConfig};
//!
//! # async fn example() -> promptgrid::Result<()> {
//! let mut experiment = ChatExperiment::builder()
//!     .config(ExperimentConfig::new())
//!     .models(["llama3.1", "phi3"])
//!     .message_lists([vec![
//!         ChatMessage::system("Answer in one sentence."),
//!         ChatMessage::user("Who was the first president?"),
//!     ]])
//!     .temperatures([0.0, 0.7, 1.0])
//!     .build()?;
//!
//! experiment.run().await?;
//! println!("{}", experiment.get_table(false));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod client;
pub mod config;
pub mod error;
pub mod experiment;
pub mod param;
pub mod queue;
pub mod selector;
pub mod state;
pub mod store;
pub mod table;

pub use client::{
    ChatCompletionClient, ChatMessage, ChatResponse, MockChatClient, OpenAiCompatClient,
    RequestPayload, DEFAULT_BASE_URL,
};
pub use config::ExperimentConfig;
pub use error::{Error, Result};
pub use experiment::{ChatExperiment, ChatExperimentBuilder};
pub use param::{param_kind, ArgumentCombo, ParamKind, ParamValue, ParameterSet, PARAM_SCHEMA};
pub use queue::{RequestOutcome, RequestQueue};
pub use selector::{PromptSelector, TemplateSelector};
pub use state::{ExperimentState, SaveEnvelope, StoredEnvelope};
pub use store::{HttpStateStore, MemoryStateStore, SaveReceipt, StateStore};
pub use table::{ColumnGroup, ResultTable, RESPONSE_COLUMNS};
