//! Error types for promptgrid
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Promptgrid error types
#[derive(Error, Debug)]
pub enum Error {
    /// State transfer attempted without a configured API credential
    #[error("API credential missing: cannot {0} without one\nProvide it via ExperimentConfig::with_credential")]
    MissingCredential(String),

    /// Save attempted before any results exist
    #[error("Cannot save empty experiment: run the experiment first")]
    EmptyExperiment,

    /// Save attempted with no name and no previously assigned experiment id
    #[error("Experiment has no name: pass one to the first save")]
    UnnamedExperiment,

    /// Loaded state identifies a different experiment
    #[error("Experiment id mismatch: requested {requested}, store returned {returned}")]
    ExperimentIdMismatch {
        /// Id the caller asked for
        requested: String,
        /// Id recorded inside the stored state
        returned: String,
    },

    /// Loaded state identifies a different revision
    #[error("Revision id mismatch: requested {requested}, store returned {returned}")]
    RevisionIdMismatch {
        /// Id the caller asked for
        requested: String,
        /// Id recorded inside the stored state
        returned: String,
    },

    /// Loaded state was produced by a different experiment type
    #[error("Experiment type mismatch: stored state is {found}, expected {expected}\nLoad it with the type that saved it")]
    TypeMismatch {
        /// Type tag of the loading experiment
        expected: String,
        /// Type tag found in the stored state
        found: String,
    },

    /// Recorded-result count disagreed with the number of requests attempted
    #[error("Execution integrity failure: attempted {attempted} requests but recorded {recorded} new results\nCheck the request arguments and the client behavior")]
    ExecutionIntegrity {
        /// Requests dispatched in this run
        attempted: usize,
        /// New records observed in the queue
        recorded: usize,
    },

    /// Parameter name not present in the chat-completion schema
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    /// Candidate value has the wrong JSON shape for its parameter
    #[error("Invalid value for parameter {name}: expected {expected}")]
    InvalidParameterValue {
        /// Parameter being assigned
        name: String,
        /// Shape the schema requires
        expected: String,
    },

    /// Parameter declared with an empty candidate list
    #[error("Parameter {0} has no candidate values")]
    EmptyCandidates(String),

    /// Message list absent from the prompt-key map
    #[error("No prompt key recorded for messages ending in: {0}")]
    PromptKeyMissing(String),

    /// Score column length disagreed with the table row count
    #[error("Score column {name} has {given} values but the table has {rows} rows")]
    ScoreLength {
        /// Score column being attached
        name: String,
        /// Values supplied
        given: usize,
        /// Rows currently in the table
        rows: usize,
    },

    /// Remote state store rejected the request
    #[error("State store returned {status}: {body}")]
    RemoteStore {
        /// HTTP status code
        status: u16,
        /// Response body text
        body: String,
    },

    /// Chat-completion endpoint rejected the request
    #[error("Chat completion failed with {status}: {body}")]
    ChatCompletion {
        /// HTTP status code
        status: u16,
        /// Response body text
        body: String,
    },

    /// Stored blob did not decode to a usable snapshot
    #[error("State decode error: {0}")]
    StateShape(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
