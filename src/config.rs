//! Experiment configuration
//!
//! Credentials and mode switches are passed in explicitly; the library never
//! reads the process environment.

use serde::{Deserialize, Serialize};

/// Configuration handed to an experiment at construction time.
///
/// `credential` authorizes state-store traffic. `mock_mode` routes chat
/// completions to the built-in mock client instead of a live endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperimentConfig {
    credential: Option<String>,
    mock_mode: bool,
}

impl ExperimentConfig {
    /// Create a configuration with no credential, targeting a live backend.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            credential: None,
            mock_mode: false,
        }
    }

    /// Set the API credential used for state transfer.
    #[must_use]
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Route chat completions to the built-in mock client.
    #[must_use]
    pub const fn with_mock_mode(mut self, mock_mode: bool) -> Self {
        self.mock_mode = mock_mode;
        self
    }

    /// Get the configured credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// Whether chat completions are mocked.
    #[must_use]
    pub const fn mock_mode(&self) -> bool {
        self.mock_mode
    }
}
