//! Prompt selectors: one conversation, two renderings
//!
//! A selector renders the same instruction/input pair both as a chat message
//! list and as an alternate single-string prompt for backends that take raw
//! text. The content of the final chat message doubles as the prompt key
//! that cross-references the two renderings.

use crate::client::ChatMessage;

/// A conversation renderable for two backend formats.
pub trait PromptSelector {
    /// Render as a chat-completion message list.
    fn chat_messages(&self) -> Vec<ChatMessage>;

    /// Render as a single-string prompt for a raw-text backend.
    fn alternate_prompt(&self) -> String;

    /// Canonical identity of this conversation: the final message's content.
    fn prompt_key(&self) -> String {
        self.chat_messages()
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default()
    }
}

/// Selector pairing a system instruction with one user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSelector {
    instruction: String,
    user_input: String,
}

impl TemplateSelector {
    /// Create a selector from an instruction and a user input.
    #[must_use]
    pub fn new(instruction: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            user_input: user_input.into(),
        }
    }

    /// The system instruction.
    #[must_use]
    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    /// The user input.
    #[must_use]
    pub fn user_input(&self) -> &str {
        &self.user_input
    }
}

impl PromptSelector for TemplateSelector {
    fn chat_messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(&self.instruction),
            ChatMessage::user(&self.user_input),
        ]
    }

    fn alternate_prompt(&self) -> String {
        format!("[INST] {} {} [/INST]", self.instruction, self.user_input)
    }
}
