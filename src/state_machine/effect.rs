//! Effects produced by state transitions

use std::time::Duration;

/// Work for the session to carry out after a transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    AppendUserMessage {
        conversation_id: String,
        text: String,
    },

    /// Append the assistant placeholder that marks the in-flight request
    AppendPlaceholder { conversation_id: String },

    /// Write the conversation list to storage
    PersistConversations,

    /// Send the conversation's history to the completion service
    RequestCompletion { conversation_id: String },

    /// Replace the trailing placeholder with final content
    ResolvePlaceholder {
        conversation_id: String,
        content: String,
    },

    /// Show the rate-limit banner for `duration`
    RaiseRateLimitAlert { message: String, duration: Duration },
}

impl Effect {
    pub fn resolve(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Effect::ResolvePlaceholder {
            conversation_id: conversation_id.into(),
            content: content.into(),
        }
    }
}
