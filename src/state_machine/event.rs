//! Events that drive the session

use crate::llm::LlmError;

#[derive(Debug, Clone)]
pub enum Event {
    /// Text submitted for the given (active) conversation
    UserMessage {
        conversation_id: String,
        text: String,
    },
    /// The completion call returned reply text
    CompletionSucceeded { text: String },
    /// The completion call failed
    CompletionFailed { error: LlmError },
}
