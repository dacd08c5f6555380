//! Session state

/// Where the session is in its request/response cycle
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Ready for the next message
    #[default]
    Idle,
    /// A completion request is in flight for `conversation_id`
    AwaitingResponse { conversation_id: String },
}

impl SessionState {
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionState::AwaitingResponse { .. })
    }

    /// Conversation the in-flight request belongs to
    pub fn pending_conversation(&self) -> Option<&str> {
        match self {
            SessionState::Idle => None,
            SessionState::AwaitingResponse { conversation_id } => Some(conversation_id),
        }
    }
}
