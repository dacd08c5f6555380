//! Pure state transition function

use super::{Effect, Event, SessionState};
use crate::store::ERROR_REPLY_PREFIX;
use std::time::Duration;
use thiserror::Error;

/// How long the rate-limit banner stays up
pub const RATE_LIMIT_ALERT_DURATION: Duration = Duration::from_secs(5);

const RATE_LIMIT_ALERT: &str =
    "Rate limit exceeded. Please wait a moment before sending another message.";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Reasons an event is refused. The session drops refused submissions
/// without telling the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("A reply is still pending")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function: same inputs, same outputs, no I/O.
pub fn transition(
    state: &SessionState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // Busy wins over everything a user can submit
        (SessionState::AwaitingResponse { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::Busy)
        }

        (SessionState::Idle, Event::UserMessage { conversation_id, text }) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(TransitionError::EmptyMessage);
            }
            Ok(TransitionResult::new(SessionState::AwaitingResponse {
                conversation_id: conversation_id.clone(),
            })
            .with_effect(Effect::AppendUserMessage {
                conversation_id: conversation_id.clone(),
                text: text.to_string(),
            })
            .with_effect(Effect::AppendPlaceholder {
                conversation_id: conversation_id.clone(),
            })
            .with_effect(Effect::PersistConversations)
            .with_effect(Effect::RequestCompletion { conversation_id }))
        }

        (SessionState::AwaitingResponse { conversation_id }, Event::CompletionSucceeded { text }) => {
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::resolve(conversation_id.as_str(), text))
                .with_effect(Effect::PersistConversations))
        }

        (SessionState::AwaitingResponse { conversation_id }, Event::CompletionFailed { error }) => {
            let mut result = TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::resolve(
                    conversation_id.as_str(),
                    format!("{ERROR_REPLY_PREFIX}{}", error.message),
                ))
                .with_effect(Effect::PersistConversations);
            if error.is_rate_limited() {
                result = result.with_effect(Effect::RaiseRateLimitAlert {
                    message: RATE_LIMIT_ALERT.to_string(),
                    duration: RATE_LIMIT_ALERT_DURATION,
                });
            }
            Ok(result)
        }

        (SessionState::Idle, event) => Err(TransitionError::InvalidTransition(format!(
            "completion settled while idle: {event:?}"
        ))),
    }
}
