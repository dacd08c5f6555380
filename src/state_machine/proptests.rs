//! Property-based tests for the state machine
//!
//! These tests verify the single-flight invariants hold across all inputs.

use super::*;
use crate::llm::{LlmError, LlmErrorKind};
use proptest::prelude::*;

fn arb_state() -> impl Strategy<Value = SessionState> {
    prop_oneof![
        Just(SessionState::Idle),
        "[a-z0-9]{1,13}".prop_map(|conversation_id| SessionState::AwaitingResponse { conversation_id }),
    ]
}

fn arb_error_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        Just(LlmErrorKind::Network),
        Just(LlmErrorKind::RateLimit),
        Just(LlmErrorKind::ServerError),
        Just(LlmErrorKind::Auth),
        Just(LlmErrorKind::InvalidRequest),
        Just(LlmErrorKind::Unknown),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        ("[a-z0-9]{1,13}", "[ a-zA-Z0-9\t\n]{0,40}").prop_map(|(conversation_id, text)| {
            Event::UserMessage { conversation_id, text }
        }),
        "[a-zA-Z0-9 ]{0,40}".prop_map(|text| Event::CompletionSucceeded { text }),
        (arb_error_kind(), "[a-zA-Z0-9 ]{0,40}").prop_map(|(kind, message)| {
            Event::CompletionFailed {
                error: LlmError::new(kind, message),
            }
        }),
    ]
}

fn count(effects: &[Effect], pred: impl Fn(&Effect) -> bool) -> usize {
    effects.iter().filter(|e| pred(e)).count()
}

proptest! {
    #[test]
    fn busy_sessions_drop_submissions(state in arb_state(), event in arb_event()) {
        let is_submit = matches!(event, Event::UserMessage { .. });
        let result = transition(&state, event);
        if state.is_busy() && is_submit {
            prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
        }
    }

    #[test]
    fn accepted_submit_opens_exactly_one_request(state in arb_state(), event in arb_event()) {
        let was_submit = matches!(event, Event::UserMessage { .. });
        if let Ok(result) = transition(&state, event) {
            let placeholders = count(&result.effects, |e| matches!(e, Effect::AppendPlaceholder { .. }));
            let requests = count(&result.effects, |e| matches!(e, Effect::RequestCompletion { .. }));
            let resolves = count(&result.effects, |e| matches!(e, Effect::ResolvePlaceholder { .. }));

            if was_submit {
                prop_assert!(result.new_state.is_busy());
                prop_assert_eq!(placeholders, 1);
                prop_assert_eq!(requests, 1);
                prop_assert_eq!(resolves, 0);
            } else {
                prop_assert_eq!(&result.new_state, &SessionState::Idle);
                prop_assert_eq!(placeholders, 0);
                prop_assert_eq!(requests, 0);
                prop_assert_eq!(resolves, 1);
            }
            prop_assert_eq!(
                result.effects.last().is_some_and(|e| matches!(e, Effect::RequestCompletion { .. })),
                was_submit
            );
        }
    }

    #[test]
    fn settling_resolves_the_pending_conversation(id in "[a-z0-9]{1,13}", event in arb_event()) {
        let state = SessionState::AwaitingResponse { conversation_id: id.clone() };
        if let Ok(result) = transition(&state, event) {
            for effect in &result.effects {
                if let Effect::ResolvePlaceholder { conversation_id, .. } = effect {
                    prop_assert_eq!(conversation_id, &id);
                }
            }
        }
    }

    #[test]
    fn only_rate_limits_raise_the_banner(kind in arb_error_kind(), message in "[a-z ]{0,20}") {
        let state = SessionState::AwaitingResponse { conversation_id: "c".to_string() };
        let result = transition(&state, Event::CompletionFailed { error: LlmError::new(kind, message) }).unwrap();
        let alerts = count(&result.effects, |e| matches!(e, Effect::RaiseRateLimitAlert { .. }));
        prop_assert_eq!(alerts, usize::from(kind == LlmErrorKind::RateLimit));
    }
}
