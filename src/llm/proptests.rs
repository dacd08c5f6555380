//! Property-based tests for the Gemini translation layer
//!
//! - Every history entry becomes exactly one `contents` entry, in order
//! - Roles map to the `user` / `model` vocabulary
//! - Text survives translation untouched
//! - A normalized response never carries empty text

use super::gemini::{
    normalize_response, translate_request, GeminiCandidate, GeminiContent, GeminiPart,
    GeminiResponse,
};
use super::types::{LlmMessage, LlmRequest, MessageRole};
use proptest::prelude::*;

fn arb_role() -> impl Strategy<Value = MessageRole> {
    prop_oneof![Just(MessageRole::User), Just(MessageRole::Assistant)]
}

fn arb_message() -> impl Strategy<Value = LlmMessage> {
    (arb_role(), "[a-zA-Z0-9 _.!?,\n]{0,80}").prop_map(|(role, text)| LlmMessage { role, text })
}

fn arb_part() -> impl Strategy<Value = GeminiPart> {
    proptest::option::of("[a-zA-Z0-9 ]{0,20}").prop_map(|text| GeminiPart { text })
}

fn arb_response() -> impl Strategy<Value = GeminiResponse> {
    proptest::collection::vec(
        proptest::option::of(proptest::collection::vec(arb_part(), 0..3)),
        0..3,
    )
    .prop_map(|candidates| GeminiResponse {
        candidates: candidates
            .into_iter()
            .map(|parts| GeminiCandidate {
                content: parts.map(|parts| GeminiContent {
                    role: Some("model".to_string()),
                    parts,
                }),
            })
            .collect(),
        usage_metadata: None,
    })
}

proptest! {
    #[test]
    fn translation_preserves_history(messages in proptest::collection::vec(arb_message(), 0..20)) {
        let request = LlmRequest::new(messages.clone());
        let translated = translate_request(&request);

        prop_assert_eq!(translated.contents.len(), messages.len());
        for (content, msg) in translated.contents.iter().zip(&messages) {
            let expected_role = match msg.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            prop_assert_eq!(content.role.as_deref(), Some(expected_role));
            prop_assert_eq!(content.parts.len(), 1);
            prop_assert_eq!(content.parts[0].text.as_deref(), Some(msg.text.as_str()));
        }
    }

    #[test]
    fn normalized_text_is_never_empty(resp in arb_response()) {
        let normalized = normalize_response(resp);
        prop_assert!(!normalized.text.is_empty());
    }
}
