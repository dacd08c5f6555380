//! Property-based tests for the conversation store
//!
//! Whatever sequence of create/select/delete calls runs against an opened
//! store, the list stays non-empty and the active id resolves.

use super::*;
use crate::storage::testing::InMemoryStorage;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Create,
    /// Index into the current list, wrapped
    Select(usize),
    Delete(usize),
    DeleteUnknown,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Create),
        2 => any::<usize>().prop_map(Op::Select),
        3 => any::<usize>().prop_map(Op::Delete),
        1 => Just(Op::DeleteUnknown),
    ]
}

fn id_at(store: &ConversationStore, index: usize) -> String {
    let list = store.conversations();
    list[index % list.len()].id.clone()
}

proptest! {
    #[test]
    fn list_never_empty_and_active_resolves(ops in proptest::collection::vec(arb_op(), 0..40)) {
        let storage = Arc::new(InMemoryStorage::new());
        let mut store = ConversationStore::open(storage.clone());

        for op in ops {
            let before = store.conversations().len();
            match op {
                Op::Create => {
                    store.create();
                    prop_assert_eq!(store.conversations().len(), before + 1);
                }
                Op::Select(i) => {
                    let id = id_at(&store, i);
                    prop_assert!(store.select(&id));
                    prop_assert_eq!(store.active_id(), Some(id.as_str()));
                }
                Op::Delete(i) => {
                    let id = id_at(&store, i);
                    let result = store.delete(&id);
                    if before == 1 {
                        prop_assert_eq!(result, Err(StoreError::LastConversation));
                        prop_assert_eq!(store.conversations().len(), 1);
                    } else {
                        prop_assert!(result.is_ok());
                        prop_assert_eq!(store.conversations().len(), before - 1);
                        prop_assert!(store.get(&id).is_none());
                    }
                }
                Op::DeleteUnknown => {
                    prop_assert!(store.delete("unknown").is_err());
                    prop_assert_eq!(store.conversations().len(), before);
                }
            }

            prop_assert!(!store.conversations().is_empty());
            prop_assert!(store.active().is_some());
        }

        // Persisted state reloads to the same list and active id
        let reloaded = ConversationStore::load(storage);
        prop_assert_eq!(reloaded.conversations(), store.conversations());
        prop_assert_eq!(reloaded.active_id(), store.active_id());
    }
}
