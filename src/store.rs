//! Conversation store
//!
//! Owns every conversation plus the active-conversation pointer and
//! mirrors both into a [`KeyValueStore`] after each mutation. Storage
//! trouble never fails an operation: it is logged and queued as a notice
//! for the caller to surface, and the in-memory state carries on.

mod conversation;

#[cfg(test)]
mod proptests;

pub use conversation::*;

use crate::storage::{KeyValueStore, StorageError};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

/// Storage key holding the JSON conversation list
pub const CONVERSATIONS_KEY: &str = "geminiConversations";
/// Storage key holding the raw active conversation id
pub const ACTIVE_ID_KEY: &str = "currentChatId";

/// Prefix of every inline failure shown in place of a reply
pub const ERROR_REPLY_PREFIX: &str = "❌ Sorry, I couldn't process your request. ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("You can't delete the last conversation.")]
    LastConversation,
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
}

pub struct ConversationStore {
    storage: Arc<dyn KeyValueStore>,
    /// Most recent first
    conversations: Vec<Conversation>,
    active_id: Option<String>,
    last_issued_id: i64,
    notices: Vec<String>,
}

impl ConversationStore {
    /// Read persisted state. Missing keys yield an empty store; an
    /// unreadable or malformed payload is logged and treated as missing.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let mut notices = Vec::new();

        let conversations = match storage.get(CONVERSATIONS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Conversation>>(&raw) {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!(error = %e, "Stored conversation list is malformed, starting empty");
                    notices.push(format!("Saved conversations could not be read: {e}"));
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read conversation list");
                notices.push(format!("Saved conversations could not be read: {e}"));
                Vec::new()
            }
        };

        let active_id = match storage.get(ACTIVE_ID_KEY) {
            Ok(id) => id.filter(|id| !id.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read active conversation id");
                None
            }
        };

        tracing::info!(
            conversations = conversations.len(),
            active = ?active_id,
            "Loaded conversation store"
        );

        let mut store = Self {
            storage,
            conversations,
            active_id,
            last_issued_id: 0,
            notices,
        };
        if store.recover_interrupted() > 0 {
            store.save();
        }
        store
    }

    /// Load and make sure an active conversation exists. After this the
    /// list is never empty.
    pub fn open(storage: Arc<dyn KeyValueStore>) -> Self {
        let mut store = Self::load(storage);
        store.get_active();
        store
    }

    /// Replace placeholders left behind by a process that exited while a
    /// request was in flight. Returns how many were replaced.
    fn recover_interrupted(&mut self) -> usize {
        let mut recovered = 0;
        for conv in self.conversations.iter_mut().filter(|c| c.has_pending_reply()) {
            if let Some(last) = conv.messages.last_mut() {
                last.settle(format!(
                    "{ERROR_REPLY_PREFIX}The request was interrupted before a reply arrived."
                ));
                recovered += 1;
                tracing::info!(conv_id = %conv.id, "Recovered interrupted reply");
            }
        }
        recovered
    }

    /// Persist the conversation list
    pub fn save(&mut self) {
        let payload = match serde_json::to_string(&self.conversations) {
            Ok(payload) => payload,
            Err(e) => {
                self.storage_failed("serialize conversations", &StorageError::from(e));
                return;
            }
        };
        if let Err(e) = self.storage.set(CONVERSATIONS_KEY, &payload) {
            self.storage_failed("save conversations", &e);
        }
    }

    fn save_active_id(&mut self) {
        let Some(id) = self.active_id.clone() else {
            return;
        };
        if let Err(e) = self.storage.set(ACTIVE_ID_KEY, &id) {
            self.storage_failed("save active conversation", &e);
        }
    }

    fn storage_failed(&mut self, action: &str, error: &StorageError) {
        tracing::warn!(action, error = %error, "Storage write failed; changes will not survive a restart");
        self.notices
            .push(format!("Could not {action}: {error}. Changes will not survive a restart."));
    }

    /// Drain storage problems recorded since the last call
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    fn next_id(&mut self) -> String {
        let mut candidate = Utc::now().timestamp_millis().max(self.last_issued_id + 1);
        while self.get(&candidate.to_string()).is_some() {
            candidate += 1;
        }
        self.last_issued_id = candidate;
        candidate.to_string()
    }

    /// Start a new conversation at the head of the list and make it active
    pub fn create(&mut self) -> &Conversation {
        let id = self.next_id();
        self.conversations
            .insert(0, Conversation::new(id.clone(), now_millis()));
        tracing::debug!(conv_id = %id, "Created conversation");
        self.active_id = Some(id);
        self.save();
        self.save_active_id();
        &self.conversations[0]
    }

    fn active_index(&self) -> Option<usize> {
        let id = self.active_id.as_deref()?;
        self.conversations.iter().position(|c| c.id == id)
    }

    /// The active conversation, creating one first when the active id is
    /// unset or dangling
    pub fn get_active(&mut self) -> &Conversation {
        let index = if let Some(index) = self.active_index() {
            index
        } else {
            if let Some(dangling) = &self.active_id {
                tracing::debug!(conv_id = %dangling, "Active conversation missing, starting a new one");
            }
            self.create();
            0
        };
        &self.conversations[index]
    }

    /// The active conversation without creating one
    pub fn active(&self) -> Option<&Conversation> {
        self.active_index().map(|i| &self.conversations[i])
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    /// Make `id` active. Unknown ids leave the state untouched and return
    /// `false`.
    pub fn select(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.active_id = Some(id.to_string());
        self.save_active_id();
        true
    }

    /// Remove a conversation. The last remaining conversation cannot be
    /// removed; removing the active one activates the new head of the
    /// list.
    pub fn delete(&mut self, id: &str) -> Result<(), StoreError> {
        if self.conversations.len() <= 1 {
            return Err(StoreError::LastConversation);
        }
        let index = self
            .conversations
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))?;

        self.conversations.remove(index);
        if self.active_id.as_deref() == Some(id) {
            self.active_id = Some(self.conversations[0].id.clone());
            self.save_active_id();
        }
        self.save();
        tracing::debug!(conv_id = %id, "Deleted conversation");
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// All conversations, most recent first
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    /// Append a message; returns its index, or `None` when the
    /// conversation no longer exists
    pub fn append_message(&mut self, conversation_id: &str, message: Message) -> Option<usize> {
        let conv = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)?;
        conv.messages.push(message);
        Some(conv.messages.len() - 1)
    }

    /// Replace the trailing placeholder's content. Returns the index and
    /// the updated message, or `None` when there is no placeholder to
    /// resolve.
    pub fn resolve_placeholder(
        &mut self,
        conversation_id: &str,
        content: String,
    ) -> Option<(usize, &Message)> {
        let conv = self
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)?;
        let index = conv.messages.len().checked_sub(1)?;
        let last = &mut conv.messages[index];
        if !last.is_placeholder() {
            return None;
        }
        last.settle(content);
        Some((index, &*last))
    }

    /// Every message except in-flight placeholders, oldest first
    pub fn history(&self, conversation_id: &str) -> Option<Vec<Message>> {
        let conv = self.get(conversation_id)?;
        Some(
            conv.messages
                .iter()
                .filter(|m| !m.is_placeholder())
                .cloned()
                .collect(),
        )
    }
}
