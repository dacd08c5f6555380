//! Chat session runtime
//!
//! Runs one request/response cycle at a time against the conversation
//! store and tells subscribers about every change through a broadcast
//! channel, so rendering never reaches into the core.


use crate::llm::{LlmError, LlmMessage, LlmRequest, LlmService};
use crate::state_machine::{transition, Effect, Event, SessionState, TransitionError};
use crate::store::{Conversation, ConversationStore, Message, Role, StoreError};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications for rendering layers
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A new conversation became active
    ConversationCreated { conversation: Conversation },
    /// An existing conversation became active; carries a snapshot to redraw
    ConversationSelected { conversation: Conversation },
    ConversationDeleted { conversation_id: String },
    MessageAppended {
        conversation_id: String,
        index: usize,
        message: Message,
    },
    MessageUpdated {
        conversation_id: String,
        index: usize,
        message: Message,
    },
    Alert(Alert),
}

/// Transient user-facing notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
    /// How long the alert should stay visible; `None` until dismissed
    pub expires_after: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    RateLimited,
    LastConversation,
    Storage,
}

/// What happened to a submission
#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// The request ran and its placeholder was resolved
    Settled { conversation_id: String },
    /// Dropped without any state change
    Ignored(TransitionError),
}

/// Sidebar entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub active: bool,
}

struct Inner {
    store: ConversationStore,
    state: SessionState,
    rate_limited_until: Option<Instant>,
}

pub struct ChatSession {
    inner: Mutex<Inner>,
    llm: Arc<dyn LlmService>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatSession {
    pub fn new(store: ConversationStore, llm: Arc<dyn LlmService>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(Inner {
                store,
                state: SessionState::Idle,
                rate_limited_until: None,
            }),
            llm,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn flush_notices(&self, inner: &mut Inner) {
        for message in inner.store.take_notices() {
            self.emit(ChatEvent::Alert(Alert {
                kind: AlertKind::Storage,
                message,
                expires_after: None,
            }));
        }
    }

    /// Announce the restored active conversation and any storage problems
    /// hit while loading. Call once subscribers are attached.
    pub fn restore(&self) {
        let mut inner = self.lock();
        let conversation = inner.store.get_active().clone();
        self.emit(ChatEvent::ConversationSelected { conversation });
        self.flush_notices(&mut inner);
    }

    /// Active conversation id, creating a conversation when none resolves
    fn resolve_active(&self, inner: &mut Inner) -> String {
        let missing = inner.store.active().is_none();
        let conversation = inner.store.get_active().clone();
        let id = conversation.id.clone();
        if missing {
            self.emit(ChatEvent::ConversationCreated { conversation });
        }
        id
    }

    /// Submit `text` to the active conversation and wait for the reply.
    ///
    /// Blank text, or text sent while an earlier reply is pending, is
    /// dropped with no state change.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let (conversation_id, request) = {
            let mut inner = self.lock();
            let conversation_id = self.resolve_active(&mut inner);
            let event = Event::UserMessage {
                conversation_id: conversation_id.clone(),
                text: text.to_string(),
            };
            let result = match transition(&inner.state, event) {
                Ok(result) => result,
                Err(reason) => {
                    tracing::debug!(
                        %reason,
                        pending = ?inner.state.pending_conversation(),
                        "Dropping submission"
                    );
                    return SendOutcome::Ignored(reason);
                }
            };
            inner.state = result.new_state;
            let request = self.apply(&mut inner, result.effects);
            (conversation_id, request)
        };

        let settled = match request {
            Some(request) => match self.llm.complete(&request).await {
                Ok(response) => Event::CompletionSucceeded {
                    text: response.text,
                },
                Err(error) => Event::CompletionFailed { error },
            },
            None => Event::CompletionFailed {
                error: LlmError::unknown("Conversation disappeared before the request"),
            },
        };

        let mut inner = self.lock();
        match transition(&inner.state, settled) {
            Ok(result) => {
                inner.state = result.new_state;
                self.apply(&mut inner, result.effects);
            }
            Err(e) => {
                tracing::error!(error = %e, "Completion settled in an unexpected state");
                inner.state = SessionState::Idle;
            }
        }
        SendOutcome::Settled { conversation_id }
    }

    /// Execute effects in order. Returns the completion request when one
    /// was asked for.
    fn apply(&self, inner: &mut Inner, effects: Vec<Effect>) -> Option<LlmRequest> {
        let mut request = None;
        for effect in effects {
            match effect {
                Effect::AppendUserMessage {
                    conversation_id,
                    text,
                } => self.append(inner, conversation_id, Message::user(text)),
                Effect::AppendPlaceholder { conversation_id } => {
                    self.append(inner, conversation_id, Message::placeholder());
                }
                Effect::PersistConversations => inner.store.save(),
                Effect::RequestCompletion { conversation_id } => {
                    request = inner.store.history(&conversation_id).map(|history| {
                        LlmRequest::new(history.iter().map(to_llm_message).collect())
                    });
                }
                Effect::ResolvePlaceholder {
                    conversation_id,
                    content,
                } => match inner.store.resolve_placeholder(&conversation_id, content) {
                    Some((index, message)) => {
                        let message = message.clone();
                        self.emit(ChatEvent::MessageUpdated {
                            conversation_id,
                            index,
                            message,
                        });
                    }
                    None => {
                        tracing::warn!(conv_id = %conversation_id, "Reply arrived for a conversation that no longer exists");
                    }
                },
                Effect::RaiseRateLimitAlert { message, duration } => {
                    inner.rate_limited_until = Some(Instant::now() + duration);
                    self.emit(ChatEvent::Alert(Alert {
                        kind: AlertKind::RateLimited,
                        message,
                        expires_after: Some(duration),
                    }));
                }
            }
        }
        self.flush_notices(inner);
        request
    }

    fn append(&self, inner: &mut Inner, conversation_id: String, message: Message) {
        match inner.store.append_message(&conversation_id, message.clone()) {
            Some(index) => self.emit(ChatEvent::MessageAppended {
                conversation_id,
                index,
                message,
            }),
            None => {
                tracing::warn!(conv_id = %conversation_id, "Cannot append to missing conversation");
            }
        }
    }

    /// Start a new conversation and make it active
    pub fn new_conversation(&self) -> Conversation {
        let mut inner = self.lock();
        let conversation = inner.store.create().clone();
        self.emit(ChatEvent::ConversationCreated {
            conversation: conversation.clone(),
        });
        self.flush_notices(&mut inner);
        conversation
    }

    /// Make `id` active. Unknown ids change nothing and return `false`.
    pub fn select_conversation(&self, id: &str) -> bool {
        let mut inner = self.lock();
        if !inner.store.select(id) {
            return false;
        }
        if let Some(conversation) = inner.store.get(id).cloned() {
            self.emit(ChatEvent::ConversationSelected { conversation });
        }
        self.flush_notices(&mut inner);
        true
    }

    /// Delete a conversation. Refusing to delete the last one raises an
    /// alert as well as returning the error.
    pub fn delete_conversation(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let active_before = inner.store.active_id().map(str::to_string);

        if let Err(e) = inner.store.delete(id) {
            if e == StoreError::LastConversation {
                self.emit(ChatEvent::Alert(Alert {
                    kind: AlertKind::LastConversation,
                    message: e.to_string(),
                    expires_after: None,
                }));
            }
            return Err(e);
        }

        self.emit(ChatEvent::ConversationDeleted {
            conversation_id: id.to_string(),
        });
        if inner.store.active_id().map(str::to_string) != active_before {
            if let Some(conversation) = inner.store.active().cloned() {
                self.emit(ChatEvent::ConversationSelected { conversation });
            }
        }
        self.flush_notices(&mut inner);
        Ok(())
    }

    /// Snapshot of the active conversation
    pub fn active_conversation(&self) -> Conversation {
        let mut inner = self.lock();
        self.resolve_active(&mut inner);
        inner.store.get_active().clone()
    }

    /// Every conversation, most recent first
    pub fn conversations(&self) -> Vec<ConversationSummary> {
        let inner = self.lock();
        let active = inner.store.active_id();
        inner
            .store
            .conversations()
            .iter()
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                title: c.display_title(),
                message_count: c.messages.len(),
                active: Some(c.id.as_str()) == active,
            })
            .collect()
    }

    /// Most recent settled assistant reply in the active conversation
    pub fn last_reply(&self) -> Option<String> {
        let inner = self.lock();
        inner
            .store
            .active()?
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.is_placeholder())
            .map(|m| m.content.clone())
    }

    pub fn is_busy(&self) -> bool {
        self.lock().state.is_busy()
    }

    /// Whether the rate-limit banner should currently be shown
    pub fn rate_limit_banner_active(&self) -> bool {
        self.lock()
            .rate_limited_until
            .is_some_and(|until| Instant::now() < until)
    }
}

/// Spawned sends the front end still owes a reply for
#[derive(Default)]
pub struct SendTasks {
    handles: Vec<JoinHandle<()>>,
}

impl SendTasks {
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|handle| !handle.is_finished());
        self.handles.push(tokio::spawn(task));
    }

    /// Wait for every outstanding send to settle
    pub async fn finish(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "Send task failed");
                }
            }
        }
    }

    /// Cancel outstanding sends. Their placeholders stay pending in storage
    /// and are recovered on the next load.
    pub async fn abort(self) {
        for handle in &self.handles {
            handle.abort();
        }
        self.finish().await;
    }
}

fn to_llm_message(message: &Message) -> LlmMessage {
    match message.role {
        Role::User => LlmMessage::user(message.content.clone()),
        Role::Assistant => LlmMessage::assistant(message.content.clone()),
    }
}
