use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;
use tokio::sync::broadcast;
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;
const TIMESTAMP_FORMAT: &str = "%-I:%M:%S %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "Assistant",
            Role::System => "System",
        }
    }
}

/// A single entry of the conversation log. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: Uuid,
    role: Role,
    text: String,
    timestamp: String,
}

impl Message {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub pending: bool,
    pub last_error: Option<String>,
    pub input: String,
}

/// Change notification published after every store mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    MessageAppended(Message),
    PendingChanged(bool),
    ErrorChanged(Option<String>),
    InputCleared,
}

/// Shared handle to the conversation state.
///
/// Clones refer to the same state. Every mutation is published to
/// subscribers; the lock is released before publishing.
#[derive(Clone)]
pub struct ConversationStore {
    state: Arc<Mutex<ConversationState>>,
    events: broadcast::Sender<StoreEvent>,
}

impl ConversationStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            state: Arc::new(Mutex::new(ConversationState::default())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn append(&self, message: Message) {
        self.lock().messages.push(message.clone());
        self.notify(StoreEvent::MessageAppended(message));
    }

    pub fn set_pending(&self, pending: bool) {
        self.lock().pending = pending;
        self.notify(StoreEvent::PendingChanged(pending));
    }

    pub fn set_error(&self, error: Option<String>) {
        self.lock().last_error = error.clone();
        self.notify(StoreEvent::ErrorChanged(error));
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.lock().input = text.into();
    }

    pub fn clear_input(&self) {
        self.lock().input.clear();
        self.notify(StoreEvent::InputCleared);
    }

    /// Appends the user's message and enters the pending state, unless a
    /// submission is already in flight. Returns false without touching
    /// anything in that case.
    pub fn begin_submission(&self, message: Message) -> bool {
        {
            let mut state = self.lock();
            if state.pending {
                return false;
            }
            state.messages.push(message.clone());
            state.pending = true;
            state.last_error = None;
        }

        self.notify(StoreEvent::MessageAppended(message));
        self.notify(StoreEvent::PendingChanged(true));
        self.notify(StoreEvent::ErrorChanged(None));
        true
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn input(&self) -> String {
        self.lock().input.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn snapshot(&self) -> ConversationState {
        self.lock().clone()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
