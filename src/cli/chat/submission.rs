use tracing::{debug, error, warn};

use crate::chat_client::ChatTransport;
use crate::cli::chat::conversation_state::{ConversationStore, Message};

/// Assistant text used when the endpoint answers with an empty reply.
pub const NO_RESPONSE: &str = "No response";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input; nothing happened.
    Ignored,
    /// Another submission is still in flight; nothing happened.
    Busy,
    /// The endpoint replied and the assistant message was appended.
    Replied(Message),
    /// The request failed; the message was recorded as the last error.
    Failed(String),
}

/// Runs one send cycle at a time against a [`ChatTransport`].
pub struct SubmissionController<T> {
    store: ConversationStore,
    transport: T,
}

impl<T: ChatTransport> SubmissionController<T> {
    pub fn new(store: ConversationStore, transport: T) -> Self {
        Self { store, transport }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub async fn submit(&self, input_text: &str) -> SubmitOutcome {
        if input_text.trim().is_empty() {
            debug!("Ignoring blank submission");
            return SubmitOutcome::Ignored;
        }

        if !self.store.begin_submission(Message::user(input_text)) {
            warn!("Submission rejected: a request is already in flight");
            return SubmitOutcome::Busy;
        }

        let _finalize = Finalize { store: &self.store };

        match self.transport.send_message(input_text).await {
            Ok(reply) => {
                let text = if reply.is_empty() { NO_RESPONSE.to_string() } else { reply };
                let message = Message::assistant(text);
                self.store.append(message.clone());
                SubmitOutcome::Replied(message)
            }
            Err(err) => {
                error!("Chat request failed: {}", err);
                let message = err.user_message();
                self.store.set_error(Some(message.clone()));
                SubmitOutcome::Failed(message)
            }
        }
    }
}

/// Leaves the pending state and clears the draft when dropped, so it runs
/// on return, on panic and when the submit future is dropped mid-flight.
struct Finalize<'a> {
    store: &'a ConversationStore,
}

impl Drop for Finalize<'_> {
    fn drop(&mut self) {
        self.store.set_pending(false);
        self.store.clear_input();
    }
}
