//! The in-memory transcript and its message lifecycle.
//!
//! A send appends a `Sent` user message and a `Streaming` assistant
//! placeholder; stream events then grow the placeholder and finally settle it
//! as `Sent` or `Error`. Events for unknown or already settled messages are
//! ignored, so a late chunk can never reopen or shrink a message.

use std::collections::HashSet;

use crate::error::Error;
use crate::types::{Message, MessageStatus};

/// Content given to a failed assistant message that received no text.
pub const FAILED_RESPONSE_PLACEHOLDER: &str = "Failed to receive response";

/// Ids of the two messages created by one send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// The echoed user message.
    pub user_id: String,
    /// The assistant placeholder that stream events update.
    pub assistant_id: String,
}

/// An ordered, append-only transcript.
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    next_id: u64,
    in_flight: HashSet<String>,
    error: Option<String>,
}

impl Conversation {
    /// Creates an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages in send order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Looks up a message by id.
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// True while any exchange has not settled.
    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// True while an assistant message is receiving text.
    pub fn is_typing(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.status == MessageStatus::Streaming)
    }

    /// The last conversation-level error.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Drops every message and the error. Ids are never reused.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.in_flight.clear();
        self.error = None;
    }

    /// Append the user message and the assistant placeholder for one send.
    pub fn begin_exchange(&mut self, text: &str) -> Exchange {
        self.next_id += 1;
        let exchange = Exchange {
            user_id: format!("user-{}", self.next_id),
            assistant_id: format!("assistant-{}", self.next_id),
        };
        self.error = None;
        self.messages.push(Message::user(&exchange.user_id, text));
        self.messages
            .push(Message::assistant_placeholder(&exchange.assistant_id));
        self.in_flight.insert(exchange.assistant_id.clone());
        exchange
    }

    /// Append streamed text to a message that is still streaming.
    ///
    /// Returns the updated message, or `None` if the event was ignored.
    pub fn append_chunk(&mut self, id: &str, chunk: &str) -> Option<&Message> {
        let message = self.streaming_mut(id)?;
        message.content.push_str(chunk);
        Some(message)
    }

    /// Settle a message as fully delivered.
    pub fn complete(&mut self, id: &str) -> Option<&Message> {
        self.settle(id, MessageStatus::Sent, None)
    }

    /// Settle a message as failed, keeping whatever text already arrived.
    pub fn fail(&mut self, id: &str, error: &Error) -> Option<&Message> {
        let detail = error.to_string();
        self.error = Some(detail.clone());
        self.settle(id, MessageStatus::Error, Some(detail))
    }

    /// Settle a message whose stream was cancelled by the user.
    pub fn settle_cancelled(&mut self, id: &str) -> Option<&Message> {
        self.settle(id, MessageStatus::Sent, None)
    }

    fn settle(&mut self, id: &str, status: MessageStatus, error: Option<String>) -> Option<&Message> {
        self.in_flight.remove(id);
        let message = self.streaming_mut(id)?;
        if !message.status.can_transition_to(status) {
            return None;
        }
        if status == MessageStatus::Error && message.content.is_empty() {
            message.content = FAILED_RESPONSE_PLACEHOLDER.to_string();
        }
        message.status = status;
        message.error = error;
        Some(message)
    }

    fn streaming_mut(&mut self, id: &str) -> Option<&mut Message> {
        let message = self.messages.iter_mut().find(|message| message.id == id)?;
        if message.status.is_terminal() {
            tracing::debug!(id, status = %message.status, "ignoring event for settled message");
            return None;
        }
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sender;

    #[test]
    fn exchange_appends_user_then_placeholder() {
        let mut conversation = Conversation::new();
        let exchange = conversation.begin_exchange("hello");
        assert_eq!(conversation.len(), 2);

        let user = &conversation.messages()[0];
        assert_eq!(user.id, exchange.user_id);
        assert_eq!(user.sender, Sender::User);
        assert_eq!(user.content, "hello");
        assert_eq!(user.status, MessageStatus::Sent);

        let assistant = &conversation.messages()[1];
        assert_eq!(assistant.id, exchange.assistant_id);
        assert_eq!(assistant.sender, Sender::Assistant);
        assert_eq!(assistant.content, "");
        assert_eq!(assistant.status, MessageStatus::Streaming);

        assert!(conversation.is_loading());
        assert!(conversation.is_typing());
    }

    #[test]
    fn chunks_accumulate_then_complete() {
        let mut conversation = Conversation::new();
        let exchange = conversation.begin_exchange("hello");
        let id = exchange.assistant_id.as_str();

        let mut seen = Vec::new();
        for chunk in ["Hi", " there"] {
            let message = conversation.append_chunk(id, chunk).unwrap();
            seen.push(message.content.clone());
        }
        assert_eq!(seen, vec!["Hi".to_string(), "Hi there".to_string()]);

        let message = conversation.complete(id).unwrap();
        assert_eq!(message.status, MessageStatus::Sent);
        assert_eq!(message.content, "Hi there");
        assert!(!conversation.is_loading());
        assert!(!conversation.is_typing());
    }

    #[test]
    fn failure_keeps_partial_text() {
        let mut conversation = Conversation::new();
        let id = conversation.begin_exchange("hello").assistant_id;
        conversation.append_chunk(&id, "Hal");
        let message = conversation
            .fail(&id, &Error::streaming("Error in HTTP stream: reset", None))
            .unwrap();
        assert_eq!(message.status, MessageStatus::Error);
        assert_eq!(message.content, "Hal");
        assert!(message.error.as_deref().unwrap().contains("reset"));
        assert!(conversation.error().unwrap().contains("reset"));
    }

    #[test]
    fn failure_without_text_uses_placeholder() {
        let mut conversation = Conversation::new();
        let id = conversation.begin_exchange("hello").assistant_id;
        let message = conversation
            .fail(&id, &Error::internal_server("HTTP error! status: 500"))
            .unwrap();
        assert_eq!(message.content, FAILED_RESPONSE_PLACEHOLDER);
    }

    #[test]
    fn settled_messages_ignore_late_events() {
        let mut conversation = Conversation::new();
        let id = conversation.begin_exchange("hello").assistant_id;
        conversation.append_chunk(&id, "done");
        conversation.complete(&id);

        assert!(conversation.append_chunk(&id, " more").is_none());
        assert!(conversation.fail(&id, &Error::abort("late")).is_none());
        let message = conversation.get(&id).unwrap();
        assert_eq!(message.content, "done");
        assert_eq!(message.status, MessageStatus::Sent);
        assert!(conversation.error().is_none());
    }

    #[test]
    fn cancelled_message_is_sent_with_partial_text() {
        let mut conversation = Conversation::new();
        let id = conversation.begin_exchange("hello").assistant_id;
        conversation.append_chunk(&id, "par");
        let message = conversation.settle_cancelled(&id).unwrap();
        assert_eq!(message.status, MessageStatus::Sent);
        assert_eq!(message.content, "par");
        assert!(message.error.is_none());
    }

    #[test]
    fn interleaved_exchanges_stay_separate() {
        let mut conversation = Conversation::new();
        let first = conversation.begin_exchange("one").assistant_id;
        let second = conversation.begin_exchange("two").assistant_id;
        conversation.append_chunk(&first, "a");
        conversation.append_chunk(&second, "b");
        conversation.append_chunk(&first, "c");
        conversation.complete(&first);
        assert!(conversation.is_loading());
        assert_eq!(conversation.get(&first).unwrap().content, "ac");
        assert_eq!(conversation.get(&second).unwrap().content, "b");
    }

    #[test]
    fn clear_keeps_ids_unique() {
        let mut conversation = Conversation::new();
        let before = conversation.begin_exchange("one");
        conversation.set_error("boom");
        conversation.clear();
        assert!(conversation.is_empty());
        assert!(conversation.error().is_none());
        assert!(!conversation.is_loading());

        let after = conversation.begin_exchange("two");
        assert_ne!(before.user_id, after.user_id);
        assert_ne!(before.assistant_id, after.assistant_id);
        assert!(conversation.append_chunk(&before.assistant_id, "x").is_none());
    }
}
