//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the transcript
//! and drives streaming sends through the agent gateway.

use tokio_util::sync::CancellationToken;

use crate::agent::{AgentGateway, StreamCallbacks};
use crate::conversation::{Conversation, Exchange};
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::token;

/// Error recorded when a send is attempted without a usable credential.
pub const LOGIN_REQUIRED: &str = "Please login to send messages";

/// A conversation bound to an agent gateway.
pub struct ChatSession {
    gateway: AgentGateway,
    conversation: Conversation,
    max_input_length: Option<usize>,
}

impl ChatSession {
    /// Creates a session with an empty transcript.
    pub fn new(gateway: AgentGateway) -> Self {
        Self {
            gateway,
            conversation: Conversation::new(),
            max_input_length: None,
        }
    }

    /// Limits accepted input to `max_input_length` characters.
    pub fn with_max_input_length(mut self, max_input_length: Option<usize>) -> Self {
        self.max_input_length = max_input_length;
        self
    }

    /// The transcript.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The gateway sends go through.
    pub fn gateway(&self) -> &AgentGateway {
        &self.gateway
    }

    /// Empties the transcript.
    pub fn clear(&mut self) {
        self.conversation.clear();
    }

    /// Clears the conversation-level error.
    pub fn clear_error(&mut self) {
        self.conversation.clear_error();
    }

    /// Sends a user message and streams the response.
    ///
    /// This method:
    /// 1. Rejects empty or over-long input without touching the transcript
    /// 2. Rejects the send if no unexpired access token is stored
    /// 3. Appends the user message and an assistant placeholder
    /// 4. Streams the response into the placeholder
    ///
    /// A failure after step 3 is recorded on the assistant message and in
    /// [`Conversation::error`] and does not make this method fail. If `cancel`
    /// fires, the assistant message keeps the text received so far.
    pub async fn send_message(
        &mut self,
        text: &str,
        renderer: &mut dyn Renderer,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::validation(
                "Message cannot be empty",
                Some("message".to_string()),
            ));
        }
        if let Some(limit) = self.max_input_length
            && text.chars().count() > limit
        {
            return Err(Error::validation(
                format!("Message must be at most {limit} characters"),
                Some("message".to_string()),
            ));
        }

        let usable = self
            .gateway
            .client()
            .store()
            .access_token()
            .is_some_and(|token| !token::is_expired(&token));
        if !usable {
            self.conversation.set_error(LOGIN_REQUIRED);
            renderer.print_error(LOGIN_REQUIRED);
            return Err(Error::authentication(LOGIN_REQUIRED));
        }

        let exchange = self.conversation.begin_exchange(text);
        for id in [&exchange.user_id, &exchange.assistant_id] {
            if let Some(message) = self.conversation.get(id) {
                renderer.message_added(message);
            }
        }

        let mut callbacks = TranscriptCallbacks {
            conversation: &mut self.conversation,
            renderer: &mut *renderer,
            exchange: &exchange,
        };
        self.gateway.send_stream(text, &mut callbacks, cancel).await;

        // Still open only when the stream was cancelled.
        if let Some(message) = self.conversation.settle_cancelled(&exchange.assistant_id) {
            tracing::debug!(id = %message.id, "send cancelled");
            renderer.message_finished(message);
        }
        Ok(())
    }
}

// Translates stream events into transcript mutations for one exchange.
struct TranscriptCallbacks<'a> {
    conversation: &'a mut Conversation,
    renderer: &'a mut dyn Renderer,
    exchange: &'a Exchange,
}

impl StreamCallbacks for TranscriptCallbacks<'_> {
    fn on_chunk(&mut self, chunk: &str) {
        if let Some(message) = self
            .conversation
            .append_chunk(&self.exchange.assistant_id, chunk)
        {
            self.renderer.message_updated(message, chunk);
        }
    }

    fn on_complete(&mut self) {
        if let Some(message) = self.conversation.complete(&self.exchange.assistant_id) {
            self.renderer.message_finished(message);
        }
    }

    fn on_error(&mut self, error: Error) {
        tracing::warn!(error = %error, "send failed");
        if let Some(message) = self.conversation.fail(&self.exchange.assistant_id, &error) {
            self.renderer.message_finished(message);
        }
    }
}
