use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Who authored a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The person typing into the widget.
    User,
    /// The remote agent.
    Assistant,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "assistant"),
        }
    }
}

/// Lifecycle state of a message.
///
/// Assistant messages move `Sending -> Streaming -> {Sent, Error}`; user
/// messages are created `Sent`. `Sent` and `Error` are terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Created but no response has started.
    Sending,
    /// Response text is still arriving.
    Streaming,
    /// Delivered in full.
    Sent,
    /// The response failed; see `Message::error`.
    Error,
}

impl MessageStatus {
    /// Returns true for `Sent` and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, MessageStatus::Sent | MessageStatus::Error)
    }

    /// Returns true if a message may move from `self` to `next`.
    pub fn can_transition_to(self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        matches!(
            (self, next),
            (Sending, Streaming) | (Sending, Sent) | (Sending, Error) | (Streaming, Sent) | (Streaming, Error)
        )
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Sending => write!(f, "sending"),
            MessageStatus::Streaming => write!(f, "streaming"),
            MessageStatus::Sent => write!(f, "sent"),
            MessageStatus::Error => write!(f, "error"),
        }
    }
}

/// Error returned when parsing an invalid message status string.
#[derive(Debug)]
pub struct MessageStatusParseError {
    /// The invalid string value that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for MessageStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown message status: {}", self.invalid_value)
    }
}

impl std::error::Error for MessageStatusParseError {}

impl FromStr for MessageStatus {
    type Err = MessageStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sending" => Ok(MessageStatus::Sending),
            "streaming" => Ok(MessageStatus::Streaming),
            "sent" => Ok(MessageStatus::Sent),
            "error" => Ok(MessageStatus::Error),
            _ => Err(MessageStatusParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// A single entry of the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique, immutable id.
    pub id: String,
    /// Author of the message.
    pub sender: Sender,
    /// Message text; only grows while `status` is `Streaming`.
    pub content: String,
    /// Creation time.
    #[serde(with = "crate::utils::timestamp")]
    pub timestamp: OffsetDateTime,
    /// Lifecycle state.
    pub status: MessageStatus,
    /// Failure detail when `status` is `Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Message {
    /// Creates a delivered user message.
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: Sender::User,
            content: content.into(),
            timestamp: crate::utils::timestamp::normalize(OffsetDateTime::now_utc()),
            status: MessageStatus::Sent,
            error: None,
        }
    }

    /// Creates an empty assistant placeholder in the `Streaming` state.
    pub fn assistant_placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sender: Sender::Assistant,
            content: String::new(),
            timestamp: crate::utils::timestamp::normalize(OffsetDateTime::now_utc()),
            status: MessageStatus::Streaming,
            error: None,
        }
    }
}
