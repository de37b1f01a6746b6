//! Interactive chat on top of the client library.
//!
//! This module provides the pieces of the `chat-bubble` REPL:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: transcript ownership and streaming sends
//! - [`commands`]: slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, DEFAULT_CREDENTIALS_FILE};
pub use session::{ChatSession, LOGIN_REQUIRED};
