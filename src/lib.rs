//! Client core for an embeddable chat widget.
//!
//! The crate signs a user in against the chat API, keeps the session in a
//! [`CredentialStore`], and streams assistant replies from the agent endpoint
//! into a [`Conversation`]. Non-streaming calls go through [`ApiClient`],
//! which renews an expired access token once per burst of 401s and retries.
//!
//! ```no_run
//! # async fn run() -> chat_bubble::Result<()> {
//! use chat_bubble::{AgentGateway, ApiClient, AuthGateway, ClientConfig, CredentialStore};
//! use chat_bubble::chat::ChatSession;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ClientConfig::from_env();
//! let client = ApiClient::new(&config, CredentialStore::in_memory())?;
//! AuthGateway::new(client.clone()).login("a@b.com", "secret1").await?;
//!
//! let mut session = ChatSession::new(AgentGateway::new(client));
//! session
//!     .send_message("hello", &mut (), &CancellationToken::new())
//!     .await?;
//! println!("{}", session.conversation().messages()[1].content);
//! # Ok(())
//! # }
//! ```

// Public modules
pub mod agent;
pub mod auth;
pub mod chat;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod observability;
pub mod render;
pub mod sse;
pub mod storage;
pub mod token;
pub mod types;
pub mod utils;

// Re-exports
pub use agent::{AgentGateway, EventStream, StreamCallbacks};
pub use auth::{AuthGateway, validate_credentials};
pub use client::{ApiClient, Method};
pub use config::{AutoLogin, ClientConfig};
pub use conversation::{Conversation, Exchange};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use sse::{EventStreamCodec, Frame, decode_event_stream};
pub use storage::{CredentialStore, JsonFileStore, KeyValueStore, MemoryStore};
pub use types::*;
