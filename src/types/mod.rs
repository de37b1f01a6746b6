// Public modules
pub mod agent_params;
pub mod auth_params;
pub mod credential;
pub mod message;
pub mod stream_event;

// Re-exports
pub use agent_params::AgentStreamRequest;
pub use auth_params::{AuthRequest, AuthResponse, ErrorBody, RefreshRequest, RefreshResponse};
pub use credential::{AuthSession, Credential, User};
pub use message::{Message, MessageStatus, MessageStatusParseError, Sender};
pub use stream_event::StreamEvent;
