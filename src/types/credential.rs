use std::fmt;

use serde::{Deserialize, Serialize};

/// The identity of the signed-in user, as persisted under the user key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user id.
    pub id: String,
    /// Email address the user signed in with.
    pub email: String,
}

impl User {
    /// Creates a new user record.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

/// The one live credential of a session.
///
/// Created on successful login, register or refresh, read on every
/// authenticated request and destroyed on logout.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Bearer token attached to authenticated requests.
    pub access_token: String,
    /// Token exchanged for a new pair when the access token is rejected.
    pub refresh_token: String,
    /// Id of the user the tokens were issued to.
    pub user_id: String,
    /// Email of the user the tokens were issued to.
    pub email: String,
}

impl Credential {
    /// Returns the user record this credential belongs to.
    pub fn user(&self) -> User {
        User::new(self.user_id.clone(), self.email.clone())
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .finish()
    }
}

/// The result of a successful login, register or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// The signed-in user.
    pub user: User,
    /// The credential that was persisted before this value was returned.
    pub credential: Credential,
}
