use serde::{Deserialize, Serialize};

/// Body of `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

/// Response of `POST /auth/login` and `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Server-assigned user id.
    pub user_id: String,
    /// Account email.
    pub email: String,
    /// Freshly issued access token.
    pub access_token: String,
    /// Freshly issued refresh token.
    pub refresh_token: String,
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// The access token being replaced.
    pub access_token: String,
    /// The refresh token authorizing the exchange.
    pub refresh_token: String,
}

/// Response of `POST /auth/refresh`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// Replacement access token.
    pub access_token: String,
    /// Replacement refresh token.
    pub refresh_token: String,
}

/// Structured error payload returned by the API on non-success statuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable error message.
    #[serde(default)]
    pub error: Option<String>,
}
