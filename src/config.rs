//! Client configuration.
//!
//! The host supplies the API base URL and, optionally, an email/password pair
//! used to sign in automatically when no stored session exists.

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable holding the API base URL.
pub const BASE_URL_ENV: &str = "CHAT_BUBBLE_API_BASE_URL";
/// Environment variable holding the auto-login email.
pub const AUTH_EMAIL_ENV: &str = "CHAT_BUBBLE_AUTH_EMAIL";
/// Environment variable holding the auto-login password.
pub const AUTH_PASSWORD_ENV: &str = "CHAT_BUBBLE_AUTH_PASSWORD";

/// Credentials used for automatic sign-in at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct AutoLogin {
    /// Account email.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl std::fmt::Debug for AutoLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoLogin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for [`ApiClient`](crate::ApiClient) and the layers above it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Root of the API; endpoint paths are appended to it.
    pub base_url: String,

    /// Timeout applied to non-streaming requests.
    pub timeout: Duration,

    /// Optional sign-in performed by `AuthGateway::initialize`.
    pub auto_login: Option<AutoLogin>,

    /// Longest message, in characters, that `send_message` accepts.
    pub max_input_length: Option<usize>,
}

impl ClientConfig {
    /// Creates a configuration with default values.
    ///
    /// Defaults:
    /// - Base URL: `http://localhost:5000`
    /// - Timeout: 60 seconds
    /// - Auto-login: disabled
    /// - Max input length: unlimited
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            auto_login: None,
            max_input_length: None,
        }
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through an arbitrary lookup function.
    ///
    /// The auto-login pair is used only when both values are present and non-empty.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::new();
        if let Some(base_url) = non_empty(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        if let (Some(email), Some(password)) = (non_empty(AUTH_EMAIL_ENV), non_empty(AUTH_PASSWORD_ENV))
        {
            config.auto_login = Some(AutoLogin { email, password });
        }
        config
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the auto-login pair.
    pub fn with_auto_login(mut self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.auto_login = Some(AutoLogin {
            email: email.into(),
            password: password.into(),
        });
        self
    }

    /// Sets the maximum accepted message length.
    pub fn with_max_input_length(mut self, max_input_length: Option<usize>) -> Self {
        self.max_input_length = max_input_length;
        self
    }

    /// Parses the base URL, normalized to end with a slash so joins keep its path.
    pub fn parsed_base_url(&self) -> Result<Url> {
        let mut raw = self.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let url = Url::parse(&raw)?;
        if url.cannot_be_a_base() {
            return Err(Error::url(
                format!("base URL cannot be used as a base: {raw}"),
                None,
            ));
        }
        Ok(url)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
