//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::path::PathBuf;

use arrrg_derive::CommandLine;

use crate::config::{AUTH_PASSWORD_ENV, ClientConfig};

/// File name of the credential store, relative to the home directory.
pub const DEFAULT_CREDENTIALS_FILE: &str = ".chat-bubble-credentials.json";

/// Command-line arguments for the chat-bubble tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// API base URL.
    #[arrrg(optional, "API base URL (default: $CHAT_BUBBLE_API_BASE_URL or http://localhost:5000)", "URL")]
    pub base_url: Option<String>,

    /// Credential store location.
    #[arrrg(optional, "File holding the stored session (default: ~/.chat-bubble-credentials.json)", "PATH")]
    pub credentials: Option<String>,

    /// Auto-login email. The password is only read from the environment.
    #[arrrg(optional, "Email to sign in with at startup (password from $CHAT_BUBBLE_AUTH_PASSWORD)", "EMAIL")]
    pub email: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for the chat application.
///
/// This struct holds the resolved configuration values after layering
/// command-line arguments over the environment.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Settings for the API client and the layers above it.
    pub client: ClientConfig,

    /// Where the session is persisted between runs.
    pub credentials_path: PathBuf,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Client: [`ClientConfig::new`]
    /// - Credentials: `~/.chat-bubble-credentials.json`
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            client: ClientConfig::new(),
            credentials_path: default_credentials_path(),
            use_color: true,
        }
    }

    /// Layers `args` over `client`; flags win over the base values.
    ///
    /// `--email` replaces the email of an existing auto-login pair and is
    /// ignored when `client` has none.
    pub fn from_args(args: ChatArgs, client: ClientConfig) -> Self {
        let mut client = client;
        if let Some(base_url) = args.base_url {
            client = client.with_base_url(base_url);
        }
        if let Some(email) = args.email {
            match client.auto_login.as_mut() {
                Some(auto) => auto.email = email,
                None => tracing::warn!("--email given without {AUTH_PASSWORD_ENV}; not signing in"),
            }
        }
        Self {
            client,
            credentials_path: args
                .credentials
                .map(PathBuf::from)
                .unwrap_or_else(default_credentials_path),
            use_color: !args.no_color,
        }
    }

    /// Sets the client configuration.
    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Sets the credential store location.
    pub fn with_credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatConfig {
    /// Layers `args` over the variables `lookup` resolves.
    ///
    /// An `--email` flag pairs with the password variable even when the email
    /// variable is unset.
    pub fn from_lookup<F>(args: ChatArgs, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut client = ClientConfig::from_lookup(&lookup);
        if let Some(email) = &args.email
            && client.auto_login.is_none()
            && let Some(password) = lookup(AUTH_PASSWORD_ENV).filter(|p| !p.trim().is_empty())
        {
            client = client.with_auto_login(email.clone(), password);
        }
        Self::from_args(args, client)
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        Self::from_lookup(args, |key| std::env::var(key).ok())
    }
}

fn default_credentials_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(DEFAULT_CREDENTIALS_FILE)
}
