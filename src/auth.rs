//! Sign-in, registration and session bootstrap.

use crate::client::{ApiClient, LOGIN_ENDPOINT, REGISTER_ENDPOINT};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::storage::CredentialStore;
use crate::types::{AuthRequest, AuthResponse, AuthSession, Credential, User};

/// Shortest password accepted by [`validate_credentials`].
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Check an email/password pair before it is sent anywhere.
pub fn validate_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(Error::validation("Email and password are required", None));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::validation(
            "Password must be at least 6 characters",
            Some("password".to_string()),
        ));
    }
    Ok(())
}

/// Performs authentication calls and keeps the credential store current.
///
/// Every successful call has persisted its credential by the time it returns.
#[derive(Debug, Clone)]
pub struct AuthGateway {
    client: ApiClient,
}

impl AuthGateway {
    /// Creates a gateway over `client`.
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn store(&self) -> &CredentialStore {
        self.client.store()
    }

    /// Sign in with an existing account.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        validate_credentials(email, password)?;
        tracing::debug!(email, "logging in");
        self.authenticate(LOGIN_ENDPOINT, email, password)
            .await
            .map_err(|err| Error::authentication(format!("Login failed: {}", err.message())))
    }

    /// Create an account and sign in with it.
    pub async fn register(&self, email: &str, password: &str) -> Result<AuthSession> {
        validate_credentials(email, password)?;
        tracing::debug!(email, "registering");
        self.authenticate(REGISTER_ENDPOINT, email, password)
            .await
            .map_err(|err| {
                Error::authentication(format!("Registration failed: {}", err.message()))
            })
    }

    async fn authenticate(&self, endpoint: &str, email: &str, password: &str) -> Result<AuthSession> {
        let request = AuthRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: AuthResponse = self.client.post(endpoint, &request).await?;
        let credential = Credential {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            user_id: response.user_id,
            email: response.email,
        };
        self.store().save(&credential)?;
        tracing::info!(user_id = %credential.user_id, "signed in");
        Ok(AuthSession {
            user: credential.user(),
            credential,
        })
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Shares the single in-flight exchange with the request pipeline. The
    /// store is cleared if the exchange fails.
    pub async fn refresh(&self) -> Result<AuthSession> {
        self.client.refresh().await?;
        let credential = self
            .store()
            .credential()
            .ok_or_else(|| Error::authentication("No stored user for refreshed credential"))?;
        Ok(AuthSession {
            user: credential.user(),
            credential,
        })
    }

    /// Forget the current session.
    pub fn logout(&self) -> Result<()> {
        tracing::info!("signing out");
        self.store().clear()
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<User> {
        self.store().user()
    }

    /// True if an access token is stored.
    pub fn is_authenticated(&self) -> bool {
        self.store().is_authenticated()
    }

    /// The stored access token.
    pub fn access_token(&self) -> Option<String> {
        self.store().access_token()
    }

    /// The stored refresh token.
    pub fn refresh_token(&self) -> Option<String> {
        self.store().refresh_token()
    }

    /// Restore the stored session, or sign in with the configured auto-login pair.
    ///
    /// Returns `Ok(None)` when there is neither a stored session nor an
    /// auto-login pair.
    pub async fn initialize(&self, config: &ClientConfig) -> Result<Option<AuthSession>> {
        if let Some(credential) = self.store().credential() {
            tracing::debug!(user_id = %credential.user_id, "restored stored session");
            return Ok(Some(AuthSession {
                user: credential.user(),
                credential,
            }));
        }

        let Some(auto) = &config.auto_login else {
            return Ok(None);
        };
        tracing::info!(email = %auto.email, "auto-login with configured credentials");
        match self.login(&auto.email, &auto.password).await {
            Ok(session) => Ok(Some(session)),
            Err(err) => {
                tracing::warn!(error = %err, "auto-login failed");
                Err(Error::authentication(format!(
                    "Auto-login failed: {}",
                    err.message()
                )))
            }
        }
    }
}
