use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use url::Url;

pub use reqwest::Method;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUEST_RETRIES, CLIENT_REQUESTS,
    REFRESH_EXCHANGES, REFRESH_FAILURES, REFRESH_WAITERS,
};
use crate::storage::CredentialStore;
use crate::types::{ErrorBody, RefreshRequest, RefreshResponse};

/// Endpoint for signing in.
pub const LOGIN_ENDPOINT: &str = "/auth/login";
/// Endpoint for creating an account.
pub const REGISTER_ENDPOINT: &str = "/auth/register";
/// Endpoint for exchanging a refresh token.
pub const REFRESH_ENDPOINT: &str = "/auth/refresh";

type RefreshWaiter = oneshot::Sender<Result<String>>;

/// Authenticated JSON client for the chat-bubble API.
///
/// Every request carries the stored access token. A 401 on a non-auth
/// endpoint triggers one token refresh and one retry; concurrent 401s share a
/// single refresh exchange.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    store: CredentialStore,
    // `Some` while a refresh exchange is in flight; holds the queued callers.
    refresh_waiters: Arc<Mutex<Option<Vec<RefreshWaiter>>>>,
}

impl ApiClient {
    /// Create a new client for the API described by `config`.
    pub fn new(config: &ClientConfig, store: CredentialStore) -> Result<Self> {
        let base_url = config.parsed_base_url()?;
        // No client-wide timeout: it would cut long-lived streams. Plain
        // requests get `timeout` applied per request instead.
        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
            store,
            refresh_waiters: Arc::new(Mutex::new(None)),
        })
    }

    /// The credential store this client reads tokens from.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// The base URL endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &ReqwestClient {
        &self.client
    }

    /// Resolve an endpoint path such as `/auth/login` against the base URL.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.base_url.join(endpoint.trim_start_matches('/'))?)
    }

    /// Send a `GET` request and decode the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.request::<T, ()>(Method::GET, endpoint, None).await
    }

    /// Send a `POST` request with a JSON body and decode the JSON response.
    pub async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    /// Send a `PUT` request with a JSON body and decode the JSON response.
    pub async fn put<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, endpoint, Some(body)).await
    }

    /// Send a `DELETE` request and decode the JSON response.
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.request::<T, ()>(Method::DELETE, endpoint, None).await
    }

    /// Send a request and decode the JSON response.
    ///
    /// An empty success body decodes as JSON `null`, so `()` and `Option<_>`
    /// are valid targets.
    pub async fn request<T, B>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = self.request_with_refresh(method, endpoint, body).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());
        if let Err(err) = &result {
            CLIENT_REQUEST_ERRORS.click();
            tracing::debug!(endpoint, error = %err, "request failed");
        }
        result
    }

    async fn request_with_refresh<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.endpoint_url(endpoint)?;
        // Serialized once so the retry replays the identical body.
        let body = body.map(serde_json::to_vec).transpose()?;

        let sent_token = self.store.access_token();
        let response = self
            .execute(&method, &url, body.as_deref(), sent_token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || is_auth_endpoint(endpoint) {
            return Self::decode_response(response).await;
        }

        let token = match self.store.access_token() {
            // Someone else already renewed the credential while we were waiting.
            Some(current) if sent_token.as_ref() != Some(&current) => {
                tracing::debug!(endpoint, "credential renewed concurrently; replaying request");
                current
            }
            _ => self.refresh().await?,
        };

        CLIENT_REQUEST_RETRIES.click();
        let retry = self
            .execute(&method, &url, body.as_deref(), Some(&token))
            .await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            let cause = Self::process_error_response(retry).await;
            return Err(Error::authentication(format!(
                "request rejected after token refresh: {}",
                cause.message()
            )));
        }
        Self::decode_response(retry).await
    }

    /// Exchange the refresh token for a new token pair.
    ///
    /// At most one exchange is in flight at a time: a caller that arrives
    /// while one is running waits for its outcome instead of starting another.
    /// On failure every waiter receives the same error and the credential
    /// store is cleared.
    pub async fn refresh(&self) -> Result<String> {
        let waiter = {
            let mut in_flight = self
                .refresh_waiters
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            match in_flight.as_mut() {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    *in_flight = Some(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            REFRESH_WAITERS.click();
            return rx
                .await
                .unwrap_or_else(|_| Err(Error::abort("token refresh was abandoned")));
        }

        let mut slot = RefreshSlot {
            waiters: self.refresh_waiters.as_ref(),
            settled: false,
        };
        let result = self.exchange_refresh_token().await;
        slot.settle(&result);
        result
    }

    async fn exchange_refresh_token(&self) -> Result<String> {
        REFRESH_EXCHANGES.click();
        tracing::debug!("refreshing access token");
        match self.try_exchange_refresh_token().await {
            Ok(token) => {
                tracing::info!("access token refreshed");
                Ok(token)
            }
            Err(err) => {
                REFRESH_FAILURES.click();
                tracing::warn!(error = %err, "token refresh failed; clearing stored credential");
                if let Err(clear_err) = self.store.clear() {
                    tracing::warn!(error = %clear_err, "failed to clear credential store");
                }
                Err(match err {
                    Error::Authentication { .. } => err,
                    other => Error::authentication(format!("Failed to refresh token: {other}")),
                })
            }
        }
    }

    async fn try_exchange_refresh_token(&self) -> Result<String> {
        let (Some(access_token), Some(refresh_token)) =
            (self.store.access_token(), self.store.refresh_token())
        else {
            return Err(Error::authentication("No refresh token available"));
        };

        let url = self.endpoint_url(REFRESH_ENDPOINT)?;
        let body = serde_json::to_vec(&RefreshRequest {
            access_token,
            refresh_token,
        })?;
        let response = self.execute(&Method::POST, &url, Some(&body), None).await?;
        if !response.status().is_success() {
            let cause = Self::process_error_response(response).await;
            return Err(Error::authentication(format!(
                "Failed to refresh token: {}",
                cause.message()
            )));
        }

        let tokens: RefreshResponse = Self::decode_response(response).await?;
        self.store
            .save_tokens(&tokens.access_token, &tokens.refresh_token)?;
        Ok(tokens.access_token)
    }

    async fn execute(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        token: Option<&str>,
    ) -> Result<Response> {
        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .timeout(self.timeout)
            .header(header::ACCEPT, HeaderValue::from_static("application/json"))
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.body(body.to_vec());
        }

        builder
            .send()
            .await
            .map_err(|e| Error::from_transport(e, Some(self.timeout.as_secs_f64())))
    }

    async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let bytes = response.bytes().await.map_err(|e| {
            Error::http_client(
                format!("Failed to read response: {e}"),
                Some(Box::new(e)),
            )
        })?;
        let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &bytes
        };
        serde_json::from_slice(bytes).map_err(|e| {
            Error::serialization(format!("Failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// Process API response errors and convert to our Error type
    pub(crate) async fn process_error_response(response: Response) -> Error {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.error)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));

        error_for_status(status, message, retry_after)
    }
}

/// Map an HTTP status and message onto the matching error variant.
pub(crate) fn error_for_status(status: StatusCode, message: String, retry_after: Option<u64>) -> Error {
    match status.as_u16() {
        400 => Error::bad_request(message),
        401 => Error::authentication(message),
        403 => Error::permission(message),
        404 => Error::not_found(message),
        408 => Error::timeout(message, None),
        429 => Error::rate_limit(message, retry_after),
        500 => Error::internal_server(message),
        502..=504 => Error::service_unavailable(message, retry_after),
        code => Error::api(code, message),
    }
}

/// True for endpoints whose 401s must never trigger a refresh.
pub fn is_auth_endpoint(endpoint: &str) -> bool {
    let path = endpoint.split(['?', '#']).next().unwrap_or(endpoint);
    let path = format!("/{}", path.trim_matches('/'));
    [LOGIN_ENDPOINT, REGISTER_ENDPOINT, REFRESH_ENDPOINT].contains(&path.as_str())
}

// Owns the in-flight marker for the duration of one exchange. Dropping it
// unsettled (the leader was cancelled) releases waiters with a closed channel.
struct RefreshSlot<'a> {
    waiters: &'a Mutex<Option<Vec<RefreshWaiter>>>,
    settled: bool,
}

impl RefreshSlot<'_> {
    fn settle(&mut self, result: &Result<String>) {
        self.settled = true;
        let waiters = self
            .waiters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .unwrap_or_default();
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

impl Drop for RefreshSlot<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let abandoned = self
                .waiters
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            drop(abandoned);
        }
    }
}
