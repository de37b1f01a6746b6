//! In-process mock of the chat API for end-to-end tests.

#![allow(dead_code)]

use std::convert::Infallible;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use serde_json::{Value, json};

use chat_bubble::{ApiClient, ClientConfig, CredentialStore};

/// Password the mock accepts for every account.
pub const PASSWORD: &str = "secret1";

/// How long `/profile/slow` holds a rejection before answering.
pub const SLOW_REJECT_MS: u64 = 300;

/// Email the mock refuses to register.
pub const TAKEN_EMAIL: &str = "taken@b.com";

#[derive(Default)]
pub struct MockState {
    pub refresh_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub slow_calls: AtomicUsize,
    pub fail_refresh: AtomicBool,
    pub reject_profile: AtomicBool,
    pub refresh_delay_ms: AtomicUsize,
    issued: AtomicUsize,
    // (access, refresh) pair the server currently honours.
    tokens: Mutex<Option<(String, String)>>,
}

impl MockState {
    /// Mint a new token pair and make it the only valid one.
    pub fn issue(&self) -> (String, String) {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let pair = (format!("at-{n}"), format!("rt-{n}"));
        *self.tokens.lock().unwrap() = Some(pair.clone());
        pair
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn slow_calls(&self) -> usize {
        self.slow_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    fn access_valid(&self, headers: &HeaderMap) -> bool {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        let tokens = self.tokens.lock().unwrap();
        matches!((presented, tokens.as_ref()), (Some(p), Some((access, _))) if p == access)
    }
}

pub struct MockServer {
    pub base_url: String,
    pub state: Arc<MockState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/refresh", post(refresh))
            .route(
                "/profile",
                get(profile).put(update_profile).delete(delete_profile),
            )
            .route("/profile/slow", get(slow_profile))
            .route("/agents/run-stream", post(run_stream))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_base_url(self.base_url.clone())
            .with_timeout(Duration::from_secs(5))
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.config(), CredentialStore::in_memory()).unwrap()
    }

    /// A client whose stored access token the server no longer accepts but
    /// whose refresh token is current.
    pub fn client_with_expired_token(&self) -> ApiClient {
        let (_, refresh) = self.state.issue();
        let client = self.client();
        client.store().save_tokens("at-expired", &refresh).unwrap();
        client
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn auth_response(state: &MockState, email: &str) -> Response {
    let (access, refresh) = state.issue();
    Json(json!({
        "userId": "user-42",
        "email": email,
        "accessToken": access,
        "refreshToken": refresh,
    }))
    .into_response()
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if body["password"] != PASSWORD {
        return error(StatusCode::UNAUTHORIZED, "Invalid email or password");
    }
    auth_response(&state, body["email"].as_str().unwrap_or_default())
}

async fn register(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    if email == TAKEN_EMAIL {
        return error(StatusCode::CONFLICT, "User already exists");
    }
    auth_response(&state, email)
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = state.refresh_delay_ms.load(Ordering::SeqCst) as u64;
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.fail_refresh.load(Ordering::SeqCst) {
        return error(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }
    let current = state.tokens.lock().unwrap().clone();
    match current {
        Some((_, refresh)) if body["refreshToken"] == refresh.as_str() => {
            let (access, refresh) = state.issue();
            Json(json!({ "accessToken": access, "refreshToken": refresh })).into_response()
        }
        _ => error(StatusCode::UNAUTHORIZED, "Invalid refresh token"),
    }
}

async fn profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.profile_calls.fetch_add(1, Ordering::SeqCst);
    if state.reject_profile.load(Ordering::SeqCst) || !state.access_valid(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Token expired");
    }
    Json(json!({ "email": "a@b.com" })).into_response()
}

/// Echoes the JSON body back once the caller is authorized.
async fn update_profile(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.profile_calls.fetch_add(1, Ordering::SeqCst);
    if !state.access_valid(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Token expired");
    }
    Json(body).into_response()
}

/// Judges the token on arrival but answers late, so a rejection can land
/// after another request has already renewed the credential.
async fn slow_profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.slow_calls.fetch_add(1, Ordering::SeqCst);
    let valid = state.access_valid(&headers);
    if !valid {
        tokio::time::sleep(Duration::from_millis(SLOW_REJECT_MS)).await;
        return error(StatusCode::UNAUTHORIZED, "Token expired");
    }
    Json(json!({ "email": "a@b.com" })).into_response()
}

async fn delete_profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.access_valid(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Token expired");
    }
    StatusCode::NO_CONTENT.into_response()
}

fn delayed<S: Into<String>>(parts: Vec<S>) -> Body {
    let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
    let chunks = stream::iter(parts).then(|part| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, Infallible>(Bytes::from(part))
    });
    Body::from_stream(chunks)
}

fn event_stream(body: Body) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn run_stream(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.stream_calls.fetch_add(1, Ordering::SeqCst);
    if !state.access_valid(&headers) {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    match body["message"].as_str().unwrap_or_default() {
        // Event boundaries deliberately fall mid-chunk.
        "hello" => event_stream(delayed(vec![
            "data: H",
            "i\n\ndata:  th",
            "ere\n\ndata: [DO",
            "NE]\n\ndata: ignored\n\n",
        ])),
        "eof" => event_stream(delayed(vec!["data: one\n\n", "data: two\n\n"])),
        "slow" => {
            let ticks = stream::unfold((), |()| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Some((Ok::<_, Infallible>(Bytes::from_static(b"data: tick\n\n")), ()))
            });
            let first = stream::once(async { Ok::<_, Infallible>(Bytes::from_static(b"data: first\n\n")) });
            event_stream(Body::from_stream(first.chain(ticks)))
        }
        "break" => {
            let parts: Vec<io::Result<Bytes>> = vec![
                Ok(Bytes::from_static(b"data: partial\n\ndata: lo")),
                Err(io::Error::other("connection reset by mock")),
            ];
            let chunks = stream::iter(parts).then(|part| async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                part
            });
            event_stream(Body::from_stream(chunks))
        }
        "boom" => error(StatusCode::INTERNAL_SERVER_ERROR, "Agent crashed"),
        // Status line now, error body much later.
        "slowfail" => {
            let body = stream::once(async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok::<_, Infallible>(Bytes::from(json!({ "error": "slow failure" }).to_string()))
            });
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "application/json")],
                Body::from_stream(body),
            )
                .into_response()
        }
        "bare" => StatusCode::BAD_GATEWAY.into_response(),
        other => event_stream(delayed(vec![
            format!("data: echo {other}\n\n"),
            "data: [DONE]\n\n".to_string(),
        ])),
    }
}
