//! End-to-end tests for authentication and the request pipeline.
//! These run against an in-process mock server; no network access is needed.

mod common;

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde::{Deserialize, Serialize};
    use tokio_test::{assert_err, assert_ok};

    use chat_bubble::{AuthGateway, ClientConfig, CredentialStore, JsonFileStore, ApiClient};

    use crate::common::{MockServer, PASSWORD, TAKEN_EMAIL};

    #[derive(Debug, Deserialize)]
    struct Profile {
        email: String,
    }

    #[tokio::test]
    async fn login_persists_credential_before_returning() {
        let server = MockServer::start().await;
        let client = server.client();
        let auth = AuthGateway::new(client.clone());

        let session = assert_ok!(auth.login("a@b.com", PASSWORD).await);
        assert_eq!(session.user.email, "a@b.com");
        assert_eq!(session.user.id, "user-42");

        let stored = client.store().credential().unwrap();
        assert_eq!(stored, session.credential);
        assert_eq!(auth.current_user(), Some(session.user));
        assert!(auth.is_authenticated());
    }

    #[tokio::test]
    async fn bad_credentials_do_not_trigger_refresh() {
        let server = MockServer::start().await;
        let auth = AuthGateway::new(server.client());

        let err = assert_err!(auth.login("a@b.com", "wrong-password").await);
        assert!(err.is_authentication());
        assert_eq!(err.message(), "Login failed: Invalid email or password");
        assert_eq!(server.state.refresh_calls(), 0);
        assert!(!auth.is_authenticated());
    }

    #[tokio::test]
    async fn register_reports_server_message() {
        let server = MockServer::start().await;
        let auth = AuthGateway::new(server.client());

        let err = assert_err!(auth.register(TAKEN_EMAIL, PASSWORD).await);
        assert!(err.is_authentication());
        assert_eq!(err.message(), "Registration failed: User already exists");

        let session = assert_ok!(auth.register("new@b.com", PASSWORD).await);
        assert_eq!(session.user.email, "new@b.com");
    }

    #[tokio::test]
    async fn unauthorized_get_refreshes_once_and_retries() {
        let server = MockServer::start().await;
        let client = server.client_with_expired_token();

        let profile: Profile = assert_ok!(client.get("/profile").await);
        assert_eq!(profile.email, "a@b.com");
        assert_eq!(server.state.refresh_calls(), 1);
        assert_eq!(server.state.profile_calls(), 2);
        assert_eq!(client.store().access_token().as_deref(), Some("at-2"));
        assert_eq!(client.store().refresh_token().as_deref(), Some("rt-2"));
    }

    #[tokio::test]
    async fn concurrent_unauthorized_requests_share_one_refresh() {
        let server = MockServer::start().await;
        server.state.refresh_delay_ms.store(100, Ordering::SeqCst);
        let client = server.client_with_expired_token();

        let (a, b, c) = tokio::join!(
            client.get::<Profile>("/profile"),
            client.get::<Profile>("/profile"),
            client.get::<Profile>("/profile"),
        );
        assert_ok!(a);
        assert_ok!(b);
        assert_ok!(c);
        assert_eq!(server.state.refresh_calls(), 1);
        assert_eq!(server.state.profile_calls(), 6);
        assert_eq!(client.store().access_token().as_deref(), Some("at-2"));
    }

    #[tokio::test]
    async fn clones_share_the_refresh_slot() {
        let server = MockServer::start().await;
        server.state.refresh_delay_ms.store(100, Ordering::SeqCst);
        let client = server.client_with_expired_token();
        let other = client.clone();

        let first = tokio::spawn(async move { client.get::<Profile>("/profile").await });
        let second = tokio::spawn(async move { other.get::<Profile>("/profile").await });
        assert_ok!(first.await.unwrap());
        assert_ok!(second.await.unwrap());
        assert_eq!(server.state.refresh_calls(), 1);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ProfileUpdate {
        display_name: String,
        tags: Vec<String>,
    }

    #[tokio::test]
    async fn late_unauthorized_replays_with_renewed_token() {
        let server = MockServer::start().await;
        let client = server.client_with_expired_token();

        // The slow rejection lands long after the fast request has refreshed.
        let (slow, fast) = tokio::join!(
            client.get::<Profile>("/profile/slow"),
            client.get::<Profile>("/profile"),
        );
        assert_eq!(assert_ok!(slow).email, "a@b.com");
        assert_ok!(fast);
        assert_eq!(server.state.refresh_calls(), 1);
        assert_eq!(server.state.slow_calls(), 2);
        assert_eq!(client.store().access_token().as_deref(), Some("at-2"));
    }

    #[tokio::test]
    async fn retried_put_replays_the_same_body() {
        let server = MockServer::start().await;
        let client = server.client_with_expired_token();
        let update = ProfileUpdate {
            display_name: "Ada".to_string(),
            tags: vec!["admin".to_string(), "beta".to_string()],
        };

        let echoed: ProfileUpdate = assert_ok!(client.put("/profile", &update).await);
        assert_eq!(echoed, update);
        assert_eq!(server.state.refresh_calls(), 1);
        assert_eq!(server.state.profile_calls(), 2);
    }

    #[tokio::test]
    async fn second_unauthorized_is_terminal() {
        let server = MockServer::start().await;
        server.state.reject_profile.store(true, Ordering::SeqCst);
        let client = server.client_with_expired_token();

        let err = assert_err!(client.get::<Profile>("/profile").await);
        assert!(err.is_authentication());
        assert!(err.message().contains("Token expired"));
        assert_eq!(server.state.refresh_calls(), 1);
        assert_eq!(server.state.profile_calls(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_rejects_all_waiters_and_clears_store() {
        let server = MockServer::start().await;
        server.state.fail_refresh.store(true, Ordering::SeqCst);
        server.state.refresh_delay_ms.store(100, Ordering::SeqCst);
        let client = server.client_with_expired_token();

        let (a, b) = tokio::join!(
            client.get::<Profile>("/profile"),
            client.get::<Profile>("/profile"),
        );
        let a = assert_err!(a);
        let b = assert_err!(b);
        assert!(a.is_authentication());
        assert!(b.is_authentication());
        assert_eq!(a.message(), b.message());
        assert_eq!(server.state.refresh_calls(), 1);

        assert!(client.store().access_token().is_none());
        assert!(client.store().refresh_token().is_none());
        assert!(client.store().user().is_none());
    }

    #[tokio::test]
    async fn auth_gateway_refresh_returns_session() {
        let server = MockServer::start().await;
        let client = server.client();
        let auth = AuthGateway::new(client.clone());
        let before = assert_ok!(auth.login("a@b.com", PASSWORD).await);

        let after = assert_ok!(auth.refresh().await);
        assert_eq!(after.user, before.user);
        assert_ne!(after.credential.access_token, before.credential.access_token);
        assert_eq!(client.store().credential(), Some(after.credential));
        assert_eq!(server.state.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn empty_response_body_decodes_as_unit() {
        let server = MockServer::start().await;
        let client = server.client_with_expired_token();
        let () = assert_ok!(client.delete::<()>("/profile").await);
        assert_eq!(server.state.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn auto_login_on_initialize() {
        let server = MockServer::start().await;
        let auth = AuthGateway::new(server.client());

        let config = server.config().with_auto_login("a@b.com", PASSWORD);
        let session = assert_ok!(auth.initialize(&config).await).unwrap();
        assert_eq!(session.user.email, "a@b.com");

        let failing = AuthGateway::new(server.client());
        let config = server.config().with_auto_login("a@b.com", "wrong-password");
        let err = assert_err!(failing.initialize(&config).await);
        assert!(err.message().starts_with("Auto-login failed: "));
        assert!(!failing.is_authenticated());
    }

    #[tokio::test]
    async fn session_survives_restart_with_file_store() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let store = CredentialStore::new(JsonFileStore::open(&path).unwrap());
            let client = ApiClient::new(&server.config(), store).unwrap();
            assert_ok!(AuthGateway::new(client).login("a@b.com", PASSWORD).await);
        }

        let store = CredentialStore::new(JsonFileStore::open(&path).unwrap());
        let auth = AuthGateway::new(ApiClient::new(&server.config(), store).unwrap());
        let restored = assert_ok!(auth.initialize(&ClientConfig::new()).await).unwrap();
        assert_eq!(restored.user.email, "a@b.com");
        let profile: Profile = assert_ok!(auth.client().get("/profile").await);
        assert_eq!(profile.email, "a@b.com");
        assert_eq!(server.state.refresh_calls(), 0);
    }
}
