//! Valid token accessor
//!
//! The single entry point for "give me a usable token". Refreshes are
//! serialized through `refresh_lock` so concurrent callers that all see an
//! expired set trigger one refresh, not several racing ones that each rotate
//! the refresh token.

use std::sync::Arc;

use oauth_client::{TokenClient, TokenSet, is_expired, unix_now};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct ValidTokenAccessor {
    client: Arc<TokenClient>,
    buffer_secs: u64,
    refresh_lock: Mutex<()>,
}

impl ValidTokenAccessor {
    pub fn new(client: Arc<TokenClient>, buffer_secs: u64) -> Self {
        Self {
            client,
            buffer_secs,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn client(&self) -> &Arc<TokenClient> {
        &self.client
    }

    /// Return a non-expired token set, refreshing when needed.
    ///
    /// `None` means the user must log in again: nothing stored, nothing to
    /// refresh with, or the refresh failed. A failed refresh clears the
    /// stored set so a dead refresh token is not retried on every call.
    pub async fn get_valid_token(&self) -> Option<TokenSet> {
        let store = self.client.store();
        let current = store.load().await?;
        if !is_expired(Some(&current), self.buffer_secs) {
            return Some(current);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited.
        let current = store.load().await?;
        if !is_expired(Some(&current), self.buffer_secs) {
            debug!("token refreshed by concurrent caller");
            return Some(current);
        }

        let Some(refresh_token) = current.refresh_token.as_deref() else {
            info!("access token expired and no refresh token held");
            return None;
        };

        match self.client.refresh(refresh_token).await {
            Ok(tokens) => {
                metrics::counter!("oauth_token_requests_total", "grant" => "refresh_token", "outcome" => "success")
                    .increment(1);
                Some(tokens)
            }
            Err(e) => {
                metrics::counter!("oauth_token_requests_total", "grant" => "refresh_token", "outcome" => "failure")
                    .increment(1);
                warn!(error = %e, status = ?e.http_status(), "token refresh failed, clearing stored tokens");
                if let Err(clear_err) = store.clear().await {
                    warn!(error = %clear_err, "failed to clear tokens after refresh failure");
                }
                None
            }
        }
    }

    /// Forget the stored token set.
    pub async fn sign_out(&self) -> oauth_client::Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.client.store().clear().await
    }

    /// Session summary for health output. Never includes token material.
    pub async fn status(&self) -> serde_json::Value {
        let Some(tokens) = self.client.store().load().await else {
            return serde_json::json!({ "signed_in": false });
        };
        let now = unix_now();
        serde_json::json!({
            "signed_in": true,
            "expired": oauth_client::is_expired_at(Some(&tokens), self.buffer_secs, now),
            "expires_at": tokens.expires_at(),
            "refreshable": tokens.refresh_token.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use common::Secret;
    use oauth_client::{ClientCredentials, FileTokenStore, TokenRepository, build_http_client};
    use provider::GenericProfile;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        server: MockServer,
        store: Arc<FileTokenStore>,
        accessor: Arc<ValidTokenAccessor>,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let server = MockServer::start().await;
        let profile = GenericProfile::new(
            format!("{}/authorize", server.uri()),
            format!("{}/token", server.uri()),
        );
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTokenStore::new(dir.path().join("tokens.json")));
        let client = TokenClient::new(
            build_http_client(Duration::from_secs(5)).unwrap(),
            Arc::new(profile),
            ClientCredentials::new(
                "client-123",
                Secret::new("shh".to_string()),
                "http://localhost:5000/callback",
            ),
            store.clone(),
        );
        Fixture {
            server,
            store,
            accessor: Arc::new(ValidTokenAccessor::new(Arc::new(client), 300)),
            _dir: dir,
        }
    }

    fn tokens(access: &str, refresh: Option<&str>, expires_in: u64) -> TokenSet {
        TokenSet {
            access_token: access.into(),
            refresh_token: refresh.map(Into::into),
            id_token: None,
            expires_in: Some(expires_in),
            obtained_at: None,
            token_type: "Bearer".into(),
            scope: None,
            refresh_token_expires_in: None,
        }
    }

    /// Store a set, then rewrite its timestamp so it reads as `age` seconds old.
    async fn store_aged(f: &Fixture, set: TokenSet, age: u64) {
        let mut saved = f.store.save(set).await.unwrap();
        saved.obtained_at = Some(unix_now() - age);
        tokio::fs::write(f.store.path(), serde_json::to_string(&saved).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_store_yields_none() {
        let f = fixture().await;
        assert!(f.accessor.get_valid_token().await.is_none());
    }

    #[tokio::test]
    async fn fresh_token_returned_without_refresh() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&f.server)
            .await;
        f.store.save(tokens("at_1", Some("rt_1"), 3600)).await.unwrap();

        let got = f.accessor.get_valid_token().await.unwrap();
        assert_eq!(got.access_token, "at_1");
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_once_under_concurrency() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_2",
                "refresh_token": "rt_2",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&f.server)
            .await;
        store_aged(&f, tokens("at_1", Some("rt_1"), 3600), 3500).await;

        let mut handles = Vec::new();
        for _ in 0..5 {
            let accessor = f.accessor.clone();
            handles.push(tokio::spawn(async move { accessor.get_valid_token().await }));
        }
        for handle in handles {
            let got = handle.await.unwrap().unwrap();
            assert_eq!(got.access_token, "at_2");
        }
        assert_eq!(f.store.load().await.unwrap().refresh_token.as_deref(), Some("rt_2"));
    }

    #[tokio::test]
    async fn expired_without_refresh_token_yields_none() {
        let f = fixture().await;
        store_aged(&f, tokens("at_1", None, 3600), 4000).await;
        assert!(f.accessor.get_valid_token().await.is_none());
    }

    #[tokio::test]
    async fn failed_refresh_clears_store() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
            )
            .expect(1)
            .mount(&f.server)
            .await;
        store_aged(&f, tokens("at_1", Some("rt_dead"), 3600), 3500).await;

        assert!(f.accessor.get_valid_token().await.is_none());
        assert!(f.store.load().await.is_none());
        // nothing left to refresh with, so no second request
        assert!(f.accessor.get_valid_token().await.is_none());
    }

    #[tokio::test]
    async fn sign_out_clears_and_status_reflects_it() {
        let f = fixture().await;
        f.store.save(tokens("at_1", Some("rt_1"), 3600)).await.unwrap();

        let status = f.accessor.status().await;
        assert_eq!(status["signed_in"], true);
        assert_eq!(status["expired"], false);
        assert_eq!(status["refreshable"], true);
        assert!(status.get("access_token").is_none());

        f.accessor.sign_out().await.unwrap();
        assert_eq!(f.accessor.status().await["signed_in"], false);
        assert!(f.accessor.get_valid_token().await.is_none());
    }
}
