//! Session routes
//!
//! JSON endpoints wiring the login flow, the token accessor and the
//! warehouse client together:
//! - GET  /login?role=       start a login, 303 to the provider
//! - GET  /callback          provider redirect target, completes the login
//! - GET  /session           token metadata plus decoded (unverified) claims
//! - POST /query             run one statement as the signed-in user
//! - POST /logout            forget the stored tokens

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use tracing::{error, info, warn};

use oauth_client::{TokenClient, begin_login, inspect::unverified_claims};
use token_session::{PendingLogins, ValidTokenAccessor};

use crate::metrics;
use crate::warehouse::{StatementRequest, WarehouseClient};

/// Where a user goes to start over after a failed login.
const LOGIN_PATH: &str = "/login";

/// Shared state for session handlers.
#[derive(Clone)]
pub struct SessionState {
    pub client: Arc<TokenClient>,
    pub accessor: Arc<ValidTokenAccessor>,
    pub pending: Arc<PendingLogins>,
    pub warehouse: WarehouseClient,
}

impl SessionState {
    pub fn new(accessor: Arc<ValidTokenAccessor>, warehouse: WarehouseClient) -> Self {
        Self {
            client: accessor.client().clone(),
            accessor,
            pending: Arc::new(PendingLogins::new()),
            warehouse,
        }
    }
}

pub fn build_session_router(state: SessionState) -> Router {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/session", get(session))
        .route("/query", post(query))
        .route("/logout", post(logout))
        .with_state(state)
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    (
        status,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

/// JSON error body: {"error":{"type":"...","message":"..."}}
fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    json_response(
        status,
        serde_json::json!({
            "error": {
                "type": kind,
                "message": message,
            }
        }),
    )
}

fn authentication_failed() -> Response {
    json_response(
        StatusCode::BAD_REQUEST,
        serde_json::json!({
            "error": {
                "type": "authentication_failed",
                "message": "authentication failed, please log in again",
                "login_url": LOGIN_PATH,
            }
        }),
    )
}

fn not_authenticated() -> Response {
    json_response(
        StatusCode::UNAUTHORIZED,
        serde_json::json!({
            "error": {
                "type": "not_authenticated",
                "message": "no valid session",
                "login_url": LOGIN_PATH,
            }
        }),
    )
}

#[derive(Deserialize)]
struct LoginParams {
    role: Option<String>,
}

/// GET /login: build the authorization URL and hold the pending login.
async fn login(State(state): State<SessionState>, Query(params): Query<LoginParams>) -> Response {
    let profile = state.client.profile();
    let request = match begin_login(profile.as_ref(), state.client.credentials(), params.role.as_deref()) {
        Ok(r) => r,
        Err(e) => {
            error!(provider = profile.id(), error = %e, "cannot build authorization URL");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "configuration_error", &e.to_string());
        }
    };

    state.pending.insert(request.pending).await;
    info!(provider = profile.id(), role = params.role.as_deref().unwrap_or("any"), "login started");

    Redirect::to(&request.redirect_url).into_response()
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// GET /callback: validate the provider redirect and exchange the code.
async fn callback(State(state): State<SessionState>, Query(params): Query<CallbackParams>) -> Response {
    let profile = state.client.profile();

    if let Some(provider_error) = params.error.as_deref() {
        warn!(
            provider = profile.id(),
            error = provider_error,
            description = params.error_description.as_deref().unwrap_or(""),
            "provider returned an authorization error"
        );
        if let Some(s) = params.state.as_deref() {
            state.pending.take(s).await;
        }
        metrics::record_login_failure("provider_error");
        return authentication_failed();
    }

    let grant = match state
        .pending
        .complete(profile.as_ref(), params.code.as_deref(), params.state.as_deref())
        .await
    {
        Ok(g) => g,
        Err(e) => {
            warn!(provider = profile.id(), reason = e.reason(), "login rejected at callback");
            metrics::record_login_failure(e.reason());
            return authentication_failed();
        }
    };

    let redirect_uri = &state.client.credentials().redirect_uri;
    match state
        .client
        .exchange_authorization_code(&grant.code, redirect_uri, grant.code_verifier.as_deref())
        .await
    {
        Ok(tokens) => {
            metrics::record_code_exchange(true);
            json_response(
                StatusCode::OK,
                serde_json::json!({
                    "status": "signed_in",
                    "token_type": tokens.token_type,
                    "expires_at": tokens.expires_at(),
                    "refreshable": tokens.refresh_token.is_some(),
                }),
            )
        }
        Err(e) => {
            metrics::record_code_exchange(false);
            warn!(provider = profile.id(), error = %e, "code exchange failed");
            let status = if matches!(e, oauth_client::Error::Persist(_)) {
                StatusCode::INTERNAL_SERVER_ERROR
            } else {
                StatusCode::BAD_GATEWAY
            };
            json_response(
                status,
                serde_json::json!({
                    "error": {
                        "type": "token_exchange_failed",
                        "message": e.to_string(),
                        "provider_status": e.http_status(),
                        "provider_body": e.body(),
                        "login_url": LOGIN_PATH,
                    }
                }),
            )
        }
    }
}

/// GET /session: what the current tokens say about the user.
///
/// Claims are decoded without signature verification and are shown for
/// diagnosis only.
async fn session(State(state): State<SessionState>) -> Response {
    let Some(tokens) = state.accessor.get_valid_token().await else {
        return not_authenticated();
    };

    json_response(
        StatusCode::OK,
        serde_json::json!({
            "provider": state.client.profile().id(),
            "token_type": tokens.token_type,
            "scope": tokens.scope,
            "expires_at": tokens.expires_at(),
            "refreshable": tokens.refresh_token.is_some(),
            "id_token_claims": tokens.id_token.as_deref().and_then(unverified_claims),
            "access_token_claims": unverified_claims(&tokens.access_token),
        }),
    )
}

/// POST /query: run a statement with a fresh access token.
///
/// Warehouse failures are returned as-is and leave the session intact.
async fn query(
    State(state): State<SessionState>,
    axum::Json(request): axum::Json<StatementRequest>,
) -> Response {
    if request.sql.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "invalid_request", "sql must not be empty");
    }

    let Some(tokens) = state.accessor.get_valid_token().await else {
        return not_authenticated();
    };

    let start = Instant::now();
    let result = state.warehouse.execute(&tokens.access_token, &request).await;
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(result) => {
            metrics::record_statement("success", elapsed);
            json_response(
                StatusCode::OK,
                serde_json::to_value(&result).unwrap_or_default(),
            )
        }
        Err(e) => {
            metrics::record_statement(e.kind(), elapsed);
            let handle = match &e {
                crate::error::Error::Pending { statement_handle } => Some(statement_handle.clone()),
                _ => None,
            };
            json_response(
                e.status_code(),
                serde_json::json!({
                    "error": {
                        "type": "warehouse_error",
                        "kind": e.kind(),
                        "message": e.to_string(),
                        "statement_handle": handle,
                    }
                }),
            )
        }
    }
}

/// POST /logout: clear the stored token set.
async fn logout(State(state): State<SessionState>) -> Response {
    match state.accessor.sign_out().await {
        Ok(()) => {
            info!("signed out");
            json_response(StatusCode::OK, serde_json::json!({ "status": "signed_out" }))
        }
        Err(e) => {
            error!(error = %e, "failed to clear token store");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "logout_failed", &e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use common::Secret;
    use oauth_client::{ClientCredentials, FileTokenStore, TokenRepository, TokenSet, build_http_client};
    use provider::GenericProfile;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::WarehouseConfig;

    struct Fixture {
        idp: MockServer,
        warehouse: MockServer,
        store: Arc<FileTokenStore>,
        state: SessionState,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let idp = MockServer::start().await;
        let warehouse = MockServer::start().await;
        let profile = GenericProfile::new(
            format!("{}/authorize", idp.uri()),
            format!("{}/token", idp.uri()),
        );
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileTokenStore::new(dir.path().join("tokens.json")));
        let http = build_http_client(Duration::from_secs(5)).unwrap();
        let client = TokenClient::new(
            http.clone(),
            Arc::new(profile),
            ClientCredentials::new(
                "client-123",
                Secret::new("shh".to_string()),
                "http://localhost:5000/callback",
            ),
            store.clone(),
        );
        let accessor = Arc::new(ValidTokenAccessor::new(Arc::new(client), 300));
        let warehouse_client = WarehouseClient::new(
            http,
            &WarehouseConfig {
                account: "xy12345".into(),
                base_url: Some(warehouse.uri()),
                default_warehouse: None,
                default_role: None,
                statement_timeout_secs: 60,
            },
        );
        Fixture {
            idp,
            warehouse,
            store,
            state: SessionState::new(accessor, warehouse_client),
            _dir: dir,
        }
    }

    fn signed_in_tokens() -> TokenSet {
        TokenSet {
            access_token: "at_live".into(),
            refresh_token: Some("rt_live".into()),
            id_token: None,
            expires_in: Some(3600),
            obtained_at: None,
            token_type: "Bearer".into(),
            scope: Some("openid".into()),
            refresh_token_expires_in: None,
        }
    }

    async fn send(state: &SessionState, request: Request<Body>) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = build_session_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(axum::http::header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, location, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn state_param(location: &str) -> String {
        url::Url::parse(location)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn login_redirects_and_holds_pending_state() {
        let f = fixture().await;
        let (status, location, _) = send(&f.state, get("/login?role=Analyst")).await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        let location = location.unwrap();
        assert!(location.starts_with(&format!("{}/authorize?", f.idp.uri())));
        assert!(location.contains("session%3Arole%3AAnalyst"));
        assert_eq!(f.state.pending.len().await, 1);
    }

    #[tokio::test]
    async fn full_login_flow_then_logout() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_new",
                "refresh_token": "rt_new",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&f.idp)
            .await;

        let (_, location, _) = send(&f.state, get("/login")).await;
        let state = state_param(&location.unwrap());

        let (status, _, body) = send(&f.state, get(&format!("/callback?code=abc&state={state}"))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], "signed_in");
        assert_eq!(body["refreshable"], true);
        assert!(body.get("access_token").is_none(), "tokens must not be echoed");
        assert_eq!(f.store.load().await.unwrap().access_token, "at_new");

        let (status, _, body) = send(&f.state, get("/session")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], "generic");
        assert!(body["access_token_claims"].is_null(), "opaque token has no claims");

        let (status, _, body) = send(&f.state, post_json("/logout", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "signed_out");

        let (status, _, _) = send(&f.state, get("/session")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn replayed_callback_is_rejected() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at_new",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&f.idp)
            .await;

        let (_, location, _) = send(&f.state, get("/login")).await;
        let state = state_param(&location.unwrap());
        let uri = format!("/callback?code=abc&state={state}");

        let (status, _, _) = send(&f.state, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _, body) = send(&f.state, get(&uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "authentication_failed");
    }

    #[tokio::test]
    async fn callback_with_forged_state_fails_without_exchange() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&f.idp)
            .await;

        send(&f.state, get("/login")).await;
        let (status, _, body) = send(&f.state, get("/callback?code=abc&state=forged")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "authentication_failed");
        assert_eq!(body["error"]["login_url"], "/login");
    }

    #[tokio::test]
    async fn provider_error_on_callback_is_authentication_failure() {
        let f = fixture().await;
        let (_, location, _) = send(&f.state, get("/login")).await;
        let state = state_param(&location.unwrap());

        let (status, _, body) = send(
            &f.state,
            get(&format!("/callback?error=access_denied&state={state}")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "authentication_failed");
        assert!(f.state.pending.is_empty().await);
    }

    #[tokio::test]
    async fn failed_exchange_surfaces_provider_status_and_body() {
        let f = fixture().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
            .mount(&f.idp)
            .await;

        let (_, location, _) = send(&f.state, get("/login")).await;
        let state = state_param(&location.unwrap());
        let (status, _, body) = send(&f.state, get(&format!("/callback?code=stale&state={state}"))).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["type"], "token_exchange_failed");
        assert_eq!(body["error"]["provider_status"], 400);
        assert_eq!(body["error"]["provider_body"], r#"{"error":"invalid_grant"}"#);
    }

    #[tokio::test]
    async fn query_requires_session() {
        let f = fixture().await;
        let (status, _, body) = send(&f.state, post_json("/query", serde_json::json!({ "sql": "select 1" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["type"], "not_authenticated");
    }

    #[tokio::test]
    async fn query_rejects_blank_sql() {
        let f = fixture().await;
        f.store.save(signed_in_tokens()).await.unwrap();
        let (status, _, _) = send(&f.state, post_json("/query", serde_json::json!({ "sql": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn query_returns_rows() {
        let f = fixture().await;
        f.store.save(signed_in_tokens()).await.unwrap();
        Mock::given(method("POST"))
            .and(path("/api/v2/statements"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "statementHandle": "h1",
                "resultSetMetaData": { "rowType": [{ "name": "N" }] },
                "data": [["1"]]
            })))
            .expect(1)
            .mount(&f.warehouse)
            .await;

        let (status, _, body) = send(&f.state, post_json("/query", serde_json::json!({ "sql": "select 1 as n" }))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["columns"], serde_json::json!(["N"]));
        assert_eq!(body["rows"], serde_json::json!([["1"]]));
    }

    #[tokio::test]
    async fn warehouse_failure_keeps_tokens() {
        let f = fixture().await;
        f.store.save(signed_in_tokens()).await.unwrap();
        Mock::given(method("POST"))
            .and(path("/api/v2/statements"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "code": "002003",
                "message": "SQL compilation error"
            })))
            .mount(&f.warehouse)
            .await;

        let (status, _, body) = send(&f.state, post_json("/query", serde_json::json!({ "sql": "select * from nope" }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["type"], "warehouse_error");
        assert_eq!(body["error"]["kind"], "rejected");
        assert!(f.store.load().await.is_some(), "resource errors must not clear tokens");
    }
}
