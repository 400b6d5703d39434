//! Token endpoint client
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (login completion)
//! 2. Refresh-token grant (expired access token)
//!
//! Both POST a form body with the confidential client's id and secret. A
//! successful response is persisted through the `TokenRepository` before it
//! is returned; an exchange is not complete until it is stored. Failures are
//! reported to the caller and never acted on here.

use std::sync::Arc;
use std::time::Duration;

use provider::ProviderProfile;
use tracing::{info, warn};

use crate::credentials::ClientCredentials;
use crate::error::{Error, Result};
use crate::store::TokenRepository;
use crate::tokens::{TokenResponse, TokenSet};

/// Upper bound on establishing a connection to any endpoint.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the shared HTTP client with bounded request and connect timeouts.
pub fn build_http_client(request_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
        .build()
        .map_err(|e| Error::Http(format!("building HTTP client: {e}")))
}

/// Token exchange client for one provider profile and client registration.
pub struct TokenClient {
    http: reqwest::Client,
    profile: Arc<dyn ProviderProfile>,
    credentials: ClientCredentials,
    store: Arc<dyn TokenRepository>,
}

impl TokenClient {
    pub fn new(
        http: reqwest::Client,
        profile: Arc<dyn ProviderProfile>,
        credentials: ClientCredentials,
        store: Arc<dyn TokenRepository>,
    ) -> Self {
        Self {
            http,
            profile,
            credentials,
            store,
        }
    }

    pub fn profile(&self) -> &Arc<dyn ProviderProfile> {
        &self.profile
    }

    pub fn credentials(&self) -> &ClientCredentials {
        &self.credentials
    }

    pub fn store(&self) -> &Arc<dyn TokenRepository> {
        &self.store
    }

    /// Exchange an authorization code for tokens and persist them.
    ///
    /// `code_verifier` is the PKCE secret from the pending login, when the
    /// flow used one.
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenSet> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose().as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        let response = self.post("authorization_code", &form).await?;
        self.persist("authorization_code", response.into()).await
    }

    /// Trade a refresh token for a new token set and persist it.
    ///
    /// Providers that do not rotate refresh tokens omit `refresh_token` from
    /// the response; the one we sent is carried forward so the next expiry
    /// can refresh again.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.expose().as_str()),
            ("refresh_token", refresh_token),
        ];
        if self.profile.refresh_requires_redirect_uri() {
            form.push(("redirect_uri", self.credentials.redirect_uri.as_str()));
        }

        let response = self.post("refresh_token", &form).await?;
        let mut tokens: TokenSet = response.into();
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        self.persist("refresh_token", tokens).await
    }

    async fn post(&self, grant: &'static str, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let endpoint = self.profile.token_endpoint();
        let response = self
            .http
            .post(&endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| {
                warn!(provider = self.profile.id(), grant, error = %e, "token endpoint unreachable");
                Error::Http(format!("{grant} request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            warn!(
                provider = self.profile.id(),
                grant,
                status = status.as_u16(),
                "token endpoint rejected request"
            );
            return Err(Error::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::InvalidResponse(format!("{grant} response: {e}")))
    }

    async fn persist(&self, grant: &'static str, tokens: TokenSet) -> Result<TokenSet> {
        let saved = self
            .store
            .save(tokens)
            .await
            .map_err(|e| Error::Persist(e.to_string()))?;
        info!(
            provider = self.profile.id(),
            grant,
            expires_in = saved.expires_in,
            refreshable = saved.refresh_token.is_some(),
            "token set obtained"
        );
        Ok(saved)
    }
}
