//! Token set model
//!
//! `TokenResponse` is what the token endpoint sends; `TokenSet` is what we
//! persist. The two are kept apart so `obtained_at` can only ever be set by
//! the token store at write time, never by provider input.

use serde::{Deserialize, Serialize};

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Current credentials for the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer credential presented to the warehouse
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// OIDC identity token (Cognito-style providers only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Lifetime in seconds as declared by the provider at issuance
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Unix seconds, stamped by the token store when the set was written
    #[serde(default)]
    pub obtained_at: Option<u64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_expires_in: Option<u64>,
}

impl TokenSet {
    /// Absolute expiry in unix seconds, when both halves are known.
    pub fn expires_at(&self) -> Option<u64> {
        Some(self.obtained_at?.saturating_add(self.expires_in?))
    }
}

/// Successful (200) token endpoint body for both grants.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub refresh_token_expires_in: Option<u64>,
}

impl From<TokenResponse> for TokenSet {
    fn from(r: TokenResponse) -> Self {
        Self {
            access_token: r.access_token,
            refresh_token: r.refresh_token,
            id_token: r.id_token,
            expires_in: r.expires_in,
            obtained_at: None,
            token_type: r.token_type.unwrap_or_else(default_token_type),
            scope: r.scope,
            refresh_token_expires_in: r.refresh_token_expires_in,
        }
    }
}
