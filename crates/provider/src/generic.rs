//! Any OIDC authorization server with explicitly configured endpoints
//! (Okta, Entra ID, a local mock).

use serde::{Deserialize, Deserializer};

use crate::{ProviderProfile, Result, check_url};

/// Fully explicit profile. `role_scope_template` substitutes `{role}`.
/// Set `any_role_scope = ""` to send only the base scopes when no role is
/// requested.
#[derive(Debug, Clone, Deserialize)]
pub struct GenericProfile {
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_role_template")]
    pub role_scope_template: String,
    #[serde(default = "default_any_role", deserialize_with = "empty_as_none")]
    pub any_role_scope: Option<String>,
    #[serde(default = "default_true")]
    pub use_pkce: bool,
    #[serde(default)]
    pub refresh_requires_redirect_uri: bool,
}

fn default_scopes() -> Vec<String> {
    vec![
        "openid".into(),
        "profile".into(),
        "email".into(),
        "offline_access".into(),
    ]
}

fn default_role_template() -> String {
    "session:role:{role}".to_string()
}

fn default_any_role() -> Option<String> {
    Some("session:role-any".to_string())
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    let value = String::deserialize(deserializer)?;
    let trimmed = value.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

fn default_true() -> bool {
    true
}

impl GenericProfile {
    /// Profile with default scopes and PKCE enabled.
    pub fn new(authorization_endpoint: impl Into<String>, token_endpoint: impl Into<String>) -> Self {
        Self {
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            scopes: default_scopes(),
            role_scope_template: default_role_template(),
            any_role_scope: default_any_role(),
            use_pkce: true,
            refresh_requires_redirect_uri: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_url("authorization_endpoint", &self.authorization_endpoint)?;
        check_url("token_endpoint", &self.token_endpoint)
    }
}

impl ProviderProfile for GenericProfile {
    fn id(&self) -> &str {
        "generic"
    }

    fn authorization_endpoint(&self) -> String {
        self.authorization_endpoint.clone()
    }

    fn token_endpoint(&self) -> String {
        self.token_endpoint.clone()
    }

    fn requires_pkce(&self) -> bool {
        self.use_pkce
    }

    fn base_scopes(&self) -> Vec<String> {
        self.scopes.clone()
    }

    fn role_scope(&self, role: &str) -> String {
        self.role_scope_template.replace("{role}", role)
    }

    fn any_role_scope(&self) -> Option<String> {
        self.any_role_scope.clone()
    }

    fn refresh_requires_redirect_uri(&self) -> bool {
        self.refresh_requires_redirect_uri
    }
}
