//! Identity provider profiles
//!
//! A `ProviderProfile` captures everything that differs between authorization
//! servers: endpoint URLs, whether PKCE is mandatory, and the scope vocabulary
//! used to request a warehouse role. The token exchange and authorization
//! request code is written once against this trait, so Cognito, the
//! warehouse's native OAuth server, and any other OIDC server share one path.

pub mod cognito;
pub mod generic;
pub mod warehouse;

pub use cognito::CognitoProfile;
pub use generic::GenericProfile;
pub use warehouse::WarehouseProfile;

use serde::Deserialize;
use std::sync::Arc;

/// Errors from profile validation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid {field} URL {value}: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Result alias for profile validation.
pub type Result<T> = std::result::Result<T, Error>;

/// Capability describing one authorization server.
pub trait ProviderProfile: Send + Sync {
    /// Identifier for logging and metrics labels (e.g. "cognito").
    fn id(&self) -> &str;

    /// Browser-facing authorization endpoint.
    fn authorization_endpoint(&self) -> String;

    /// Token endpoint used for both the code grant and the refresh grant.
    fn token_endpoint(&self) -> String;

    /// Whether the authorization request must carry a PKCE challenge.
    fn requires_pkce(&self) -> bool;

    /// Scopes requested on every login.
    fn base_scopes(&self) -> Vec<String>;

    /// Scope that pins the session to a single warehouse role.
    fn role_scope(&self, role: &str) -> String;

    /// Scope requested when no role is given. `None` sends only the base scopes.
    fn any_role_scope(&self) -> Option<String>;

    /// Whether the refresh grant must repeat `redirect_uri`.
    fn refresh_requires_redirect_uri(&self) -> bool {
        false
    }
}

/// Profile selection as it appears in configuration files.
///
/// ```toml
/// [provider]
/// kind = "cognito"
/// domain = "my-pool"
/// region = "us-west-2"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProfileConfig {
    Cognito(CognitoProfile),
    Warehouse(WarehouseProfile),
    Generic(GenericProfile),
}

impl ProfileConfig {
    /// Validate the selected profile and hand it out behind the trait.
    pub fn build(self) -> Result<Arc<dyn ProviderProfile>> {
        Ok(match self {
            ProfileConfig::Cognito(p) => {
                p.validate()?;
                Arc::new(p)
            }
            ProfileConfig::Warehouse(p) => {
                p.validate()?;
                Arc::new(p)
            }
            ProfileConfig::Generic(p) => {
                p.validate()?;
                Arc::new(p)
            }
        })
    }
}

/// Reject anything that is not an absolute http(s) URL.
pub(crate) fn check_url(field: &'static str, value: &str) -> Result<()> {
    let parsed = url::Url::parse(value).map_err(|e| Error::InvalidUrl {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::InvalidUrl {
            field,
            value: value.to_string(),
            reason: format!("unsupported scheme {other}"),
        }),
    }
}

/// Reject empty or whitespace-only identifiers.
pub(crate) fn check_non_empty(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Empty(field));
    }
    Ok(())
}
