//! AWS Cognito hosted UI

use serde::Deserialize;

use crate::{ProviderProfile, Result, check_non_empty};

/// Cognito user pool domain. Endpoints are derived from the pool's domain
/// prefix and region.
#[derive(Debug, Clone, Deserialize)]
pub struct CognitoProfile {
    /// Domain prefix of the hosted UI (`<domain>.auth.<region>.amazoncognito.com`)
    pub domain: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_true")]
    pub use_pkce: bool,
}

fn default_region() -> String {
    "us-west-2".to_string()
}

fn default_true() -> bool {
    true
}

impl CognitoProfile {
    pub fn new(domain: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            region: region.into(),
            use_pkce: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_non_empty("cognito domain", &self.domain)?;
        check_non_empty("cognito region", &self.region)
    }

    fn base_url(&self) -> String {
        format!(
            "https://{}.auth.{}.amazoncognito.com",
            self.domain, self.region
        )
    }
}

impl ProviderProfile for CognitoProfile {
    fn id(&self) -> &str {
        "cognito"
    }

    fn authorization_endpoint(&self) -> String {
        format!("{}/oauth2/authorize", self.base_url())
    }

    fn token_endpoint(&self) -> String {
        format!("{}/oauth2/token", self.base_url())
    }

    fn requires_pkce(&self) -> bool {
        self.use_pkce
    }

    fn base_scopes(&self) -> Vec<String> {
        vec!["openid".into(), "profile".into(), "email".into()]
    }

    // Resource-server scopes are lowercase in the user pool.
    fn role_scope(&self, role: &str) -> String {
        format!("session/role:{}", role.to_lowercase())
    }

    fn any_role_scope(&self) -> Option<String> {
        Some("session/role-any".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_follow_hosted_ui_layout() {
        let p = CognitoProfile::new("demo", "us-west-2");
        assert_eq!(
            p.authorization_endpoint(),
            "https://demo.auth.us-west-2.amazoncognito.com/oauth2/authorize"
        );
        assert_eq!(
            p.token_endpoint(),
            "https://demo.auth.us-west-2.amazoncognito.com/oauth2/token"
        );
    }

    #[test]
    fn role_scope_is_lowercased() {
        let p = CognitoProfile::new("demo", "us-west-2");
        assert_eq!(p.role_scope("ANALYST"), "session/role:analyst");
        assert_eq!(p.any_role_scope().as_deref(), Some("session/role-any"));
        assert!(!p.refresh_requires_redirect_uri());
    }

    #[test]
    fn empty_domain_is_rejected() {
        let p = CognitoProfile::new("  ", "us-west-2");
        assert!(p.validate().is_err());
    }
}
