//! Warehouse-native OAuth authorization server (Snowflake OAuth)

use serde::Deserialize;

use crate::{ProviderProfile, Result, check_non_empty};

/// OAuth server hosted by the warehouse account itself.
#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseProfile {
    /// Account identifier, e.g. `xy12345.us-east-1` or `myorg-myaccount`
    pub account: String,
    #[serde(default = "default_true")]
    pub use_pkce: bool,
}

fn default_true() -> bool {
    true
}

impl WarehouseProfile {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            use_pkce: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_non_empty("warehouse account", &self.account)
    }

    fn base_url(&self) -> String {
        format!("https://{}.snowflakecomputing.com", self.account)
    }
}

impl ProviderProfile for WarehouseProfile {
    fn id(&self) -> &str {
        "warehouse"
    }

    fn authorization_endpoint(&self) -> String {
        format!("{}/oauth/authorize", self.base_url())
    }

    fn token_endpoint(&self) -> String {
        format!("{}/oauth/token-request", self.base_url())
    }

    fn requires_pkce(&self) -> bool {
        self.use_pkce
    }

    fn base_scopes(&self) -> Vec<String> {
        vec!["refresh_token".into()]
    }

    fn role_scope(&self, role: &str) -> String {
        format!("session:role:{role}")
    }

    // The native server falls back to the user's default role.
    fn any_role_scope(&self) -> Option<String> {
        None
    }

    fn refresh_requires_redirect_uri(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_live_on_account_host() {
        let p = WarehouseProfile::new("xy12345");
        assert_eq!(
            p.authorization_endpoint(),
            "https://xy12345.snowflakecomputing.com/oauth/authorize"
        );
        assert_eq!(
            p.token_endpoint(),
            "https://xy12345.snowflakecomputing.com/oauth/token-request"
        );
    }

    #[test]
    fn role_scope_keeps_case() {
        let p = WarehouseProfile::new("xy12345");
        assert_eq!(p.role_scope("ANALYST"), "session:role:ANALYST");
        assert_eq!(p.base_scopes(), vec!["refresh_token".to_string()]);
        assert!(p.any_role_scope().is_none());
    }
}
