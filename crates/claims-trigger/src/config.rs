//! Trigger configuration
//!
//! Read once at process start. The audience has no default: the same
//! function deploys to several environments, and a placeholder audience
//! would issue tokens the warehouse silently rejects.

use tracing::warn;

/// Scope marker injected when `TRIGGER_SCOPE_CLAIM` is unset.
pub const DEFAULT_SCOPE_CLAIM: &str = "session:role-any";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerConfig {
    /// Value of the access token's `aud` claim (the client id the warehouse
    /// security integration expects)
    pub audience: String,
    /// Value of the `scp` claim on both tokens
    pub scope_claim: String,
}

impl TriggerConfig {
    pub fn new(audience: impl Into<String>, scope_claim: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            scope_claim: scope_claim.into(),
        }
    }

    /// Build from `TRIGGER_AUDIENCE` (required) and `TRIGGER_SCOPE_CLAIM`.
    pub fn from_env() -> common::Result<Self> {
        let audience = std::env::var("TRIGGER_AUDIENCE")
            .ok()
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .ok_or(common::Error::MissingSetting("TRIGGER_AUDIENCE"))?;

        let scope_claim = match std::env::var("TRIGGER_SCOPE_CLAIM") {
            Ok(v) if !v.trim().is_empty() => v.trim().to_owned(),
            Ok(_) => {
                warn!("TRIGGER_SCOPE_CLAIM is blank, using default");
                DEFAULT_SCOPE_CLAIM.to_owned()
            }
            Err(_) => DEFAULT_SCOPE_CLAIM.to_owned(),
        };

        Ok(Self {
            audience,
            scope_claim,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    #[test]
    fn missing_audience_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("TRIGGER_AUDIENCE") };
        let err = TriggerConfig::from_env().unwrap_err();
        assert!(matches!(err, common::Error::MissingSetting("TRIGGER_AUDIENCE")));

        unsafe { set_env("TRIGGER_AUDIENCE", "   ") };
        assert!(TriggerConfig::from_env().is_err(), "blank audience must be rejected");
        unsafe { remove_env("TRIGGER_AUDIENCE") };
    }

    #[test]
    fn scope_claim_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("TRIGGER_AUDIENCE", "client-abc") };
        unsafe { remove_env("TRIGGER_SCOPE_CLAIM") };

        let cfg = TriggerConfig::from_env().unwrap();
        assert_eq!(cfg, TriggerConfig::new("client-abc", DEFAULT_SCOPE_CLAIM));

        unsafe { remove_env("TRIGGER_AUDIENCE") };
    }

    #[test]
    fn scope_claim_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("TRIGGER_AUDIENCE", "client-abc") };
        unsafe { set_env("TRIGGER_SCOPE_CLAIM", "session:role:analyst") };

        let cfg = TriggerConfig::from_env().unwrap();
        assert_eq!(cfg.scope_claim, "session:role:analyst");

        unsafe { remove_env("TRIGGER_AUDIENCE") };
        unsafe { remove_env("TRIGGER_SCOPE_CLAIM") };
    }
}
