//! In-flight login state
//!
//! Entries are keyed by the `state` value sent to the provider, so the
//! callback's own `state` finds its entry. `take` removes the entry whether
//! or not the rest of the callback validates, which makes every state
//! single-use. Expired entries are purged lazily on insert.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use oauth_client::{AuthorizationGrant, PendingLogin, complete_login};
use provider::ProviderProfile;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// How long a login may stay at the provider before its state is dropped.
pub const PENDING_LOGIN_TTL: Duration = Duration::from_secs(600);

struct Entry {
    login: PendingLogin,
    created_at: Instant,
}

/// Ephemeral store of logins awaiting their callback.
pub struct PendingLogins {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for PendingLogins {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingLogins {
    pub fn new() -> Self {
        Self::with_ttl(PENDING_LOGIN_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Hold a login until its callback arrives.
    pub async fn insert(&self, login: PendingLogin) {
        let mut entries = self.entries.lock().await;
        let ttl = self.ttl;
        entries.retain(|_, e| e.created_at.elapsed() < ttl);
        entries.insert(
            login.state.clone(),
            Entry {
                login,
                created_at: Instant::now(),
            },
        );
        debug!(pending = entries.len(), "login pending");
    }

    /// Remove and return the login for `state`, unless it has expired.
    pub async fn take(&self, state: &str) -> Option<PendingLogin> {
        let entry = self.entries.lock().await.remove(state)?;
        if entry.created_at.elapsed() >= self.ttl {
            info!("pending login expired before callback");
            return None;
        }
        Some(entry.login)
    }

    /// Validate a callback against the matching pending login.
    ///
    /// A missing code is reported first, whatever the state. An unknown,
    /// absent or expired state is a state mismatch.
    pub async fn complete(
        &self,
        profile: &dyn ProviderProfile,
        returned_code: Option<&str>,
        returned_state: Option<&str>,
    ) -> oauth_client::Result<AuthorizationGrant> {
        let held = match returned_state {
            Some(state) => self.take(state).await,
            None => None,
        };

        match held {
            Some(held) => complete_login(profile, returned_code, returned_state, &held),
            None if returned_code.is_none_or(str::is_empty) => Err(oauth_client::Error::MissingCode),
            None => Err(oauth_client::Error::StateMismatch),
        }
    }

    /// Number of logins currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
