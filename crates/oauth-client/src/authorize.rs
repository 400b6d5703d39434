//! Authorization request construction and callback validation

use provider::ProviderProfile;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::credentials::ClientCredentials;
use crate::error::{Error, Result};
use crate::pkce::{compute_challenge, generate_state, generate_verifier};

/// Ephemeral state for one in-flight login. Held by the caller until the
/// callback arrives, then consumed exactly once.
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub state: String,
    pub code_verifier: Option<String>,
}

/// Result of starting a login.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// Where to send the user's browser
    pub redirect_url: String,
    pub pending: PendingLogin,
}

/// A validated authorization code, ready for the token exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    pub code: String,
    pub code_verifier: Option<String>,
}

/// Build the scope string: base scopes plus either the role scope or the
/// profile's any-role marker. Blank roles count as absent.
pub fn compose_scope(profile: &dyn ProviderProfile, role: Option<&str>) -> String {
    let mut scopes = profile.base_scopes();
    match role.map(str::trim).filter(|r| !r.is_empty()) {
        Some(role) => scopes.push(profile.role_scope(role)),
        None => scopes.extend(profile.any_role_scope()),
    }
    scopes.join(" ")
}

/// Start a login: fresh state, PKCE pair when the profile wants one, and
/// the authorization URL carrying both.
pub fn begin_login(
    profile: &dyn ProviderProfile,
    credentials: &ClientCredentials,
    role: Option<&str>,
) -> Result<LoginRequest> {
    let endpoint = profile.authorization_endpoint();
    let mut url = url::Url::parse(&endpoint)
        .map_err(|e| Error::AuthorizationUrl(format!("{endpoint}: {e}")))?;

    let state = generate_state();
    let code_verifier = profile.requires_pkce().then(generate_verifier);
    let scope = compose_scope(profile, role);

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("response_type", "code");
        params.append_pair("client_id", &credentials.client_id);
        params.append_pair("redirect_uri", &credentials.redirect_uri);
        params.append_pair("scope", &scope);
        params.append_pair("state", &state);
        if let Some(verifier) = &code_verifier {
            params.append_pair("code_challenge", &compute_challenge(verifier));
            params.append_pair("code_challenge_method", "S256");
        }
    }

    debug!(provider = profile.id(), scope = %scope, pkce = code_verifier.is_some(), "built authorization URL");

    Ok(LoginRequest {
        redirect_url: url.into(),
        pending: PendingLogin {
            state,
            code_verifier,
        },
    })
}

/// Validate the callback against the held login state.
///
/// Checks run in a fixed order: code present, state equal (constant-time),
/// verifier present when the profile requires PKCE.
pub fn complete_login(
    profile: &dyn ProviderProfile,
    returned_code: Option<&str>,
    returned_state: Option<&str>,
    held: &PendingLogin,
) -> Result<AuthorizationGrant> {
    let code = returned_code
        .filter(|c| !c.is_empty())
        .ok_or(Error::MissingCode)?;

    let returned_state = returned_state.unwrap_or_default();
    let state_matches: bool = returned_state
        .as_bytes()
        .ct_eq(held.state.as_bytes())
        .into();
    if !state_matches {
        warn!(provider = profile.id(), "callback state mismatch");
        return Err(Error::StateMismatch);
    }

    if profile.requires_pkce() && held.code_verifier.is_none() {
        return Err(Error::MissingVerifier);
    }

    Ok(AuthorizationGrant {
        code: code.to_string(),
        code_verifier: held.code_verifier.clone(),
    })
}
