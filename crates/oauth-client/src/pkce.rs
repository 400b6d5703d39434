//! PKCE (Proof Key for Code Exchange, RFC 7636) and CSRF state values
//!
//! The verifier stays with the pending login and is sent with the code
//! exchange; only its S256 challenge goes into the authorization URL.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

/// Random bytes behind a code verifier. 64 bytes encode to 86 base64url
/// characters, inside RFC 7636's 43..=128 window.
const VERIFIER_BYTES: usize = 64;

/// Random bytes behind a `state` value.
const STATE_BYTES: usize = 32;

/// Generate a cryptographically random PKCE code verifier.
///
/// The output only uses `[A-Za-z0-9_-]`, a subset of the RFC 7636
/// unreserved set.
pub fn generate_verifier() -> String {
    random_urlsafe::<VERIFIER_BYTES>()
}

/// Compute the S256 code challenge: `BASE64URL(SHA256(verifier))`, no padding.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate the CSRF `state` nonce for an authorization request.
pub fn generate_state() -> String {
    random_urlsafe::<STATE_BYTES>()
}

fn random_urlsafe<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}
