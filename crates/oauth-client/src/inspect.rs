//! Unverified JWT payload decoding, for display only
//!
//! Nothing here checks a signature. Use it to show a user what claims their
//! tokens carry; never to decide what they may access. Authorization based
//! on claims must verify the token against the provider's published keys.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Map, Value};
use tracing::debug;

/// Decode the payload segment of a compact JWS without verifying it.
///
/// Returns `None` for opaque tokens (e.g. the warehouse-native server's
/// access tokens) or anything that does not decode to a JSON object.
pub fn unverified_claims(token: &str) -> Option<Map<String, Value>> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        debug!("token is not a compact JWS, skipping claim decode");
        return None;
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}
