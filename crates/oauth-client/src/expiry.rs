//! Expiry policy
//!
//! A token counts as expired `buffer` seconds before its real deadline so no
//! request starts with a token that lapses mid-flight.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::tokens::TokenSet;

/// Default safety margin before the provider-declared expiry.
pub const DEFAULT_EXPIRY_BUFFER_SECS: u64 = 300;

/// Current unix time in whole seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Whether `tokens` must be refreshed before use.
pub fn is_expired(tokens: Option<&TokenSet>, buffer_secs: u64) -> bool {
    is_expired_at(tokens, buffer_secs, unix_now())
}

/// `is_expired` against an explicit clock.
///
/// Missing tokens, or a set without `expires_in` or `obtained_at`, are
/// always expired. Reaching the threshold exactly counts as expired. A
/// buffer at least as large as the lifetime expires the token immediately.
pub fn is_expired_at(tokens: Option<&TokenSet>, buffer_secs: u64, now: u64) -> bool {
    let Some(tokens) = tokens else {
        return true;
    };
    let (Some(expires_in), Some(obtained_at)) = (tokens.expires_in, tokens.obtained_at) else {
        return true;
    };

    let elapsed = now as i128 - obtained_at as i128;
    let usable_for = expires_in as i128 - buffer_secs as i128;
    elapsed >= usable_for
}
