//! OAuth2 authorization-code client for the warehouse
//!
//! Provides the token lifecycle used by the warehouse client service: PKCE
//! and state generation, authorization URL construction and callback
//! validation, code exchange and refresh against the provider's token
//! endpoint, local persistence of the token set, and the expiry policy that
//! decides when a refresh is due. Provider differences come in through
//! `provider::ProviderProfile`.
//!
//! Login flow:
//! 1. `authorize::begin_login()` returns the redirect URL plus a `PendingLogin`
//! 2. The caller holds the `PendingLogin` until the callback arrives
//! 3. `authorize::complete_login()` checks code, state and verifier
//! 4. `TokenClient::exchange_authorization_code()` trades the code for tokens
//!    and persists them through a `TokenRepository`
//! 5. `expiry::is_expired()` + `TokenClient::refresh()` keep the token usable

pub mod authorize;
pub mod credentials;
pub mod error;
pub mod expiry;
pub mod inspect;
pub mod pkce;
pub mod store;
pub mod token;
pub mod tokens;

pub use authorize::{
    AuthorizationGrant, LoginRequest, PendingLogin, begin_login, complete_login, compose_scope,
};
pub use credentials::ClientCredentials;
pub use error::{Error, Result};
pub use expiry::{DEFAULT_EXPIRY_BUFFER_SECS, is_expired, is_expired_at, unix_now};
pub use pkce::{compute_challenge, generate_state, generate_verifier};
pub use store::{FileTokenStore, TokenRepository};
pub use token::{TokenClient, build_http_client};
pub use tokens::{TokenResponse, TokenSet};
