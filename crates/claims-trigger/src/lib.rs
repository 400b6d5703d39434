//! Token-issuance claim injection
//!
//! Invoked by the identity provider each time it is about to issue tokens.
//! Adds a fixed scope-like `scp` claim to the ID and access tokens and an
//! `aud` claim to the access token, so the warehouse accepts the access
//! token as an external OAuth credential.
//!
//! The handler never fails: an event it cannot augment is returned with an
//! empty `response` and the failure is logged for operators.

mod config;
mod trigger;

pub use config::{DEFAULT_SCOPE_CLAIM, TriggerConfig};
pub use trigger::{ClaimOverride, ClaimOverrideDetails, TokenGeneration, handle};
