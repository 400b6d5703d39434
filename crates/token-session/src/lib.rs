//! Per-process session state for the warehouse client
//!
//! Two pieces of state sit between HTTP requests:
//! - `PendingLogins`: the state/verifier of logins waiting for their
//!   callback, each consumed at most once
//! - `ValidTokenAccessor`: the only way callers obtain a token; it loads the
//!   stored set, applies the expiry policy, and refreshes on demand
//!
//! Token lifecycle:
//! 1. `/login` stores a `PendingLogin` and redirects to the provider
//! 2. `/callback` takes it back via `PendingLogins::complete`, and the code
//!    is exchanged and persisted
//! 3. Every warehouse call goes through `ValidTokenAccessor::get_valid_token`
//! 4. A failed refresh clears the stored set; the user must log in again

pub mod accessor;
pub mod pending;

pub use accessor::ValidTokenAccessor;
pub use pending::{PENDING_LOGIN_TTL, PendingLogins};
