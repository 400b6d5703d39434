//! Startup plumbing shared by the warehouse OAuth crates and services:
//! the fatal configuration error and client secret handling.

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Secret, resolve_secret};
