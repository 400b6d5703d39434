//! Client secret handling
//!
//! The OAuth client secret never lives in the TOML file. It comes from an
//! environment variable or a mounted secret file, and once loaded it is
//! held in a [`Secret`] so it cannot end up in a log line.

use std::fmt;
use std::path::Path;

use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Credential that prints as `[REDACTED]` and is wiped on drop.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// The raw value, for the token request body and nowhere else.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl From<String> for Secret<String> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Resolve a secret from the value of its environment variable, falling
/// back to a file. Surrounding whitespace is stripped and a blank value
/// counts as unset.
///
/// `setting` names the environment variable and is reported in
/// `MissingSetting` when neither source yields a value.
pub fn resolve_secret(
    setting: &'static str,
    env_value: Option<String>,
    file: Option<&Path>,
) -> Result<Secret<String>> {
    if let Some(value) = env_value.and_then(non_blank) {
        return Ok(Secret::new(value));
    }

    if let Some(path) = file {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::SecretFile {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(value) = non_blank(contents) {
            return Ok(Secret::new(value));
        }
    }

    Err(Error::MissingSetting(setting))
}

fn non_blank(mut value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        value.zeroize();
        return None;
    }
    let owned = trimmed.to_string();
    value.zeroize();
    Some(owned)
}
