//! Startup errors
//!
//! Everything here is fatal: the service and the trigger binary refuse to
//! start rather than run with a half-resolved configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A setting is present but unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A required setting has no value from any source.
    #[error("{0} is not set")]
    MissingSetting(&'static str),

    #[error("cannot read secret file {}: {source}", path.display())]
    SecretFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config file: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
