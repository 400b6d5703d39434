//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from OAUTH_CLIENT_SECRET or
//! client_secret_file, never stored in the TOML directly.

use common::Secret;
use provider::ProfileConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProfileConfig,
    pub client: ClientConfig,
    #[serde(default)]
    pub tokens: TokensConfig,
    pub warehouse: WarehouseConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Client registration at the identity provider
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file holding the client secret (alternative to OAUTH_CLIENT_SECRET)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

/// Token persistence and lifetime policy
#[derive(Debug, Deserialize)]
pub struct TokensConfig {
    #[serde(default = "default_token_path")]
    pub path: PathBuf,
    #[serde(default = "default_expiry_buffer")]
    pub expiry_buffer_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            path: default_token_path(),
            expiry_buffer_secs: default_expiry_buffer(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Warehouse SQL API settings
#[derive(Debug, Deserialize)]
pub struct WarehouseConfig {
    pub account: String,
    /// Overrides the account URL, e.g. for a private link endpoint
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub default_warehouse: Option<String>,
    #[serde(default)]
    pub default_role: Option<String>,
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,
}

impl WarehouseConfig {
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }
}

fn default_max_connections() -> usize {
    256
}

fn default_token_path() -> PathBuf {
    PathBuf::from("tokens.json")
}

fn default_expiry_buffer() -> u64 {
    oauth_client::DEFAULT_EXPIRY_BUFFER_SECS
}

fn default_request_timeout() -> u64 {
    30
}

fn default_statement_timeout() -> u64 {
    60
}

fn check_http_url(field: &str, value: &str) -> common::Result<()> {
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. OAUTH_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.client.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }
        check_http_url("redirect_uri", &config.client.redirect_uri)?;

        // Profile validation errors surface at startup, not at first login
        config
            .provider
            .clone()
            .build()
            .map_err(|e| common::Error::Config(format!("provider: {e}")))?;

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if config.tokens.request_timeout_secs == 0 {
            return Err(common::Error::Config(
                "request_timeout_secs must be greater than 0".into(),
            ));
        }

        if config.warehouse.account.trim().is_empty() {
            return Err(common::Error::Config(
                "warehouse account must not be empty".into(),
            ));
        }
        if let Some(ref url) = config.warehouse.base_url {
            check_http_url("warehouse base_url", url)?;
        }

        // Env var takes precedence over the file
        let secret = common::resolve_secret(
            "OAUTH_CLIENT_SECRET",
            std::env::var("OAUTH_CLIENT_SECRET").ok(),
            config.client.client_secret_file.as_deref(),
        )?;
        config.client.client_secret = Some(secret);

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("warehouse-client.toml")
    }
}
