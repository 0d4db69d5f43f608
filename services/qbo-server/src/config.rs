//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! OAuth secrets are loaded from QBO_* env vars or `*_file` paths and are
//! never stored in the TOML directly.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub quickbooks: QuickBooksConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Prefix the QuickBooks routes are nested under
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// QuickBooks Online app and company settings
#[derive(Debug, Deserialize)]
pub struct QuickBooksConfig {
    pub client_id: String,
    pub realm_id: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub minor_version: Option<u32>,
    /// Background refresh period; 0 disables the task
    #[serde(default)]
    pub refresh_interval_secs: u64,

    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default)]
    pub refresh_token_file: Option<PathBuf>,
    #[serde(default)]
    pub access_token_file: Option<PathBuf>,

    #[serde(skip)]
    pub client_secret: Secret<String>,
    #[serde(skip)]
    pub refresh_token: Secret<String>,
    /// Optional; empty until the first refresh replaces it
    #[serde(skip)]
    pub access_token: Secret<String>,
}

fn default_api_prefix() -> String {
    "/api/v1/quickbooks".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_max_connections() -> usize {
    1000
}

fn default_token_url() -> String {
    qbo_auth::INTUIT_TOKEN_ENDPOINT.to_string()
}

fn default_api_base_url() -> String {
    "https://quickbooks.api.intuit.com".to_string()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order, per secret:
    /// 1. QBO_CLIENT_SECRET / QBO_REFRESH_TOKEN / QBO_ACCESS_TOKEN env var
    /// 2. client_secret_file / refresh_token_file / access_token_file path
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        let qb = &mut config.quickbooks;
        qb.client_secret = resolve_secret(
            "QBO_CLIENT_SECRET",
            "client_secret_file",
            qb.client_secret_file.as_deref(),
        )?
        .ok_or(common::Error::MissingSecret {
            name: "client_secret",
            env_var: "QBO_CLIENT_SECRET",
            file_key: "client_secret_file",
        })?;
        qb.refresh_token = resolve_secret(
            "QBO_REFRESH_TOKEN",
            "refresh_token_file",
            qb.refresh_token_file.as_deref(),
        )?
        .ok_or(common::Error::MissingSecret {
            name: "refresh_token",
            env_var: "QBO_REFRESH_TOKEN",
            file_key: "refresh_token_file",
        })?;
        qb.access_token = resolve_secret(
            "QBO_ACCESS_TOKEN",
            "access_token_file",
            qb.access_token_file.as_deref(),
        )?
        .unwrap_or_default();

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        for (key, url) in [
            ("token_url", &self.quickbooks.token_url),
            ("api_base_url", &self.quickbooks.api_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{key} must start with http:// or https://, got: {url}"
                )));
            }
        }

        let prefix = &self.server.api_prefix;
        if !prefix.starts_with('/') || prefix.ends_with('/') {
            return Err(common::Error::Config(format!(
                "api_prefix must start with '/' and must not end with '/', got: {prefix}"
            )));
        }

        if self.quickbooks.client_id.trim().is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        if self.quickbooks.realm_id.trim().is_empty() {
            return Err(common::Error::Config("realm_id must not be empty".into()));
        }

        if self.server.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("qbo-server.toml")
    }
}

/// Env var wins over file. Both are trimmed; empty counts as absent.
fn resolve_secret(
    env_var: &str,
    file_key: &str,
    file: Option<&Path>,
) -> common::Result<Option<Secret<String>>> {
    if let Ok(value) = std::env::var(env_var) {
        let value = value.trim();
        if !value.is_empty() {
            return Ok(Some(Secret::new(value.to_owned())));
        }
    }

    let Some(file) = file else {
        return Ok(None);
    };
    let value = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!(
            "failed to read {file_key} {}: {e}",
            file.display()
        ))
    })?;
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(Secret::new(value.to_owned())))
}
