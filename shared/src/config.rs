//! Configuration management for Lambda functions.

use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::{secrets, Error, Result};

/// Default identity provider host for the client-credential flow.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
/// Default directory API base.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
/// Default application scope requested for directory tokens.
pub const DEFAULT_GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
/// Public hostname advertised in the plugin manifest when none is configured.
pub const DEFAULT_DEPLOYED_BASE_URL: &str = "https://copilot-fastapi-demo.azurewebsites.net";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REFRESH_MARGIN_SECS: u64 = 60;

/// Application configuration loaded from environment variables.
///
/// Loaded once per cold start and never mutated afterwards.
#[derive(Debug)]
pub struct Config {
    /// Directory tenant
    pub tenant_id: String,
    /// Application (client) id
    pub client_id: String,
    /// Application secret
    pub client_secret: SecretString,
    /// Public base URL of this deployment (manifest only)
    pub deployed_base_url: Option<String>,
    /// Identity provider host
    pub authority_host: String,
    /// Directory API base URL
    pub graph_base_url: String,
    /// Scope requested for application tokens
    pub graph_scope: String,
    /// Per-request timeout for token and directory calls
    pub request_timeout: Duration,
    /// Tokens are refreshed when they expire within this margin
    pub token_refresh_margin: Duration,
    /// Root folder for log housekeeping
    pub log_folder: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration, resolving the client secret through Secrets Manager
    /// when only `CLIENT_SECRET_ARN` is set.
    pub async fn load() -> Result<Self> {
        if non_empty(env::var("CLIENT_SECRET").ok()).is_none() {
            if let Some(arn) = non_empty(env::var("CLIENT_SECRET_ARN").ok()) {
                let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                let client = aws_sdk_secretsmanager::Client::new(&aws);
                let secret = secrets::get_client_secret(&client, &arn).await?;

                return Self::from_lookup(|key| match key {
                    "CLIENT_SECRET" => Some(secret.expose_secret().to_owned()),
                    _ => env::var(key).ok(),
                });
            }
        }

        Self::from_env()
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            non_empty(lookup(key))
                .ok_or_else(|| Error::Config(format!("{} must be set", key)))
        };

        let tenant_id = required("TENANT_ID")?;
        let client_id = required("CLIENT_ID")?;
        let client_secret = SecretString::from(required("CLIENT_SECRET")?);

        let request_timeout = Duration::from_secs(parse_secs(
            lookup("DIRECTORY_TIMEOUT_SECS"),
            "DIRECTORY_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?);
        let token_refresh_margin = Duration::from_secs(parse_secs(
            lookup("TOKEN_REFRESH_MARGIN_SECS"),
            "TOKEN_REFRESH_MARGIN_SECS",
            DEFAULT_REFRESH_MARGIN_SECS,
        )?);

        let log_folder = log_folder_or_default(lookup("LOG_FOLDER"));

        Ok(Self {
            tenant_id,
            client_id,
            client_secret,
            deployed_base_url: non_empty(lookup("DEPLOYED_BASE_URL")),
            authority_host: non_empty(lookup("AUTHORITY_HOST"))
                .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string()),
            graph_base_url: non_empty(lookup("GRAPH_BASE_URL"))
                .unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.to_string()),
            graph_scope: non_empty(lookup("GRAPH_SCOPE"))
                .unwrap_or_else(|| DEFAULT_GRAPH_SCOPE.to_string()),
            request_timeout,
            token_refresh_margin,
            log_folder,
        })
    }

    /// Client-credential token endpoint for the configured tenant.
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    /// Base URL advertised to plugin hosts.
    pub fn public_base_url(&self) -> &str {
        self.deployed_base_url
            .as_deref()
            .unwrap_or(DEFAULT_DEPLOYED_BASE_URL)
    }
}

/// Log root from `LOG_FOLDER` alone, for handlers that never talk to the
/// directory and so do not need credentials.
pub fn log_folder_from_env() -> PathBuf {
    log_folder_or_default(env::var("LOG_FOLDER").ok())
}

/// Manifest base URL from `DEPLOYED_BASE_URL` alone.
pub fn deployed_base_url_from_env() -> String {
    non_empty(env::var("DEPLOYED_BASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_DEPLOYED_BASE_URL.to_string())
}

fn log_folder_or_default(value: Option<String>) -> PathBuf {
    non_empty(value)
        .map(PathBuf::from)
        .unwrap_or_else(default_log_folder)
}

/// Log root used when `LOG_FOLDER` is not set.
pub fn default_log_folder() -> PathBuf {
    let local = PathBuf::from("./logs");
    if local.exists() {
        local
    } else {
        env::temp_dir()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_secs(value: Option<String>, key: &str, default: u64) -> Result<u64> {
    match non_empty(value) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a whole number of seconds", key))),
        None => Ok(default),
    }
}
