//! AWS Secrets Manager integration.

use aws_sdk_secretsmanager::Client as SecretsClient;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::{Error, Result};

/// Secret values keyed by ARN, fetched at most once per cold start.
static SECRETS_CACHE: OnceLock<RwLock<HashMap<String, SecretString>>> = OnceLock::new();

fn get_cache() -> &'static RwLock<HashMap<String, SecretString>> {
    SECRETS_CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Application credentials stored as a JSON secret.
#[derive(Deserialize)]
struct ClientSecretDocument {
    client_secret: String,
}

/// Get a secret value from Secrets Manager with caching.
#[instrument(skip(client))]
pub async fn get_secret(client: &SecretsClient, secret_arn: &str) -> Result<SecretString> {
    if let Some(value) = get_cache().read().await.get(secret_arn) {
        debug!("Secret served from cache");
        return Ok(value.clone());
    }

    let response = client
        .get_secret_value()
        .secret_id(secret_arn)
        .send()
        .await
        .map_err(|e| Error::Aws(format!("Failed to get secret {}: {}", secret_arn, e)))?;

    let value = SecretString::from(
        response
            .secret_string()
            .ok_or_else(|| Error::Aws(format!("Secret {} has no string value", secret_arn)))?
            .to_string(),
    );

    get_cache()
        .write()
        .await
        .insert(secret_arn.to_string(), value.clone());

    Ok(value)
}

/// Get the application client secret from Secrets Manager.
///
/// Accepts either the bare secret or a JSON document with a `client_secret` key.
pub async fn get_client_secret(client: &SecretsClient, secret_arn: &str) -> Result<SecretString> {
    let raw = get_secret(client, secret_arn).await?;
    let secret = parse_client_secret(raw.expose_secret())?;
    info!("Resolved client secret from Secrets Manager");
    Ok(SecretString::from(secret))
}

fn parse_client_secret(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        let document: ClientSecretDocument = serde_json::from_str(trimmed)
            .map_err(|e| Error::Config(format!("Failed to parse client secret document: {}", e)))?;
        return Ok(document.client_secret);
    }

    if trimmed.is_empty() {
        return Err(Error::Config("Client secret is empty".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Clear the secrets cache (useful for testing or credential rotation).
pub async fn clear_cache() {
    let mut cache = get_cache().write().await;
    cache.clear();
}
