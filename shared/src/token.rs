//! Client-credential access tokens for the directory API.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::{Config, Error, Result};

/// OAuth2 token response from the identity provider.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// OAuth2 error document (`invalid_client`, `unauthorized_client`, ...).
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// Application access token issued for a single scope.
#[derive(Clone, PartialEq)]
pub struct AccessToken {
    secret: String,
    expires_at: DateTime<Utc>,
    scope: String,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>, scope: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
            scope: scope.into(),
        }
    }

    /// Bearer value for the `Authorization` header.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns true if the token is expired or will expire within `margin`.
    pub fn is_expired(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    token: Option<AccessToken>,
    /// Bumped every time a refresh completes, successfully or not.
    generation: u64,
    /// Outcome of the latest refresh when it failed.
    last_failure: Option<Error>,
}

/// Token cache for the directory API application token.
///
/// Concurrent callers that find the token absent or expiring share one
/// refresh: the first one through `refresh_lock` performs the request, the
/// others wait on the lock and pick up its outcome.
#[derive(Debug)]
pub struct TokenCache {
    token_endpoint: String,
    client_id: String,
    client_secret: SecretString,
    scope: String,
    http_client: reqwest::Client,
    state: RwLock<CacheState>,
    refresh_lock: Mutex<()>,
    refresh_margin: Duration,
}

impl TokenCache {
    /// Creates a token cache for the configured tenant and application.
    pub fn new(config: &Config, http_client: reqwest::Client) -> Self {
        let refresh_margin = Duration::from_std(config.token_refresh_margin)
            .unwrap_or_else(|_| Duration::seconds(60));

        Self {
            token_endpoint: config.token_endpoint(),
            client_id: config.client_id.clone(),
            client_secret: SecretString::from(config.client_secret.expose_secret().to_owned()),
            scope: config.graph_scope.clone(),
            http_client,
            state: RwLock::new(CacheState::default()),
            refresh_lock: Mutex::new(()),
            refresh_margin,
        }
    }

    /// Gets a valid access token, refreshing if necessary.
    #[instrument(skip(self), fields(client_id = %self.client_id))]
    pub async fn get_token(&self) -> Result<AccessToken> {
        let observed_generation = {
            let state = self.state.read().await;
            if let Some(token) = self.usable(&state) {
                debug!("Using cached token, expires at {}", token.expires_at());
                return Ok(token);
            }
            state.generation
        };

        let _flight = self.refresh_lock.lock().await;

        {
            let state = self.state.read().await;
            if state.generation != observed_generation {
                // A refresh finished while we waited for the lock.
                if let Some(err) = &state.last_failure {
                    return Err(err.clone());
                }
                if let Some(token) = self.usable(&state) {
                    debug!("Using token refreshed by a concurrent caller");
                    return Ok(token);
                }
            } else if let Some(token) = self.usable(&state) {
                return Ok(token);
            }
        }

        debug!("Refreshing access token");
        let outcome = self.acquire_token().await;

        let mut state = self.state.write().await;
        state.generation += 1;
        match outcome {
            Ok(token) => {
                state.token = Some(token.clone());
                state.last_failure = None;
                Ok(token)
            }
            Err(err) => {
                warn!("Token refresh failed: {}", err);
                state.token = None;
                state.last_failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Drops the cached token if it is still the one the directory rejected.
    pub async fn invalidate(&self, rejected: &AccessToken) {
        let mut state = self.state.write().await;
        if state.token.as_ref() == Some(rejected) {
            info!("Invalidating rejected access token");
            state.token = None;
        }
    }

    fn usable(&self, state: &CacheState) -> Option<AccessToken> {
        state
            .token
            .as_ref()
            .filter(|token| !token.is_expired(self.refresh_margin))
            .cloned()
    }

    /// Acquires a new access token using client credentials flow.
    #[instrument(skip(self))]
    async fn acquire_token(&self) -> Result<AccessToken> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::TransientNetwork(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_token_failure(status, &body));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::TransientNetwork(format!("Token response interrupted: {}", e)))?;

        let token_response: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| Error::ResponseFormat(format!("Failed to parse token response: {}", e)))?;

        let expires_at = token_lifetime(token_response.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                Error::ResponseFormat(format!(
                    "Token response has an out-of-range expires_in: {}",
                    token_response.expires_in
                ))
            })?;

        info!(
            "Acquired new token, expires at {}",
            expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        Ok(AccessToken::new(
            token_response.access_token,
            expires_at,
            self.scope.clone(),
        ))
    }
}

/// `expires_in` as a duration; negative or unrepresentable values are rejected.
fn token_lifetime(expires_in: i64) -> Option<Duration> {
    if expires_in < 0 {
        return None;
    }
    Duration::try_seconds(expires_in)
}

/// Maps a non-2xx token endpoint answer onto the error taxonomy.
fn classify_token_failure(status: reqwest::StatusCode, body: &str) -> Error {
    let detail = match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(doc) => match doc.error_description {
            // AADSTS descriptions carry trace ids on later lines
            Some(description) => format!(
                "{}: {}",
                doc.error,
                description.lines().next().unwrap_or_default()
            ),
            None => doc.error,
        },
        Err(_) => body.chars().take(200).collect(),
    };

    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Error::TransientNetwork(format!("Token endpoint returned {}: {}", status, detail))
    } else {
        Error::Authentication(format!("Token request rejected ({}): {}", status, detail))
    }
}
