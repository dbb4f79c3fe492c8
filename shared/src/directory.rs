//! Microsoft Graph directory client.
//!
//! Wraps the [`TokenCache`] and issues bearer-authenticated GET requests,
//! classifying every non-2xx answer into the crate error taxonomy. The only
//! retry is a single refresh-and-retry when the directory rejects the token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::token::{AccessToken, TokenCache};
use crate::{Config, Error, Result};

/// `OData` error response from Microsoft Graph.
#[derive(Debug, Deserialize)]
struct ODataError {
    error: ODataErrorBody,
}

#[derive(Debug, Deserialize)]
struct ODataErrorBody {
    code: String,
    message: String,
}

/// Query parameters for a directory request.
///
/// Keys are case-insensitive and stored lowercased, so `$Top` and `$top`
/// address the same parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a parameter.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// A single directory object (user, event, ...).
///
/// Only the fields this service reads have accessors; everything else stays
/// reachable through [`DirectoryRecord::get`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryRecord(Map<String, Value>);

impl DirectoryRecord {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    fn str_field(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    pub fn display_name(&self) -> Option<&str> {
        self.str_field("displayName")
    }

    pub fn user_principal_name(&self) -> Option<&str> {
        self.str_field("userPrincipalName")
    }

    pub fn mail(&self) -> Option<&str> {
        self.str_field("mail")
    }
}

impl From<Map<String, Value>> for DirectoryRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Directory API payload, unmodified in structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryPayload(Value);

impl DirectoryPayload {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Records in payload order.
    ///
    /// Handles collection responses (`{"value": [...]}`), bare arrays, and
    /// single objects. Non-object entries are skipped.
    pub fn records(&self) -> Vec<DirectoryRecord> {
        let items: Vec<&Value> = match &self.0 {
            Value::Object(map) => match map.get("value") {
                Some(Value::Array(items)) => items.iter().collect(),
                _ => vec![&self.0],
            },
            Value::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        };

        items
            .into_iter()
            .filter_map(|item| item.as_object().cloned().map(DirectoryRecord::from))
            .collect()
    }

    /// `@odata.nextLink` of a paged collection, if any.
    pub fn next_link(&self) -> Option<&str> {
        self.0.get("@odata.nextLink").and_then(Value::as_str)
    }
}

/// Microsoft Graph API client.
#[derive(Debug)]
pub struct DirectoryClient {
    http_client: reqwest::Client,
    token_cache: TokenCache,
    base_url: String,
}

impl DirectoryClient {
    /// Creates a directory client sharing one HTTP client between the token
    /// endpoint and the directory API.
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = build_http_client(config.request_timeout)?;
        let token_cache = TokenCache::new(config, http_client.clone());

        Ok(Self {
            http_client,
            token_cache,
            base_url: config.graph_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Returns a valid application token, from cache when possible.
    pub async fn get_token(&self) -> Result<AccessToken> {
        self.token_cache.get_token().await
    }

    /// Absolute URL for a resource path relative to the API base.
    pub fn resource_url(&self, resource_path: &str) -> String {
        format!("{}/{}", self.base_url, resource_path.trim_start_matches('/'))
    }

    /// Performs an authenticated GET against the directory API.
    ///
    /// A 401/403 invalidates the token and retries exactly once with a fresh
    /// one; a second rejection surfaces as [`Error::Authentication`].
    #[instrument(skip(self, params), fields(params = params.len()))]
    pub async fn query(&self, resource_path: &str, params: &QueryParams) -> Result<DirectoryPayload> {
        let url = self.resource_url(resource_path);
        let token = self.token_cache.get_token().await?;

        match self.send(&url, params, &token).await {
            Err(Error::Authentication(reason)) => {
                warn!("Directory rejected token ({}), refreshing once", reason);
                self.token_cache.invalidate(&token).await;
                let fresh = self.token_cache.get_token().await?;
                self.send(&url, params, &fresh).await
            }
            outcome => outcome,
        }
    }

    async fn send(
        &self,
        url: &str,
        params: &QueryParams,
        token: &AccessToken,
    ) -> Result<DirectoryPayload> {
        let mut request = self
            .http_client
            .get(url)
            .bearer_auth(token.secret())
            .header("Accept", "application/json");
        if !params.is_empty() {
            let query: Vec<(&str, &str)> = params.iter().collect();
            request = request.query(&query);
        }

        let response = request.send().await.map_err(classify_transport_error)?;

        let status = response.status();
        debug!("Directory responded {} for {}", status, url);

        if status.is_success() {
            let body = response.bytes().await.map_err(classify_transport_error)?;
            let value: Value = serde_json::from_slice(&body).map_err(|e| {
                Error::ResponseFormat(format!("Directory returned a non-JSON body: {}", e))
            })?;
            return Ok(DirectoryPayload(value));
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));
        let body = response.text().await.unwrap_or_default();

        Err(classify_status(status, retry_after, &body))
    }
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("copilot-demo-api/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Transport failures: a timed-out query is an upstream failure, anything
/// else that kept the request from completing is transient.
fn classify_transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Upstream(format!("Directory request timed out: {}", err))
    } else {
        Error::TransientNetwork(format!("Directory request failed: {}", err))
    }
}

/// `Retry-After` as delta-seconds or an HTTP-date. A date in the past
/// means retry now.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&Utc).signed_duration_since(now).num_seconds();
    Some(u64::try_from(wait).unwrap_or(0))
}

fn classify_status(status: reqwest::StatusCode, retry_after: Option<u64>, body: &str) -> Error {
    let message = match serde_json::from_str::<ODataError>(body) {
        Ok(odata) => format!("{} - {}", odata.error.code, odata.error.message),
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => body.chars().take(200).collect(),
    };

    match status.as_u16() {
        404 => Error::NotFound(message),
        401 | 403 => Error::Authentication(message),
        429 => Error::RateLimited {
            message,
            retry_after,
        },
        _ => Error::Upstream(format!("Directory returned {}: {}", status, message)),
    }
}
