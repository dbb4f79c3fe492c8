//! Common test utilities for directory client integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use shared::Config;
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TENANT: &str = "test-tenant";
pub const TOKEN_PATH: &str = "/test-tenant/oauth2/v2.0/token";

/// Creates a mock OAuth token response.
pub fn create_token_response(access_token: &str, expires_in: u64) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

/// Token response with an arbitrary `expires_in` value.
pub fn create_token_response_raw(access_token: &str, expires_in: Value) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in
    })
}

/// Test data factory for directory users.
pub fn create_test_user(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "displayName": name,
        "userPrincipalName": format!("{}@test.onmicrosoft.com", id),
        "accountEnabled": true
    })
}

/// Creates an `OData` error response.
pub fn create_odata_error(code: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message
        }
    })
}

/// Configuration pointing both the identity provider and the directory API at
/// the mock server.
pub fn test_config(server: &MockServer) -> Config {
    test_config_with(server, &[])
}

pub fn test_config_with(server: &MockServer, overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("TENANT_ID".to_string(), TENANT.to_string()),
        ("CLIENT_ID".to_string(), "test-client".to_string()),
        ("CLIENT_SECRET".to_string(), "test-secret".to_string()),
        ("AUTHORITY_HOST".to_string(), server.uri()),
        ("GRAPH_BASE_URL".to_string(), format!("{}/v1.0", server.uri())),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config")
}

/// Mounts a token endpoint that always answers with `access_token`.
pub async fn mount_token(server: &MockServer, access_token: &str, expires_in: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(create_token_response(access_token, expires_in)),
        )
        .mount(server)
        .await;
}

/// Same as [`mount_token`] but answers slowly.
pub async fn mount_slow_token(server: &MockServer, access_token: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(create_token_response(access_token, 3600))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Number of requests the mock server has seen for `request_path`.
pub async fn hits(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
