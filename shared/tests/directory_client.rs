//! Integration tests for the directory client against a mock identity
//! provider and Graph API.

mod common;

use common::*;
use serde_json::json;
use shared::{DirectoryClient, Error, QueryParams};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_users(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [create_test_user("u1", "Adele Vance"), create_test_user("u2", "Alex Wilber")]
        })))
        .mount(server)
        .await;
}

/// Two queries inside the validity window share one token.
#[tokio::test]
async fn test_token_cached_across_queries() {
    let server = MockServer::start().await;
    mount_token(&server, "token-1", 3600).await;
    mount_users(&server).await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    client.query("users", &QueryParams::new()).await.unwrap();
    client.query("users", &QueryParams::new()).await.unwrap();

    assert_eq!(hits(&server, TOKEN_PATH).await, 1);
    assert_eq!(hits(&server, "/v1.0/users").await, 2);
}

/// The token request uses the client-credential grant and Graph scope.
#[tokio::test]
async fn test_token_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=test-client"))
        .and(body_string_contains("scope=https%3A%2F%2Fgraph.microsoft.com%2F.default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(create_token_response("token-1", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    let token = client.get_token().await.unwrap();

    assert_eq!(token.secret(), "token-1");
    assert_eq!(token.scope(), "https://graph.microsoft.com/.default");
    server.verify().await;
}

/// A token expiring inside the safety margin is refreshed before the next query.
#[tokio::test]
async fn test_token_within_margin_refreshed() {
    let server = MockServer::start().await;
    // 30s lifetime is inside the default 60s margin
    mount_token(&server, "short-lived", 30).await;
    mount_users(&server).await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    client.query("users", &QueryParams::new()).await.unwrap();
    assert_eq!(hits(&server, TOKEN_PATH).await, 1);

    client.query("users", &QueryParams::new()).await.unwrap();
    assert_eq!(hits(&server, TOKEN_PATH).await, 2);
    assert_eq!(hits(&server, "/v1.0/users").await, 2);
}

/// Concurrent callers with no valid token trigger exactly one refresh.
#[tokio::test]
async fn test_concurrent_refresh_single_flight() {
    let server = MockServer::start().await;
    mount_slow_token(&server, "shared-token", Duration::from_millis(300)).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(header("authorization", "Bearer shared-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(8)
        .mount(&server)
        .await;

    let client = Arc::new(DirectoryClient::new(&test_config(&server)).unwrap());
    let calls: Vec<_> = (0..8)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.query("users", &QueryParams::new()).await })
        })
        .collect();

    for call in calls {
        assert!(call.await.unwrap().is_ok());
    }

    assert_eq!(hits(&server, TOKEN_PATH).await, 1);
    server.verify().await;
}

/// Waiters on a failed refresh get its error instead of retrying it.
#[tokio::test]
async fn test_concurrent_refresh_failure_shared() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": "invalid_client", "error_description": "AADSTS7000215: Invalid client secret provided."}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let client = Arc::new(DirectoryClient::new(&test_config(&server)).unwrap());
    let calls: Vec<_> = (0..4)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.get_token().await })
        })
        .collect();

    for call in calls {
        assert!(matches!(call.await.unwrap(), Err(Error::Authentication(_))));
    }
    assert_eq!(hits(&server, TOKEN_PATH).await, 1);
}

#[tokio::test]
async fn test_not_found_classified() {
    let server = MockServer::start().await;
    mount_token(&server, "token-1", 3600).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(create_odata_error(
            "Request_ResourceNotFound",
            "Resource 'missing' does not exist",
        )))
        .mount(&server)
        .await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    let err = client.query("users/missing", &QueryParams::new()).await.unwrap_err();

    assert!(matches!(err, Error::NotFound(ref m) if m.contains("Request_ResourceNotFound")));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    mount_token(&server, "token-1", 3600).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "30")
                .set_body_json(create_odata_error("TooManyRequests", "Too many requests")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    let err = client.query("users", &QueryParams::new()).await.unwrap_err();

    assert!(matches!(err, Error::RateLimited { retry_after: Some(30), .. }));
    server.verify().await;
}

/// A 401 with a cached token causes one refresh and one retried request.
#[tokio::test]
async fn test_rejected_token_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(create_token_response("token-a", 3600)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_token(&server, "token-b", 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(header("authorization", "Bearer token-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(header("authorization", "Bearer token-a"))
        .respond_with(ResponseTemplate::new(401).set_body_json(create_odata_error(
            "InvalidAuthenticationToken",
            "Access token has expired or is not yet valid.",
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(header("authorization", "Bearer token-b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": [create_test_user("u1", "Adele Vance")]})))
        .mount(&server)
        .await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    client.query("users", &QueryParams::new()).await.unwrap();
    let payload = client.query("users", &QueryParams::new()).await.unwrap();

    assert_eq!(payload.records().len(), 1);
    assert_eq!(hits(&server, TOKEN_PATH).await, 2);
    assert_eq!(hits(&server, "/v1.0/users").await, 3);
}

/// When the retry is rejected too, the call fails with an authentication error.
#[tokio::test]
async fn test_rejected_retry_surfaces_authentication_error() {
    let server = MockServer::start().await;
    mount_token(&server, "token-1", 3600).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(403).set_body_json(create_odata_error(
            "Authorization_RequestDenied",
            "Insufficient privileges to complete the operation.",
        )))
        .mount(&server)
        .await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    let err = client.query("users", &QueryParams::new()).await.unwrap_err();

    assert!(matches!(err, Error::Authentication(_)));
    assert_eq!(hits(&server, TOKEN_PATH).await, 2);
    assert_eq!(hits(&server, "/v1.0/users").await, 2);
}

#[tokio::test]
async fn test_invalid_credentials_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "unauthorized_client",
            "error_description": "AADSTS700016: Application not found in the directory."
        })))
        .mount(&server)
        .await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    let err = client.query("users", &QueryParams::new()).await.unwrap_err();

    assert!(matches!(err, Error::Authentication(ref m) if m.contains("unauthorized_client")));
    assert_eq!(hits(&server, "/v1.0/users").await, 0);
}

#[tokio::test]
async fn test_unreachable_identity_provider_is_transient() {
    let server = MockServer::start().await;
    let config = test_config_with(&server, &[("AUTHORITY_HOST", "http://127.0.0.1:1")]);

    let client = DirectoryClient::new(&config).unwrap();
    let err = client.get_token().await.unwrap_err();

    assert!(matches!(err, Error::TransientNetwork(_)));
    assert_eq!(err.status_code(), 503);
}

#[tokio::test]
async fn test_non_json_body_is_format_error() {
    let server = MockServer::start().await;
    mount_token(&server, "token-1", 3600).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    let err = client.query("users", &QueryParams::new()).await.unwrap_err();

    assert!(matches!(err, Error::ResponseFormat(_)));
    assert_eq!(err.status_code(), 502);
}

#[tokio::test]
async fn test_server_error_is_upstream() {
    let server = MockServer::start().await;
    mount_token(&server, "token-1", 3600).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    let err = client.query("users", &QueryParams::new()).await.unwrap_err();

    assert!(matches!(err, Error::Upstream(_)));
    server.verify().await;
}

#[tokio::test]
async fn test_slow_directory_times_out_as_upstream() {
    let server = MockServer::start().await;
    mount_token(&server, "token-1", 3600).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"value": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = test_config_with(&server, &[("DIRECTORY_TIMEOUT_SECS", "1")]);
    let client = DirectoryClient::new(&config).unwrap();
    let err = client.query("users", &QueryParams::new()).await.unwrap_err();

    assert!(matches!(err, Error::Upstream(ref m) if m.contains("timed out")));
}

#[tokio::test]
async fn test_query_params_forwarded() {
    let server = MockServer::start().await;
    mount_token(&server, "token-1", 3600).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users/u1/events"))
        .and(query_param("$top", "5"))
        .and(query_param("$select", "subject,start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "e1", "subject": "Standup"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    let params = QueryParams::new().with("$TOP", "5").with("$select", "subject,start");
    let payload = client.query("/users/u1/events", &params).await.unwrap();

    assert_eq!(
        payload.as_value(),
        &json!({"value": [{"id": "e1", "subject": "Standup"}]})
    );
    server.verify().await;
}

/// A token lifetime chrono cannot represent is a malformed token response.
#[tokio::test]
async fn test_out_of_range_expires_in_is_response_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(create_token_response_raw("token-1", json!(9_000_000_000_000_i64))),
        )
        .mount(&server)
        .await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    let err = client.get_token().await.unwrap_err();

    match err {
        Error::ResponseFormat(message) => assert!(message.contains("expires_in")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(hits(&server, "/v1.0/users").await, 0);
}

/// Negative lifetimes are rejected the same way.
#[tokio::test]
async fn test_negative_expires_in_is_response_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(create_token_response_raw("token-1", json!(-5))),
        )
        .mount(&server)
        .await;

    let client = DirectoryClient::new(&test_config(&server)).unwrap();
    let err = client.query("users", &QueryParams::new()).await.unwrap_err();

    assert!(matches!(err, Error::ResponseFormat(_)));
}
