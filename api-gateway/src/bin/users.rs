//! Users Lambda - Microsoft Graph user and event lookups.
//!
//! Endpoints:
//! - GET /users - List directory users as `{name, email}` pairs
//! - GET /users/{id} - Get a single directory user
//! - GET /users/{id}/events - List a user's calendar events
//!
//! OData options (`$top`, `$select`, `$filter`, ...) on the inbound query
//! string are forwarded to the directory API.

use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use shared::http::{respond, route_not_found};
use shared::{Config, DirectoryClient, QueryParams, UsersResponse};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state
struct AppState {
    directory: DirectoryClient,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::load().await?;
        Self::from_config(&config)
    }

    fn from_config(config: &Config) -> Result<Self, Error> {
        Ok(Self {
            directory: DirectoryClient::new(config)?,
        })
    }
}

/// Routes under `/users`.
#[derive(Debug, PartialEq)]
enum UsersRoute<'a> {
    List,
    User(&'a str),
    Events(&'a str),
}

fn parse_route(path: &str) -> Option<UsersRoute<'_>> {
    let rest = path.trim_end_matches('/').strip_prefix("/users")?;
    if rest.is_empty() {
        return Some(UsersRoute::List);
    }
    if !rest.starts_with('/') {
        return None;
    }

    let segments: Vec<&str> = rest.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        [id] if !id.is_empty() => Some(UsersRoute::User(id)),
        [id, "events"] if !id.is_empty() => Some(UsersRoute::Events(id)),
        _ => None,
    }
}

/// OData system query options from the inbound request.
fn odata_params(event: &Request) -> QueryParams {
    event
        .query_string_parameters()
        .iter()
        .filter(|(key, _)| key.starts_with('$'))
        .collect()
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let path = event.uri().path();
    let method = event.method().as_str();

    if method != "GET" {
        return route_not_found(method, path);
    }

    match parse_route(path) {
        Some(UsersRoute::List) => {
            let params = odata_params(&event);
            let result = state
                .directory
                .query("users", &params)
                .await
                .map(|payload| UsersResponse::from(&payload));

            if let Ok(users) = &result {
                info!("Listed {} directory users", users.users.len());
            }
            respond(result)
        }

        Some(UsersRoute::User(id)) => {
            let resource = format!("users/{}", urlencoding::encode(id));
            respond(state.directory.query(&resource, &odata_params(&event)).await)
        }

        Some(UsersRoute::Events(id)) => {
            let resource = format!("users/{}/events", urlencoding::encode(id));
            respond(state.directory.query(&resource, &odata_params(&event)).await)
        }

        None => route_not_found(method, path),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
