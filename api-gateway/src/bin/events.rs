//! Events Lambda - Recent system log events.
//!
//! Endpoints:
//! - GET /events?source=windows|linux&level=all|error|warning

use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use shared::events::read_events;
use shared::http::{respond, route_not_found};
use shared::{EventLevel, EventSource, EventsResponse};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn get_events(event: &Request) -> shared::Result<EventsResponse> {
    let params = event.query_string_parameters();
    let source: EventSource = params.first("source").unwrap_or("windows").parse()?;
    let level: EventLevel = params.first("level").unwrap_or("all").parse()?;

    let events = tokio::task::spawn_blocking(move || read_events(source, level))
        .await
        .map_err(|e| shared::Error::Io(format!("Event read task failed: {}", e)))??;

    info!("Read {} {} events", events.events.len(), source);
    Ok(events)
}

async fn handler(event: Request) -> Result<Response<Body>, Error> {
    let path = event.uri().path();
    let method = event.method().as_str();

    match (method, path) {
        ("GET", "/events") => respond(get_events(&event).await),
        _ => route_not_found(method, path),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    run(service_fn(handler)).await
}
