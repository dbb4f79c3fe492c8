//! Health Lambda - Liveness and host metrics.
//!
//! Endpoints:
//! - GET /health - CPU, memory and disk usage with an OK/WARNING status
//! - GET / - Greeting

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::http::{json_response, respond, route_not_found};
use shared::{HostSnapshot, MessageResponse};
use tracing::info;
use tracing_subscriber::EnvFilter;

async fn handler(event: Request) -> Result<Response<Body>, Error> {
    let path = event.uri().path();
    let method = event.method().as_str();

    match (method, path) {
        ("GET", "/health") => {
            let result = HostSnapshot::capture().await.map(|snapshot| {
                info!(
                    "Health sampled: cpu {:.1}%, memory {:.1}%",
                    snapshot.cpu_percent, snapshot.memory_percent
                );
                snapshot.report()
            });
            respond(result)
        }

        ("GET", "/") => json_response(
            200,
            &MessageResponse {
                message: "Hello from Copilot Demo API!".to_string(),
            },
        ),

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
