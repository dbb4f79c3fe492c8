//! Plugin manifest Lambda.
//!
//! Endpoints:
//! - GET /.well-known/ai-plugin.json - Manifest pointing at `DEPLOYED_BASE_URL`

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use shared::config::deployed_base_url_from_env;
use shared::http::{json_response, route_not_found};
use shared::PluginManifest;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const MANIFEST_PATH: &str = "/.well-known/ai-plugin.json";

async fn handler(manifest: Arc<PluginManifest>, event: Request) -> Result<Response<Body>, Error> {
    let path = event.uri().path();
    let method = event.method().as_str();

    match (method, path) {
        ("GET", MANIFEST_PATH) => json_response(200, &*manifest),
        _ => route_not_found(method, path),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let manifest = Arc::new(PluginManifest::for_base_url(&deployed_base_url_from_env()));
    tracing::info!("Serving plugin manifest for {}", manifest.api.url);

    run(service_fn(move |event| {
        let manifest = Arc::clone(&manifest);
        async move { handler(manifest, event).await }
    }))
    .await
}
