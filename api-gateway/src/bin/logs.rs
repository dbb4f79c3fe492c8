//! Logs Lambda - Log folder housekeeping.
//!
//! Endpoints:
//! - GET /logs - Newest files in the log folder (`limit`, default 20)
//! - GET /logs/preview-delete - Files older than `days` (default 30)
//! - DELETE /logs/delete-confirmed - Delete them, only with `confirm=yes`
//! - POST /logs/summarize - Keyword summary of `file_path`
//!
//! Every `folder` and `file_path` parameter must resolve inside `LOG_FOLDER`.

use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use shared::config::log_folder_from_env;
use shared::http::{respond, route_not_found};
use shared::logs::{self, DeletionSkipped, LogListing};
use shared::LogRoot;
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LIMIT: usize = 20;
const DEFAULT_DAYS: u32 = 30;

/// Application state
struct AppState {
    root: LogRoot,
}

impl AppState {
    fn new() -> Self {
        let root = LogRoot::new(log_folder_from_env());
        info!("Log root: {}", root.path().display());
        Self { root }
    }
}

/// Runs filesystem work off the async runtime.
async fn blocking<T, F>(work: F) -> shared::Result<T>
where
    F: FnOnce() -> shared::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| shared::Error::Io(format!("Log task failed: {}", e)))?
}

fn numeric_param<T: FromStr>(event: &Request, key: &str, default: T) -> shared::Result<T> {
    match event.query_string_parameters().first(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            shared::Error::Validation(format!("{} must be a non-negative integer", key))
        }),
        None => Ok(default),
    }
}

fn text_param(event: &Request, key: &str) -> Option<String> {
    event.query_string_parameters().first(key).map(str::to_string)
}

async fn list_logs(state: &AppState, event: &Request) -> shared::Result<LogListing> {
    let limit = numeric_param(event, "limit", DEFAULT_LIMIT)?;
    let folder = state.root.resolve(None)?;

    blocking(move || {
        let files = logs::list_recent(&folder, limit)?;
        Ok(LogListing {
            folder: folder.display().to_string(),
            files,
        })
    })
    .await
}

async fn preview_delete(state: &AppState, event: &Request) -> shared::Result<logs::DeletionPreview> {
    let days = numeric_param(event, "days", DEFAULT_DAYS)?;
    let folder = state.root.resolve(text_param(event, "folder").as_deref())?;

    blocking(move || logs::preview_expired(&folder, days, SystemTime::now())).await
}

async fn delete_confirmed(state: &AppState, event: &Request) -> Result<Response<Body>, Error> {
    let days = match numeric_param(event, "days", DEFAULT_DAYS) {
        Ok(days) => days,
        Err(err) => return respond::<()>(Err(err)),
    };
    let requested = text_param(event, "folder");
    let confirmed = text_param(event, "confirm")
        .map(|c| c.trim().eq_ignore_ascii_case("yes"))
        .unwrap_or(false);

    if !confirmed {
        let folder = requested.unwrap_or_else(|| state.root.path().display().to_string());
        return respond(Ok(DeletionSkipped {
            message: "Deletion not performed. Use ?confirm=yes to proceed.".to_string(),
            folder,
            days,
        }));
    }

    let result = match state.root.resolve(requested.as_deref()) {
        Ok(folder) => blocking(move || logs::delete_expired(&folder, days, SystemTime::now())).await,
        Err(err) => Err(err),
    };
    respond(result)
}

async fn summarize(state: &AppState, event: &Request) -> shared::Result<logs::LogSummary> {
    let requested = text_param(event, "file_path")
        .ok_or_else(|| shared::Error::Validation("file_path is required".to_string()))?;
    let path = state.root.resolve(Some(requested.as_str()))?;

    blocking(move || logs::summarize(&path)).await
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let path = event.uri().path();
    let method = event.method().as_str();

    match (method, path.trim_end_matches('/')) {
        ("GET", "/logs") => respond(list_logs(&state, &event).await),
        ("GET", "/logs/preview-delete") => respond(preview_delete(&state, &event).await),
        ("DELETE", "/logs/delete-confirmed") => delete_confirmed(&state, &event).await,
        ("POST", "/logs/summarize") => respond(summarize(&state, &event).await),
        _ => route_not_found(method, path),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new());

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
