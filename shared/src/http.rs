//! HTTP helpers for Lambda functions.

use lambda_http::{Body, Response};
use serde::Serialize;
use tracing::{error, warn};

use crate::Error;

/// JSON error body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            error: err.kind(),
            message: err.message(),
            retry_after: err.retry_after(),
        }
    }
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>, lambda_http::Error> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(data)?))?)
}

/// Create the JSON error response for a domain error.
///
/// Rate-limit errors also carry a `Retry-After` header when the upstream
/// provided one.
pub fn error_response(err: &Error) -> Result<Response<Body>, lambda_http::Error> {
    let status = err.status_code();
    if status >= 500 {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected: {}", err);
    }

    let mut builder = Response::builder()
        .status(status)
        .header("content-type", "application/json");
    if let Some(secs) = err.retry_after() {
        builder = builder.header("retry-after", secs.to_string());
    }

    Ok(builder.body(Body::from(serde_json::to_string(&ErrorBody::from(err))?))?)
}

/// Render a handler outcome: 200 with the payload, or the error response.
pub fn respond<T: Serialize>(result: crate::Result<T>) -> Result<Response<Body>, lambda_http::Error> {
    match result {
        Ok(data) => json_response(200, &data),
        Err(err) => error_response(&err),
    }
}

/// 404 for paths no route matches.
pub fn route_not_found(method: &str, path: &str) -> Result<Response<Body>, lambda_http::Error> {
    error_response(&Error::NotFound(format!("No route for {} {}", method, path)))
}
