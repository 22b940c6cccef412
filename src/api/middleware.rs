//! Request-scoped middleware: request ID propagation and structured
//! tracing. Authentication and rate limiting are explicitly out of scope
//! for this crate (see the admin surface's non-goals) — this file keeps
//! only the observability middleware the teacher's stack already pulled
//! in via `tower-http`.

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Attaches a request id to every request/response pair, generating one
/// when the caller didn't supply it.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(request_id.clone());
    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
