//! API response types.
//!
//! Deliberately small: this service has one public data endpoint and a
//! handful of admin actions, none of which need HAL links, JSON:API
//! envelopes, or pagination. Errors carry just enough for an operator or
//! a calling script to act on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::{RenderError, TemplateError};
use crate::spider::StatsSnapshot;

/// A minimal error envelope returned for every non-2xx response.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self.code {
            "not_spider" | "unknown_domain" => StatusCode::NOT_FOUND,
            "content_exhausted" | "pool_empty" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(self)).into_response()
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::NotSpider => ApiError::new("not_spider", err.to_string()),
            RenderError::UnknownDomain(_) => ApiError::new("unknown_domain", err.to_string()),
            RenderError::Template(TemplateError::NotFound { .. }) => {
                ApiError::new("template_not_found", err.to_string())
            }
            RenderError::Template(TemplateError::Compile(_)) => {
                ApiError::new("template_compile_error", err.to_string())
            }
            RenderError::PoolEmpty { .. } => ApiError::new("pool_empty", err.to_string()),
            RenderError::ContentExhausted { .. } => {
                ApiError::new("content_exhausted", err.to_string())
            }
            RenderError::UpstreamQuery(_) => ApiError::new("upstream_query_failed", err.to_string()),
            RenderError::Gzip(_) => ApiError::new("gzip_failure", err.to_string()),
        }
    }
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache_entries: usize,
    pub cache_bytes: u64,
    pub spider: StatsSnapshot,
}

/// Response body for admin actions that only need to confirm they ran.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub ok: bool,
    pub detail: String,
}

impl AckResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }
}
