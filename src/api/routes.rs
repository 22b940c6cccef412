//! Router construction.
//!
//! One public data route (`/page`) gated by spider classification, a
//! health check, and a small admin surface for cache/pool control. No
//! versioning scheme: this is a single internal service, not a public
//! API product.

use std::sync::Arc;

use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

use super::handlers::{
    clear_cache, clear_cache_for_domain, health, pause_pools, render_page, resize_pools,
    resume_pools, warmup_pools,
};
use super::middleware::request_id_middleware;

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    let admin = Router::new()
        .route("/cache/clear", post(clear_cache))
        .route("/cache/clear/:domain", post(clear_cache_for_domain))
        .route("/pool/pause", post(pause_pools))
        .route("/pool/resume", post(resume_pools))
        .route("/pool/resize", post(resize_pools))
        .route("/pool/warmup", post(warmup_pools));

    Router::new()
        .route("/page", get(render_page))
        .route("/health", get(health))
        .nest("/admin", admin)
        .layer(from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(ctx)
}
