//! HTTP surface: a single spider-gated rendering endpoint, a health
//! check, and a small admin control surface for the page cache and
//! object pools.

pub mod handlers;
pub mod middleware;
pub mod responses;
pub mod routes;

pub use responses::{ApiError, HealthResponse};
pub use routes::build_router;
