//! # Pagefabric - Dynamic SEO Page Rendering Core
//!
//! A spider-gated HTTP service that renders synthesized HTML pages from
//! keyword/image/title/paragraph corpora, backed by bounded object pools
//! and a multi-tier page cache.
//!
//! ## Architecture
//!
//! - `config`: process-wide configuration, loaded from the environment
//! - `context`: the `AppContext` singleton shared across handlers and
//!   background workers
//! - `spider`: User-Agent classification and optional reverse-DNS
//!   verification
//! - `site`: domain -> `Site` resolution and compiled template caching
//! - `pool`: reusable and one-shot object pools, refill/consumer workers
//! - `render`: the compiled-template walk that produces a page body
//! - `cache`: the bounded, single-flighted page cache and its evictor
//! - `store`: Postgres/Redis access behind the `DataStore` trait
//! - `api`: the HTTP surface
//! - `alerts`: de-duplicated operator alerting for degraded conditions

pub mod alerts;
pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod pool;
pub mod render;
pub mod site;
pub mod spider;
pub mod store;

/// Crate version, surfaced in the startup banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, surfaced in the startup banner.
pub const NAME: &str = env!("CARGO_PKG_NAME");
