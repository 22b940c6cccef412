//! Request handlers.
//!
//! `render_page` is the hot path this whole crate exists to serve within
//! the latency budget; every other handler is an admin control surface
//! and is allowed to be as simple as it looks.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use std::io::Write;

use crate::cache::CacheKey;
use crate::context::AppContext;
use crate::error::RenderError;
use crate::render::{self, RenderContext};
use crate::spider::{Classification, SpiderKind};

use super::responses::{AckResponse, ApiError, HealthResponse};

/// `GET /page` query parameters, per spec §6: `ua`, `path`, and `domain`
/// are passed explicitly rather than read off headers, since this
/// service sits behind a collaborator that already resolved the real
/// client UA/Host for it.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub ua: String,
    pub path: String,
    pub domain: String,
}

pub async fn render_page(
    State(ctx): State<Arc<AppContext>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let classification = if ctx.config.spider.enabled {
        ctx.classifier
            .classify(&query.ua)
            .ok_or(RenderError::NotSpider)?
    } else {
        // Detection disabled: every request is treated as the default
        // engine so rendering still proceeds, per the operator's choice
        // to run this service without crawler gating (e.g. behind a
        // collaborator that already filtered traffic).
        Classification {
            kind: SpiderKind::Google,
            dns_verified: None,
        }
    };

    if ctx.config.spider.enabled && ctx.config.spider.dns_verify_enabled {
        if let Some(verifier) = &ctx.dns_verifier {
            let engine = ctx
                .config
                .spider
                .engines
                .iter()
                .find(|e| e.kind == classification.kind);
            if let Some(engine) = engine {
                let verified = verifier
                    .verify(addr.ip(), classification.kind, &engine.dns_suffixes)
                    .await;
                if !verified {
                    return Err(RenderError::NotSpider.into());
                }
            }
        }
    }

    let domain = query.domain;
    let path = query.path;

    let site = ctx
        .site_resolver
        .resolve(&domain)
        .await?
        .ok_or_else(|| RenderError::UnknownDomain(domain.clone()))?;

    if !site.active {
        return Err(RenderError::UnknownDomain(domain).into());
    }

    let cache_key = CacheKey::new(domain.clone(), classification.kind, path.clone());
    let gzip_enabled = ctx.config.cache.gzip_enabled;

    let ctx_for_render = Arc::clone(&ctx);
    let entry = ctx
        .page_cache
        .get_or_render(cache_key, || async move {
            let template = ctx_for_render
                .template_store
                .resolve(site.site_group_id, &site.template_name)
                .await?;
            let inputs = ctx_for_render.render_inputs_for(site.site_group_id);
            let render_ctx = RenderContext {
                domain: &domain,
                path: &path,
                spider_kind: classification.kind,
                inputs: &inputs,
            };
            let body = render::render(&template, &render_ctx)?;
            if gzip_enabled {
                let compressed = gzip(body).await?;
                Ok((compressed, true))
            } else {
                Ok((body, false))
            }
        })
        .await?;

    let mut response = Response::builder().status(StatusCode::OK);
    if entry.gzipped {
        response = response.header(axum::http::header::CONTENT_ENCODING, "gzip");
    }
    response = response.header(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8");
    Ok(response
        .body(axum::body::Body::from(entry.body.clone()))
        .expect("response builder invariants upheld"))
}

async fn gzip(body: Bytes) -> Result<Bytes, RenderError> {
    tokio::task::spawn_blocking(move || {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder
            .write_all(&body)
            .map_err(|e| RenderError::Gzip(e.to_string()))?;
        encoder
            .finish()
            .map(Bytes::from)
            .map_err(|e| RenderError::Gzip(e.to_string()))
    })
    .await
    .map_err(|e| RenderError::Gzip(e.to_string()))?
}

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cache_entries: ctx.page_cache.len(),
        cache_bytes: ctx.page_cache.current_size(),
        spider: ctx.spider_stats.snapshot(),
    })
}

pub async fn clear_cache(State(ctx): State<Arc<AppContext>>) -> Json<AckResponse> {
    ctx.page_cache.clear();
    Json(AckResponse::new("cache cleared"))
}

pub async fn clear_cache_for_domain(
    State(ctx): State<Arc<AppContext>>,
    Path(domain): Path<String>,
) -> Json<AckResponse> {
    ctx.page_cache.invalidate_domain(&domain);
    Json(AckResponse::new(format!("cache cleared for {domain}")))
}

/// Selects which site group's pools an admin pool action applies to; a
/// missing `group_id` means "every group currently materialized".
#[derive(Debug, Default, Deserialize)]
pub struct PoolScope {
    pub group_id: Option<i64>,
}

pub async fn pause_pools(
    State(ctx): State<Arc<AppContext>>,
    Json(scope): Json<PoolScope>,
) -> Json<AckResponse> {
    ctx.pause_pools(scope.group_id);
    Json(AckResponse::new("pools paused"))
}

pub async fn resume_pools(
    State(ctx): State<Arc<AppContext>>,
    Json(scope): Json<PoolScope>,
) -> Json<AckResponse> {
    ctx.resume_pools(scope.group_id);
    Json(AckResponse::new("pools resumed"))
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub group_id: i64,
    pub size: usize,
}

pub async fn resize_pools(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<ResizeRequest>,
) -> Json<AckResponse> {
    ctx.resize_pools(request.group_id, request.size);
    Json(AckResponse::new(format!(
        "group {} resized to {}",
        request.group_id, request.size
    )))
}

#[derive(Debug, Deserialize)]
pub struct WarmupRequest {
    pub group_id: i64,
}

/// Materializes (or confirms already-materialized) a site group's pools
/// and their background workers ahead of the first real request, so a
/// newly onboarded site doesn't pay the cold-start cost on its first
/// crawl hit.
pub async fn warmup_pools(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<WarmupRequest>,
) -> Json<AckResponse> {
    ctx.render_inputs_for(request.group_id);
    Json(AckResponse::new(format!(
        "group {} warmed up",
        request.group_id
    )))
}
