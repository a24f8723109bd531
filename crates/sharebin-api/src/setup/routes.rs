//! Route configuration and setup

use crate::handlers;
use crate::middleware::{rate_limit_middleware, redact_error_details, HttpRateLimiter};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post, MethodRouter},
    Router,
};
use sharebin_core::{Config, RateLimit};
use std::sync::Arc;
use std::time::Duration;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and the small form fields.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;

    let http_concurrency_limit = config.http_concurrency_limit.max(1);
    tracing::info!(
        http_concurrency_limit = http_concurrency_limit,
        "HTTP concurrency limit layer enabled"
    );

    // Per-tier limits are enforced while reading the body; this only caps the
    // largest request any tier may send.
    let paid = config.quotas.paid;
    let body_limit = paid
        .file_size_bytes
        .max(paid.text_size_bytes)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    let upload = rate_limited(
        post(handlers::upload::create_share),
        config,
        "upload",
        config.rate_limits.upload,
    );
    let fetch = rate_limited(
        get(handlers::fetch::fetch_share),
        config,
        "fetch",
        config.rate_limits.fetch,
    );

    let app = Router::new()
        .route("/", upload)
        .route("/health", get(handlers::health::health_check))
        .route("/{short_code}", fetch)
        .layer(from_fn_with_state(state.clone(), redact_error_details))
        .layer(DefaultBodyLimit::disable())
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::debug!(body_limit, "Routes configured");

    Ok(app)
}

/// Wrap `route` in a per-client limiter unless rate limiting is switched off.
fn rate_limited(
    route: MethodRouter<Arc<AppState>>,
    config: &Config,
    name: &'static str,
    limit: RateLimit,
) -> MethodRouter<Arc<AppState>> {
    if !config.rate_limits.enabled {
        return route;
    }
    let limiter = setup_rate_limiter(name, limit, config.rate_limits.trusted_proxy_count);
    route.layer(from_fn_with_state(limiter, rate_limit_middleware))
}

/// Build a limiter and start its periodic bucket cleanup.
fn setup_rate_limiter(
    name: &'static str,
    limit: RateLimit,
    trusted_proxy_count: usize,
) -> Arc<HttpRateLimiter> {
    let limiter = Arc::new(HttpRateLimiter::new(name, limit, trusted_proxy_count));

    // Holds a weak handle so the task ends once the router is dropped.
    let weak = Arc::downgrade(&limiter);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_CLEANUP_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            match weak.upgrade() {
                Some(limiter) => {
                    limiter.cleanup_expired_buckets().await;
                }
                None => break,
            }
        }
    });

    tracing::info!(limiter = name, limit = %limit, trusted_proxy_count, "Rate limiting enabled");
    limiter
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    };
    Ok(cors)
}
