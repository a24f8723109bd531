//! Per-client fixed-window rate limiting.
//!
//! Each limited route gets its own [`HttpRateLimiter`]. Buckets are keyed by
//! client IP and spread over shards so concurrent requests from different
//! clients rarely contend on the same lock.

use crate::error::HttpAppError;
use crate::middleware::client_ip::client_ip;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sharebin_core::{AppError, RateLimit};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_SHARDS: usize = 16;
const MAX_BUCKETS_PER_SHARD: usize = 10_000;

#[derive(Debug, Clone)]
struct Bucket {
    count: u32,
    reset_at: Instant,
}

impl Bucket {
    fn new(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now + window,
        }
    }

    /// Count one request. Returns the remaining budget, or `None` when the
    /// window is already spent.
    fn hit(&mut self, now: Instant, limit: u32, window: Duration) -> Option<u32> {
        if now >= self.reset_at {
            self.count = 0;
            self.reset_at = now + window;
        }
        if self.count < limit {
            self.count += 1;
            Some(limit - self.count)
        } else {
            None
        }
    }
}

type Shard = Mutex<HashMap<String, Bucket>>;

pub struct HttpRateLimiter {
    name: &'static str,
    limit: RateLimit,
    trusted_proxies: usize,
    shards: Vec<Shard>,
}

impl HttpRateLimiter {
    pub fn new(name: &'static str, limit: RateLimit, trusted_proxies: usize) -> Self {
        Self::with_shards(name, limit, trusted_proxies, DEFAULT_SHARDS)
    }

    pub fn with_shards(
        name: &'static str,
        limit: RateLimit,
        trusted_proxies: usize,
        shard_count: usize,
    ) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            name,
            limit,
            trusted_proxies,
            shards,
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.limit.window_secs)
    }

    fn shard(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Count a request for `key`. `Ok` carries the remaining budget, `Err`
    /// the time until the window resets.
    pub async fn check(&self, key: &str) -> Result<u32, Duration> {
        let now = Instant::now();
        let window = self.window();
        let mut buckets = self.shard(key).lock().await;

        if buckets.len() >= MAX_BUCKETS_PER_SHARD && !buckets.contains_key(key) {
            buckets.retain(|_, bucket| bucket.reset_at > now);
            if buckets.len() >= MAX_BUCKETS_PER_SHARD {
                let oldest = buckets
                    .iter()
                    .min_by_key(|(_, bucket)| bucket.reset_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    buckets.remove(&oldest);
                    tracing::debug!(limiter = self.name, evicted = %oldest, "Rate limit shard full");
                }
            }
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(now, window));
        bucket
            .hit(now, self.limit.requests, window)
            .ok_or_else(|| bucket.reset_at.saturating_duration_since(now))
    }

    /// Drop buckets whose window has ended.
    pub async fn cleanup_expired_buckets(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut buckets = shard.lock().await;
            let before = buckets.len();
            buckets.retain(|_, bucket| bucket.reset_at > now);
            removed += before - buckets.len();
        }
        if removed > 0 {
            tracing::debug!(limiter = self.name, buckets_removed = removed, "Cleaned up rate limit buckets");
        }
        removed
    }

    #[cfg(test)]
    async fn bucket_count(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.lock().await.len();
        }
        total
    }
}

fn insert_header(response: &mut Response, name: &'static str, value: impl ToString) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        response.headers_mut().insert(name, value);
    }
}

/// Reject with `429 Too Many Requests` once the client has spent its budget.
///
/// Sets `X-RateLimit-Limit` and `X-RateLimit-Remaining` on every response
/// and `Retry-After` on rejections.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<HttpRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let key = client_ip(request.headers(), peer, limiter.trusted_proxies)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let limit = limiter.limit();

    match limiter.check(&key).await {
        Ok(remaining) => {
            let mut response = next.run(request).await;
            insert_header(&mut response, "X-RateLimit-Limit", limit.requests);
            insert_header(&mut response, "X-RateLimit-Remaining", remaining);
            response
        }
        Err(reset_in) => {
            tracing::warn!(
                limiter = limiter.name,
                client = %key,
                path = %request.uri().path(),
                limit = %limit,
                "Rate limit exceeded"
            );
            let mut response = HttpAppError(AppError::RateLimited(format!(
                "Rate limit exceeded: {}",
                limit
            )))
            .into_response();
            insert_header(&mut response, "X-RateLimit-Limit", limit.requests);
            insert_header(&mut response, "X-RateLimit-Remaining", 0);
            insert_header(&mut response, "Retry-After", reset_in.as_secs().max(1));
            response
        }
    }
}
