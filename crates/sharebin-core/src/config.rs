//! Configuration module
//!
//! `Config` is built once at process start and handed to each component.
//! Nothing reads the environment after that.

use std::env;
use std::fmt;

use crate::quota::{
    QuotaTable, TierLimits, ANON_EXPIRY_LIMIT, ANON_FILE_SIZE_LIMIT, ANON_TEXT_SIZE_LIMIT,
    FREE_EXPIRY_LIMIT, FREE_FILE_SIZE_LIMIT, FREE_TEXT_SIZE_LIMIT, PAID_EXPIRY_LIMIT,
    PAID_FILE_SIZE_LIMIT, PAID_TEXT_SIZE_LIMIT,
};

const SERVER_PORT: u16 = 8000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const CLEANUP_INTERVAL_SECS: u64 = 60;
const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
const DEFAULT_DOMAIN: &str = "https://shareb.in";
const DEFAULT_STORAGE_PATH: &str = "./data";
const TRUSTED_PROXY_COUNT: usize = 1;
const UPLOAD_RATE_LIMIT: RateLimit = RateLimit::new(10, 60);
const FETCH_RATE_LIMIT: RateLimit = RateLimit::new(60, 3600);

pub const MEMORY_DATABASE_URL: &str = "memory://";

/// Settings shared by every binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub environment: String,
}

/// Requests allowed per client within a fixed window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    pub requests: u32,
    pub window_secs: u64,
}

impl RateLimit {
    pub const fn new(requests: u32, window_secs: u64) -> Self {
        Self {
            requests,
            window_secs,
        }
    }

    /// Parse `<count>/<period>` such as `10/minute` or `60/hour`. The period
    /// may carry a multiplier (`100/5 minutes`).
    pub fn parse(value: &str) -> Option<Self> {
        let (count, period) = value.trim().split_once('/')?;
        let requests: u32 = count.trim().parse().ok()?;

        let period = period.trim().to_lowercase();
        let (multiplier, unit) = match period.split_once(char::is_whitespace) {
            Some((n, unit)) => (n.trim().parse::<u64>().ok()?, unit.trim().to_string()),
            None => (1, period),
        };
        let unit_secs = match unit.trim_end_matches('s') {
            "second" | "sec" => 1,
            "minute" | "min" => 60,
            "hour" => 3600,
            "day" => 86_400,
            _ => return None,
        };

        let window_secs = multiplier.checked_mul(unit_secs)?;
        (requests > 0 && window_secs > 0).then_some(Self::new(requests, window_secs))
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n, unit) = match self.window_secs {
            s if s % 86_400 == 0 => (s / 86_400, "day"),
            s if s % 3600 == 0 => (s / 3600, "hour"),
            s if s % 60 == 0 => (s / 60, "minute"),
            s => (s, "second"),
        };
        write!(f, "{} per {} {}", self.requests, n, unit)
    }
}

/// Per-client request limits on the share routes.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// `POST /`
    pub upload: RateLimit,
    /// `GET /{short_code}`
    pub fetch: RateLimit,
    /// Proxies in front of the server whose `X-Forwarded-For` entries are trusted.
    pub trusted_proxy_count: usize,
}

fn parse_rate_limit(
    value: Option<String>,
    key: &str,
    default: RateLimit,
) -> Result<RateLimit, anyhow::Error> {
    match value {
        Some(raw) => RateLimit::parse(&raw).ok_or_else(|| {
            anyhow::anyhow!("{} must look like '10/minute', got '{}'", key, raw)
        }),
        None => Ok(default),
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub database_url: String,
    /// Public origin used to build share links
    pub domain: String,
    pub storage_path: String,
    pub quotas: QuotaTable,
    pub cleanup_interval_secs: u64,
    /// Treat expired-but-unreaped records as missing on fetch
    pub strict_read_expiry: bool,
    pub http_concurrency_limit: usize,
    pub rate_limits: RateLimitConfig,
}

fn parse_or<T: std::str::FromStr + Copy>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.map(|v| v.trim().to_lowercase()).as_deref() {
        Some("1") | Some("true") | Some("yes") | Some("on") => true,
        Some("0") | Some("false") | Some("no") | Some("off") => false,
        _ => default,
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: match lookup("PORT") {
                Some(port) => port
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
                None => SERVER_PORT,
            },
            cors_origins,
            db_max_connections: parse_or(lookup("DB_MAX_CONNECTIONS"), MAX_CONNECTIONS),
            db_timeout_seconds: parse_or(lookup("DB_TIMEOUT_SECONDS"), CONNECTION_TIMEOUT_SECS),
            jwt_secret: lookup("JWT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            environment,
        };

        let quotas = QuotaTable {
            anonymous: TierLimits {
                file_size_bytes: parse_or(lookup("ANON_FILE_SIZE_LIMIT"), ANON_FILE_SIZE_LIMIT),
                text_size_bytes: parse_or(lookup("ANON_TEXT_SIZE_LIMIT"), ANON_TEXT_SIZE_LIMIT),
                max_expiry_secs: parse_or(lookup("ANON_EXPIRY_LIMIT"), ANON_EXPIRY_LIMIT),
            },
            free: TierLimits {
                file_size_bytes: parse_or(lookup("FREE_FILE_SIZE_LIMIT"), FREE_FILE_SIZE_LIMIT),
                text_size_bytes: parse_or(lookup("FREE_TEXT_SIZE_LIMIT"), FREE_TEXT_SIZE_LIMIT),
                max_expiry_secs: parse_or(lookup("FREE_EXPIRY_LIMIT"), FREE_EXPIRY_LIMIT),
            },
            paid: TierLimits {
                file_size_bytes: parse_or(lookup("PAID_FILE_SIZE_LIMIT"), PAID_FILE_SIZE_LIMIT),
                text_size_bytes: parse_or(lookup("PAID_TEXT_SIZE_LIMIT"), PAID_TEXT_SIZE_LIMIT),
                max_expiry_secs: parse_or(lookup("PAID_EXPIRY_LIMIT"), PAID_EXPIRY_LIMIT),
            },
        };

        let rate_limits = RateLimitConfig {
            enabled: parse_bool(lookup("RATE_LIMIT_ENABLED"), true),
            upload: parse_rate_limit(lookup("UPLOAD_RATE_LIMIT"), "UPLOAD_RATE_LIMIT", UPLOAD_RATE_LIMIT)?,
            fetch: parse_rate_limit(lookup("FETCH_RATE_LIMIT"), "FETCH_RATE_LIMIT", FETCH_RATE_LIMIT)?,
            trusted_proxy_count: parse_or(lookup("TRUSTED_PROXY_COUNT"), TRUSTED_PROXY_COUNT),
        };

        Ok(Config {
            base,
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            domain: lookup("DOMAIN")
                .map(|d| d.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            storage_path: lookup("STORAGE_PATH").unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string()),
            quotas,
            cleanup_interval_secs: parse_or(lookup("CLEANUP_INTERVAL_SECS"), CLEANUP_INTERVAL_SECS),
            strict_read_expiry: parse_bool(lookup("STRICT_READ_EXPIRY"), false),
            http_concurrency_limit: parse_or(lookup("HTTP_CONCURRENCY_LIMIT"), HTTP_CONCURRENCY_LIMIT),
            rate_limits,
        })
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !(self.database_url.starts_with("postgres://")
            || self.database_url.starts_with("postgresql://")
            || self.uses_memory_store())
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a PostgreSQL connection string or {}",
                MEMORY_DATABASE_URL
            ));
        }

        if self.is_production() && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.cleanup_interval_secs == 0 {
            return Err(anyhow::anyhow!("CLEANUP_INTERVAL_SECS must be greater than 0"));
        }

        self.quotas.validate()
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn jwt_secret(&self) -> &str {
        &self.base.jwt_secret
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.base.cors_origins
    }

    pub fn db_max_connections(&self) -> u32 {
        self.base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.base.db_timeout_seconds
    }

    pub fn environment(&self) -> &str {
        &self.base.environment
    }

    /// Absolute link for a short code.
    pub fn share_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.domain, short_code)
    }
}
