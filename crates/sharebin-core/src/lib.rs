//! Sharebin Core Library
//!
//! Domain models, error types, configuration and the pure pieces of the share
//! lifecycle (quota resolution, short-code generation, input sanitizing) that are
//! shared by the storage, database, service and API crates.

pub mod config;
pub mod error;
pub mod models;
pub mod quota;
pub mod shortcode;
pub mod validation;

// Re-export commonly used types
pub use config::{BaseConfig, Config, RateLimit, RateLimitConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{PlanTier, ShareItem, ShareKind};
pub use quota::{QuotaKind, QuotaTable, TierLimits};
pub use shortcode::{CodeGenerator, RandomCodeGenerator, RESERVED_CODES, SHORT_CODE_LENGTH};
