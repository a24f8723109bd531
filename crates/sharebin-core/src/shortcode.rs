//! Short-code generation and custom-code sanitizing.
//!
//! Generated codes are drawn from a 62-symbol alphabet, so callers retry on
//! collision without backoff. Custom codes are sanitized then either accepted
//! or rejected; they never fall back to a generated code.

use rand::distr::Alphanumeric;
use rand::Rng;

use crate::error::AppError;

pub const SHORT_CODE_LENGTH: usize = 6;

/// Longest custom code accepted, in characters, after sanitizing.
pub const MAX_CUSTOM_CODE_LENGTH: usize = 64;

/// Route names that would be shadowed by a share with the same code.
pub const RESERVED_CODES: &[&str] = &[
    "admin",
    "success",
    "register",
    "login",
    "reset",
    "about",
    "terms",
    "health",
    "docs",
    "redoc",
    "openapi.json",
    "favicon.ico",
    "static",
    "auth",
];

/// Source of candidate short codes.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniform random alphanumeric codes of [`SHORT_CODE_LENGTH`] characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SHORT_CODE_LENGTH)
            .map(char::from)
            .collect()
    }
}

pub fn is_reserved(code: &str) -> bool {
    RESERVED_CODES.contains(&code)
}

/// Letters and digits from any script, plus `_` and `-`.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Normalize a user supplied code.
///
/// Lower-cases, drops one leading `/`, turns each run of non-word characters
/// into a single `-`, collapses repeated hyphens and trims hyphens at both ends.
/// Idempotent.
pub fn sanitize_custom_code(custom_code: &str) -> String {
    let lowered = custom_code.trim().to_lowercase();
    let stripped = lowered.strip_prefix('/').unwrap_or(&lowered);

    let mut out = String::with_capacity(stripped.len());
    for c in stripped.chars() {
        let c = if is_word_char(c) { c } else { '-' };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

/// Sanitize a custom code and reject it if nothing usable survives, it is longer
/// than [`MAX_CUSTOM_CODE_LENGTH`] or it names a reserved route. Availability
/// against the store is checked by the caller.
pub fn validate_custom_code(custom_code: &str) -> Result<String, AppError> {
    let code = sanitize_custom_code(custom_code);
    if code.is_empty() {
        return Err(AppError::InvalidInput(
            "Custom code must contain letters or digits".to_string(),
        ));
    }
    if code.chars().count() > MAX_CUSTOM_CODE_LENGTH {
        return Err(AppError::InvalidInput(format!(
            "Custom code must be at most {} characters",
            MAX_CUSTOM_CODE_LENGTH
        )));
    }
    if is_reserved(&code) {
        return Err(AppError::CodeInUse("Custom code already in use".to_string()));
    }
    Ok(code)
}
