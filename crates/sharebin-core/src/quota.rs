//! Quota resolution: (tier, kind) -> size limit and tier -> retention.
//!
//! Lookups are pure. Tier parsing never fails (see [`PlanTier::from_plan`]),
//! so every request resolves to some row of the table.

use crate::error::AppError;
use crate::models::PlanTier;

pub const ANON_FILE_SIZE_LIMIT: u64 = 52_428_800;
pub const FREE_FILE_SIZE_LIMIT: u64 = 262_144_000;
pub const PAID_FILE_SIZE_LIMIT: u64 = 5_368_709_120;

pub const ANON_TEXT_SIZE_LIMIT: u64 = 1_048_576;
pub const FREE_TEXT_SIZE_LIMIT: u64 = 5_242_880;
pub const PAID_TEXT_SIZE_LIMIT: u64 = 10_485_760;

pub const ANON_EXPIRY_LIMIT: u64 = 86_400;
pub const FREE_EXPIRY_LIMIT: u64 = 604_800;
pub const PAID_EXPIRY_LIMIT: u64 = 2_592_000;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Content kinds that carry a size quota. URLs are exempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    File,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierLimits {
    pub file_size_bytes: u64,
    pub text_size_bytes: u64,
    pub max_expiry_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaTable {
    pub anonymous: TierLimits,
    pub free: TierLimits,
    pub paid: TierLimits,
}

impl Default for QuotaTable {
    fn default() -> Self {
        Self {
            anonymous: TierLimits {
                file_size_bytes: ANON_FILE_SIZE_LIMIT,
                text_size_bytes: ANON_TEXT_SIZE_LIMIT,
                max_expiry_secs: ANON_EXPIRY_LIMIT,
            },
            free: TierLimits {
                file_size_bytes: FREE_FILE_SIZE_LIMIT,
                text_size_bytes: FREE_TEXT_SIZE_LIMIT,
                max_expiry_secs: FREE_EXPIRY_LIMIT,
            },
            paid: TierLimits {
                file_size_bytes: PAID_FILE_SIZE_LIMIT,
                text_size_bytes: PAID_TEXT_SIZE_LIMIT,
                max_expiry_secs: PAID_EXPIRY_LIMIT,
            },
        }
    }
}

impl QuotaTable {
    pub fn limits(&self, tier: PlanTier) -> &TierLimits {
        match tier {
            PlanTier::Anonymous => &self.anonymous,
            PlanTier::Free => &self.free,
            PlanTier::Paid => &self.paid,
        }
    }

    pub fn size_limit(&self, kind: QuotaKind, tier: PlanTier) -> u64 {
        let limits = self.limits(tier);
        match kind {
            QuotaKind::File => limits.file_size_bytes,
            QuotaKind::Text => limits.text_size_bytes,
        }
    }

    pub fn expiry_limit(&self, tier: PlanTier) -> u64 {
        self.limits(tier).max_expiry_secs
    }

    /// Resolve a requested expiry (hours) into a TTL in seconds.
    ///
    /// Absent means the tier maximum. Longer than the maximum is clamped, never
    /// rejected. Zero, negative and non-finite values are rejected.
    pub fn effective_ttl(&self, tier: PlanTier, requested_hours: Option<f64>) -> Result<u64, AppError> {
        let max = self.expiry_limit(tier);
        let Some(hours) = requested_hours else {
            return Ok(max);
        };
        if !hours.is_finite() || hours <= 0.0 {
            return Err(AppError::InvalidInput(
                "Expiry must be a positive number of hours".to_string(),
            ));
        }
        let secs = (hours * SECONDS_PER_HOUR).ceil();
        if secs >= max as f64 {
            Ok(max)
        } else {
            Ok(secs as u64)
        }
    }

    /// Check that every limit is non-decreasing anonymous -> free -> paid.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let pairs = [
            ("anonymous", &self.anonymous, "free", &self.free),
            ("free", &self.free, "paid", &self.paid),
        ];
        for (lower_name, lower, upper_name, upper) in pairs {
            if lower.file_size_bytes > upper.file_size_bytes
                || lower.text_size_bytes > upper.text_size_bytes
                || lower.max_expiry_secs > upper.max_expiry_secs
            {
                return Err(anyhow::anyhow!(
                    "Quota limits for tier '{}' must not exceed those of tier '{}'",
                    lower_name,
                    upper_name
                ));
            }
        }
        Ok(())
    }
}
