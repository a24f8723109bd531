use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Quota class of a requester.
///
/// Tier provenance is external (the auth collaborator), so parsing never fails:
/// anything that is not a known paying plan falls back to `Anonymous`, the most
/// restrictive tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Anonymous,
    Free,
    Paid,
}

impl PlanTier {
    pub const ALL: [PlanTier; 3] = [PlanTier::Anonymous, PlanTier::Free, PlanTier::Paid];

    pub fn from_plan(plan: Option<&str>) -> Self {
        match plan.map(|p| p.trim().to_lowercase()).as_deref() {
            Some("free") => PlanTier::Free,
            Some("paid") => PlanTier::Paid,
            _ => PlanTier::Anonymous,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Anonymous => "anonymous",
            PlanTier::Free => "free",
            PlanTier::Paid => "paid",
        }
    }
}

impl Display for PlanTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
