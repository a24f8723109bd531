use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Kind of shared payload. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "share_kind", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    File,
    Text,
    Url,
}

impl FromStr for ShareKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(ShareKind::File),
            "text" => Ok(ShareKind::Text),
            "url" => Ok(ShareKind::Url),
            _ => Err(anyhow::anyhow!("Invalid share kind: {}", s)),
        }
    }
}

impl Display for ShareKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ShareKind::File => write!(f, "file"),
            ShareKind::Text => write!(f, "text"),
            ShareKind::Url => write!(f, "url"),
        }
    }
}

/// A persisted share record.
///
/// `content` is the stored filename for `File`, the sanitized text for `Text`
/// and the destination for `Url`. Records are never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ShareItem {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub short_code: String,
    pub kind: ShareKind,
    pub content: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ShareItem {
    /// Build a new record expiring `ttl_secs` after `now`.
    pub fn new(
        short_code: impl Into<String>,
        kind: ShareKind,
        content: impl Into<String>,
        ttl_secs: u64,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        let expires_at = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            id: Uuid::new_v4(),
            user_id,
            short_code: short_code.into(),
            kind,
            content: content.into(),
            expires_at,
            created_at: now,
        }
    }

    /// Logically dead once `now` has passed `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
