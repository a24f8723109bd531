//! Bearer-token identity
//!
//! Tokens are issued by the account service and signed with the shared
//! `JWT_SECRET` (HS256). A request without an `Authorization` header is
//! anonymous; a header that does not verify is rejected with 401.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sharebin_core::{AppError, PlanTier};
use sharebin_services::Requester;
use std::sync::Arc;
use uuid::Uuid;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ShareClaims {
    pub sub: Uuid, // user_id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    pub exp: i64,
}

/// Verify a bearer token and map it to the uploading identity.
pub fn verify_token(token: &str, secret: &str) -> Result<Requester, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<ShareClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired".to_string())
        }
        _ => AppError::Unauthorized("Invalid token".to_string()),
    })?;

    let claims = data.claims;
    Ok(Requester::user(
        claims.sub,
        PlanTier::from_plan(claims.plan.as_deref()),
    ))
}

/// The caller's identity, anonymous when no token was sent.
#[derive(Debug, Clone, Copy)]
pub struct Identity(pub Requester);

impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = HttpAppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Identity(Requester::anonymous()));
        };

        let token = value
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::Unauthorized("Invalid authorization header format".to_string())
            })?;

        let requester = verify_token(token, state.config.jwt_secret())?;
        tracing::debug!(user_id = ?requester.user_id, tier = %requester.tier, "Authenticated request");
        Ok(Identity(requester))
    }
}
