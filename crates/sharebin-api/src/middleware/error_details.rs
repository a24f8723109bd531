//! Strip error detail from responses when the deployment asks for it.

use crate::error::ErrorResponse;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

/// Re-render error bodies without `details` and `error_type` when
/// `AppState::hide_error_details` is set. Other responses pass through.
pub async fn redact_error_details(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !state.hide_error_details {
        return response;
    }

    let redacted = response
        .extensions()
        .get::<ErrorResponse>()
        .filter(|body| body.details.is_some() || body.error_type.is_some())
        .map(ErrorResponse::redacted);
    let Some(redacted) = redacted else {
        return response;
    };

    let (mut parts, _) = response.into_parts();
    let rendered = Json(redacted.clone()).into_response();
    let (rendered_parts, body) = rendered.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    if let Some(content_type) = rendered_parts.headers.get(header::CONTENT_TYPE) {
        parts.headers.insert(header::CONTENT_TYPE, content_type.clone());
    }
    parts.extensions.insert(redacted);
    Response::from_parts(parts, body)
}
