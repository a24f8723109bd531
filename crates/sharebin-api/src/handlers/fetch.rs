//! `GET /{short_code}`: serve whatever a short code points at.

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use sharebin_core::AppError;
use sharebin_services::ShareDescriptor;
use std::sync::Arc;

#[tracing::instrument(skip(state), fields(operation = "fetch_share"))]
pub async fn fetch_share(
    State(state): State<Arc<AppState>>,
    Path(short_code): Path<String>,
) -> Result<Response, HttpAppError> {
    let response = match state.shares.resolve(&short_code).await? {
        ShareDescriptor::File {
            name,
            mime,
            disposition,
            ..
        } => {
            let (stream, length) = state.shares.open_file(&name).await?;
            let body_stream = stream.map(|result| {
                result.map_err(|e| std::io::Error::other(format!("Storage stream error: {}", e)))
            });

            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, mime.as_str())
                .header(header::CONTENT_LENGTH, length)
                .header(
                    header::CONTENT_DISPOSITION,
                    format!("{}; filename=\"{}\"", disposition.as_str(), name),
                )
                .body(Body::from_stream(body_stream))
        }
        ShareDescriptor::Text(text) => {
            return Ok((
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                text,
            )
                .into_response());
        }
        ShareDescriptor::Redirect(target) => Response::builder()
            .status(StatusCode::FOUND)
            .header(header::LOCATION, target.as_str())
            .body(Body::empty()),
    };

    response.map_err(|e| {
        tracing::error!(error = %e, "Failed to build response");
        HttpAppError::from(AppError::Internal(e.to_string()))
    })
}
