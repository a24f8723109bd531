//! `POST /`: create a share from a multipart form.

use crate::auth::Identity;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sharebin_core::{AppError, PlanTier, QuotaKind, ShareKind};
use sharebin_services::{Requester, UploadContent, UploadRequest};
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

const EXACTLY_ONE: &str = "You must provide exactly one of: file, url, or text";
const TEXT_PREVIEW_CHARS: usize = 100;

/// Whitespace allowance on top of the tier text limit; the exact check runs
/// on the trimmed text after reading.
const TEXT_TRIM_SLACK_BYTES: u64 = 4 * 1024;
const MAX_URL_FIELD_BYTES: u64 = 8 * 1024;
/// `custom_code` and `expiry`.
const MAX_SMALL_FIELD_BYTES: u64 = 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub detail: &'static str,
    pub data: UploadData,
}

#[derive(Debug, Serialize)]
pub struct UploadData {
    pub short_code: String,
    pub url: String,
    pub expires_at: DateTime<Utc>,
    pub expiry_hours: f64,
    #[serde(flatten)]
    pub content: ContentPreview,
}

/// Kind-specific key of the response data.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentPreview {
    Filename(String),
    Text(String),
    Redirect(String),
}

/// Form fields after reading the body.
#[derive(Default)]
struct UploadForm {
    content: Option<UploadContent>,
    content_fields: usize,
    custom_code: Option<String>,
    expiry_hours: Option<f64>,
}

#[tracing::instrument(skip_all, fields(operation = "create_share"))]
pub async fn create_share(
    State(state): State<Arc<AppState>>,
    Identity(requester): Identity,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, HttpAppError> {
    let form = read_form(&state, requester, multipart?).await?;

    if form.content_fields != 1 {
        return Err(AppError::InvalidInput(EXACTLY_ONE.to_string()).into());
    }
    let content = form
        .content
        .ok_or_else(|| AppError::InvalidInput(EXACTLY_ONE.to_string()))?;

    let mut request = UploadRequest::new(content, requester);
    request.custom_code = form.custom_code;
    request.expiry_hours = form.expiry_hours;

    let outcome = state.shares.upload(request).await?;
    let item = outcome.item;

    let (detail, content) = match item.kind {
        ShareKind::File => ("File uploaded successfully!", ContentPreview::Filename(item.content)),
        ShareKind::Text => ("Text uploaded successfully!", ContentPreview::Text(preview(&item.content))),
        ShareKind::Url => ("URL uploaded successfully!", ContentPreview::Redirect(item.content)),
    };

    let response = UploadResponse {
        detail,
        data: UploadData {
            url: state.config.share_url(&item.short_code),
            short_code: item.short_code,
            expires_at: item.expires_at,
            expiry_hours: outcome.ttl_secs as f64 / 3600.0,
            content,
        },
    };

    Ok((StatusCode::CREATED, Json(response)))
}

async fn read_form(
    state: &AppState,
    requester: Requester,
    mut multipart: Multipart,
) -> Result<UploadForm, HttpAppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "text" | "url" => {
                form.content_fields += 1;
                if form.content_fields > 1 {
                    return Err(AppError::InvalidInput(EXACTLY_ONE.to_string()).into());
                }
                form.content = Some(match name.as_str() {
                    "file" => {
                        let limit = state
                            .shares
                            .quotas()
                            .size_limit(QuotaKind::File, requester.tier);
                        spool_file(field, limit, requester.tier).await?
                    }
                    "text" => {
                        let limit = state
                            .shares
                            .quotas()
                            .size_limit(QuotaKind::Text, requester.tier);
                        let tier = requester.tier;
                        let cap = limit.saturating_add(TEXT_TRIM_SLACK_BYTES);
                        let text = read_bounded(field, cap, || {
                            AppError::PayloadTooLarge(format!(
                                "Text too large. Maximum size for {} users is {} bytes",
                                tier, limit
                            ))
                        })
                        .await?;
                        UploadContent::Text(text)
                    }
                    _ => {
                        let url = read_bounded(field, MAX_URL_FIELD_BYTES, || {
                            AppError::InvalidInput(format!(
                                "URL must be at most {} bytes",
                                MAX_URL_FIELD_BYTES
                            ))
                        })
                        .await?;
                        UploadContent::Url(url)
                    }
                });
            }
            "custom_code" => {
                let code = read_bounded(field, MAX_SMALL_FIELD_BYTES, || {
                    AppError::InvalidInput("Custom code is too long".to_string())
                })
                .await?;
                form.custom_code = Some(code);
            }
            "expiry" => {
                let raw = read_bounded(field, MAX_SMALL_FIELD_BYTES, || {
                    AppError::InvalidInput("Expiry must be a number of hours".to_string())
                })
                .await?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    let hours = raw.parse::<f64>().map_err(|_| {
                        AppError::InvalidInput("Expiry must be a number of hours".to_string())
                    })?;
                    form.expiry_hours = Some(hours);
                }
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown form field");
            }
        }
    }

    Ok(form)
}

/// Read a text part chunk by chunk, failing with `overflow` as soon as more
/// than `limit` bytes have arrived.
async fn read_bounded(
    mut field: Field<'_>,
    limit: u64,
    overflow: impl FnOnce() -> AppError,
) -> Result<String, HttpAppError> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(overflow().into());
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf)
        .map_err(|_| AppError::InvalidInput("Form fields must be valid UTF-8".to_string()).into())
}

/// Copy the file part to an anonymous temp file, stopping once it exceeds
/// `limit`. The byte count becomes the declared size.
async fn spool_file(
    mut field: Field<'_>,
    limit: u64,
    tier: PlanTier,
) -> Result<UploadContent, HttpAppError> {
    let filename = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| AppError::InvalidInput("File name is unknown".to_string()))?;

    let mut file = tokio::fs::File::from_std(tempfile::tempfile().map_err(AppError::from)?);
    let mut size: u64 = 0;

    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;
        if size > limit {
            return Err(AppError::PayloadTooLarge(format!(
                "File too large. Maximum size for {} users is {} bytes",
                tier, limit
            ))
            .into());
        }
        file.write_all(&chunk).await.map_err(AppError::from)?;
    }

    file.flush().await.map_err(AppError::from)?;
    file.seek(SeekFrom::Start(0)).await.map_err(AppError::from)?;
    tracing::debug!(filename = %filename, size, "Spooled upload");

    Ok(UploadContent::File {
        reader: Box::pin(file),
        filename,
        size: Some(size),
    })
}

fn preview(text: &str) -> String {
    if text.chars().count() > TEXT_PREVIEW_CHARS {
        let head: String = text.chars().take(TEXT_PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_text() {
        let long = "é".repeat(150);
        let short = preview(&long);
        assert_eq!(short.chars().count(), TEXT_PREVIEW_CHARS + 3);
        assert!(short.ends_with("..."));
        assert_eq!(preview("hello"), "hello");
        assert_eq!(preview(&"a".repeat(100)), "a".repeat(100));
    }
}
