//! `POST /api/files/upload/`: store an uploaded video and run detection on it.

use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::core::DetectionResult;
use crate::shared::constants;
use crate::utils::file_utils::sanitize_file_name;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_url: String,
    pub anomalies: DetectionResult,
}

/// Declared content type must be `video/*` or `image/*`.
pub fn validate_content_type(content_type: Option<&str>) -> ApiResult<()> {
    let content_type = content_type.unwrap_or("");
    if constants::ALLOWED_CONTENT_TYPES
        .iter()
        .any(|t| content_type.starts_with(t))
    {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "Only video or image files are allowed.".into(),
        ))
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue; // ignore unknown fields
        }

        if let Err(e) = validate_content_type(field.content_type()) {
            tracing::info!(content_type = ?field.content_type(), "upload rejected");
            return Err(e);
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        file = Some((filename, data));
    }

    let (filename, data) =
        file.ok_or_else(|| ApiError::Validation("No file was submitted.".into()))?;
    if data.is_empty() {
        return Err(ApiError::Validation("The submitted file is empty.".into()));
    }

    let (video_path, file_url) = store_upload(&state.config.upload_dir(), &filename, &data)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    tracing::info!(path = %video_path.display(), bytes = data.len(), "upload stored");

    let pipeline = state.pipeline.clone();
    let path = video_path.clone();
    let anomalies = tokio::task::spawn_blocking(move || pipeline.detect_anomalies(&path))
        .await
        .map_err(|e| ApiError::Internal(format!("detection task failed: {e}")))??;

    Ok((StatusCode::CREATED, Json(UploadResponse { file_url, anomalies })))
}

/// `{uuid v7}_{sanitized name}`; unique per call, ordered by arrival.
fn stored_file_name(original: &str) -> String {
    format!("{}_{}", uuid::Uuid::now_v7(), sanitize_file_name(original))
}

/// Write the upload under `upload_dir`, returning its path and public URL.
async fn store_upload(upload_dir: &Path, filename: &str, data: &[u8]) -> std::io::Result<(PathBuf, String)> {
    tokio::fs::create_dir_all(upload_dir).await?;

    let stored_name = stored_file_name(filename);
    let path = upload_dir.join(&stored_name);
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await?;
    file.write_all(data).await?;
    file.flush().await?;

    let file_url = format!("{}{}/{}", constants::MEDIA_URL, constants::UPLOAD_SUBDIR, stored_name);
    Ok((path, file_url))
}
