//! Promotion image uploads, stored under `{data_dir}/uploads/{user_id}/`.

use axum::{
  extract::{multipart::MultipartError, Multipart, State},
  http::StatusCode,
  Json,
};
use serde::Serialize;

use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::paths;
use crate::state::AppState;

pub const IMAGE_FIELD: &str = "image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
  Png,
  Jpeg,
  Gif,
  Webp,
}

impl ImageKind {
  pub fn extension(&self) -> &'static str {
    match self {
      Self::Png => "png",
      Self::Jpeg => "jpg",
      Self::Gif => "gif",
      Self::Webp => "webp",
    }
  }

  pub fn mime(&self) -> &'static str {
    match self {
      Self::Png => "image/png",
      Self::Jpeg => "image/jpeg",
      Self::Gif => "image/gif",
      Self::Webp => "image/webp",
    }
  }

  /// Whether a client-declared content type agrees with the sniffed kind
  fn matches_declared(&self, declared: &str) -> bool {
    let declared = declared.trim().to_ascii_lowercase();
    if !declared.starts_with("image/") {
      // application/octet-stream and friends carry no claim
      return true;
    }
    declared == self.mime() || (*self == Self::Jpeg && declared == "image/jpg")
  }
}

/// Detect the image format from magic bytes
pub fn sniff_image(data: &[u8]) -> Option<ImageKind> {
  if data.starts_with(b"\x89PNG\r\n\x1a\n") {
    Some(ImageKind::Png)
  } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
    Some(ImageKind::Jpeg)
  } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
    Some(ImageKind::Gif)
  } else if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP" {
    Some(ImageKind::Webp)
  } else {
    None
  }
}

#[derive(Debug, Serialize)]
pub struct UploadResult {
  pub url: String,
  pub size: usize,
  pub content_type: &'static str,
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> ApiError {
  if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
    ApiError::PayloadTooLarge(format!("image must be at most {} bytes", max_bytes))
  } else {
    ApiError::bad_request(format!("invalid multipart body: {}", e.body_text()))
  }
}

/// POST /api/uploads/image
pub async fn upload_image(
  State(state): State<AppState>,
  auth: AuthContext,
  mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResult>)> {
  let max_bytes = state.config.max_upload_bytes;

  while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, max_bytes))? {
    if field.name() != Some(IMAGE_FIELD) {
      continue;
    }
    let declared = field.content_type().map(str::to_string);
    let data = field.bytes().await.map_err(|e| multipart_error(e, max_bytes))?;

    if data.is_empty() {
      return Err(ApiError::bad_request("image is empty"));
    }
    if data.len() > max_bytes {
      return Err(ApiError::PayloadTooLarge(format!(
        "image must be at most {} bytes",
        max_bytes
      )));
    }
    let kind = sniff_image(&data)
      .ok_or_else(|| ApiError::bad_request("only PNG, JPEG, GIF and WebP images are accepted"))?;
    if let Some(declared) = declared.as_deref() {
      if !kind.matches_declared(declared) {
        return Err(ApiError::bad_request(format!(
          "declared content type {} does not match image data ({})",
          declared,
          kind.mime()
        )));
      }
    }

    let dir = paths::user_uploads_dir(&state.config.data_dir, auth.user_id());
    let file_name = format!("{}.{}", hex::encode(rand::random::<[u8; 12]>()), kind.extension());
    tokio::fs::create_dir_all(&dir)
      .await
      .map_err(|e| ApiError::Internal(format!("could not create upload dir: {}", e)))?;
    tokio::fs::write(dir.join(&file_name), &data)
      .await
      .map_err(|e| ApiError::Internal(format!("could not store upload: {}", e)))?;

    tracing::info!(user_id = auth.user_id(), file = %file_name, size = data.len(), "Image uploaded");
    return Ok((
      StatusCode::CREATED,
      Json(UploadResult {
        url: paths::upload_url(auth.user_id(), &file_name),
        size: data.len(),
        content_type: kind.mime(),
      }),
    ));
  }

  Err(ApiError::bad_request(format!("multipart field '{}' is required", IMAGE_FIELD)))
}
