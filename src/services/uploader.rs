use base64::{engine::general_purpose, Engine as _};
use std::time::Duration;
use tracing::warn;

use crate::error::AppError;
use crate::services::s3::BlobStore;

const MAX_UPLOAD_ATTEMPTS: u32 = 3;

/// Incoming media payload. JSON callers send a base64 data-URI string;
/// multipart callers hand over raw bytes. Neither pre-decodes.
#[derive(Debug, Clone)]
pub enum MediaData {
    DataUri(String),
    Bytes(Vec<u8>),
}

impl MediaData {
    /// Decode into raw bytes plus the MIME type embedded in a data-URI
    /// header, if one was present.
    pub fn decode(self) -> Result<(Vec<u8>, Option<String>), AppError> {
        match self {
            MediaData::Bytes(bytes) => Ok((bytes, None)),
            MediaData::DataUri(raw) => {
                if let Some(rest) = raw.strip_prefix("data:") {
                    let (header, payload) = rest.split_once(',').ok_or_else(|| {
                        AppError::BadRequest("Malformed data URI: missing payload".to_string())
                    })?;
                    let mime = header
                        .split(';')
                        .next()
                        .filter(|m| !m.is_empty())
                        .map(|m| m.to_string());
                    let bytes = general_purpose::STANDARD.decode(payload.trim()).map_err(|e| {
                        AppError::BadRequest(format!("Invalid base64 payload: {}", e))
                    })?;
                    Ok((bytes, mime))
                } else {
                    // Bare base64 without a data-URI wrapper.
                    let bytes = general_purpose::STANDARD.decode(raw.trim()).map_err(|e| {
                        AppError::BadRequest(format!("Invalid base64 payload: {}", e))
                    })?;
                    Ok((bytes, None))
                }
            }
        }
    }
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Collision-resistant object key: `{prefix}{unix_millis}-{sanitized_name}`.
pub fn generate_object_key(prefix: &str, file_name: &str) -> String {
    format!(
        "{}{}-{}",
        prefix,
        chrono::Utc::now().timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

pub struct BlobUploader<'a> {
    store: &'a dyn BlobStore,
}

impl<'a> BlobUploader<'a> {
    pub fn new(store: &'a dyn BlobStore) -> Self {
        Self { store }
    }

    /// Up to 3 attempts with linearly increasing backoff; only the final
    /// attempt's error is surfaced.
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        let mut last_err = None;

        for attempt in 1..=MAX_UPLOAD_ATTEMPTS {
            match self
                .store
                .put_object(bucket, key, data.clone(), content_type)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        "Upload attempt {}/{} for {} failed: {}",
                        attempt, MAX_UPLOAD_ATTEMPTS, key, e
                    );
                    last_err = Some(e);
                    if attempt < MAX_UPLOAD_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(attempt as u64 * 1000)).await;
                    }
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| AppError::StorageError("Upload failed".to_string())))
    }
}
