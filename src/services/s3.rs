use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;
use tracing::error;

use crate::config::get_config;
use crate::error::AppError;

/// Seam over the blob storage service so the media service can be exercised
/// against an in-memory double. All paths are keys inside a bucket; the
/// bucket is multi-tenant by key prefix.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn default_bucket(&self) -> &str;

    /// Write an object. Never overwrites: an existing key is an error.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError>;

    async fn remove_objects(&self, bucket: &str, keys: &[String]) -> Result<(), AppError>;

    /// `Ok(false)` is a confirmed negative; transport or permission problems
    /// surface as `Err` so callers never treat them as absence.
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, AppError>;

    async fn get_presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, AppError>;
}

#[derive(Clone)]
pub struct S3Service {
    client: Client,
    pub bucket_name: String,
}

impl S3Service {
    pub async fn new() -> Self {
        let config = get_config();

        let region = aws_sdk_s3::config::Region::new(config.aws_region.clone());

        let mut s3_config_builder = match (&config.aws_access_key_id, &config.aws_secret_access_key)
        {
            (Some(key_id), Some(secret)) => {
                let credentials = aws_sdk_s3::config::Credentials::new(
                    key_id.clone(),
                    secret.clone(),
                    None,
                    None,
                    "manual_config",
                );
                aws_sdk_s3::config::Builder::new()
                    .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials)
            }
            // No explicit keys: fall back to the default provider chain
            // (instance profile, env, shared config file).
            _ => {
                let shared = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                aws_sdk_s3::config::Builder::from(&shared).region(region)
            }
        };

        if let Some(endpoint) = &config.s3_endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        Self {
            client,
            bucket_name: config.s3_bucket_name.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for S3Service {
    fn default_bucket(&self) -> &str {
        &self.bucket_name
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            // Key collisions must fail, not clobber.
            .if_none_match("*")
            .send()
            .await
            .map_err(|e| {
                error!("S3 Upload Error: {:?}", e);
                AppError::StorageError(format!("Failed to upload {}: {}", key, e))
            })?;

        Ok(())
    }

    async fn remove_objects(&self, bucket: &str, keys: &[String]) -> Result<(), AppError> {
        for key in keys {
            self.client
                .delete_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| {
                    error!("S3 Delete Error: {}", e);
                    AppError::StorageError(format!("Failed to delete {}: {}", key, e))
                })?;
        }

        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, AppError> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service_err)) if service_err.err().is_not_found() => {
                Ok(false)
            }
            Err(e) => Err(AppError::StorageError(format!(
                "Failed to probe {}: {}",
                key, e
            ))),
        }
    }

    async fn get_presigned_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, AppError> {
        let presigning_config = aws_sdk_s3::presigning::PresigningConfig::expires_in(expires_in)
            .map_err(|e| {
                error!("Presigning Config Error: {}", e);
                AppError::StorageError("Failed to configure presigner".to_string())
            })?;

        let presigned_req = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning_config)
            .await
            .map_err(|e| {
                error!("Presigning Error: {}", e);
                AppError::StorageError("Failed to generate presigned URL".to_string())
            })?;

        Ok(presigned_req.uri().to_string())
    }
}
