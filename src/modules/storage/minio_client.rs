//! MinIO/S3-compatible storage client
//!
//! Uses rust-s3 with path-style addressing. Evidence is private: objects are
//! only reachable through presigned GET URLs.

use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::ObjectStorage;
use crate::core::config::MinIOConfig;
use crate::core::error::AppError;

/// Key probed by `ping`; it does not need to exist.
const PING_KEY: &str = ".chakshu-health";

pub struct MinIOClient {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    presigned_url_expiry_secs: u32,
    endpoint: String,
}

impl MinIOClient {
    /// Create a client and make sure the bucket exists.
    pub async fn new(config: MinIOConfig) -> Result<Self, AppError> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create MinIO credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Internal(format!("Failed to create MinIO bucket: {}", e)))?;

        // MinIO wants http://endpoint/bucket rather than http://bucket.endpoint
        bucket.set_path_style();

        let client = Self {
            bucket,
            region,
            credentials,
            presigned_url_expiry_secs: config.presigned_url_expiry_secs,
            endpoint: config.endpoint,
        };

        client.ensure_bucket_exists().await;

        info!(
            "MinIO client initialized for endpoint: {}, bucket: {}",
            client.endpoint,
            client.bucket.name()
        );

        Ok(client)
    }

    /// Create the bucket; an "already exists" answer is success.
    async fn ensure_bucket_exists(&self) {
        let result = Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        match result {
            Ok(_) => info!("Bucket '{}' created successfully", self.bucket.name()),
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStorage for MinIOClient {
    fn name(&self) -> &'static str {
        "minio"
    }

    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        self.bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("Failed to upload file '{}': {}", key, e))
            })?;

        debug!("Uploaded '{}' to bucket '{}'", key, self.bucket.name());
        Ok(())
    }

    async fn signed_url(&self, key: &str) -> Result<String, AppError> {
        self.bucket
            .presign_get(key, self.presigned_url_expiry_secs, None)
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!(
                    "Failed to generate presigned URL for '{}': {}",
                    key, e
                ))
            })
    }

    async fn ping(&self) -> Result<Duration, AppError> {
        let started = Instant::now();
        match self.bucket.head_object(PING_KEY).await {
            Ok(_) => Ok(started.elapsed()),
            Err(e) => {
                let error_str = e.to_string();
                // A missing key still proves the service answered
                if error_str.contains("404") || error_str.contains("NoSuchKey") {
                    Ok(started.elapsed())
                } else {
                    Err(AppError::ExternalServiceError(format!(
                        "Storage health probe failed: {}",
                        e
                    )))
                }
            }
        }
    }
}
