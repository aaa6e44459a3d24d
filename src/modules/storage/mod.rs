//! Object storage for report evidence.
//!
//! `MinIOClient` talks to MinIO or any S3-compatible service; `MemoryStorage`
//! keeps objects in process for tests and demo runs.

mod memory;
mod minio_client;

use async_trait::async_trait;
use std::time::Duration;

use crate::core::error::AppError;

pub use memory::MemoryStorage;
pub use minio_client::MinIOClient;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Store `data` under `key`, replacing any existing object.
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError>;

    /// Time-limited download URL for `key`.
    async fn signed_url(&self, key: &str) -> Result<String, AppError>;

    /// Round-trip latency of a metadata request.
    async fn ping(&self) -> Result<Duration, AppError>;
}
