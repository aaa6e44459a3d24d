use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::ObjectStorage;
use crate::core::error::AppError;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Process-local object store. Signed URLs use a `memory://` scheme.
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn signed_url(&self, key: &str) -> Result<String, AppError> {
        if !self.objects.read().await.contains_key(key) {
            return Err(AppError::NotFound(format!("Object '{}' not found", key)));
        }
        Ok(format!("memory://{}", urlencoding::encode(key)))
    }

    async fn ping(&self) -> Result<Duration, AppError> {
        let started = Instant::now();
        let _objects = self.objects.read().await;
        Ok(started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_then_sign() {
        let storage = MemoryStorage::new();
        assert!(storage.signed_url("evidence/a.png").await.is_err());

        storage
            .upload("evidence/a.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        let url = storage.signed_url("evidence/a.png").await.unwrap();
        assert_eq!(url, "memory://evidence%2Fa.png");
        assert_eq!(storage.get("evidence/a.png").await.unwrap().data, vec![1, 2, 3]);
    }
}
