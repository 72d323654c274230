use crate::utils::error::{ApiError, Dependency};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub uploader_id: String,
    pub original_filename: String,
    pub content_type: String,
    pub sha256: String,
}

/// C4. Durable storage of raw ingested bytes keyed by content-derived ID.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        doc_id: &str,
        bytes: &[u8],
        metadata: ObjectMetadata,
    ) -> Result<String, ApiError>;

    async fn get(&self, object_ref: &str) -> Result<(Vec<u8>, ObjectMetadata), ApiError>;
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Filesystem-backed object store, sharded by ingest date, grounded in the
/// teacher's physical-file-write pattern for uploaded documents but keyed by
/// content hash so `put` is idempotent on doc-id rather than a fresh UUID
/// per call.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, doc_id: &str) -> PathBuf {
        let today = Utc::now();
        self.root
            .join(format!("{:04}", today.format("%Y")))
            .join(format!("{:02}", today.format("%m")))
            .join(format!("{:02}", today.format("%d")))
            .join(doc_id)
    }

    fn metadata_path(&self, object_path: &std::path::Path) -> PathBuf {
        object_path.with_extension("meta.json")
    }
}

#[async_trait::async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(
        &self,
        doc_id: &str,
        bytes: &[u8],
        metadata: ObjectMetadata,
    ) -> Result<String, ApiError> {
        let path = self.object_path(doc_id);
        let parent = path.parent().map(|p| p.to_path_buf());

        let path_clone = path.clone();
        let metadata_path = self.metadata_path(&path);
        let bytes = bytes.to_vec();
        let metadata_json = serde_json::to_vec(&metadata)
            .map_err(|e| ApiError::Internal(format!("serialize object metadata: {e}")))?;

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            if let Some(parent) = parent {
                std::fs::create_dir_all(parent)?;
            }
            // put is idempotent on doc-id: re-writing the same bytes is a no-op replace.
            std::fs::write(&path_clone, &bytes)?;
            std::fs::write(&metadata_path, &metadata_json)?;
            Ok(())
        })
        .await
        .map_err(|e| ApiError::Internal(format!("object store task join error: {e}")))?
        .map_err(|e| {
            ApiError::dependency(Dependency::ObjectStore, true, format!("object store write failed: {e}"))
        })?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn get(&self, object_ref: &str) -> Result<(Vec<u8>, ObjectMetadata), ApiError> {
        let path = PathBuf::from(object_ref);
        let metadata_path = self.metadata_path(&path);

        tokio::task::spawn_blocking(move || -> anyhow::Result<(Vec<u8>, ObjectMetadata)> {
            let bytes = std::fs::read(&path)?;
            let metadata_bytes = std::fs::read(&metadata_path)?;
            let metadata: ObjectMetadata = serde_json::from_slice(&metadata_bytes)?;
            Ok((bytes, metadata))
        })
        .await
        .map_err(|e| ApiError::Internal(format!("object store task join error: {e}")))?
        .map_err(|e| {
            ApiError::dependency(Dependency::ObjectStore, false, format!("object not found: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let dir = tempdir();
        let store = FsObjectStore::new(dir.clone());
        let meta = ObjectMetadata {
            uploader_id: "u1".into(),
            original_filename: "doc1.txt".into(),
            content_type: "txt".into(),
            sha256: sha256_hex(b"hello"),
        };
        let object_ref = store.put("doc1", b"hello", meta.clone()).await.unwrap();
        let (bytes, read_meta) = store.get(&object_ref).await.unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(read_meta.sha256, meta.sha256);
        std::fs::remove_dir_all(dir).ok();
    }

    fn tempdir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("ragcore-objstore-test-{}", uuid::Uuid::new_v4()));
        p
    }
}
