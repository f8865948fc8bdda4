//! In-memory artifact storage.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ytx_models::{sanitize_filename, ArtifactRef, ExportFormat};

use crate::error::{StorageError, StorageResult};
use crate::storage::ArtifactStorage;

const SCHEME: &str = "mem://";

#[derive(Debug)]
struct Object {
    format: ExportFormat,
    bytes: Vec<u8>,
    created_at: DateTime<Utc>,
}

/// Keeps artifacts in a process-local map. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryArtifactStorage {
    objects: Mutex<HashMap<String, Object>>,
    failing_formats: Mutex<BTreeSet<ExportFormat>>,
}

impl MemoryArtifactStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `store` of `format` fail, for exercising error paths.
    pub fn fail_format(&self, format: ExportFormat) {
        if let Ok(mut failing) = self.failing_formats.lock() {
            failing.insert(format);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> u64 {
        self.lock().values().map(|o| o.bytes.len() as u64).sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Object>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ArtifactStorage for MemoryArtifactStorage {
    async fn store(
        &self,
        bytes: Vec<u8>,
        suggested_name: &str,
        format: ExportFormat,
    ) -> StorageResult<ArtifactRef> {
        let failing = self
            .failing_formats
            .lock()
            .map(|f| f.contains(&format))
            .unwrap_or(false);
        if failing {
            return Err(StorageError::write_failed(format!("{} writes disabled", format)));
        }

        let stem = sanitize_filename(suggested_name);
        let mut objects = self.lock();
        let mut location = format!("{}{}.{}", SCHEME, stem, format.extension());
        let mut attempt = 1;
        while objects.contains_key(&location) {
            location = format!("{}{}-{}.{}", SCHEME, stem, attempt, format.extension());
            attempt += 1;
        }

        let size_bytes = bytes.len() as u64;
        let created_at = Utc::now();
        objects.insert(
            location.clone(),
            Object {
                format,
                bytes,
                created_at,
            },
        );
        Ok(ArtifactRef {
            format,
            location,
            size_bytes,
            created_at,
        })
    }

    async fn read(&self, artifact: &ArtifactRef) -> StorageResult<Vec<u8>> {
        if !artifact.location.starts_with(SCHEME) {
            return Err(StorageError::InvalidLocation(artifact.location.clone()));
        }
        self.lock()
            .get(&artifact.location)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::not_found(artifact.location.clone()))
    }

    async fn delete(&self, artifact: &ArtifactRef) -> StorageResult<()> {
        self.lock().remove(&artifact.location);
        Ok(())
    }

    async fn list(&self) -> StorageResult<Vec<ArtifactRef>> {
        Ok(self
            .lock()
            .iter()
            .map(|(location, o)| ArtifactRef {
                format: o.format,
                location: location.clone(),
                size_bytes: o.bytes.len() as u64,
                created_at: o.created_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_and_unique_locations() {
        let storage = MemoryArtifactStorage::new();
        let a = storage.store(b"a".to_vec(), "x", ExportFormat::PlainText).await.unwrap();
        let b = storage.store(b"bb".to_vec(), "x", ExportFormat::PlainText).await.unwrap();

        assert_ne!(a.location, b.location);
        assert_eq!(storage.total_bytes(), 3);
        assert_eq!(storage.read(&b).await.unwrap(), b"bb");

        storage.delete(&a).await.unwrap();
        storage.delete(&a).await.unwrap();
        assert_eq!(storage.len(), 1);

        let listed = storage.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].location, b.location);
        assert_eq!(listed[0].size_bytes, 2);
    }

    #[tokio::test]
    async fn test_failing_format() {
        let storage = MemoryArtifactStorage::new();
        storage.fail_format(ExportFormat::Document);

        tokio_test::assert_err!(storage.store(vec![], "x", ExportFormat::Document).await);
        tokio_test::assert_ok!(storage.store(vec![], "x", ExportFormat::PlainText).await);
    }
}
