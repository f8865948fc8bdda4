//! Artifact storage capability.

use async_trait::async_trait;
use ytx_models::{ArtifactRef, ExportFormat};

use crate::error::StorageResult;

/// Durable home for rendered artifacts.
///
/// `store` must not return until the bytes are durable. `delete` is
/// idempotent: removing something already gone succeeds.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    /// Persist `bytes` under a name derived from `suggested_name` and the
    /// format's extension. Never overwrites an existing artifact.
    async fn store(
        &self,
        bytes: Vec<u8>,
        suggested_name: &str,
        format: ExportFormat,
    ) -> StorageResult<ArtifactRef>;

    async fn read(&self, artifact: &ArtifactRef) -> StorageResult<Vec<u8>>;

    async fn delete(&self, artifact: &ArtifactRef) -> StorageResult<()>;

    /// Every artifact currently held, referenced by a job or not.
    async fn list(&self) -> StorageResult<Vec<ArtifactRef>>;
}
