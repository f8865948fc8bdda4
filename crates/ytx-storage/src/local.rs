//! Local filesystem artifact storage.
//!
//! Artifacts are named `<stem>_<YYYYmmdd_HHMMSS>.<ext>`. Bytes go to a hidden
//! partial file first and are hard-linked under the final name only once they
//! are durable, so a dropped `store` future never leaves a visible file.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;
use ytx_models::{sanitize_filename, ArtifactRef, ExportFormat};

use crate::error::{StorageError, StorageResult};
use crate::storage::ArtifactStorage;

const PARTIAL_PREFIX: &str = ".partial-";

/// Names tried per store: the timestamped name, then random suffixes.
const MAX_NAME_ATTEMPTS: u32 = 4;

/// Removes a partial file when dropped, including when the owning future
/// is cancelled mid-write.
struct PartialFile {
    path: PathBuf,
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != IoErrorKind::NotFound {
                warn!("Failed to remove partial file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Stores artifacts as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactStorage {
    root: PathBuf,
}

impl LocalArtifactStorage {
    /// Create storage rooted at `root`, creating the directory if needed.
    ///
    /// Partial files left behind by a crashed process are removed.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::config_error(format!("cannot create {}: {}", root.display(), e))
        })?;
        let root = fs::canonicalize(&root).await?;

        let mut entries = fs::read_dir(&root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(PARTIAL_PREFIX) {
                let _ = fs::remove_file(entry.path()).await;
            }
        }

        info!("Artifact storage rooted at {}", root.display());
        Ok(Self { root })
    }

    /// Create from `YTX_OUTPUT_DIR` (default `./exports`).
    pub async fn from_env() -> StorageResult<Self> {
        let root = std::env::var("YTX_OUTPUT_DIR").unwrap_or_else(|_| "./exports".to_string());
        Self::new(root).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a location back to a path, refusing anything outside the root.
    fn path_for(&self, artifact: &ArtifactRef) -> StorageResult<PathBuf> {
        let path = PathBuf::from(&artifact.location);
        let inside = path.parent() == Some(self.root.as_path())
            && path.file_name().is_some();
        if inside {
            Ok(path)
        } else {
            Err(StorageError::InvalidLocation(artifact.location.clone()))
        }
    }

    fn candidate(&self, stem: &str, stamp: &str, ext: &str, attempt: u32) -> PathBuf {
        if attempt == 0 {
            self.root.join(format!("{}_{}.{}", stem, stamp, ext))
        } else {
            let suffix = Uuid::new_v4().simple().to_string();
            self.root.join(format!("{}_{}_{}.{}", stem, stamp, &suffix[..8], ext))
        }
    }

    /// Write `bytes` to a fresh partial file and fsync it.
    async fn write_partial(&self, bytes: &[u8]) -> StorageResult<PartialFile> {
        let partial = PartialFile {
            path: self
                .root
                .join(format!("{}{}", PARTIAL_PREFIX, Uuid::new_v4().simple())),
        };
        let written = async {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&partial.path)
                .await?;
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;

        match written {
            Ok(()) => Ok(partial),
            Err(e) => Err(StorageError::write_failed(format!(
                "{}: {}",
                partial.path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl ArtifactStorage for LocalArtifactStorage {
    async fn store(
        &self,
        bytes: Vec<u8>,
        suggested_name: &str,
        format: ExportFormat,
    ) -> StorageResult<ArtifactRef> {
        let mut stem = sanitize_filename(suggested_name);
        if stem.is_empty() || stem.starts_with('.') {
            stem = format!("artifact{}", stem);
        }

        let partial = self.write_partial(&bytes).await?;
        let created_at = Utc::now();
        let stamp = created_at.format("%Y%m%d_%H%M%S").to_string();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.candidate(&stem, &stamp, format.extension(), attempt);
            // A hard link never replaces an existing name.
            match fs::hard_link(&partial.path, &path).await {
                Ok(()) => {}
                Err(e) if e.kind() == IoErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::write_failed(format!("{}: {}", path.display(), e))),
            }

            debug!(format = %format, bytes = bytes.len(), "Stored artifact at {}", path.display());
            return Ok(ArtifactRef {
                format,
                location: path.to_string_lossy().into_owned(),
                size_bytes: bytes.len() as u64,
                created_at,
            });
        }

        Err(StorageError::write_failed(format!(
            "no free name for '{}' after {} attempts",
            stem, MAX_NAME_ATTEMPTS
        )))
    }

    async fn read(&self, artifact: &ArtifactRef) -> StorageResult<Vec<u8>> {
        let path = self.path_for(artifact)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                Err(StorageError::not_found(artifact.location.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, artifact: &ArtifactRef) -> StorageResult<()> {
        let path = self.path_for(artifact)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted artifact {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::delete_failed(format!("{}: {}", path.display(), e))),
        }
    }

    async fn list(&self) -> StorageResult<Vec<ArtifactRef>> {
        let mut artifacts = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let format = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(|e| e.parse::<ExportFormat>().ok());
            let format = match format {
                Some(format) if !hidden => format,
                _ => continue,
            };
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };

            artifacts.push(ArtifactRef {
                format,
                location: path.to_string_lossy().into_owned(),
                size_bytes: metadata.len(),
                created_at: metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now()),
            });
        }
        Ok(artifacts)
    }
}
