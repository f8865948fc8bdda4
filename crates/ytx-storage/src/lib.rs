//! Artifact storage for rendered transcripts.
//!
//! This crate provides:
//! - The [`ArtifactStorage`] capability used by the job pipeline
//! - A local filesystem backend with collision-free naming
//! - An in-memory backend

pub mod error;
pub mod local;
pub mod memory;
pub mod storage;

pub use error::{StorageError, StorageResult};
pub use local::LocalArtifactStorage;
pub use memory::MemoryArtifactStorage;
pub use storage::ArtifactStorage;
