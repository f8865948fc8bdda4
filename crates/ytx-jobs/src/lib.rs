//! Transcript export jobs.
//!
//! This crate provides:
//! - [`JobStore`]: per-job serialized registry, in memory or file-backed
//! - [`JobManager`]: request validation and the fetch, render, store pipeline
//! - [`WorkerPool`]: bounded background execution of queued jobs
//! - [`RetentionSweeper`]: age and size based eviction of finished jobs

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod store;
pub mod sweeper;
pub mod worker;

pub use config::{RetentionConfig, ServiceConfig};
pub use error::{JobError, JobResult};
pub use logging::JobLogger;
pub use manager::{JobEvent, JobManager, MAX_CUSTOM_NAME_LEN};
pub use store::{JobStore, StartOutcome};
pub use sweeper::{RetentionSweeper, SweepReport};
pub use worker::WorkerPool;
