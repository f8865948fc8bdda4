//! Service configuration.

use std::path::PathBuf;
use std::time::Duration;

use ytx_models::DEFAULT_LANGUAGES;

/// Job pipeline configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum concurrently processed jobs
    pub workers: usize,
    /// Pending jobs the worker queue holds before submit waits
    pub queue_capacity: usize,
    /// Limit on fetch + render + store for one job; `None` disables it
    pub job_timeout: Option<Duration>,
    /// Language chain used when a request names none
    pub default_languages: Vec<String>,
    /// Where job records are persisted; `None` keeps them in memory
    pub job_store_dir: Option<PathBuf>,
    /// Artifact root for the local storage backend
    pub output_dir: PathBuf,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 256,
            job_timeout: None,
            default_languages: DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect(),
            job_store_dir: None,
            output_dir: PathBuf::from("./exports"),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            workers: std::env::var("YTX_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.workers),
            job_timeout: std::env::var("YTX_JOB_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            default_languages: std::env::var("YTX_DEFAULT_LANGUAGES")
                .ok()
                .map(|s| parse_list(&s))
                .filter(|langs| !langs.is_empty())
                .unwrap_or(defaults.default_languages),
            job_store_dir: std::env::var("YTX_JOB_STORE_DIR").ok().map(PathBuf::from),
            output_dir: std::env::var("YTX_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            ..defaults
        }
    }
}

/// Retention policy for finished jobs and their artifacts.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Terminal jobs older than this are evicted
    pub max_age: Duration,
    /// Artifact byte budget across all jobs; `None` means unbounded
    pub max_total_bytes: Option<u64>,
    /// Time between sweeps
    pub interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(7 * 24 * 3600),
            max_total_bytes: None,
            interval: Duration::from_secs(3600),
        }
    }
}

impl RetentionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_age: std::env::var("YTX_RETENTION_DAYS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|days| Duration::from_secs(days * 24 * 3600))
                .unwrap_or(defaults.max_age),
            max_total_bytes: std::env::var("YTX_RETENTION_MAX_BYTES")
                .ok()
                .and_then(|s| s.parse().ok()),
            interval: Duration::from_secs(
                std::env::var("YTX_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(3600),
            ),
        }
    }
}

fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
