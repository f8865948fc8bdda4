//! Caption track discovery, language resolution and transcript retrieval.
//!
//! [`TranscriptFetcher`] drives a [`CaptionSource`] through the language
//! fallback policy in [`resolver`], retrying transient upstream failures
//! under a bounded [`RetryPolicy`].

pub mod error;
pub mod fetcher;
pub mod http;
pub mod memory;
pub mod metrics;
pub mod resolver;
pub mod retry;
pub mod source;

pub use error::{FetchError, FetchResult};
pub use fetcher::TranscriptFetcher;
pub use http::{CaptionServiceClient, CaptionServiceConfig};
pub use memory::MemoryCaptionSource;
pub use resolver::{resolve, resolve_or_err};
pub use retry::{Backoff, RetryPolicy};
pub use source::CaptionSource;
