//! Shared fixtures for ytx-jobs integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ytx_captions::{Backoff, MemoryCaptionSource, RetryPolicy, TranscriptFetcher};
use ytx_export::ArtifactExporter;
use ytx_jobs::{JobManager, JobStore, ServiceConfig};
use ytx_models::{AvailableTrack, CaptionSegment, ExportFormat, TranscriptRequest, VideoId};
use ytx_storage::MemoryArtifactStorage;

pub const VIDEO: &str = "abc123XYZ90";

pub struct Harness {
    pub manager: Arc<JobManager>,
    pub source: Arc<MemoryCaptionSource>,
    pub storage: Arc<MemoryArtifactStorage>,
}

pub fn video() -> VideoId {
    VideoId::parse(VIDEO).unwrap()
}

pub fn harness() -> Harness {
    harness_with(MemoryCaptionSource::new(), ServiceConfig::default())
}

pub fn harness_with(source: MemoryCaptionSource, config: ServiceConfig) -> Harness {
    let source = Arc::new(source);
    let storage = Arc::new(MemoryArtifactStorage::new());
    let store = Arc::new(JobStore::in_memory(storage.clone()));
    let retry = RetryPolicy::default().with_backoff(Backoff::Fixed(Duration::from_millis(1)));
    let fetcher = TranscriptFetcher::new(source.clone(), retry);
    let manager = Arc::new(JobManager::new(
        store,
        fetcher,
        ArtifactExporter::default(),
        &config,
    ));
    Harness {
        manager,
        source,
        storage,
    }
}

/// Human English track with two segments.
pub fn add_english(source: &MemoryCaptionSource) {
    source.add_track(
        &video(),
        AvailableTrack::human("en"),
        vec![
            CaptionSegment::new(0, 1500, "seg1"),
            CaptionSegment::new(1500, 1500, "seg2"),
        ],
    );
}

pub fn request(formats: &[ExportFormat]) -> TranscriptRequest {
    let url = format!("https://www.youtube.com/watch?v={}", VIDEO);
    formats
        .iter()
        .fold(TranscriptRequest::new(url), |request, format| request.with_format(*format))
}
