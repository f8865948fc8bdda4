//! In-process caption source.
//!
//! Backs the local CLI's `--fixture` mode and every pipeline test. Failures
//! can be scripted per video so retry and error-routing paths are
//! reachable without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use ytx_models::{AvailableTrack, CaptionSegment, VideoId};

use crate::error::{FetchError, FetchResult};
use crate::source::CaptionSource;

#[derive(Debug, Clone)]
enum Entry {
    Unavailable(String),
    Tracks(Vec<(AvailableTrack, Vec<CaptionSegment>)>),
}

/// Caption source holding tracks in memory.
#[derive(Debug, Default)]
pub struct MemoryCaptionSource {
    videos: Mutex<HashMap<String, Entry>>,
    /// Videos whose next N calls fail with `Upstream`.
    transient_failures: Mutex<HashMap<String, u32>>,
    /// Tracks that vanish between listing and fetching.
    vanished: Mutex<Vec<(String, AvailableTrack)>>,
    latency: Option<Duration>,
    list_calls: AtomicU32,
    fetch_calls: AtomicU32,
}

/// On-disk fixture layout: `{ "<video id>": [ { track, segments } ] }`.
#[derive(Debug, Deserialize)]
struct FixtureTrack {
    #[serde(flatten)]
    track: AvailableTrack,
    #[serde(default)]
    segments: Vec<CaptionSegment>,
}

impl MemoryCaptionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, so callers can observe in-flight state.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Load videos from a JSON fixture document.
    pub fn from_json(json: &str) -> FetchResult<Self> {
        let fixture: HashMap<String, Vec<FixtureTrack>> =
            serde_json::from_str(json).map_err(|e| FetchError::invalid_payload(e.to_string()))?;

        let source = Self::new();
        for (video, tracks) in fixture {
            let tracks = tracks.into_iter().map(|t| (t.track, t.segments)).collect();
            source.lock_videos().insert(video, Entry::Tracks(tracks));
        }
        Ok(source)
    }

    /// Register a track and its segments for a video.
    pub fn add_track(&self, video_id: &VideoId, track: AvailableTrack, segments: Vec<CaptionSegment>) {
        let mut videos = self.lock_videos();
        let entry = videos
            .entry(video_id.as_str().to_string())
            .or_insert_with(|| Entry::Tracks(Vec::new()));
        match entry {
            Entry::Tracks(tracks) => tracks.push((track, segments)),
            Entry::Unavailable(_) => *entry = Entry::Tracks(vec![(track, segments)]),
        }
    }

    /// Register a video that exists but has no caption tracks.
    pub fn add_video_without_captions(&self, video_id: &VideoId) {
        self.lock_videos()
            .insert(video_id.as_str().to_string(), Entry::Tracks(Vec::new()));
    }

    /// Register a video as deleted, private or blocked.
    pub fn mark_unavailable(&self, video_id: &VideoId, reason: impl Into<String>) {
        self.lock_videos()
            .insert(video_id.as_str().to_string(), Entry::Unavailable(reason.into()));
    }

    /// Fail the next `count` calls for this video with an upstream error.
    pub fn fail_transiently(&self, video_id: &VideoId, count: u32) {
        if let Ok(mut failures) = self.transient_failures.lock() {
            failures.insert(video_id.as_str().to_string(), count);
        }
    }

    /// Keep advertising `track` but report it missing on fetch.
    pub fn vanish_on_fetch(&self, video_id: &VideoId, track: AvailableTrack) {
        if let Ok(mut vanished) = self.vanished.lock() {
            vanished.push((video_id.as_str().to_string(), track));
        }
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn lock_videos(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoned map only means a test panicked mid-insert; the data is still usable.
        self.videos.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_transient_failure(&self, video_id: &VideoId) -> bool {
        let Ok(mut failures) = self.transient_failures.lock() else {
            return false;
        };
        match failures.get_mut(video_id.as_str()) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    async fn simulate_call(&self, video_id: &VideoId) -> FetchResult<Entry> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.take_transient_failure(video_id) {
            return Err(FetchError::upstream("simulated transient failure"));
        }
        self.lock_videos()
            .get(video_id.as_str())
            .cloned()
            .ok_or_else(|| FetchError::video_unavailable(format!("{} not found", video_id)))
    }
}

#[async_trait]
impl CaptionSource for MemoryCaptionSource {
    async fn list_tracks(&self, video_id: &VideoId) -> FetchResult<Vec<AvailableTrack>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match self.simulate_call(video_id).await? {
            Entry::Unavailable(reason) => Err(FetchError::VideoUnavailable(reason)),
            Entry::Tracks(tracks) => Ok(tracks.into_iter().map(|(t, _)| t).collect()),
        }
    }

    async fn fetch_captions(
        &self,
        video_id: &VideoId,
        track: &AvailableTrack,
    ) -> FetchResult<Vec<CaptionSegment>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let entry = self.simulate_call(video_id).await?;

        let gone = self
            .vanished
            .lock()
            .map(|v| v.iter().any(|(id, t)| id == video_id.as_str() && t == track))
            .unwrap_or(false);
        if gone {
            return Err(FetchError::TrackNotFound(track.language_code.clone()));
        }

        match entry {
            Entry::Unavailable(reason) => Err(FetchError::VideoUnavailable(reason)),
            Entry::Tracks(tracks) => tracks
                .into_iter()
                .find(|(t, _)| t == track)
                .map(|(_, segments)| segments)
                .ok_or_else(|| FetchError::TrackNotFound(track.language_code.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixture_loading() {
        let json = r#"{
            "dQw4w9WgXcQ": [
                {
                    "language_code": "en",
                    "is_auto_generated": false,
                    "segments": [{ "start_ms": 0, "duration_ms": 1000, "text": "hi" }]
                }
            ]
        }"#;
        let source = MemoryCaptionSource::from_json(json).unwrap();
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();

        let tracks = source.list_tracks(&id).await.unwrap();
        assert_eq!(tracks, vec![AvailableTrack::human("en")]);

        let segments = source.fetch_captions(&id, &tracks[0]).await.unwrap();
        assert_eq!(segments[0].text, "hi");
    }

    #[tokio::test]
    async fn test_unknown_video_is_unavailable() {
        let source = MemoryCaptionSource::new();
        let id = VideoId::parse("dQw4w9WgXcQ").unwrap();
        let err = source.list_tracks(&id).await.unwrap_err();
        assert!(matches!(err, FetchError::VideoUnavailable(_)));
    }
}
