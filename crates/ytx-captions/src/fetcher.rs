//! Transcript retrieval: availability listing, language resolution and
//! caption download behind one call.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use ytx_models::{AvailableTrack, LanguagePreference, Transcript, VideoId};

use crate::error::{FetchError, FetchResult};
use crate::metrics;
use crate::resolver::resolve_or_err;
use crate::retry::RetryPolicy;
use crate::source::CaptionSource;

/// Resolves a video and language preference into a transcript.
#[derive(Clone)]
pub struct TranscriptFetcher {
    source: Arc<dyn CaptionSource>,
    retry: RetryPolicy,
}

impl TranscriptFetcher {
    pub fn new(source: Arc<dyn CaptionSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// List the tracks a video currently offers.
    pub async fn available_tracks(&self, video_id: &VideoId) -> FetchResult<Vec<AvailableTrack>> {
        self.retry
            .run("list_tracks", || self.source.list_tracks(video_id))
            .await
    }

    /// Resolve the best transcript for `preference`.
    ///
    /// Availability is always listed fresh. A track that disappears between
    /// listing and download is dropped and resolution moves on to the next
    /// candidate.
    pub async fn resolve(
        &self,
        video_id: &VideoId,
        preference: &LanguagePreference,
    ) -> FetchResult<Transcript> {
        let result = self.resolve_inner(video_id, preference).await;
        match &result {
            Ok(t) => metrics::record_resolved(&t.language_code, t.is_auto_generated),
            Err(e) => metrics::record_failure(e.kind().as_str()),
        }
        result
    }

    async fn resolve_inner(
        &self,
        video_id: &VideoId,
        preference: &LanguagePreference,
    ) -> FetchResult<Transcript> {
        let mut candidates = self.available_tracks(video_id).await?;
        if candidates.is_empty() {
            return Err(FetchError::CaptionsDisabled(video_id.to_string()));
        }
        debug!(
            video_id = %video_id,
            tracks = candidates.len(),
            "Listed caption tracks"
        );

        loop {
            let track = resolve_or_err(preference, &candidates)?.clone();

            let fetched = self
                .retry
                .run("fetch_captions", || self.source.fetch_captions(video_id, &track))
                .await;

            match fetched {
                Ok(segments) => {
                    info!(
                        video_id = %video_id,
                        language = %track.language_code,
                        auto_generated = track.is_auto_generated,
                        segments = segments.len(),
                        "Resolved transcript"
                    );
                    return Ok(Transcript {
                        video_id: video_id.clone(),
                        language_code: track.language_code,
                        is_auto_generated: track.is_auto_generated,
                        retrieved_at: Utc::now(),
                        segments,
                    });
                }
                Err(FetchError::TrackNotFound(_)) => {
                    warn!(
                        video_id = %video_id,
                        language = %track.language_code,
                        "Advertised track vanished, trying next candidate"
                    );
                    candidates.retain(|t| t != &track);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCaptionSource;
    use crate::retry::Backoff;
    use std::time::Duration;
    use ytx_models::CaptionSegment;

    fn video() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::default().with_backoff(Backoff::Fixed(Duration::from_millis(1)))
    }

    fn fetcher(source: Arc<MemoryCaptionSource>) -> TranscriptFetcher {
        TranscriptFetcher::new(source, fast_retry())
    }

    #[tokio::test]
    async fn test_resolves_preferred_language() {
        let source = Arc::new(MemoryCaptionSource::new());
        source.add_track(&video(), AvailableTrack::auto("en"), vec![CaptionSegment::new(0, 1, "auto")]);
        source.add_track(&video(), AvailableTrack::human("en"), vec![CaptionSegment::new(0, 1, "human")]);

        let transcript = fetcher(source)
            .resolve(&video(), &LanguagePreference::new(["es", "en"]))
            .await
            .unwrap();

        assert_eq!(transcript.language_code, "en");
        assert!(!transcript.is_auto_generated);
        assert_eq!(transcript.full_text(), "human");
    }

    #[tokio::test]
    async fn test_no_tracks_means_captions_disabled() {
        let source = Arc::new(MemoryCaptionSource::new());
        source.add_video_without_captions(&video());

        let err = fetcher(source)
            .resolve(&video(), &LanguagePreference::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::CaptionsDisabled(_)));
    }

    #[tokio::test]
    async fn test_no_matching_language() {
        let source = Arc::new(MemoryCaptionSource::new());
        source.add_track(&video(), AvailableTrack::human("fr"), vec![]);

        let err = fetcher(source)
            .resolve(&video(), &LanguagePreference::new(["de"]))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoMatchingLanguage { .. }));
    }

    #[tokio::test]
    async fn test_unavailable_video_is_not_retried() {
        let source = Arc::new(MemoryCaptionSource::new());
        source.mark_unavailable(&video(), "private");

        let err = fetcher(source.clone())
            .resolve(&video(), &LanguagePreference::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::VideoUnavailable(_)));
        assert_eq!(source.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let source = Arc::new(MemoryCaptionSource::new());
        source.add_track(&video(), AvailableTrack::human("en"), vec![CaptionSegment::new(0, 1, "ok")]);
        source.fail_transiently(&video(), 1);

        let transcript = fetcher(source.clone())
            .resolve(&video(), &LanguagePreference::default())
            .await
            .unwrap();
        assert_eq!(transcript.full_text(), "ok");
        assert_eq!(source.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_upstream() {
        let source = Arc::new(MemoryCaptionSource::new());
        source.add_track(&video(), AvailableTrack::human("en"), vec![]);
        source.fail_transiently(&video(), 5);

        let err = fetcher(source.clone())
            .resolve(&video(), &LanguagePreference::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(source.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_vanished_track_falls_through_to_next_candidate() {
        let source = Arc::new(MemoryCaptionSource::new());
        source.add_track(&video(), AvailableTrack::human("en"), vec![CaptionSegment::new(0, 1, "en")]);
        source.add_track(&video(), AvailableTrack::human("fr"), vec![CaptionSegment::new(0, 1, "fr")]);
        source.vanish_on_fetch(&video(), AvailableTrack::human("en"));

        let transcript = fetcher(source.clone())
            .resolve(&video(), &LanguagePreference::new(["en", "fr"]))
            .await
            .unwrap();
        assert_eq!(transcript.language_code, "fr");
        assert_eq!(source.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_availability_listed_on_every_resolve() {
        let source = Arc::new(MemoryCaptionSource::new());
        source.add_track(&video(), AvailableTrack::human("en"), vec![]);
        let fetcher = fetcher(source.clone());

        fetcher.resolve(&video(), &LanguagePreference::default()).await.unwrap();
        source.add_track(&video(), AvailableTrack::human("de"), vec![CaptionSegment::new(0, 1, "neu")]);
        let transcript = fetcher
            .resolve(&video(), &LanguagePreference::new(["de"]))
            .await
            .unwrap();

        assert_eq!(transcript.language_code, "de");
        assert_eq!(source.list_calls(), 2);
    }
}
