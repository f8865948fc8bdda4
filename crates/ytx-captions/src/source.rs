//! Caption source capability.

use async_trait::async_trait;
use ytx_models::{AvailableTrack, CaptionSegment, VideoId};

use crate::error::FetchResult;

/// Access to a video platform's caption tracks.
///
/// Implementations report deleted/private/blocked videos as
/// `FetchError::VideoUnavailable`, a missing track on fetch as
/// `FetchError::TrackNotFound`, and transient failures as
/// `FetchError::Upstream`.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// List the caption tracks currently available for a video.
    async fn list_tracks(&self, video_id: &VideoId) -> FetchResult<Vec<AvailableTrack>>;

    /// Fetch the segments of one track, in source order.
    async fn fetch_captions(
        &self,
        video_id: &VideoId,
        track: &AvailableTrack,
    ) -> FetchResult<Vec<CaptionSegment>>;
}
