//! HTTP caption service client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use ytx_models::timestamp::seconds_to_millis;
use ytx_models::{AvailableTrack, CaptionSegment, VideoId};

use crate::error::{FetchError, FetchResult};
use crate::source::CaptionSource;

/// Configuration for the caption service client.
#[derive(Debug, Clone)]
pub struct CaptionServiceConfig {
    /// Base URL of the caption service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for CaptionServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8010".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl CaptionServiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("CAPTION_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8010".to_string()),
            timeout: Duration::from_secs(
                std::env::var("CAPTION_SERVICE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TracksResponse {
    tracks: Vec<AvailableTrack>,
}

#[derive(Debug, Deserialize)]
struct WireSegment {
    /// Seconds from the start of the video
    start: f64,
    /// Seconds on screen
    #[serde(default)]
    duration: f64,
    text: String,
}

#[derive(Debug, Deserialize)]
struct CaptionsResponse {
    segments: Vec<WireSegment>,
}

/// Caption source backed by a remote caption service.
pub struct CaptionServiceClient {
    http: Client,
    config: CaptionServiceConfig,
}

impl CaptionServiceClient {
    /// Create a new client.
    pub fn new(config: CaptionServiceConfig) -> FetchResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> FetchResult<Self> {
        Self::new(CaptionServiceConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn upstream_error(response: Response) -> FetchError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        FetchError::upstream(format!("caption service returned {}: {}", status, body))
    }
}

#[async_trait]
impl CaptionSource for CaptionServiceClient {
    async fn list_tracks(&self, video_id: &VideoId) -> FetchResult<Vec<AvailableTrack>> {
        let url = self.url(&format!("/videos/{}/tracks", video_id));
        debug!("Listing caption tracks from {}", url);

        let response = self.http.get(&url).send().await?;
        match response.status() {
            s if s.is_success() => {
                let body: TracksResponse = response
                    .json()
                    .await
                    .map_err(|e| FetchError::invalid_payload(e.to_string()))?;
                Ok(body.tracks)
            }
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN | StatusCode::GONE => {
                let reason = response.text().await.unwrap_or_default();
                Err(FetchError::video_unavailable(if reason.is_empty() {
                    video_id.to_string()
                } else {
                    format!("{}: {}", video_id, reason)
                }))
            }
            _ => {
                let err = Self::upstream_error(response).await;
                warn!("Track listing failed for {}: {}", video_id, err);
                Err(err)
            }
        }
    }

    async fn fetch_captions(
        &self,
        video_id: &VideoId,
        track: &AvailableTrack,
    ) -> FetchResult<Vec<CaptionSegment>> {
        let url = self.url(&format!(
            "/videos/{}/captions/{}",
            video_id,
            urlencoding::encode(&track.language_code)
        ));
        let kind = if track.is_auto_generated { "auto" } else { "human" };
        debug!("Fetching captions from {} ({})", url, kind);

        let response = self.http.get(&url).query(&[("kind", kind)]).send().await?;
        match response.status() {
            s if s.is_success() => {
                let body: CaptionsResponse = response
                    .json()
                    .await
                    .map_err(|e| FetchError::invalid_payload(e.to_string()))?;
                Ok(body
                    .segments
                    .into_iter()
                    .map(|s| {
                        CaptionSegment::new(
                            seconds_to_millis(s.start),
                            seconds_to_millis(s.duration),
                            s.text,
                        )
                    })
                    .collect())
            }
            StatusCode::NOT_FOUND => Err(FetchError::TrackNotFound(track.language_code.clone())),
            _ => Err(Self::upstream_error(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> CaptionServiceClient {
        CaptionServiceClient::new(CaptionServiceConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn video() -> VideoId {
        VideoId::parse("dQw4w9WgXcQ").unwrap()
    }

    #[tokio::test]
    async fn test_list_tracks() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/dQw4w9WgXcQ/tracks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tracks": [
                    { "language_code": "en", "language_name": "English", "is_auto_generated": false },
                    { "language_code": "de", "is_auto_generated": true }
                ]
            })))
            .mount(&server)
            .await;

        let tracks = client(&server).list_tracks(&video()).await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].language_name.as_deref(), Some("English"));
        assert_eq!(tracks[1], AvailableTrack::auto("de"));
    }

    #[tokio::test]
    async fn test_fetch_converts_seconds_to_millis() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/dQw4w9WgXcQ/captions/en"))
            .and(query_param("kind", "human"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "segments": [
                    { "start": 0.0, "duration": 1.25, "text": "seg1" },
                    { "start": 1.25, "duration": 2.0, "text": "seg2" }
                ]
            })))
            .mount(&server)
            .await;

        let segments = client(&server)
            .fetch_captions(&video(), &AvailableTrack::human("en"))
            .await
            .unwrap();
        assert_eq!(segments[1], CaptionSegment::new(1250, 2000, "seg2"));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/dQw4w9WgXcQ/tracks"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/videos/dQw4w9WgXcQ/captions/en"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/videos/dQw4w9WgXcQ/captions/fr"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(matches!(
            client.list_tracks(&video()).await,
            Err(FetchError::VideoUnavailable(_))
        ));
        assert!(matches!(
            client.fetch_captions(&video(), &AvailableTrack::human("en")).await,
            Err(FetchError::TrackNotFound(_))
        ));
        let err = client
            .fetch_captions(&video(), &AvailableTrack::human("fr"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/dQw4w9WgXcQ/tracks"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server).list_tracks(&video()).await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidPayload(_)));
    }
}
