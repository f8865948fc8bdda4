//! End-to-end job pipeline tests against an in-process caption source.

mod common;

use std::time::Duration;

use common::{add_english, harness, harness_with, request, video, VIDEO};
use ytx_captions::MemoryCaptionSource;
use ytx_export::StructuredRecord;
use ytx_jobs::{JobError, ServiceConfig, WorkerPool};
use ytx_models::{
    AvailableTrack, CaptionSegment, ErrorKind, ExportFormat, JobFilter, JobState, JobTransition,
    QuickTranscriptRequest, TranscriptRequest,
};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_completed_job_has_every_requested_artifact() {
    let h = harness();
    add_english(&h.source);

    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText, ExportFormat::StructuredRecord]))
        .await
        .unwrap();

    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.history, vec![JobState::Queued, JobState::Running, JobState::Completed]);
    assert_eq!(job.language_used.as_deref(), Some("en"));
    assert_eq!(job.artifacts.len(), 2);
    assert_eq!(h.storage.len(), 2);

    let text = h.manager.read_artifact(&job.id, ExportFormat::PlainText).await.unwrap();
    assert_eq!(text, b"seg1\nseg2");

    let record = h
        .manager
        .read_artifact(&job.id, ExportFormat::StructuredRecord)
        .await
        .unwrap();
    let record = StructuredRecord::parse(&record).unwrap();
    assert_eq!(record.metadata.segment_count, 2);
    assert_eq!(record.metadata.video_id.as_str(), VIDEO);

    let status = h.manager.status(&job.id).await.unwrap();
    assert_eq!(status.progress, 100);
    assert_eq!(
        status.available_formats.into_iter().collect::<Vec<_>>(),
        vec![ExportFormat::PlainText, ExportFormat::StructuredRecord]
    );
}

#[tokio::test]
async fn test_captions_disabled_fails_without_artifacts() {
    let h = harness();
    h.source.add_video_without_captions(&video());

    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText]))
        .await
        .unwrap();

    assert_eq!(job.history, vec![JobState::Queued, JobState::Running, JobState::Failed]);
    assert_eq!(job.error.as_ref().unwrap().kind, ErrorKind::CaptionsDisabled);
    assert!(job.artifacts.is_empty());
    assert!(h.storage.is_empty());

    let status = h.manager.status(&job.id).await.unwrap();
    assert_eq!(status.error_kind, Some(ErrorKind::CaptionsDisabled));
    assert!(status.error_message.is_some());
}

#[tokio::test]
async fn test_fetch_failures_map_to_error_kinds() {
    let h = harness();
    h.source.add_track(&video(), AvailableTrack::human("fr"), vec![]);

    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText]).with_languages(["de"]))
        .await
        .unwrap();
    assert_eq!(job.error.unwrap().kind, ErrorKind::NoMatchingLanguage);

    h.source.mark_unavailable(&video(), "private video");
    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText]))
        .await
        .unwrap();
    assert_eq!(job.error.unwrap().kind, ErrorKind::VideoUnavailable);
}

#[tokio::test]
async fn test_transient_upstream_failure_is_retried() {
    let h = harness();
    add_english(&h.source);
    h.source.fail_transiently(&video(), 1);

    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText]))
        .await
        .unwrap();
    assert_eq!(job.state, JobState::Completed);
}

#[tokio::test]
async fn test_exhausted_retries_fail_as_upstream_error() {
    let h = harness();
    add_english(&h.source);
    h.source.fail_transiently(&video(), 10);

    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText]))
        .await
        .unwrap();
    assert_eq!(job.error.unwrap().kind, ErrorKind::UpstreamError);
    // Initial attempt plus one retry.
    assert_eq!(h.source.list_calls(), 2);
}

#[tokio::test]
async fn test_render_failure_discards_other_formats() {
    let h = harness();
    h.source.add_track(
        &video(),
        AvailableTrack::human("ja"),
        vec![CaptionSegment::new(0, 1000, "こんにちは")],
    );

    let job = h
        .manager
        .submit_sync(
            &request(&[ExportFormat::PlainText, ExportFormat::Document]).with_languages(["ja"]),
        )
        .await
        .unwrap();

    let error = job.error.unwrap();
    assert_eq!(error.kind, ErrorKind::RenderError);
    assert!(error.message.contains("document"));
    assert!(job.artifacts.is_empty());
    assert!(h.storage.is_empty());
}

#[tokio::test]
async fn test_storage_failure_fails_job_and_discards_stored_artifacts() {
    let h = harness();
    add_english(&h.source);
    h.storage.fail_format(ExportFormat::StructuredRecord);

    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText, ExportFormat::StructuredRecord]))
        .await
        .unwrap();

    assert_eq!(job.error.unwrap().kind, ErrorKind::StorageError);
    assert!(h.storage.is_empty());
}

#[tokio::test]
async fn test_cancel_before_start_skips_fetch() {
    let h = harness();
    add_english(&h.source);

    let job = h.manager.create(&request(&[ExportFormat::PlainText])).await.unwrap();
    let status = h.manager.cancel(&job.id).await.unwrap();
    assert_eq!(status.state, JobState::Queued);

    let job = h.manager.process(&job.id).await.unwrap();
    assert_eq!(job.history, vec![JobState::Queued, JobState::Failed]);
    assert_eq!(job.error.unwrap().kind, ErrorKind::Cancelled);
    assert_eq!(h.source.list_calls(), 0);
}

#[tokio::test]
async fn test_cancel_while_running_stops_at_checkpoint() {
    let source = MemoryCaptionSource::new().with_latency(Duration::from_millis(200));
    let h = harness_with(source, ServiceConfig::default());
    add_english(&h.source);
    let pool = WorkerPool::start(h.manager.clone(), &ServiceConfig::default());

    let job_id = pool.submit(&request(&[ExportFormat::PlainText])).await.unwrap();
    while h.manager.status(&job_id).await.unwrap().state != JobState::Running {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    h.manager.cancel(&job_id).await.unwrap();

    let job = h.manager.wait_for_terminal(&job_id, WAIT).await.unwrap();
    assert_eq!(job.history, vec![JobState::Queued, JobState::Running, JobState::Failed]);
    assert_eq!(job.error.unwrap().kind, ErrorKind::Cancelled);
    assert!(h.storage.is_empty());

    pool.shutdown().await;
}

#[tokio::test]
async fn test_cancel_after_completion_is_noop() {
    let h = harness();
    add_english(&h.source);

    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText]))
        .await
        .unwrap();
    let status = h.manager.cancel(&job.id).await.unwrap();
    assert_eq!(status.state, JobState::Completed);
    assert_eq!(h.manager.get(&job.id).await.unwrap(), job);
}

#[tokio::test]
async fn test_job_timeout_is_upstream_error() {
    let source = MemoryCaptionSource::new().with_latency(Duration::from_millis(500));
    let config = ServiceConfig {
        job_timeout: Some(Duration::from_millis(50)),
        ..ServiceConfig::default()
    };
    let h = harness_with(source, config);
    add_english(&h.source);

    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText]))
        .await
        .unwrap();
    assert_eq!(job.error.unwrap().kind, ErrorKind::UpstreamError);
}

#[tokio::test]
async fn test_worker_pool_runs_jobs_concurrently() {
    let h = harness();
    add_english(&h.source);
    let config = ServiceConfig {
        workers: 3,
        ..ServiceConfig::default()
    };
    let pool = WorkerPool::start(h.manager.clone(), &config);

    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(pool.submit(&request(&[ExportFormat::PlainText])).await.unwrap());
    }
    for id in &ids {
        let job = h.manager.wait_for_terminal(id, WAIT).await.unwrap();
        assert_eq!(job.state, JobState::Completed);
    }

    assert_eq!(h.manager.list(&JobFilter::state(JobState::Completed)).await.len(), 6);
    assert_eq!(h.manager.list(&JobFilter::default().with_limit(4)).await.len(), 4);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_stopped_pool_rejects_submissions_without_creating_jobs() {
    let h = harness();
    let pool = WorkerPool::start(h.manager.clone(), &ServiceConfig::default());
    pool.shutdown().await;

    let err = tokio_test::assert_err!(pool.submit(&request(&[ExportFormat::PlainText])).await);
    assert!(matches!(err, JobError::WorkerUnavailable));
    assert!(h.manager.store().is_empty().await);
}

#[tokio::test]
async fn test_invalid_requests_never_create_jobs() {
    let h = harness();

    let err = h
        .manager
        .submit_sync(
            &TranscriptRequest::new("https://example.com/watch?v=abc")
                .with_format(ExportFormat::PlainText),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidVideoReference);

    let err = h.manager.submit_sync(&request(&[])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    assert!(h.manager.store().is_empty().await);
}

#[tokio::test]
async fn test_illegal_transition_is_internal_fault() {
    let h = harness();
    add_english(&h.source);
    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText]))
        .await
        .unwrap();

    let err = h
        .manager
        .store()
        .update(&job.id, JobTransition::Start)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    assert!(err.kind().is_internal());
}

#[tokio::test]
async fn test_delete_cascades_and_is_idempotent() {
    let h = harness();
    add_english(&h.source);
    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText, ExportFormat::Document]))
        .await
        .unwrap();
    assert_eq!(h.storage.len(), 2);

    assert!(h.manager.delete(&job.id).await.unwrap());
    assert!(h.storage.is_empty());
    assert!(!h.manager.delete(&job.id).await.unwrap());
    assert!(matches!(h.manager.status(&job.id).await, Err(JobError::NotFound(_))));
}

#[tokio::test]
async fn test_quick_transcript_creates_no_job() {
    let h = harness();
    add_english(&h.source);

    let quick = h
        .manager
        .quick(&QuickTranscriptRequest {
            url_or_id: format!("https://youtu.be/{}", VIDEO),
            languages: vec![],
        })
        .await
        .unwrap();

    assert_eq!(quick.text, "seg1 seg2");
    assert_eq!(quick.language, "en");
    assert_eq!(quick.word_count, 2);
    assert!((quick.duration_seconds - 3.0).abs() < f64::EPSILON);
    assert!(h.manager.store().is_empty().await);
    assert!(h.storage.is_empty());
}

#[tokio::test]
async fn test_quick_failure_is_returned_directly() {
    let h = harness();
    h.source.add_video_without_captions(&video());

    let err = h
        .manager
        .quick(&QuickTranscriptRequest {
            url_or_id: VIDEO.to_string(),
            languages: vec!["en".into()],
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CaptionsDisabled);
    assert!(h.manager.store().is_empty().await);
}

#[tokio::test]
async fn test_available_tracks_lists_fresh() {
    let h = harness();
    add_english(&h.source);
    h.source.add_track(&video(), AvailableTrack::auto("de"), vec![]);

    let tracks = h.manager.available_tracks(VIDEO).await.unwrap();
    assert_eq!(tracks.len(), 2);
    assert!(tracks[1].is_auto_generated);
}

#[tokio::test]
async fn test_custom_name_used_for_artifacts() {
    let h = harness();
    add_english(&h.source);

    let job = h
        .manager
        .submit_sync(&request(&[ExportFormat::PlainText]).with_custom_name("Keynote: day 1"))
        .await
        .unwrap();
    let artifact = &job.artifacts[&ExportFormat::PlainText];
    assert_eq!(artifact.location, "mem://Keynote_ day 1.txt");
}
