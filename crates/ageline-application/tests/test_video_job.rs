mod common;

use ageline_core::job::{AssemblyStage, JobStatus};
use ageline_core::session::{BackgroundMode, PairKey};
use common::{Harness, HarnessOptions};
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_end_to_end_flat_session() {
    let harness = Harness::new();
    let session = harness.create_session(&[0, 7, 12], BackgroundMode::Flat).await;
    let id = session.session_id.clone();

    let frames = harness.run_frames(&id).await;
    assert_eq!(frames.status, JobStatus::Completed);
    assert_eq!(frames.frames.len(), 3);

    // A clip left over from an older age list
    let stray = harness.paths.transition_path(&id, PairKey::new(3, 4));
    std::fs::create_dir_all(stray.parent().unwrap()).unwrap();
    std::fs::write(&stray, b"old clip").unwrap();

    let video = harness.run_video(&id, Some(6.0)).await;
    assert_eq!(video.status, JobStatus::Completed, "{:?}", video.error);
    assert_eq!(video.stage, AssemblyStage::Done);
    assert_eq!(video.progress.completed, video.progress.total);

    let keys: Vec<String> = video.transitions.iter().map(|t| t.key().to_string()).collect();
    assert_eq!(keys, vec!["0-7", "7-12"]);

    // Both clips came from speculation, none were generated twice
    assert_eq!(harness.transitions.calls().len(), 2);
    assert_eq!(video.reused_pairs, vec![PairKey::new(0, 7), PairKey::new(7, 12)]);

    let requests = harness.transcoder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].inputs,
        vec![
            harness.paths.transition_path(&id, PairKey::new(0, 7)),
            harness.paths.transition_path(&id, PairKey::new(7, 12)),
        ]
    );
    assert_eq!(requests[0].output, harness.paths.final_video_path(&id));
    assert_eq!((requests[0].width, requests[0].height), (720, 1280));

    // Two 5s clips brought down to 6s
    let final_video = video.final_video.clone().unwrap();
    assert!((final_video.duration_secs - 6.0).abs() < 1e-9);
    assert!((final_video.speed_factor - 10.0 / 6.0).abs() < 1e-9);
    assert!((requests[0].speed_factor - final_video.speed_factor).abs() < 1e-9);

    let manifest = harness.manifest(&id).await;
    assert_eq!(manifest.transitions.len(), 2);
    assert_eq!(manifest.final_video, Some(final_video));
    assert!(manifest.check_invariants().is_ok());
    assert!(harness.paths.final_video_path(&id).exists());
    assert!(!stray.exists());

    let restored = harness.usecase.video_status_from_manifest(&id).await.unwrap();
    assert_eq!(restored.status, JobStatus::Completed);
    assert_eq!(restored.stage, AssemblyStage::Done);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_missing_clip_is_regenerated_despite_record() {
    let harness = Harness::new();
    let session = harness.create_session(&[0, 7, 12], BackgroundMode::Flat).await;
    let id = session.session_id.clone();

    harness.run_frames(&id).await;
    harness.wait_for_speculative(&id).await;
    std::fs::remove_file(harness.paths.transition_path(&id, PairKey::new(0, 7))).unwrap();

    let video = harness.run_video(&id, None).await;
    assert_eq!(video.status, JobStatus::Completed, "{:?}", video.error);
    assert_eq!(video.reused_pairs, vec![PairKey::new(7, 12)]);

    let calls = harness.transitions.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2], PairKey::new(0, 7));
    assert!(harness.paths.transition_path(&id, PairKey::new(0, 7)).exists());

    // Default 20s request capped at the 10s of source material
    let final_video = video.final_video.unwrap();
    assert_eq!(final_video.speed_factor, 1.0);
    assert_eq!(final_video.duration_secs, 10.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_speculation_is_generated_on_demand() {
    let harness = Harness::new();
    harness.transitions.fail_pair(PairKey::new(7, 12));
    let session = harness.create_session(&[0, 7, 12], BackgroundMode::Flat).await;
    let id = session.session_id.clone();

    harness.run_frames(&id).await;
    harness.wait_for_speculative(&id).await;
    harness.transitions.clear_failures();

    let video = harness.run_video(&id, Some(8.0)).await;
    assert_eq!(video.status, JobStatus::Completed, "{:?}", video.error);
    assert_eq!(video.reused_pairs, vec![PairKey::new(0, 7)]);
    assert_eq!(video.transitions.len(), 2);
    assert_eq!(harness.transitions.calls().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_on_demand_failure_fails_job_and_keeps_successes() {
    let harness = Harness::new();
    harness.transitions.fail_pair(PairKey::new(7, 12));
    let session = harness.create_session(&[0, 7, 12], BackgroundMode::Flat).await;
    let id = session.session_id.clone();

    harness.run_frames(&id).await;
    let video = harness.run_video(&id, None).await;

    assert_eq!(video.status, JobStatus::Failed);
    assert!(video.error.as_deref().unwrap().contains("7-12"));
    assert!(harness.transcoder.requests().is_empty());

    let manifest = harness.manifest(&id).await;
    assert_eq!(manifest.frames.len(), 3);
    assert_eq!(manifest.transitions.len(), 1);
    assert_eq!(manifest.transitions[0].key(), PairKey::new(0, 7));
    assert!(manifest.final_video.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_assembly_failure_fails_job_with_stderr() {
    let harness = Harness::new();
    harness.transcoder.set_failing(true);
    let session = harness.create_session(&[0, 7, 12], BackgroundMode::Flat).await;
    let id = session.session_id.clone();

    harness.run_frames(&id).await;
    let video = harness.run_video(&id, None).await;

    assert_eq!(video.status, JobStatus::Failed);
    assert_eq!(video.stage, AssemblyStage::Finalizing);
    let error = video.error.unwrap();
    assert!(error.contains("Assembly failed"));
    assert!(error.contains("Invalid filter graph"));

    let manifest = harness.manifest(&id).await;
    assert_eq!(manifest.transitions.len(), 2);
    assert!(manifest.final_video.is_none());

    harness.transcoder.set_failing(false);
    let retry = harness.run_video(&id, None).await;
    assert_eq!(retry.status, JobStatus::Completed);
    assert_eq!(retry.reused_pairs.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_video_job_conflicts_while_first_runs() {
    let harness = Harness::with_options(HarnessOptions {
        assembly_delay: Duration::from_millis(300),
        ..HarnessOptions::default()
    });
    let session = harness.create_session(&[0, 7, 12], BackgroundMode::Flat).await;
    let id = session.session_id.clone();
    harness.run_frames(&id).await;

    let first = harness.usecase.start_video_job(&id, None).await.unwrap();
    let err = harness.usecase.start_video_job(&id, None).await.unwrap_err();
    assert!(err.is_conflict());

    let snapshot = harness.wait_for_video_job(&first.job_id).await;
    assert_eq!(snapshot.status, JobStatus::Completed);

    // Once the first finished, a new request is accepted
    let again = harness.run_video(&id, None).await;
    assert_eq!(again.status, JobStatus::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_video_job_requires_every_frame() {
    let harness = Harness::new();
    let session = harness.create_session(&[0, 7, 12], BackgroundMode::Flat).await;

    let err = harness
        .usecase
        .start_video_job(&session.session_id, None)
        .await
        .unwrap_err();
    assert!(err.is_invalid_state());
    assert!(harness.usecase.registries().active_video_job(&session.session_id).is_none());

    let restored = harness
        .usecase
        .video_status_from_manifest(&session.session_id)
        .await
        .unwrap();
    assert_eq!(restored.status, JobStatus::Failed);
    assert!(restored.final_video.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_age_session_cannot_be_assembled() {
    let harness = Harness::new();
    let session = harness.create_session(&[30], BackgroundMode::Narrative).await;
    harness.run_frames(&session.session_id).await;

    let err = harness
        .usecase
        .start_video_job(&session.session_id, None)
        .await
        .unwrap_err();
    assert!(err.is_invalid_state());
}

#[tokio::test]
async fn test_non_positive_duration_is_rejected() {
    let harness = Harness::new();
    let session = harness.create_session(&[0, 7], BackgroundMode::Narrative).await;

    for duration in [0.0, -3.0, f64::NAN] {
        let err = harness
            .usecase
            .start_video_job(&session.session_id, Some(duration))
            .await
            .unwrap_err();
        assert!(err.is_invalid_state());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_speculation_past_the_wait_is_generated_on_demand() {
    let harness = Harness::with_options(HarnessOptions {
        max_concurrent_transitions: 2,
        transition_delay: Duration::from_millis(400),
        speculative_wait_secs: 0,
        ..HarnessOptions::default()
    });
    let session = harness.create_session(&[0, 7, 12], BackgroundMode::Flat).await;
    let id = session.session_id.clone();

    harness.run_frames(&id).await;
    let frame_job = harness.usecase.registries().latest_frame_job(&id).unwrap();
    assert!(frame_job.scheduler().pending_count() > 0);

    let video = harness.run_video(&id, None).await;
    assert_eq!(video.status, JobStatus::Completed, "{:?}", video.error);
    assert!(video.reused_pairs.is_empty());
    assert_eq!(video.transitions.len(), 2);
    assert_eq!(harness.transitions.calls().len(), 4);

    // On-demand calls waited for the speculative ones to free their permits
    assert!(harness.transitions.peak() <= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_frame_job_conflicts_while_video_job_runs() {
    let harness = Harness::with_options(HarnessOptions {
        assembly_delay: Duration::from_millis(300),
        ..HarnessOptions::default()
    });
    let session = harness.create_session(&[0, 7], BackgroundMode::Narrative).await;
    let id = session.session_id.clone();
    harness.run_frames(&id).await;

    let ticket = harness.usecase.start_video_job(&id, None).await.unwrap();
    let err = harness.usecase.start_frame_job(&id).await.unwrap_err();
    assert!(err.is_conflict());

    let video = harness.wait_for_video_job(&ticket.job_id).await;
    assert_eq!(video.status, JobStatus::Completed);
    assert!(harness.usecase.start_frame_job(&id).await.is_ok());
}
