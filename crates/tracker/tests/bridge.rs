mod common;

use std::sync::Arc;

use dubflow_core::job_status::{JobOutcome, JobStatus};
use dubflow_core::workflow::{Stage, StagePolicy, WorkflowState};
use dubflow_tracker::bridge::{resume_workflow, track_workflow};
use dubflow_tracker::config::TrackerConfig;
use dubflow_tracker::poller::{SessionOutcome, StatusPoller};
use dubflow_tracker::source::StatusSource;

use common::{completed, failed, running, ScriptedSource, Step};

fn poller_for(source: &Arc<ScriptedSource>) -> StatusPoller {
    let source: Arc<dyn StatusSource> = source.clone();
    StatusPoller::new(source, TrackerConfig::default())
}

/// A workflow that went through upload and configuration.
fn configured_workflow() -> Arc<WorkflowState> {
    let workflow = Arc::new(WorkflowState::with_policy(StagePolicy::Strict));
    workflow.start_upload("talk.mp4");
    workflow.set_upload_progress(60);
    workflow.upload_complete("https://storage/talk.mp4", "job-1");
    workflow
}

#[tokio::test(start_paused = true)]
async fn completed_job_lands_in_completed_stage() {
    let source = Arc::new(ScriptedSource::new(
        vec![running(), running()],
        completed("video", "https://cdn/talk.es.mp4"),
    ));
    let workflow = configured_workflow();
    let mut observed = workflow.subscribe();

    let handle = track_workflow(
        &poller_for(&source),
        Arc::clone(&workflow),
        "job-1",
        JobStatus::new("job-1", JobOutcome::Queued),
    )
    .unwrap();

    observed.changed().await.unwrap();
    assert_eq!(observed.borrow_and_update().stage(), Stage::Processing);

    let report = handle.join().await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Completed);

    let data = workflow.snapshot();
    assert_eq!(data.stage(), Stage::Completed);
    assert_eq!(data.result_urls().unwrap()["video"], "https://cdn/talk.es.mp4");
    assert_eq!(data.error(), None);
    assert!(matches!(
        data.processing_status().map(|s| &s.outcome),
        Some(JobOutcome::Completed(_))
    ));
    assert_eq!(data.original_file_name(), Some("talk.mp4"));
}

#[tokio::test(start_paused = true)]
async fn failed_job_lands_in_error_stage() {
    let source = Arc::new(ScriptedSource::new(vec![running()], failed("no speech detected")));
    let workflow = configured_workflow();

    let handle = track_workflow(
        &poller_for(&source),
        Arc::clone(&workflow),
        "job-1",
        JobStatus::new("job-1", JobOutcome::Queued),
    )
    .unwrap();
    handle.join().await.unwrap();

    let data = workflow.snapshot();
    assert_eq!(data.stage(), Stage::Error);
    assert_eq!(data.error(), Some("no speech detected"));
    assert_eq!(data.result_urls(), None);
    assert_eq!(source.refunds(), vec!["job-1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn unreachable_service_surfaces_error_text() {
    let source = Arc::new(ScriptedSource::new(vec![], Step::Fail("connection reset")));
    let workflow = configured_workflow();

    let handle = track_workflow(
        &poller_for(&source),
        Arc::clone(&workflow),
        "job-1",
        JobStatus::new("job-1", JobOutcome::Queued),
    )
    .unwrap();
    handle.join().await.unwrap();

    let data = workflow.snapshot();
    assert_eq!(data.stage(), Stage::Error);
    assert_eq!(
        data.error(),
        Some("too many consecutive errors (10): connection reset")
    );
}

#[tokio::test(start_paused = true)]
async fn resumed_job_keeps_loaded_flag() {
    let source = Arc::new(ScriptedSource::new(vec![], completed("video", "u")));
    let workflow = Arc::new(WorkflowState::with_policy(StagePolicy::Strict));
    workflow.load_existing_job(JobStatus::new("job-9", JobOutcome::Running));
    assert_eq!(workflow.stage(), Stage::Processing);

    let handle = resume_workflow(&poller_for(&source), Arc::clone(&workflow), "job-9").unwrap();
    handle.join().await.unwrap();

    let data = workflow.snapshot();
    assert_eq!(data.stage(), Stage::Completed);
    assert!(data.is_loaded_job());
    assert_eq!(data.job_id(), Some("job-9"));
}

#[tokio::test(start_paused = true)]
async fn cancelled_tracking_leaves_workflow_processing() {
    let source = Arc::new(ScriptedSource::new(vec![], running()));
    let workflow = configured_workflow();

    let handle = track_workflow(
        &poller_for(&source),
        Arc::clone(&workflow),
        "job-1",
        JobStatus::new("job-1", JobOutcome::Queued),
    )
    .unwrap();

    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    handle.cancel();
    let report = handle.join().await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Cancelled);
    assert_eq!(workflow.stage(), Stage::Processing);
    assert!(source.refunds().is_empty());
}
