//! Drives a [`WorkflowState`] from a polling session.

use std::sync::Arc;

use dubflow_core::job_status::JobStatus;
use dubflow_core::types::JobId;
use dubflow_core::workflow::{Stage, WorkflowState};

use crate::poller::{PollerError, StatusPoller, TrackFailure, TrackHandle};

/// Move `workflow` into `processing` and keep it in sync with the job.
///
/// Every status update replaces the workflow's status snapshot; completion
/// stores the result URLs and failures (remote, too many errors, timeout)
/// move the workflow to `error`.
pub fn track_workflow(
    poller: &StatusPoller,
    workflow: Arc<WorkflowState>,
    job_id: impl Into<JobId>,
    initial: JobStatus,
) -> Result<TrackHandle, PollerError> {
    let job_id = job_id.into();
    workflow.start_processing(job_id.clone(), initial);
    resume_workflow(poller, workflow, job_id)
}

/// Keep tracking a workflow that is already `processing`, e.g. one rebuilt
/// with [`WorkflowState::load_existing_job`].
pub fn resume_workflow(
    poller: &StatusPoller,
    workflow: Arc<WorkflowState>,
    job_id: impl Into<JobId>,
) -> Result<TrackHandle, PollerError> {
    let job_id = job_id.into();
    debug_assert_eq!(workflow.stage(), Stage::Processing);

    let on_update = {
        let workflow = Arc::clone(&workflow);
        move |status: &JobStatus| workflow.update_status(status.clone())
    };
    let on_complete = {
        let workflow = Arc::clone(&workflow);
        move |status: JobStatus| {
            let urls = status.result_urls().cloned().unwrap_or_default();
            workflow.complete(urls);
        }
    };
    let on_error = move |failure: TrackFailure| {
        tracing::warn!(error = %failure, "Dubbing job did not complete");
        workflow.set_error(failure.to_string());
    };

    poller.track(job_id, on_update, on_complete, on_error)
}
