//! `dubflow-worker` -- follows a dubbing job until it finishes.
//!
//! Fetches the job's current status, rebuilds a workflow snapshot from it
//! and, while the job is still processing, polls the service and logs every
//! state change. Ctrl-C stops tracking without touching the job.
//!
//! # Usage
//!
//! ```text
//! dubflow-worker <JOB_ID>
//! ```
//!
//! # Environment variables
//!
//! | Variable                 | Required | Default                 | Description                      |
//! |--------------------------|----------|-------------------------|----------------------------------|
//! | `JOB_ID`                 | no       | --                      | Used when no argument is given   |
//! | `DUBBING_API_URL`        | no       | `http://localhost:8000` | Service base URL                 |
//! | `DUBBING_API_PREFIX`     | no       | `/api/uniframe`         | Path prefix of every endpoint    |
//! | `SESSION_TOKEN`          | no       | --                      | Bearer token                     |
//! | `POLL_INTERVAL_MS`       | no       | `3000`                  | Delay between status queries     |
//! | `MAX_CONSECUTIVE_ERRORS` | no       | `10`                    | Failed queries before giving up  |
//! | `MAX_TRACKING_SECS`      | no       | `86400`                 | Tracking ceiling per job         |

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dubflow_client::api::DubbingApi;
use dubflow_client::config::ApiConfig;
use dubflow_core::workflow::{Stage, WorkflowData, WorkflowState};
use dubflow_tracker::bridge::resume_workflow;
use dubflow_tracker::config::TrackerConfig;
use dubflow_tracker::poller::{SessionOutcome, StatusPoller};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dubflow_worker=info,dubflow_tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let job_id = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("JOB_ID").ok())
        .filter(|id| !id.trim().is_empty())
        .context("usage: dubflow-worker <JOB_ID> (or set JOB_ID)")?;

    let api_config = ApiConfig::from_env();
    let tracker_config = TrackerConfig::from_env();
    tracing::info!(
        job_id = %job_id,
        api = %api_config.endpoint(""),
        poll_interval_ms = tracker_config.poll_interval.as_millis() as u64,
        "Starting dubflow-worker",
    );

    let api = Arc::new(DubbingApi::new(api_config)?);
    let status = api
        .get_status(&job_id)
        .await
        .with_context(|| format!("failed to fetch status of job {job_id}"))?;

    let workflow = Arc::new(WorkflowState::new());
    workflow.load_existing_job(status);
    log_snapshot(&workflow.snapshot());

    if workflow.stage() != Stage::Processing {
        return finish(&workflow.snapshot());
    }

    let mut snapshots = workflow.subscribe();
    let poller = StatusPoller::new(api, tracker_config);
    let handle = resume_workflow(&poller, Arc::clone(&workflow), job_id)?;

    let cancel = handle.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, cancelling tracking");
            cancel();
        }
    });

    let session = handle.join();
    tokio::pin!(session);

    let report = loop {
        tokio::select! {
            report = &mut session => break report?,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break (&mut session).await?;
                }
                let data = snapshots.borrow_and_update().clone();
                log_snapshot(&data);
            }
        }
    };

    tracing::info!(
        job_id = %report.job_id,
        outcome = ?report.outcome,
        polls = report.polls,
        refund = ?report.refund,
        "Tracking finished",
    );

    if report.outcome == SessionOutcome::Cancelled {
        return Ok(());
    }
    finish(&workflow.snapshot())
}

fn log_snapshot(data: &WorkflowData) {
    let status = data.processing_status();
    tracing::info!(
        job_id = data.job_id().unwrap_or("-"),
        stage = %data.stage(),
        progress = status.and_then(|s| s.progress_percentage),
        step = status.and_then(|s| s.step_description.as_deref()),
        "Workflow updated",
    );
}

/// Report the terminal snapshot. A job that ended in `error` fails the
/// process.
fn finish(data: &WorkflowData) -> anyhow::Result<()> {
    match data.stage() {
        Stage::Completed => {
            for (kind, url) in data.result_urls().into_iter().flatten() {
                tracing::info!(kind = %kind, url = %url, "Result available");
            }
            Ok(())
        }
        Stage::Error => anyhow::bail!(
            "job {} failed: {}",
            data.job_id().unwrap_or("-"),
            data.error().unwrap_or("unknown error")
        ),
        stage => {
            tracing::warn!(stage = %stage, "Job is not in a terminal stage");
            Ok(())
        }
    }
}
