//! Status polling sessions.
//!
//! Each call to [`StatusPoller::track`] spawns one Tokio task that owns a
//! [`PollSession`] and runs an explicit loop: query, classify, sleep, repeat.
//! There is at most one outstanding query per session, and the next one is
//! only scheduled after the previous one resolved.
//!
//! ```text
//! Active --(retry scheduled)--> Active
//! Active --> Completed | Failed | TooManyErrors | TimedOut   (internal)
//! Active --> Cancelled                                       (TrackHandle::cancel)
//! ```
//!
//! Exactly one of `on_complete` / `on_error` fires per session, never after
//! cancellation. Abnormal endings issue a compensating refund first; its
//! result is logged and reported in the [`SessionReport`] but never changes
//! which callback fires.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dubflow_core::job_status::{JobOutcome, JobStatus};
use dubflow_core::types::JobId;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backoff::retry_delay;
use crate::clock::{Clock, TokioClock};
use crate::config::TrackerConfig;
use crate::source::StatusSource;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Why a session ended with `on_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackFailure {
    /// The service reported the job as failed.
    #[error("{0}")]
    Remote(String),

    /// Too many status queries failed in a row.
    #[error("too many consecutive errors ({attempts}): {last_error}")]
    TooManyErrors { attempts: u32, last_error: String },

    /// The job did not reach a terminal status within the duration ceiling.
    #[error("pipeline timeout: no terminal status within {}s", .limit.as_secs())]
    Timeout { limit: Duration },
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed,
    Failed,
    TooManyErrors,
    TimedOut,
    Cancelled,
}

/// Result of the compensating refund issued on abnormal termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    Acknowledged,
    Rejected(String),
    TimedOut,
}

/// Summary produced when a session task finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub job_id: JobId,
    pub outcome: SessionOutcome,
    /// Number of status queries issued, including a discarded in-flight one.
    pub polls: u32,
    /// Set only when a refund was attempted.
    pub refund: Option<RefundOutcome>,
}

/// Errors returned to the caller of [`StatusPoller::track`].
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    #[error("job_id must not be empty")]
    EmptyJobId,

    #[error("status tracking requires a running Tokio runtime")]
    NoRuntime,

    #[error("polling session for job {job_id} panicked: {message}")]
    SessionPanicked { job_id: JobId, message: String },
}

// ---------------------------------------------------------------------------
// StatusPoller
// ---------------------------------------------------------------------------

/// Spawns independent polling sessions against one [`StatusSource`].
///
/// Sessions share nothing but the source and the configuration; tracking
/// the same job twice concurrently is the caller's problem.
#[derive(Clone)]
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
}

impl StatusPoller {
    pub fn new(source: Arc<dyn StatusSource>, config: TrackerConfig) -> Self {
        Self {
            source,
            config,
            clock: Arc::new(TokioClock),
        }
    }

    /// Replace the clock used for the duration ceiling.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Start tracking `job_id` until it reaches a terminal outcome.
    ///
    /// The first query is issued immediately on the spawned task.
    /// `on_update` fires for every successful query, before any terminal
    /// callback of the same cycle. The returned handle cancels the session;
    /// dropping it leaves the session running.
    pub fn track<U, C, E>(
        &self,
        job_id: impl Into<JobId>,
        on_update: U,
        on_complete: C,
        on_error: E,
    ) -> Result<TrackHandle, PollerError>
    where
        U: FnMut(&JobStatus) + Send + 'static,
        C: FnOnce(JobStatus) + Send + 'static,
        E: FnOnce(TrackFailure) + Send + 'static,
    {
        let job_id = job_id.into();
        if job_id.trim().is_empty() {
            return Err(PollerError::EmptyJobId);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| PollerError::NoRuntime)?;

        let cancel = CancellationToken::new();
        let session = PollSession::new(job_id.clone(), self.clock.now());
        let ctx = SessionContext {
            source: Arc::clone(&self.source),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
            cancel: cancel.clone(),
        };

        let task = runtime.spawn(run_session(ctx, session, on_update, on_complete, on_error));

        Ok(TrackHandle {
            job_id,
            cancel,
            task,
        })
    }
}

// ---------------------------------------------------------------------------
// TrackHandle
// ---------------------------------------------------------------------------

/// Caller-owned capability to stop a polling session.
pub struct TrackHandle {
    job_id: JobId,
    cancel: CancellationToken,
    task: JoinHandle<SessionReport>,
}

impl TrackHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stop the session. Idempotent; never triggers a callback. A query
    /// already in flight is dropped and its result discarded.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!(job_id = %self.job_id, "Tracking cancelled");
        }
        self.cancel.cancel();
    }

    /// A detached cancel function, e.g. for a UI teardown hook.
    pub fn canceller(&self) -> impl Fn() + Send + Sync + 'static {
        let token = self.cancel.clone();
        move || token.cancel()
    }

    /// `false` once the session was cancelled or reached a terminal outcome.
    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Wait for the session task to finish.
    pub async fn join(self) -> Result<SessionReport, PollerError> {
        self.task.await.map_err(|e| PollerError::SessionPanicked {
            job_id: self.job_id,
            message: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Session internals
// ---------------------------------------------------------------------------

/// Mutable state of one tracking session. Owned by the session task.
struct PollSession {
    job_id: JobId,
    consecutive_errors: u32,
    started_at: Instant,
    polls: u32,
}

impl PollSession {
    fn new(job_id: JobId, started_at: Instant) -> Self {
        Self {
            job_id,
            consecutive_errors: 0,
            started_at,
            polls: 0,
        }
    }

    fn report(self, outcome: SessionOutcome, refund: Option<RefundOutcome>) -> SessionReport {
        SessionReport {
            job_id: self.job_id,
            outcome,
            polls: self.polls,
            refund,
        }
    }
}

/// Shared collaborators handed to a session task.
struct SessionContext {
    source: Arc<dyn StatusSource>,
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

/// Why the poll loop stopped.
enum Terminal {
    Cancelled,
    Completed(JobStatus),
    Abnormal(SessionOutcome, TrackFailure),
}

async fn run_session<U, C, E>(
    ctx: SessionContext,
    mut session: PollSession,
    mut on_update: U,
    on_complete: C,
    on_error: E,
) -> SessionReport
where
    U: FnMut(&JobStatus) + Send + 'static,
    C: FnOnce(JobStatus) + Send + 'static,
    E: FnOnce(TrackFailure) + Send + 'static,
{
    tracing::info!(job_id = %session.job_id, "Tracking job status");

    let terminal = poll_until_terminal(&ctx, &mut session, &mut on_update).await;

    // The session is no longer active, whatever the reason.
    ctx.cancel.cancel();

    match terminal {
        Terminal::Cancelled => {
            tracing::debug!(job_id = %session.job_id, polls = session.polls, "Session cancelled");
            session.report(SessionOutcome::Cancelled, None)
        }
        Terminal::Completed(status) => {
            tracing::info!(job_id = %session.job_id, polls = session.polls, "Job completed");
            on_complete(status);
            session.report(SessionOutcome::Completed, None)
        }
        Terminal::Abnormal(outcome, failure) => {
            tracing::warn!(
                job_id = %session.job_id,
                polls = session.polls,
                reason = %failure,
                "Job ended abnormally, requesting refund",
            );
            let (refund, started) = spawn_refund(
                Arc::clone(&ctx.source),
                session.job_id.clone(),
                ctx.config.request_timeout,
            );
            // Only the first poll of the refund call is awaited, never its result.
            let _ = started.await;
            on_error(failure);

            let refund = refund.await.unwrap_or_else(|e| {
                RefundOutcome::Rejected(format!("refund task failed: {e}"))
            });
            session.report(outcome, Some(refund))
        }
    }
}

/// The poll loop proper. Returns as soon as the session must stop.
async fn poll_until_terminal<U>(
    ctx: &SessionContext,
    session: &mut PollSession,
    on_update: &mut U,
) -> Terminal
where
    U: FnMut(&JobStatus),
{
    let config = &ctx.config;

    loop {
        if ctx.cancel.is_cancelled() {
            return Terminal::Cancelled;
        }

        let elapsed = ctx.clock.now().saturating_duration_since(session.started_at);
        if elapsed > config.max_tracking_duration {
            return Terminal::Abnormal(
                SessionOutcome::TimedOut,
                TrackFailure::Timeout {
                    limit: config.max_tracking_duration,
                },
            );
        }

        session.polls += 1;
        let result = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Terminal::Cancelled,
            r = tokio::time::timeout(config.request_timeout, ctx.source.fetch_status(&session.job_id)) => r,
        };

        // A result that arrives after cancellation is discarded.
        if ctx.cancel.is_cancelled() {
            return Terminal::Cancelled;
        }

        let query_error = match result {
            Ok(Ok(status)) => {
                session.consecutive_errors = 0;
                on_update(&status);

                // `on_update` may itself cancel the session.
                if ctx.cancel.is_cancelled() {
                    return Terminal::Cancelled;
                }

                match &status.outcome {
                    JobOutcome::Completed(_) => return Terminal::Completed(status),
                    JobOutcome::Failed(message) => {
                        return Terminal::Abnormal(
                            SessionOutcome::Failed,
                            TrackFailure::Remote(message.clone()),
                        );
                    }
                    JobOutcome::Queued | JobOutcome::Running => None,
                }
            }
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "status request timed out after {}s",
                config.request_timeout.as_secs()
            )),
        };

        let delay = match query_error {
            None => config.poll_interval,
            Some(last_error) => {
                session.consecutive_errors += 1;
                let attempts = session.consecutive_errors;

                if attempts >= config.max_consecutive_errors {
                    return Terminal::Abnormal(
                        SessionOutcome::TooManyErrors,
                        TrackFailure::TooManyErrors {
                            attempts,
                            last_error,
                        },
                    );
                }

                let delay = retry_delay(attempts, config);
                tracing::warn!(
                    job_id = %session.job_id,
                    attempt = attempts,
                    max_attempts = config.max_consecutive_errors,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "Status check failed, retrying",
                );
                delay
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Terminal::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Fire the compensating refund on its own task so `on_error` never waits
/// for it. Failures are logged and folded into the returned outcome.
///
/// The returned receiver resolves once the refund request has been issued,
/// i.e. after its first poll.
fn spawn_refund(
    source: Arc<dyn StatusSource>,
    job_id: JobId,
    timeout: Duration,
) -> (JoinHandle<RefundOutcome>, oneshot::Receiver<()>) {
    let (started_tx, started_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut request = Box::pin(tokio::time::timeout(timeout, source.request_refund(&job_id)));
        let mut started_tx = Some(started_tx);
        let result = std::future::poll_fn(|cx| {
            let poll = request.as_mut().poll(cx);
            if let Some(tx) = started_tx.take() {
                let _ = tx.send(());
            }
            poll
        })
        .await;

        match result {
            Ok(Ok(())) => {
                tracing::info!(job_id = %job_id, "Refund processed");
                RefundOutcome::Acknowledged
            }
            Ok(Err(e)) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to refund job");
                RefundOutcome::Rejected(e.to_string())
            }
            Err(_) => {
                tracing::error!(job_id = %job_id, "Refund request timed out");
                RefundOutcome::TimedOut
            }
        }
    });

    (task, started_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;

    /// Source that is never expected to be queried.
    struct Never;

    #[async_trait::async_trait]
    impl StatusSource for Never {
        async fn fetch_status(&self, _: &str) -> Result<JobStatus, SourceError> {
            Err("unreachable".into())
        }
        async fn request_refund(&self, _: &str) -> Result<(), SourceError> {
            Ok(())
        }
    }

    fn never_poller() -> StatusPoller {
        StatusPoller::new(Arc::new(Never), TrackerConfig::default())
    }

    #[test]
    fn failure_messages() {
        assert_eq!(TrackFailure::Remote("no audio".into()).to_string(), "no audio");
        assert_eq!(
            TrackFailure::TooManyErrors {
                attempts: 10,
                last_error: "connection refused".into()
            }
            .to_string(),
            "too many consecutive errors (10): connection refused"
        );
        assert_eq!(
            TrackFailure::Timeout {
                limit: Duration::from_secs(86_400)
            }
            .to_string(),
            "pipeline timeout: no terminal status within 86400s"
        );
    }

    #[test]
    fn track_outside_runtime_is_rejected() {
        let result = never_poller().track("job-1", |_| {}, |_| {}, |_| {});
        assert!(matches!(result, Err(PollerError::NoRuntime)));
    }

    #[tokio::test]
    async fn empty_job_id_is_rejected() {
        let result = never_poller().track("  ", |_| {}, |_| {}, |_| {});
        assert!(matches!(result, Err(PollerError::EmptyJobId)));
    }
}
