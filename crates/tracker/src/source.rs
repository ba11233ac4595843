//! Where a polling session gets job status from, and where it sends refunds.

use async_trait::async_trait;
use dubflow_client::api::DubbingApi;
use dubflow_core::job_status::JobStatus;

/// Error type returned by a [`StatusSource`]. The poller only logs and
/// counts these, so any error will do.
pub type SourceError = Box<dyn std::error::Error + Send + Sync>;

/// Remote side of a polling session.
///
/// Implemented for [`DubbingApi`]; tests substitute scripted sources.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    /// Query the current status of `job_id`. Any error counts as a failed
    /// poll.
    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus, SourceError>;

    /// Ask for the job's charge to be refunded after an abnormal end.
    async fn request_refund(&self, job_id: &str) -> Result<(), SourceError>;
}

#[async_trait]
impl StatusSource for DubbingApi {
    async fn fetch_status(&self, job_id: &str) -> Result<JobStatus, SourceError> {
        Ok(DubbingApi::get_status(self, job_id).await?)
    }

    async fn request_refund(&self, job_id: &str) -> Result<(), SourceError> {
        let ack = DubbingApi::request_refund(self, job_id).await?;
        if !ack.success {
            return Err(format!("refund for job {job_id} was not accepted").into());
        }
        Ok(())
    }
}
