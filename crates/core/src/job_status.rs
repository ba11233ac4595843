//! Job status reported by the dubbing service.
//!
//! The service sends a flat JSON object in which `error_message` and
//! `result_urls` are optional and, in principle, mutually exclusive. On the
//! client side that payload is folded into [`JobStatus`], whose
//! [`JobOutcome`] makes the invalid combinations unrepresentable. Fields the
//! client does not interpret are kept verbatim in [`JobStatus::metadata`] so
//! that schema additions on the server never break status decoding.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{JobId, ResultUrls, Timestamp};

// ---------------------------------------------------------------------------
// Wire status strings
// ---------------------------------------------------------------------------

/// Job accepted but not yet picked up by a worker.
pub const STATUS_QUEUED: &str = "queued";
/// Legacy spelling of [`STATUS_QUEUED`] still emitted by older deployments.
pub const STATUS_PENDING: &str = "pending";
/// Job is being processed.
pub const STATUS_RUNNING: &str = "running";
/// Job finished and produced results.
pub const STATUS_COMPLETED: &str = "completed";
/// Job terminated with an error.
pub const STATUS_FAILED: &str = "failed";

/// Reason reported when the service marks a job failed without a message.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Pipeline failed";

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Where a job stands, with the data that only exists in that state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum JobOutcome {
    Queued,
    Running,
    /// Finished; carries output kind to download URL.
    Completed(ResultUrls),
    /// Finished abnormally; carries the server's error message.
    Failed(String),
}

impl JobOutcome {
    /// Classify a wire status string plus its optional payloads.
    ///
    /// `completed` wins over a stray `error_message`; any other status with
    /// an `error_message` is treated as failed. Unknown strings are treated
    /// as still running so that new intermediate states keep polling.
    pub fn from_wire(
        status: &str,
        error_message: Option<String>,
        result_urls: Option<ResultUrls>,
    ) -> Self {
        match (status, error_message) {
            (STATUS_COMPLETED, _) => Self::Completed(result_urls.unwrap_or_default()),
            (_, Some(message)) => Self::Failed(message),
            (STATUS_FAILED, None) => Self::Failed(DEFAULT_FAILURE_MESSAGE.to_string()),
            (STATUS_QUEUED | STATUS_PENDING, None) => Self::Queued,
            _ => Self::Running,
        }
    }

    /// The canonical wire string for this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => STATUS_QUEUED,
            Self::Running => STATUS_RUNNING,
            Self::Completed(_) => STATUS_COMPLETED,
            Self::Failed(_) => STATUS_FAILED,
        }
    }

    /// Whether polling should stop at this outcome.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// One snapshot of a job as reported by `GET .../{job_id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "JobStatusWire")]
pub struct JobStatus {
    pub job_id: JobId,
    pub outcome: JobOutcome,
    /// Completion percentage (0-100), when the server reports one.
    pub progress_percentage: Option<f64>,
    /// Human-readable description of the current processing step.
    pub step_description: Option<String>,
    /// Coarse server-side phase (`preparation`, `processing`, `finalization`).
    pub stage: Option<String>,
    pub current_step_index: Option<u32>,
    pub processing_steps: Vec<String>,
    pub original_file_name: Option<String>,
    /// Set when the server waits for the user to review the transcription.
    pub review_required_url: Option<String>,
    pub created_at: Option<Timestamp>,
    pub updated_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    /// Fields this client does not interpret, kept for passthrough.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl JobStatus {
    /// Create a status with only the required fields set.
    pub fn new(job_id: impl Into<JobId>, outcome: JobOutcome) -> Self {
        Self {
            job_id: job_id.into(),
            outcome,
            progress_percentage: None,
            step_description: None,
            stage: None,
            current_step_index: None,
            processing_steps: Vec::new(),
            original_file_name: None,
            review_required_url: None,
            created_at: None,
            updated_at: None,
            completed_at: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Attach progress information.
    pub fn with_progress(mut self, percentage: f64, description: impl Into<String>) -> Self {
        self.progress_percentage = Some(percentage);
        self.step_description = Some(description.into());
        self
    }

    /// Result URLs, present only once the job completed.
    pub fn result_urls(&self) -> Option<&ResultUrls> {
        match &self.outcome {
            JobOutcome::Completed(urls) => Some(urls),
            _ => None,
        }
    }

    /// Error message, present only once the job failed.
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            JobOutcome::Failed(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome.is_terminal()
    }
}

/// Raw payload shape as sent by the service.
#[derive(Debug, Deserialize)]
struct JobStatusWire {
    job_id: JobId,
    status: String,
    #[serde(default)]
    progress_percentage: Option<f64>,
    #[serde(default)]
    step_description: Option<String>,
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    current_step_index: Option<u32>,
    #[serde(default)]
    processing_steps: Option<Vec<String>>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    result_urls: Option<ResultUrls>,
    #[serde(default)]
    original_file_name: Option<String>,
    #[serde(default)]
    review_required_url: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    completed_at: Option<String>,
    #[serde(flatten)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

impl From<JobStatusWire> for JobStatus {
    fn from(wire: JobStatusWire) -> Self {
        // An empty error string carries no information.
        let error_message = wire.error_message.filter(|m| !m.trim().is_empty());

        Self {
            outcome: JobOutcome::from_wire(&wire.status, error_message, wire.result_urls),
            job_id: wire.job_id,
            progress_percentage: wire.progress_percentage,
            step_description: wire.step_description,
            stage: wire.stage,
            current_step_index: wire.current_step_index,
            processing_steps: wire.processing_steps.unwrap_or_default(),
            original_file_name: wire.original_file_name,
            review_required_url: wire.review_required_url,
            created_at: wire.created_at.as_deref().and_then(parse_timestamp),
            updated_at: wire.updated_at.as_deref().and_then(parse_timestamp),
            completed_at: wire.completed_at.as_deref().and_then(parse_timestamp),
            metadata: wire.metadata,
        }
    }
}

/// Parse an RFC 3339 timestamp, falling back to a naive ISO 8601 value
/// interpreted as UTC. Unparseable values yield `None`.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
