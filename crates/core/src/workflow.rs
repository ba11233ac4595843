//! Client-visible lifecycle of one dubbing job.
//!
//! [`WorkflowState`] owns a [`WorkflowData`] snapshot behind a
//! [`tokio::sync::watch`] channel. Every transition rewrites the snapshot
//! under the channel's write lock, so observers obtained through
//! [`WorkflowState::subscribe`] only ever see complete records.
//!
//! ```text
//! idle -> uploading -> configuring -> processing -> completed
//!   ^         (any) --------------------------------> error
//!   +---------------------- reset (from any) ------------+
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::catalog::{VoiceProvider, DEFAULT_VOICE_ID, DEFAULT_VOICE_PROVIDER};
use crate::error::CoreError;
use crate::job_status::{JobOutcome, JobStatus};
use crate::types::{JobId, ResultUrls};

/// File name recorded when a rehydrated job does not report one.
pub const UNKNOWN_FILE_NAME: &str = "Unknown file";

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Idle,
    Uploading,
    Configuring,
    Processing,
    Completed,
    Error,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Configuring => "configuring",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether the voice configuration carries meaning in this stage.
    pub fn has_configuration(self) -> bool {
        matches!(self, Self::Configuring | Self::Processing | Self::Completed)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Voice and language settings chosen during the `configuring` stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub target_language: Option<String>,
    pub source_language: Option<String>,
    pub voice_provider: Option<VoiceProvider>,
    pub voice_id: Option<String>,
    /// Comma-separated hints that improve transcription of names and jargon.
    pub transcription_keywords: Option<String>,
}

impl VoiceConfig {
    /// Configuration applied when an upload completes.
    pub fn with_defaults() -> Self {
        Self {
            voice_provider: Some(DEFAULT_VOICE_PROVIDER),
            voice_id: Some(DEFAULT_VOICE_ID.to_string()),
            ..Default::default()
        }
    }

    /// Overwrite the fields present in `patch`, keep the rest.
    pub fn merge(&mut self, patch: ConfigPatch) {
        if let Some(v) = patch.target_language {
            self.target_language = Some(v);
        }
        if let Some(v) = patch.source_language {
            self.source_language = Some(v);
        }
        if let Some(v) = patch.voice_provider {
            self.voice_provider = Some(v);
        }
        if let Some(v) = patch.voice_id {
            self.voice_id = Some(v);
        }
        if let Some(v) = patch.transcription_keywords {
            self.transcription_keywords = Some(v);
        }
    }
}

/// Partial update for [`VoiceConfig`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub target_language: Option<String>,
    pub source_language: Option<String>,
    pub voice_provider: Option<VoiceProvider>,
    pub voice_id: Option<String>,
    pub transcription_keywords: Option<String>,
}

// ---------------------------------------------------------------------------
// WorkflowData
// ---------------------------------------------------------------------------

/// Immutable snapshot of the workflow. Only [`WorkflowState`] produces these.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowData {
    stage: Stage,
    original_file_name: Option<String>,
    upload_progress: Option<u8>,
    video_url: Option<String>,
    job_id: Option<JobId>,
    configuration: VoiceConfig,
    processing_status: Option<JobStatus>,
    result_urls: Option<ResultUrls>,
    error: Option<String>,
    is_loaded_job: bool,
}

impl WorkflowData {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn original_file_name(&self) -> Option<&str> {
        self.original_file_name.as_deref()
    }

    /// Upload progress in percent (0-100).
    pub fn upload_progress(&self) -> Option<u8> {
        self.upload_progress
    }

    /// Storage URL of the uploaded source video.
    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Voice configuration, `None` outside the stages where it applies.
    pub fn configuration(&self) -> Option<&VoiceConfig> {
        self.stage.has_configuration().then_some(&self.configuration)
    }

    /// Latest status received from the service.
    pub fn processing_status(&self) -> Option<&JobStatus> {
        self.processing_status.as_ref()
    }

    pub fn result_urls(&self) -> Option<&ResultUrls> {
        self.result_urls.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether this snapshot was rebuilt from a previously known job.
    pub fn is_loaded_job(&self) -> bool {
        self.is_loaded_job
    }
}

// ---------------------------------------------------------------------------
// Stage policy
// ---------------------------------------------------------------------------

/// What to do when an operation is invoked from a stage it is not valid in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicy {
    /// Panic. Out-of-order calls are programmer errors.
    Strict,
    /// Log a warning and leave the snapshot unchanged.
    Lenient,
}

impl Default for StagePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowState
// ---------------------------------------------------------------------------

/// Finite-state machine for one in-progress job as seen by the client.
///
/// All operations take `&self`; share the state behind an `Arc` to drive it
/// from poller callbacks while the UI holds a [`watch::Receiver`].
#[derive(Debug)]
pub struct WorkflowState {
    tx: watch::Sender<WorkflowData>,
    policy: StagePolicy,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowState {
    /// Create an idle workflow with the build-dependent default policy.
    pub fn new() -> Self {
        Self::with_policy(StagePolicy::default())
    }

    pub fn with_policy(policy: StagePolicy) -> Self {
        let (tx, _) = watch::channel(WorkflowData::default());
        Self { tx, policy }
    }

    /// Receive every future snapshot; the current one is marked as seen.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowData> {
        self.tx.subscribe()
    }

    /// Clone of the current snapshot.
    pub fn snapshot(&self) -> WorkflowData {
        self.tx.borrow().clone()
    }

    pub fn stage(&self) -> Stage {
        self.tx.borrow().stage
    }

    // ---- transitions ----

    /// Begin uploading a new file. Discards everything about a prior job.
    pub fn start_upload(&self, original_file_name: impl Into<String>) {
        let original_file_name = original_file_name.into();
        self.transition("start_upload", None, |data| {
            *data = WorkflowData {
                stage: Stage::Uploading,
                original_file_name: Some(original_file_name),
                upload_progress: Some(0),
                ..Default::default()
            };
        });
    }

    /// Record upload progress, clamped to 100.
    pub fn set_upload_progress(&self, percent: u8) {
        self.transition("set_upload_progress", Some(&[Stage::Uploading]), |data| {
            data.upload_progress = Some(percent.min(100));
        });
    }

    /// Upload finished: remember where the video lives and which job it
    /// belongs to, then open configuration with default voice settings.
    pub fn upload_complete(&self, video_url: impl Into<String>, job_id: impl Into<JobId>) {
        let video_url = video_url.into();
        let job_id = job_id.into();
        self.transition("upload_complete", Some(&[Stage::Uploading]), |data| {
            data.stage = Stage::Configuring;
            data.upload_progress = Some(100);
            data.video_url = Some(video_url);
            data.job_id = Some(job_id);
            data.configuration = VoiceConfig::with_defaults();
        });
    }

    pub fn update_config(&self, patch: ConfigPatch) {
        self.transition("update_config", Some(&[Stage::Configuring]), |data| {
            data.configuration.merge(patch);
        });
    }

    /// The job was started on the service; polling begins.
    pub fn start_processing(&self, job_id: impl Into<JobId>, status: JobStatus) {
        let job_id = job_id.into();
        self.transition("start_processing", Some(&[Stage::Configuring]), |data| {
            data.stage = Stage::Processing;
            data.job_id = Some(job_id);
            data.processing_status = Some(status);
        });
    }

    pub fn update_status(&self, status: JobStatus) {
        self.transition("update_status", Some(&[Stage::Processing]), |data| {
            data.processing_status = Some(status);
        });
    }

    pub fn complete(&self, result_urls: ResultUrls) {
        self.transition("complete", Some(&[Stage::Processing]), |data| {
            data.stage = Stage::Completed;
            data.result_urls = Some(result_urls);
            data.error = None;
        });
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.transition("set_error", None, |data| {
            data.stage = Stage::Error;
            data.error = Some(message);
            data.result_urls = None;
        });
    }

    /// Rebuild the snapshot from a status fetched for an existing job, e.g.
    /// when a session resumes after a reload.
    pub fn load_existing_job(&self, status: JobStatus) {
        self.transition("load_existing_job", None, |data| {
            let (stage, result_urls, error) = match &status.outcome {
                JobOutcome::Completed(urls) => (Stage::Completed, Some(urls.clone()), None),
                JobOutcome::Failed(message) => (Stage::Error, None, Some(message.clone())),
                JobOutcome::Queued | JobOutcome::Running => (Stage::Processing, None, None),
            };

            *data = WorkflowData {
                stage,
                original_file_name: Some(
                    status
                        .original_file_name
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_FILE_NAME.to_string()),
                ),
                job_id: Some(status.job_id.clone()),
                processing_status: Some(status),
                result_urls,
                error,
                is_loaded_job: true,
                ..Default::default()
            };
        });
    }

    pub fn reset(&self) {
        self.transition("reset", None, |data| {
            *data = WorkflowData::default();
        });
    }

    // ---- private helpers ----

    /// Apply `apply` atomically if the current stage is in `allowed`
    /// (`None` = any stage). Observers are notified only on change.
    fn transition(
        &self,
        operation: &'static str,
        allowed: Option<&[Stage]>,
        apply: impl FnOnce(&mut WorkflowData),
    ) {
        let mut rejected_from = None;

        self.tx.send_if_modified(|data| {
            if let Some(allowed) = allowed {
                if !allowed.contains(&data.stage) {
                    rejected_from = Some(data.stage);
                    return false;
                }
            }
            apply(data);
            true
        });

        // Outside the closure so a Strict panic never happens under the lock.
        if let Some(from) = rejected_from {
            let err = CoreError::InvalidTransition { operation, from };
            match self.policy {
                StagePolicy::Strict => panic!("{err}"),
                StagePolicy::Lenient => {
                    tracing::warn!(operation, stage = %from, "Ignoring out-of-order workflow transition");
                }
            }
        } else {
            tracing::debug!(operation, stage = %self.stage(), "Workflow transition applied");
        }
    }
}
