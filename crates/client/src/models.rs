//! Request and response bodies exchanged with the dubbing service.

use dubflow_core::catalog::VoiceProvider;
use dubflow_core::error::CoreError;
use dubflow_core::job_status::{parse_timestamp, JobOutcome, JobStatus};
use dubflow_core::types::JobId;
use dubflow_core::validation::validate_voice_config;
use dubflow_core::workflow::VoiceConfig;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Body of `POST /dubbing/prepare`.
#[derive(Debug, Clone, Serialize)]
pub struct PrepareUploadRequest {
    /// Storage-safe file name chosen by the client.
    pub system_file_name: String,
    pub original_file_name: String,
    pub content_type: String,
    pub video_duration_seconds: f64,
}

/// Upload slot and cost estimate for a new job.
#[derive(Debug, Clone, Deserialize)]
pub struct PrepareUploadResponse {
    pub job_id: JobId,
    /// Pre-signed URL the raw bytes are `PUT` to.
    pub upload_url: String,
    /// Where the video will be readable once uploaded.
    pub video_s3_url: String,
    /// Seconds until `upload_url` expires.
    pub expires_in: u64,
    pub estimated_cost_usd: f64,
    pub video_duration_seconds: f64,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Body of `POST /dubbing/start`.
#[derive(Debug, Clone, Serialize)]
pub struct StartPipelineRequest {
    pub job_id: JobId,
    pub video_url: String,
    pub target_language: String,
    pub tts_provider: VoiceProvider,
    pub tts_voice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription_keywords: Option<String>,
}

impl StartPipelineRequest {
    /// Build a request from a validated workflow configuration.
    pub fn from_config(
        job_id: impl Into<JobId>,
        video_url: impl Into<String>,
        config: &VoiceConfig,
    ) -> Result<Self, CoreError> {
        validate_voice_config(config)?;

        // validate_voice_config guarantees the three required fields.
        let (Some(target_language), Some(tts_provider), Some(tts_voice)) = (
            config.target_language.clone(),
            config.voice_provider,
            config.voice_id.clone(),
        ) else {
            return Err(CoreError::Validation("Incomplete voice configuration".into()));
        };

        Ok(Self {
            job_id: job_id.into(),
            video_url: video_url.into(),
            target_language,
            tts_provider,
            tts_voice,
            source_language: config.source_language.clone().filter(|s| !s.is_empty()),
            transcription_keywords: config
                .transcription_keywords
                .clone()
                .filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Acknowledgement of a started pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct StartPipelineResponse {
    pub job_id: JobId,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl StartPipelineResponse {
    /// Status snapshot to seed the workflow with before the first poll.
    pub fn initial_status(&self) -> JobStatus {
        let mut status = JobStatus::new(
            self.job_id.clone(),
            JobOutcome::from_wire(&self.status, None, None),
        );
        status.created_at = self.created_at.as_deref().and_then(parse_timestamp);
        status
    }
}

/// Acknowledgement of `POST /user/refund/{job_id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefundAck {
    #[serde(default)]
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A job from the user's history.
#[derive(Debug, Clone, Deserialize)]
pub struct UserJob {
    pub job_id: JobId,
    pub original_file_name: String,
    pub status: String,
    pub created_at: String,
}

/// Funds and concurrency quota of the current user.
#[derive(Debug, Clone, Deserialize)]
pub struct UserBalance {
    pub balance_usd: f64,
    pub active_dubbing_jobs: u32,
    pub active_lipsync_jobs: u32,
    pub max_concurrent_dubbing_jobs: u32,
    pub max_concurrent_lipsync_jobs: u32,
}

impl UserBalance {
    /// Whether a new dubbing job costing `estimated_cost_usd` may start.
    pub fn can_start_dubbing(&self, estimated_cost_usd: f64) -> bool {
        self.balance_usd >= estimated_cost_usd
            && self.active_dubbing_jobs < self.max_concurrent_dubbing_jobs
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SendMagicLinkRequest {
    pub email: String,
    pub captcha_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyTokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionCheckResponse {
    pub valid: bool,
    pub user_email: String,
}

// ---------------------------------------------------------------------------
// Transcription review
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    pub id: u32,
    /// Segment start in seconds.
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub translated_text: String,
}

/// Reviewed transcription sent back when a job pauses for review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionData {
    pub text: String,
    pub segments: Vec<TranscriptionSegment>,
    pub translated_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ReviewUploadSlot {
    pub upload_url: String,
}
