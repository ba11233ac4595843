//! REST client for the dubbing service endpoints.
//!
//! Wraps the service's HTTP API using [`reqwest`]. Every JSON call carries
//! the bearer token from the shared [`SessionStore`] and is bounded by
//! [`ApiConfig::request_timeout`]; raw uploads to pre-signed URLs use
//! [`ApiConfig::upload_timeout`] and no auth header.

use futures::StreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use dubflow_core::job_status::JobStatus;

use crate::config::ApiConfig;
use crate::error::{error_from_body, ApiError};
use crate::models::{
    AuthResponse, PrepareUploadRequest, PrepareUploadResponse, RefundAck, ReviewUploadSlot,
    SendMagicLinkRequest, SessionCheckResponse, StartPipelineRequest, StartPipelineResponse,
    TranscriptionData, UserBalance, UserJob, VerifyTokenRequest,
};
use crate::session::SessionStore;

/// Size of each chunk streamed during a raw upload.
const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// HTTP client for the dubbing service.
///
/// Cheap to share behind an `Arc`; the underlying [`reqwest::Client`]
/// pools connections.
pub struct DubbingApi {
    client: reqwest::Client,
    config: ApiConfig,
    session: SessionStore,
}

impl DubbingApi {
    /// Create a client with its own connection pool.
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: ApiConfig) -> Self {
        let session = SessionStore::new(config.session_token.clone());
        Self {
            client,
            config,
            session,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Shared handle to the session token.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    // ---- upload ----

    /// Reserve an upload slot for a new job.
    ///
    /// Sends `POST /dubbing/prepare`. Returns the job ID, the pre-signed
    /// upload URL and the cost estimate.
    pub async fn prepare_upload(
        &self,
        request: &PrepareUploadRequest,
    ) -> Result<PrepareUploadResponse, ApiError> {
        tracing::debug!(file = %request.original_file_name, "Preparing upload");
        let builder = self
            .client
            .post(self.config.endpoint("/dubbing/prepare"))
            .json(request);
        self.parse_response(builder).await
    }

    /// `PUT` raw bytes to a pre-signed URL, reporting progress in percent.
    ///
    /// `on_progress` is invoked as chunks are handed to the transport, ending
    /// with `100`.
    pub async fn upload_file<F>(
        &self,
        upload_url: &str,
        bytes: Vec<u8>,
        content_type: &str,
        mut on_progress: F,
    ) -> Result<(), ApiError>
    where
        F: FnMut(u8) + Send + 'static,
    {
        let total = bytes.len();
        if total == 0 {
            on_progress(100);
        }

        let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK_SIZE).map(<[u8]>::to_vec).collect();
        let mut sent = 0usize;
        let stream = futures::stream::iter(chunks).map(move |chunk| {
            sent += chunk.len();
            on_progress(upload_percent(sent, total));
            Ok::<_, std::io::Error>(chunk)
        });

        let response = self
            .client
            .put(upload_url)
            .timeout(self.config.upload_timeout)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Upload {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("upload rejected").to_string(),
            });
        }

        tracing::info!(bytes = total, "Upload finished");
        Ok(())
    }

    // ---- pipeline ----

    /// Start dubbing an uploaded video. Sends `POST /dubbing/start`.
    pub async fn start_pipeline(
        &self,
        request: &StartPipelineRequest,
    ) -> Result<StartPipelineResponse, ApiError> {
        let builder = self
            .client
            .post(self.config.endpoint("/dubbing/start"))
            .json(request);
        let response: StartPipelineResponse = self.parse_response(builder).await?;

        tracing::info!(job_id = %response.job_id, status = %response.status, "Pipeline started");
        Ok(response)
    }

    /// Fetch the current status of a job. Sends `GET /dubbing/{job_id}/status`.
    pub async fn get_status(&self, job_id: &str) -> Result<JobStatus, ApiError> {
        let builder = self
            .client
            .get(self.config.endpoint(&format!("/dubbing/{job_id}/status")));
        self.parse_response(builder).await
    }

    /// Ask the service to refund an abnormally terminated job.
    ///
    /// Sends `POST /user/refund/{job_id}`. An empty body counts as success.
    pub async fn request_refund(&self, job_id: &str) -> Result<RefundAck, ApiError> {
        let builder = self
            .client
            .post(self.config.endpoint(&format!("/user/refund/{job_id}")));
        let response = self.send(builder).await?;

        let body = response.text().await.map_err(ApiError::from_transport)?;
        if body.trim().is_empty() {
            return Ok(RefundAck { success: true });
        }
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    /// Upload a reviewed transcription for a job paused for review.
    ///
    /// Requests an upload slot via `GET /dubbing/{job_id}/submit_review`,
    /// then `PUT`s the JSON document there. Returns the slot URL.
    pub async fn submit_transcription_review(
        &self,
        job_id: &str,
        transcription: &TranscriptionData,
    ) -> Result<String, ApiError> {
        let builder = self
            .client
            .get(self.config.endpoint(&format!("/dubbing/{job_id}/submit_review")));
        let slot: ReviewUploadSlot = self.parse_response(builder).await?;

        let response = self
            .client
            .put(&slot.upload_url)
            .json(transcription)
            .send()
            .await
            .map_err(ApiError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Upload {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("upload rejected").to_string(),
            });
        }

        tracing::info!(job_id, "Transcription review submitted");
        Ok(slot.upload_url)
    }

    // ---- account ----

    /// List the current user's jobs. Sends `GET /user/jobs`.
    pub async fn list_jobs(&self) -> Result<Vec<UserJob>, ApiError> {
        let builder = self.client.get(self.config.endpoint("/user/jobs"));
        self.parse_response(builder).await
    }

    /// Fetch funds and concurrency quota. Sends `GET /user/balance`.
    pub async fn get_balance(&self) -> Result<UserBalance, ApiError> {
        let builder = self.client.get(self.config.endpoint("/user/balance"));
        self.parse_response(builder).await
    }

    // ---- auth ----

    pub async fn send_magic_link(
        &self,
        request: &SendMagicLinkRequest,
    ) -> Result<AuthResponse, ApiError> {
        let builder = self
            .client
            .post(self.config.endpoint("/auth/send_magic_link"))
            .json(request);
        self.parse_response(builder).await
    }

    /// Exchange a magic-link token for a session. On success the session
    /// token is stored for subsequent calls.
    pub async fn verify_token(&self, request: &VerifyTokenRequest) -> Result<AuthResponse, ApiError> {
        let builder = self
            .client
            .post(self.config.endpoint("/auth/verify_token"))
            .json(request);
        let response: AuthResponse = self.parse_response(builder).await?;

        if let (true, Some(token)) = (response.success, response.session_token.as_deref()) {
            self.session.set(token);
        }
        Ok(response)
    }

    /// Check whether the stored session is still valid. An invalid session
    /// clears the stored token.
    pub async fn check_session(&self) -> Result<SessionCheckResponse, ApiError> {
        let builder = self.client.get(self.config.endpoint("/auth/check_session"));
        let response: SessionCheckResponse = self.parse_response(builder).await?;

        if !response.valid {
            self.session.clear();
        }
        Ok(response)
    }

    // ---- private helpers ----

    /// Attach the bearer token, send, and reject non-2xx responses.
    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let builder = match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await.map_err(ApiError::from_transport)?;
        self.ensure_success(response).await
    }

    /// Return the response unchanged on success. On failure, decode the
    /// error body; a `401` also clears the session.
    async fn ensure_success(&self, response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let reason = status.canonical_reason().unwrap_or("").to_string();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let err = error_from_body(status.as_u16(), &reason, &body);

        if matches!(err, ApiError::Unauthorized { .. }) {
            self.session.clear();
        }
        Err(err)
    }

    /// Send and decode a successful JSON response body.
    async fn parse_response<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        response.json::<T>().await.map_err(ApiError::from_transport)
    }
}

/// Percentage of `sent` out of `total`, rounded down. Empty uploads are done.
fn upload_percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent.min(total) as u128 * 100) / total as u128) as u8
}
