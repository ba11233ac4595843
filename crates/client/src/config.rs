use std::time::Duration;

/// Default base URL of the dubbing service.
const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default path prefix under which all endpoints are mounted.
const DEFAULT_API_PREFIX: &str = "/api/uniframe";

/// Default timeout for regular JSON calls.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default timeout for raw file uploads.
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 600;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Scheme, host and port, without trailing slash.
    pub base_url: String,
    /// Path prefix prepended to every endpoint.
    pub api_prefix: String,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    /// Bearer token to start with, if the caller already has a session.
    pub session_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
            session_token: None,
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `DUBBING_API_URL`      | `http://localhost:8000` |
    /// | `DUBBING_API_PREFIX`   | `/api/uniframe`         |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                    |
    /// | `UPLOAD_TIMEOUT_SECS`  | `600`                   |
    /// | `SESSION_TOKEN`        | unset                   |
    ///
    /// Unparseable numbers fall back to their defaults.
    pub fn from_env() -> Self {
        let base_url = std::env::var("DUBBING_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.into())
            .trim_end_matches('/')
            .to_string();

        let api_prefix =
            std::env::var("DUBBING_API_PREFIX").unwrap_or_else(|_| DEFAULT_API_PREFIX.into());

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let upload_timeout_secs: u64 = std::env::var("UPLOAD_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_UPLOAD_TIMEOUT_SECS);

        let session_token = std::env::var("SESSION_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        Self {
            base_url,
            api_prefix,
            request_timeout: Duration::from_secs(request_timeout_secs),
            upload_timeout: Duration::from_secs(upload_timeout_secs),
            session_token,
        }
    }

    /// Absolute URL for an endpoint path such as `/dubbing/start`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, path)
    }
}
