use serde::Deserialize;

/// Errors from the dubbing service HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, body decoding).
    #[error("Network error: {0}")]
    Request(#[from] reqwest::Error),

    /// No response arrived within the configured timeout.
    #[error("Request timeout")]
    Timeout,

    /// The session token was missing, expired or revoked.
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    /// The service returned a non-2xx status code.
    #[error("API error ({status}, {code}): {message}")]
    Api {
        status: u16,
        /// Machine-readable code from the error body, or `UNKNOWN_ERROR`.
        code: String,
        message: String,
    },

    /// A raw upload to a pre-signed URL was rejected.
    #[error("Upload failed ({status}): {message}")]
    Upload { status: u16, message: String },
}

impl ApiError {
    /// Map a transport error, singling out timeouts.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }

    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout => true,
            Self::Api { status, .. } | Self::Upload { status, .. } => *status >= 500 || *status == 429,
            Self::Unauthorized { .. } => false,
        }
    }
}

/// Error body returned by the service: `{"code": "...", "message": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Build an [`ApiError`] from a failed response's status and raw body.
pub(crate) fn error_from_body(status: u16, reason: &str, body: &str) -> ApiError {
    let (code, message) = match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => (parsed.code, parsed.message),
        Err(_) => ("UNKNOWN_ERROR".to_string(), format!("HTTP {status}: {reason}")),
    };

    if status == 401 {
        ApiError::Unauthorized { message }
    } else {
        ApiError::Api {
            status,
            code,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn structured_error_body_is_decoded() {
        let err = error_from_body(
            402,
            "Payment Required",
            r#"{"code":"INSUFFICIENT_FUNDS","message":"Balance too low"}"#,
        );
        assert_matches!(
            err,
            ApiError::Api { status: 402, ref code, ref message }
                if code == "INSUFFICIENT_FUNDS" && message == "Balance too low"
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn unstructured_body_falls_back_to_status_line() {
        let err = error_from_body(502, "Bad Gateway", "<html>oops</html>");
        assert_matches!(
            err,
            ApiError::Api { status: 502, ref code, ref message }
                if code == "UNKNOWN_ERROR" && message == "HTTP 502: Bad Gateway"
        );
        assert!(err.is_transient());
    }

    #[test]
    fn unauthorized_is_distinguished() {
        let err = error_from_body(401, "Unauthorized", r#"{"code":"EXPIRED","message":"Session expired"}"#);
        assert_matches!(err, ApiError::Unauthorized { ref message } if message == "Session expired");
    }
}
