//! Structured Graph API error types.
//!
//! Non-2xx responses carry a JSON envelope of the form:
//!
//! ```json
//! {"error": {"message": "...", "type": "OAuthException", "code": 190,
//!            "error_subcode": 463, "fbtrace_id": "AbCd"}}
//! ```
//!
//! [`ErrorPayload`] is the inner object and [`ResponseError`] pairs it with
//! the HTTP status it arrived with.

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

/// Error codes the platform documents as temporary or rate limiting.
const TRANSIENT_CODES: &[i64] = &[1, 2, 4, 17, 80007, 130429, 131048, 131056];

/// Code returned for expired or invalid access tokens.
const AUTH_CODE: i64 = 190;

/// The `error` object of a Graph API error response.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub error_subcode: i64,
    #[serde(default)]
    pub fbtrace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_user_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_user_msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_transient: Option<bool>,
}

impl ErrorPayload {
    /// Returns whether the platform considers this error temporary.
    ///
    /// An explicit `is_transient` flag wins over the code table.
    pub fn is_transient(&self) -> bool {
        self.is_transient
            .unwrap_or_else(|| TRANSIENT_CODES.contains(&self.code))
    }

    /// Returns whether the access token was rejected.
    pub fn is_auth_error(&self) -> bool {
        self.code == AUTH_CODE || self.kind == "OAuthException"
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (type={}, code={}, subcode={}, fbtrace_id={})",
            self.message, self.kind, self.code, self.error_subcode, self.fbtrace_id
        )
    }
}

/// Wire envelope around [`ErrorPayload`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

/// A non-2xx response whose body decoded into a structured error.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("api error (status {status}): {error}")]
pub struct ResponseError {
    pub status: StatusCode,
    pub error: ErrorPayload,
}

impl ResponseError {
    pub fn new(status: StatusCode, error: ErrorPayload) -> Self {
        Self { status, error }
    }

    /// Parse an error envelope from a response body.
    pub fn from_body(status: StatusCode, body: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: ErrorEnvelope = serde_json::from_slice(body)?;
        Ok(Self::new(status, envelope.error))
    }

    /// Returns whether a caller-side retry policy may retry this error.
    pub fn is_transient(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
            || self.status.is_server_error()
            || self.error.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_envelope() {
        let body = br#"{"error":{"message":"Invalid OAuth access token.","type":"OAuthException","code":190,"error_subcode":463,"fbtrace_id":"AbC123"}}"#;
        let err = ResponseError::from_body(StatusCode::UNAUTHORIZED, body).unwrap();

        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.error.message, "Invalid OAuth access token.");
        assert_eq!(err.error.kind, "OAuthException");
        assert_eq!(err.error.code, 190);
        assert_eq!(err.error.error_subcode, 463);
        assert_eq!(err.error.fbtrace_id, "AbC123");
        assert!(err.error.is_auth_error());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_error_missing_fields_default() {
        let err = ResponseError::from_body(StatusCode::BAD_REQUEST, br#"{"error":{"code":131056}}"#)
            .unwrap();
        assert_eq!(err.error.message, "");
        assert!(err.error.is_transient());
        assert!(err.is_transient());
    }

    #[test]
    fn test_parse_error_rejects_non_envelope() {
        assert!(ResponseError::from_body(StatusCode::BAD_GATEWAY, b"<html>bad gateway</html>").is_err());
        assert!(ResponseError::from_body(StatusCode::BAD_GATEWAY, b"").is_err());
    }

    #[test]
    fn test_explicit_transient_flag_wins() {
        let payload = ErrorPayload {
            code: 4,
            is_transient: Some(false),
            ..Default::default()
        };
        assert!(!payload.is_transient());
    }

    #[test]
    fn test_display_includes_trace_id() {
        let err = ResponseError::new(
            StatusCode::BAD_REQUEST,
            ErrorPayload {
                message: "bad".into(),
                kind: "GraphMethodException".into(),
                code: 100,
                fbtrace_id: "xyz".into(),
                ..Default::default()
            },
        );
        let rendered = err.to_string();
        assert!(rendered.contains("400"));
        assert!(rendered.contains("fbtrace_id=xyz"));
    }
}
