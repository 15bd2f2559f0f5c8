//! Error types for the request pipeline.
//!
//! Every stage of a call has its own error family so callers can tell where
//! a call failed without string matching:
//!
//! - [`BuildError`]: the request could not be turned into a URL or message
//! - [`EncodeError`]: the payload could not be turned into a body
//! - transport, timeout and abort variants on [`ClientError`]
//! - [`DecodeError`]: the response did not have the expected shape
//! - [`ResponseError`]: a decoded non-2xx API error
//!
//! Wrapping variants keep the original error as their `source()`.

use std::path::PathBuf;
use std::time::Duration;

use http::StatusCode;
pub use wacloud_core::{ResponseError, SignError};

/// Boxed error used for transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure while building the outgoing URL or HTTP message.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid base url `{url}`: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("cannot join path segments onto `{0}`")]
    JoinPath(String),

    #[error("sign request: {0}")]
    Sign(#[from] SignError),

    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },

    #[error("build http request: {0}")]
    Http(#[from] http::Error),
}

/// Failure while encoding the request body.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("encode json body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("read form file `{}`: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while decoding a completed response.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("response body is empty")]
    EmptyBody,

    #[error("decode response body: {0}")]
    Body(#[source] serde_json::Error),

    #[error("decode error response body (status {status}): {source}")]
    ErrorBody {
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur while sending a request.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request could not be built. Not retryable without fixing input.
    #[error("build request: {0}")]
    Build(#[from] BuildError),

    /// The payload could not be encoded.
    #[error("encode request: {0}")]
    Encode(#[from] EncodeError),

    /// An interceptor or middleware stopped the call.
    #[error("request aborted: {reason}")]
    Aborted { reason: String },

    /// Network-level failure (connect, TLS, I/O, protocol).
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The per-call deadline elapsed before the response arrived.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Non-2xx response without error inspection.
    #[error("request failed with status {status}")]
    RequestFailed { status: StatusCode },

    /// Non-2xx response decoded into a structured error.
    #[error(transparent)]
    Api(#[from] ResponseError),

    /// The response could not be decoded.
    #[error("decode response: {0}")]
    Decode(#[from] DecodeError),

    /// Media download gave up on transport failures.
    #[error("media download failed after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<ClientError>,
    },

    /// Media download still returned 404 on its final attempt.
    #[error("media not found after {attempts} attempts")]
    MediaNotFound { attempts: u32 },

    /// Media download hit a terminal non-2xx status.
    #[error("media download failed with status {status}")]
    DownloadFailed { status: StatusCode },

    /// Downloaded media bytes do not match the advertised digest.
    #[error("media integrity check failed: expected sha256 {expected}, got {actual}")]
    MediaIntegrity { expected: String, actual: String },
}

impl ClientError {
    /// Create an abort error, for use by interceptors and middleware.
    pub fn aborted(reason: impl Into<String>) -> Self {
        ClientError::Aborted {
            reason: reason.into(),
        }
    }

    /// Wrap a transport-level failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        ClientError::Transport(err.into())
    }

    /// Returns the HTTP status this error carries, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::RequestFailed { status } | ClientError::DownloadFailed { status } => {
                Some(*status)
            }
            ClientError::Api(err) => Some(err.status),
            ClientError::Decode(DecodeError::ErrorBody { status, .. }) => Some(*status),
            ClientError::MediaNotFound { .. } => Some(StatusCode::NOT_FOUND),
            _ => None,
        }
    }

    /// Returns whether a caller-chosen retry policy may retry this error.
    ///
    /// Transport failures, timeouts, 429/5xx statuses and API errors the
    /// platform flags as transient are retryable. Construction and decode
    /// errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Timeout(_) => true,
            ClientError::RequestFailed { status } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            ClientError::Api(err) => err.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use wacloud_core::ErrorPayload;

    #[test]
    fn test_retryable_classification() {
        assert!(ClientError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ClientError::transport("connection reset").is_retryable());
        assert!(
            ClientError::RequestFailed {
                status: StatusCode::SERVICE_UNAVAILABLE
            }
            .is_retryable()
        );
        assert!(
            !ClientError::RequestFailed {
                status: StatusCode::BAD_REQUEST
            }
            .is_retryable()
        );
        assert!(!ClientError::Build(BuildError::Sign(SignError::EmptyAccessToken)).is_retryable());
        assert!(!ClientError::Decode(DecodeError::EmptyBody).is_retryable());
        assert!(!ClientError::aborted("no").is_retryable());
    }

    #[test]
    fn test_api_error_retryable_when_transient() {
        let transient = ResponseError::new(
            StatusCode::BAD_REQUEST,
            ErrorPayload {
                code: 130429,
                ..Default::default()
            },
        );
        assert!(ClientError::Api(transient).is_retryable());

        let permanent = ResponseError::new(
            StatusCode::BAD_REQUEST,
            ErrorPayload {
                code: 100,
                ..Default::default()
            },
        );
        assert!(!ClientError::Api(permanent).is_retryable());
    }

    #[test]
    fn test_wrapped_errors_keep_source() {
        let err: ClientError = BuildError::Sign(SignError::EmptyAccessToken).into();
        let source = err.source().expect("build error source");
        assert!(source.to_string().contains("sign request"));

        let exhausted = ClientError::RetryExhausted {
            attempts: 3,
            last: Box::new(ClientError::Timeout(Duration::from_millis(5))),
        };
        assert!(exhausted.source().unwrap().to_string().contains("timed out"));
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(
            ClientError::MediaNotFound { attempts: 2 }.status(),
            Some(StatusCode::NOT_FOUND)
        );
        assert_eq!(ClientError::Timeout(Duration::ZERO).status(), None);
    }
}
