//! Exchange and handler errors, and the HTTP status each one maps to.

use http::StatusCode;
use wacloud_core::SignError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of one data exchange.
///
/// Every cryptographic failure maps to the same status and an empty body,
/// so the peer cannot tell a wrong key from a tampered payload.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("malformed exchange envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    #[error("field `{field}` is not valid base64")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("load private key: {0}")]
    KeyLoad(#[source] BoxError),

    #[error("unwrap symmetric key")]
    KeyUnwrap(#[source] rsa::Error),

    #[error("unsupported symmetric key length {0}")]
    KeyLength(usize),

    #[error("initialization vector must be 16 bytes, got {0}")]
    IvLength(usize),

    #[error("authenticated decryption failed")]
    BodyDecrypt,

    #[error("authenticated encryption failed")]
    BodyEncrypt,

    #[error("malformed flow payload: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("serialize flow response: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("request signature rejected: {0}")]
    Signature(#[from] SignError),

    #[error("flow token is invalid or expired")]
    InvalidFlowToken,

    #[error("flow handler failed: {0}")]
    Handler(#[source] BoxError),
}

impl FlowError {
    /// Whether the exchange failed while unwrapping or decrypting.
    pub fn is_crypto(&self) -> bool {
        matches!(
            self,
            FlowError::Base64 { .. }
                | FlowError::KeyUnwrap(_)
                | FlowError::KeyLength(_)
                | FlowError::IvLength(_)
                | FlowError::BodyDecrypt
        )
    }

    /// Status code returned to the peer.
    ///
    /// | error | status |
    /// |-------|--------|
    /// | any decryption failure | 421 |
    /// | signature | 432 |
    /// | invalid flow token | 427 |
    /// | malformed envelope or payload | 400 |
    /// | key loading, encryption, handler | 500 |
    pub fn status(&self) -> StatusCode {
        match self {
            e if e.is_crypto() => StatusCode::MISDIRECTED_REQUEST,
            FlowError::Signature(_) => status(432),
            FlowError::InvalidFlowToken => status(427),
            FlowError::Envelope(_) | FlowError::Payload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

/// Error returned by a [`FlowHandler`](crate::FlowHandler).
#[derive(Debug, thiserror::Error)]
pub enum FlowHandlerError {
    /// Show `message` on `screen`. Delivered to the user as a normal
    /// encrypted reply.
    #[error("{screen}: {message}")]
    Screen { screen: String, message: String },

    /// The flow token is unknown or expired. The client shows a generic
    /// error and closes the flow.
    #[error("flow token is invalid or expired")]
    InvalidFlowToken,

    #[error(transparent)]
    Internal(BoxError),
}

impl FlowHandlerError {
    pub fn screen(screen: impl Into<String>, message: impl Into<String>) -> Self {
        FlowHandlerError::Screen {
            screen: screen.into(),
            message: message.into(),
        }
    }

    pub fn internal<E: Into<BoxError>>(err: E) -> Self {
        FlowHandlerError::Internal(err.into())
    }
}
