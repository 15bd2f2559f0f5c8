//! Response types and decoding.

pub mod decoder;
mod strict;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

pub use decoder::{BytesDecoder, Decode, DecodeOptions, JsonDecoder, RawDecoder, StatusDecoder};

/// A completed response with its body fully buffered.
///
/// The body is a cheaply clonable [`Bytes`], so the response interceptor and
/// the decoder can both read it.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The `Content-Type` header, if present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}
