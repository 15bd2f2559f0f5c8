//! Response decoders.
//!
//! A decoder classifies a [`RawResponse`] by status and turns it into the
//! caller's result type. The JSON decoder follows [`DecodeOptions`]:
//!
//! | response                | outcome                                              |
//! |-------------------------|------------------------------------------------------|
//! | 2xx, empty body         | `Ok(None)`, or [`DecodeError::EmptyBody`] if disallowed |
//! | 2xx, body               | decoded value, or [`DecodeError::Body`]              |
//! | non-2xx                 | [`ClientError::RequestFailed`]                       |
//! | non-2xx, inspecting     | [`ClientError::Api`], or [`DecodeError::ErrorBody`]  |

use std::marker::PhantomData;

use bytes::Bytes;
use http::StatusCode;
use serde::de::DeserializeOwned;
use wacloud_core::ResponseError;

use super::{RawResponse, strict};
use crate::{ClientError, DecodeError};

/// Per-call decoding policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Reject JSON object keys the target type does not declare.
    pub disallow_unknown_fields: bool,
    /// Fail a 2xx response that has no body.
    pub disallow_empty_response: bool,
    /// Parse non-2xx bodies into [`ResponseError`].
    pub inspect_response_error: bool,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict decoding: all three checks enabled.
    pub fn strict() -> Self {
        Self {
            disallow_unknown_fields: true,
            disallow_empty_response: true,
            inspect_response_error: true,
        }
    }

    pub fn disallow_unknown_fields(mut self, enabled: bool) -> Self {
        self.disallow_unknown_fields = enabled;
        self
    }

    pub fn disallow_empty_response(mut self, enabled: bool) -> Self {
        self.disallow_empty_response = enabled;
        self
    }

    pub fn inspect_response_error(mut self, enabled: bool) -> Self {
        self.inspect_response_error = enabled;
        self
    }

    /// Turn a non-2xx response into the matching error.
    fn status_error(&self, response: &RawResponse) -> ClientError {
        if !self.inspect_response_error {
            return ClientError::RequestFailed {
                status: response.status,
            };
        }
        match ResponseError::from_body(response.status, &response.body) {
            Ok(err) => ClientError::Api(err),
            Err(source) => DecodeError::ErrorBody {
                status: response.status,
                source,
            }
            .into(),
        }
    }
}

/// Turns a completed response into a typed result.
pub trait Decode: Send + 'static {
    type Output: Send + 'static;

    fn decode(self, response: &RawResponse) -> Result<Self::Output, ClientError>;
}

/// Decodes a JSON body into `R`.
///
/// Yields `None` for an empty 2xx body when the options allow it.
pub struct JsonDecoder<R> {
    options: DecodeOptions,
    _target: PhantomData<fn() -> R>,
}

impl<R> JsonDecoder<R> {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            options,
            _target: PhantomData,
        }
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }
}

impl<R> Default for JsonDecoder<R> {
    fn default() -> Self {
        Self::new(DecodeOptions::default())
    }
}

impl<R> Clone for JsonDecoder<R> {
    fn clone(&self) -> Self {
        Self::new(self.options)
    }
}

impl<R> std::fmt::Debug for JsonDecoder<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonDecoder")
            .field("target", &std::any::type_name::<R>())
            .field("options", &self.options)
            .finish()
    }
}

impl<R> Decode for JsonDecoder<R>
where
    R: DeserializeOwned + Send + 'static,
{
    type Output = Option<R>;

    fn decode(self, response: &RawResponse) -> Result<Option<R>, ClientError> {
        if !response.is_success() {
            return Err(self.options.status_error(response));
        }
        if response.body.is_empty() {
            if self.options.disallow_empty_response {
                return Err(DecodeError::EmptyBody.into());
            }
            return Ok(None);
        }
        let decoded = if self.options.disallow_unknown_fields {
            strict::from_slice(&response.body)
        } else {
            serde_json::from_slice(&response.body)
        };
        decoded.map(Some).map_err(|e| DecodeError::Body(e).into())
    }
}

/// Returns the raw body of a 2xx response.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesDecoder {
    options: DecodeOptions,
}

impl BytesDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }
}

impl Decode for BytesDecoder {
    type Output = Bytes;

    fn decode(self, response: &RawResponse) -> Result<Bytes, ClientError> {
        if !response.is_success() {
            return Err(self.options.status_error(response));
        }
        if response.body.is_empty() && self.options.disallow_empty_response {
            return Err(DecodeError::EmptyBody.into());
        }
        Ok(response.body.clone())
    }
}

/// Ignores the body of a 2xx response and returns its status.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatusDecoder {
    options: DecodeOptions,
}

impl StatusDecoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }
}

impl Decode for StatusDecoder {
    type Output = StatusCode;

    fn decode(self, response: &RawResponse) -> Result<StatusCode, ClientError> {
        if !response.is_success() {
            return Err(self.options.status_error(response));
        }
        Ok(response.status)
    }
}

/// Hands back the whole response without classifying it.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawDecoder;

impl Decode for RawDecoder {
    type Output = RawResponse;

    fn decode(self, response: &RawResponse) -> Result<RawResponse, ClientError> {
        Ok(response.clone())
    }
}
