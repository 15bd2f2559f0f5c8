//! Payload encoding.
//!
//! Request bodies are modeled as the closed [`Payload`] sum type. Anything a
//! caller puts in `Request::message` converts into a `Payload` through
//! [`IntoPayload`], and [`Payload::encode`] turns it into a transport body
//! plus the content type to advertise.
//!
//! | payload                 | content type                        |
//! |-------------------------|-------------------------------------|
//! | none / `Empty`          | `application/json` (empty body)     |
//! | [`RequestForm`]         | `multipart/form-data; boundary=...` |
//! | bytes or a byte stream  | `application/octet-stream`          |
//! | string                  | `text/plain`                        |
//! | [`UrlEncoded`] pairs    | `application/x-www-form-urlencoded` |
//! | anything serializable   | `application/json`                  |

use bytes::Bytes;
use serde::Serialize;

use super::form::RequestForm;
use crate::EncodeError;
use crate::transport::{BodyStream, TransportBody};

/// Content types advertised by the encoder.
pub mod content_type {
    pub const JSON: &str = "application/json";
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const TEXT: &str = "text/plain";
    pub const URL_ENCODED: &str = "application/x-www-form-urlencoded";
    pub const MULTIPART: &str = "multipart/form-data";
}

/// Every body shape the pipeline can send.
pub enum Payload {
    Empty,
    Form(RequestForm),
    Bytes(Bytes),
    Stream(BodyStream),
    Text(String),
    UrlEncoded(Vec<(String, String)>),
    /// Already-serialized JSON.
    Json(Bytes),
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Empty => f.write_str("Empty"),
            Payload::Form(form) => f.debug_tuple("Form").field(form).finish(),
            Payload::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Payload::Stream(_) => f.write_str("Stream"),
            Payload::Text(t) => f.debug_tuple("Text").field(&t.len()).finish(),
            Payload::UrlEncoded(pairs) => f.debug_tuple("UrlEncoded").field(&pairs.len()).finish(),
            Payload::Json(b) => f.debug_tuple("Json").field(&b.len()).finish(),
        }
    }
}

/// An encoded request body and the content type describing it.
#[derive(Debug)]
pub struct EncodedBody {
    pub body: TransportBody,
    pub content_type: String,
}

impl EncodedBody {
    fn new(body: TransportBody, content_type: &str) -> Self {
        Self {
            body,
            content_type: content_type.to_owned(),
        }
    }
}

impl Payload {
    /// Create a streaming payload.
    pub fn stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<Bytes, crate::ClientError>> + Send + 'static,
    {
        Payload::Stream(Box::pin(stream))
    }

    /// Serialize `value` as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodeError> {
        Ok(Payload::Json(Bytes::from(serde_json::to_vec(value)?)))
    }

    /// Encode into a transport body.
    ///
    /// Only a form whose file cannot be read fails.
    pub async fn encode(self) -> Result<EncodedBody, EncodeError> {
        let encoded = match self {
            Payload::Empty => EncodedBody::new(TransportBody::empty(), content_type::JSON),
            Payload::Form(form) => {
                let (body, boundary) = form.encode().await?;
                EncodedBody {
                    body: TransportBody::full(body),
                    content_type: format!("{}; boundary={boundary}", content_type::MULTIPART),
                }
            }
            Payload::Bytes(bytes) => {
                EncodedBody::new(TransportBody::full(bytes), content_type::OCTET_STREAM)
            }
            Payload::Stream(stream) => {
                EncodedBody::new(TransportBody::streaming(stream), content_type::OCTET_STREAM)
            }
            Payload::Text(text) => EncodedBody::new(TransportBody::full(text), content_type::TEXT),
            Payload::UrlEncoded(pairs) => {
                let body = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs)
                    .finish();
                EncodedBody::new(TransportBody::full(body), content_type::URL_ENCODED)
            }
            Payload::Json(json) => EncodedBody::new(TransportBody::full(json), content_type::JSON),
        };
        Ok(encoded)
    }
}

/// Conversion of a request message into a [`Payload`].
pub trait IntoPayload {
    fn into_payload(self) -> Result<Payload, EncodeError>;
}

/// Wrapper sending any `Serialize` value as JSON.
#[derive(Clone, Debug)]
pub struct Json<T>(pub T);

/// Key/value pairs sent as `application/x-www-form-urlencoded`.
#[derive(Clone, Debug, Default)]
pub struct UrlEncoded(pub Vec<(String, String)>);

impl UrlEncoded {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pair(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }
}

impl IntoPayload for Payload {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        Ok(self)
    }
}

impl IntoPayload for () {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        Ok(Payload::Empty)
    }
}

impl<T: IntoPayload> IntoPayload for Option<T> {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        self.map_or(Ok(Payload::Empty), IntoPayload::into_payload)
    }
}

impl IntoPayload for RequestForm {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        Ok(Payload::Form(self))
    }
}

impl IntoPayload for Bytes {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        Ok(Payload::Bytes(self))
    }
}

impl IntoPayload for Vec<u8> {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        Ok(Payload::Bytes(Bytes::from(self)))
    }
}

impl IntoPayload for BodyStream {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        Ok(Payload::Stream(self))
    }
}

impl IntoPayload for String {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        Ok(Payload::Text(self))
    }
}

impl IntoPayload for &'static str {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        Ok(Payload::Text(self.to_owned()))
    }
}

impl IntoPayload for UrlEncoded {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        Ok(Payload::UrlEncoded(self.0))
    }
}

impl IntoPayload for serde_json::Value {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        Payload::json(&self)
    }
}

impl<T: Serialize> IntoPayload for Json<T> {
    fn into_payload(self) -> Result<Payload, EncodeError> {
        Payload::json(&self.0)
    }
}
