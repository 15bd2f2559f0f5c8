//! The typed request model.
//!
//! A [`Request`] is built fresh for every call. It carries everything the
//! sender needs to produce the transport message: where to send it, who is
//! calling, the body, and per-call policy (deadline, debug level).

pub mod encoder;
pub mod form;

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue, IntoHeaderName};
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};
use url::Url;
use wacloud_core::app_secret_proof;

use crate::transport::TransportBody;
use crate::{BuildError, ClientError};
use encoder::{IntoPayload, Payload};
use form::RequestForm;

/// Query parameter carrying the app secret proof.
pub const APPSECRET_PROOF_PARAM: &str = "appsecret_proof";

/// Query parameter carrying the debug level.
pub const DEBUG_PARAM: &str = "debug";

/// Graph API debug verbosity, sent as the `debug` query parameter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    #[default]
    None,
    All,
    Info,
    Warning,
}

impl DebugLevel {
    /// The query value, or `None` when no parameter is sent.
    pub fn as_query_value(self) -> Option<&'static str> {
        match self {
            DebugLevel::None => None,
            DebugLevel::All => Some("all"),
            DebugLevel::Info => Some("info"),
            DebugLevel::Warning => Some("warning"),
        }
    }
}

/// A single API call.
///
/// `T` is the message type; see [`IntoPayload`] for what can be sent.
///
/// # Example
///
/// ```ignore
/// let request = Request::new(Method::POST, "https://graph.facebook.com")
///     .endpoints(["v21.0", "1234567890", "messages"])
///     .bearer(token)
///     .secure(app_secret)
///     .message(Json(message));
/// ```
#[derive(Clone)]
pub struct Request<T = Payload> {
    pub method: Method,
    pub base_url: String,
    /// Path segments joined onto the base URL, in order.
    pub endpoints: Vec<String>,
    /// Explicit headers. These overwrite the computed content type.
    pub headers: HeaderMap,
    pub query: BTreeMap<String, String>,
    pub bearer: String,
    pub message: Option<T>,
    /// Takes precedence over `message` when set.
    pub form: Option<RequestForm>,
    /// Attach `appsecret_proof` computed from `bearer` and `app_secret`.
    pub secure: bool,
    pub app_secret: String,
    pub debug: DebugLevel,
    /// Deadline for the whole round-trip. Falls back to the sender default.
    pub timeout: Option<Duration>,
    /// Name of the logical operation, visible to interceptors and logs.
    pub operation: Option<String>,
}

impl<T> Request<T> {
    pub fn new(method: Method, base_url: impl Into<String>) -> Self {
        Self {
            method,
            base_url: base_url.into(),
            endpoints: Vec::new(),
            headers: HeaderMap::new(),
            query: BTreeMap::new(),
            bearer: String::new(),
            message: None,
            form: None,
            secure: false,
            app_secret: String::new(),
            debug: DebugLevel::None,
            timeout: None,
            operation: None,
        }
    }

    pub fn endpoint(mut self, segment: impl Into<String>) -> Self {
        self.endpoints.push(segment.into());
        self
    }

    pub fn endpoints<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.extend(segments.into_iter().map(Into::into));
        self
    }

    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = token.into();
        self
    }

    pub fn message(mut self, message: T) -> Self {
        self.message = Some(message);
        self
    }

    pub fn form(mut self, form: RequestForm) -> Self {
        self.form = Some(form);
        self
    }

    /// Mark the request secure, signing it with `app_secret`.
    pub fn secure(mut self, app_secret: impl Into<String>) -> Self {
        self.secure = true;
        self.app_secret = app_secret.into();
        self
    }

    pub fn debug(mut self, level: DebugLevel) -> Self {
        self.debug = level;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn operation(mut self, name: impl Into<String>) -> Self {
        self.operation = Some(name.into());
        self
    }

    /// Build the full request URL.
    ///
    /// Endpoints are split on `/` and appended as percent-encoded path
    /// segments. Query parameters follow in key order, then `debug`, then
    /// `appsecret_proof` last.
    ///
    /// # Errors
    ///
    /// - [`BuildError::BaseUrl`] if the base URL does not parse
    /// - [`BuildError::JoinPath`] if the base URL cannot take path segments
    /// - [`BuildError::Sign`] if the request is secure and cannot be signed
    pub fn url(&self) -> Result<Url, BuildError> {
        let mut url = Url::parse(&self.base_url).map_err(|source| BuildError::BaseUrl {
            url: self.base_url.clone(),
            source,
        })?;

        if !self.endpoints.is_empty() {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| BuildError::JoinPath(self.base_url.clone()))?;
            segments.pop_if_empty();
            for endpoint in &self.endpoints {
                segments.extend(endpoint.split('/').filter(|s| !s.is_empty()));
            }
        }

        let proof = if self.secure {
            Some(app_secret_proof(&self.bearer, &self.app_secret)?)
        } else {
            None
        };
        let debug = self.debug.as_query_value();

        if !self.query.is_empty() || debug.is_some() || proof.is_some() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                let reserved = (key == DEBUG_PARAM && debug.is_some())
                    || (key == APPSECRET_PROOF_PARAM && proof.is_some());
                if !reserved {
                    pairs.append_pair(key, value);
                }
            }
            if let Some(level) = debug {
                pairs.append_pair(DEBUG_PARAM, level);
            }
            if let Some(proof) = &proof {
                pairs.append_pair(APPSECRET_PROOF_PARAM, proof);
            }
        }

        Ok(url)
    }
}

impl<T: IntoPayload> Request<T> {
    /// Build the transport request: URL, encoded body and headers.
    ///
    /// Headers are applied in order: the encoder's content type, the explicit
    /// headers (which may replace it), then `Authorization`.
    pub async fn into_http(self) -> Result<http::Request<TransportBody>, ClientError> {
        let url = self.url()?;

        let payload = match (self.form, self.message) {
            (Some(form), _) => Payload::Form(form),
            (None, Some(message)) => message.into_payload()?,
            (None, None) => Payload::Empty,
        };
        let encoded = payload.encode().await?;

        let mut request = http::Request::builder()
            .method(self.method)
            .uri(url.as_str())
            .body(encoded.body)
            .map_err(BuildError::from)?;

        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, header_value(CONTENT_TYPE, &encoded.content_type)?);
        headers.extend(self.headers);
        if !self.bearer.is_empty() {
            let mut value = header_value(AUTHORIZATION, &format!("Bearer {}", self.bearer))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(request)
    }
}

fn header_value(name: HeaderName, value: &str) -> Result<HeaderValue, BuildError> {
    HeaderValue::from_str(value).map_err(|_| BuildError::InvalidHeader {
        name: name.to_string(),
    })
}

impl<T> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("base_url", &self.base_url)
            .field("endpoints", &self.endpoints)
            .field("query", &self.query)
            .field("has_message", &self.message.is_some())
            .field("has_form", &self.form.is_some())
            .field("secure", &self.secure)
            .field("debug", &self.debug)
            .field("timeout", &self.timeout)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}
