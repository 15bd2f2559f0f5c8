//! Request/response pipeline for the WhatsApp Cloud API.
//!
//! Every call goes through the same pipeline: a typed [`Request`] is turned
//! into an HTTP message (URL, optional `appsecret_proof`, encoded payload,
//! headers), passed through the request interceptor, sent over a
//! [`HyperTransport`], passed through the response interceptor and finally
//! handed to a [`Decode`] implementation that produces a typed result or a
//! classified [`ClientError`].
//!
//! Cross-cutting behavior (logging, retries) lives in [`middleware`] layers
//! composed once around the sender.
//!
//! ## Example
//!
//! ```ignore
//! use wacloud_client::{Client, Json, JsonDecoder, DecodeOptions};
//! use http::Method;
//!
//! let client = Client::builder("https://graph.facebook.com")
//!     .access_token(token)
//!     .app_secret(secret)
//!     .secure_requests(true)
//!     .build()?;
//!
//! let request = client
//!     .request(Method::POST, [phone_number_id, "messages"])
//!     .message(Json(serde_json::json!({
//!         "messaging_product": "whatsapp",
//!         "to": "15551234567",
//!         "type": "text",
//!         "text": { "body": "hello" },
//!     })));
//!
//! let sent: Option<serde_json::Value> = client
//!     .send(request, JsonDecoder::new(DecodeOptions::strict()))
//!     .await?;
//! ```
//!
//! ## Retries
//!
//! The pipeline itself never retries. Retries are opt-in, either as a
//! middleware layer or around any future with [`retry_with_policy`]:
//!
//! ```ignore
//! use wacloud_client::{MiddlewareChain, RetryPolicy, StatusDecoder, middleware};
//!
//! let chain: MiddlewareChain<(), StatusDecoder> =
//!     MiddlewareChain::new().with(middleware::retry(RetryPolicy::default()));
//! let send = client.handler(&chain);
//! let status = send(client.request(Method::DELETE, [media_id]), StatusDecoder::default()).await?;
//! ```
//!
//! [`Client::download_media`] is the one exception: it carries its own
//! bounded resolve-and-fetch retry loop because media URLs expire.
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `tls` (default) | `tls-ring` + `tls-native-roots` |
//! | `tls-ring` / `tls-aws-lc` | rustls crypto provider |
//! | `tls-native-roots` / `tls-webpki-roots` | trust roots |
//! | `tracing` | debug events per call, retry warnings, `middleware::logging` |

mod builder;
mod client;
pub mod config;
mod error;
mod media;
pub mod request;
pub mod response;
mod sender;
pub mod transport;

pub use builder::{ClientBuildError, ClientBuilder, ClientConfig, DEFAULT_API_VERSION, DEFAULT_BASE_URL};
pub use client::Client;
pub use error::{BoxError, BuildError, ClientError, DecodeError, EncodeError, ResponseError, SignError};
pub use media::{DownloadedMedia, MediaId, MediaInformation};
pub use sender::Sender;

pub use config::middleware;
pub use config::{
    Chain, ExponentialBackoff, HeaderInterceptor, Middleware, MiddlewareChain, RequestContext,
    RequestInterceptor, ResponseContext, ResponseInterceptor, RetryPolicy, RetryPolicyError, SendFn, request_fn,
    response_fn, retry_with_policy,
};

pub use request::encoder::{IntoPayload, Json, Payload, UrlEncoded};
pub use request::form::RequestForm;
pub use request::{DebugLevel, Request};

pub use response::{BytesDecoder, Decode, DecodeOptions, JsonDecoder, RawDecoder, RawResponse, StatusDecoder};

pub use transport::{HyperTransport, HyperTransportBuilder, TlsClientConfig, TransportBody};

pub use wacloud_core::{ErrorPayload, app_secret_proof};

pub use bytes::Bytes;
