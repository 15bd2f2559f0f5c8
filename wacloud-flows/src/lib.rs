//! Data-exchange endpoint for WhatsApp Flows.
//!
//! A Flow endpoint receives hybrid-encrypted requests: an AES key wrapped
//! with the business RSA public key, an IV, and the AES-GCM encrypted
//! payload. [`FlowExchange`] unwraps and decrypts each request, hands the
//! payload to a [`FlowHandler`], and seals the handler's reply with the
//! same key under the inverted IV. [`FlowEndpoint`] mounts an exchange on
//! an axum router.
//!
//! ## Example
//!
//! ```ignore
//! use wacloud_flows::{FlowDataRequest, FlowDataResponse, FlowEndpoint, FlowExchange, FlowHandlerError, PemFile};
//!
//! async fn handler(request: FlowDataRequest) -> Result<FlowDataResponse, FlowHandlerError> {
//!     let token = request.flow_token.clone().ok_or(FlowHandlerError::InvalidFlowToken)?;
//!     Ok(FlowDataResponse::close(token, Default::default()))
//! }
//!
//! let exchange = FlowExchange::new(PemFile::new("private.pem"), handler).with_app_secret(app_secret);
//! let app = FlowEndpoint::new(exchange).router("/flows");
//! ```
//!
//! ## Status codes
//!
//! | outcome | status |
//! |---------|--------|
//! | reply | 200, base64 body |
//! | malformed envelope or payload | 400 |
//! | any decryption failure | 421, empty body |
//! | invalid flow token | 427 |
//! | bad signature | 432 |
//! | handler or key store failure | 500 |
//!
//! A [`FlowHandlerError::Screen`] is not a transport failure: it is sent
//! back as a normal encrypted reply carrying `error_message`.

pub mod crypto;
mod endpoint;
mod error;
mod exchange;
mod key;

pub use crypto::{DecryptedRequest, EncryptedRequest};
pub use endpoint::{DEFAULT_BODY_LIMIT, FlowEndpoint};
pub use error::{BoxError, FlowError, FlowHandlerError};
pub use exchange::{FlowAction, FlowDataRequest, FlowDataResponse, FlowExchange, FlowHandler, SUCCESS_SCREEN};
pub use key::{PemFile, PrivateKeyLoader, StaticKey};

pub use rsa::RsaPrivateKey;
