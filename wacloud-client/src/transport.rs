//! HTTP transport layer.
//!
//! [`HyperTransport`] performs the network round-trip for the sender. It is
//! also a `tower::Service`, so it can be wrapped in tower layers before being
//! handed to the client builder.

mod body;
mod connector;
mod hyper;

pub use body::{BodyStream, TransportBody};
pub use connector::{build_https_connector, default_tls_config, has_tls_support};
pub use hyper::{DEFAULT_USER_AGENT, HyperTransport, HyperTransportBuilder};

pub use rustls::ClientConfig as TlsClientConfig;
