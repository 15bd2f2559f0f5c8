//! Client configuration and builder.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{RequestInterceptor, ResponseInterceptor};
use crate::request::DebugLevel;
use crate::sender::Sender;
use crate::transport::HyperTransport;
use crate::Client;

pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v21.0";

/// Credentials and defaults applied to every request a [`Client`] creates.
///
/// Deserializable so it can come from a file or the environment; the client
/// never fetches or refreshes these values itself.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_version: String,
    pub access_token: String,
    pub app_secret: String,
    /// Sign every request with `appsecret_proof`.
    pub secure_requests: bool,
    pub debug: DebugLevel,
    pub timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_version: DEFAULT_API_VERSION.to_owned(),
            access_token: String::new(),
            app_secret: String::new(),
            secure_requests: false,
            debug: DebugLevel::None,
            timeout_ms: None,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("access_token", &redacted(&self.access_token))
            .field("app_secret", &redacted(&self.app_secret))
            .field("secure_requests", &self.secure_requests)
            .field("debug", &self.debug)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() { "" } else { "<redacted>" }
}

/// Error building a [`Client`].
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    #[error("invalid base url `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("secure requests are enabled but no app secret is configured")]
    MissingAppSecret,

    #[error("tls configuration: {0}")]
    Tls(String),

    #[error("invalid user agent: {0}")]
    InvalidUserAgent(#[from] http::header::InvalidHeaderValue),
}

/// Builder for [`Client`].
///
/// # Example
///
/// ```ignore
/// use wacloud_client::{Client, DebugLevel};
/// use std::time::Duration;
///
/// let client = Client::builder("https://graph.facebook.com")
///     .api_version("v21.0")
///     .access_token(token)
///     .app_secret(secret)
///     .secure_requests(true)
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<HyperTransport>,
    request_interceptor: Option<Arc<dyn RequestInterceptor>>,
    response_interceptor: Option<Arc<dyn ResponseInterceptor>>,
}

impl ClientBuilder {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self::from_config(ClientConfig {
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            request_interceptor: None,
            response_interceptor: None,
        }
    }

    /// Version path segment prefixed to every endpoint. Empty disables it.
    pub fn api_version<S: Into<String>>(mut self, version: S) -> Self {
        self.config.api_version = version.into();
        self
    }

    pub fn access_token<S: Into<String>>(mut self, token: S) -> Self {
        self.config.access_token = token.into();
        self
    }

    pub fn app_secret<S: Into<String>>(mut self, secret: S) -> Self {
        self.config.app_secret = secret.into();
        self
    }

    pub fn secure_requests(mut self, enabled: bool) -> Self {
        self.config.secure_requests = enabled;
        self
    }

    pub fn debug(mut self, level: DebugLevel) -> Self {
        self.config.debug = level;
        self
    }

    /// Default deadline for each call. Requests may override it.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Use a preconfigured transport instead of the default one.
    pub fn with_transport(mut self, transport: HyperTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the request interceptor slot. Compose with
    /// [`Chain`](crate::Chain) to run several.
    pub fn request_interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: RequestInterceptor + 'static,
    {
        self.request_interceptor = Some(Arc::new(interceptor));
        self
    }

    pub fn response_interceptor<I>(mut self, interceptor: I) -> Self
    where
        I: ResponseInterceptor + 'static,
    {
        self.response_interceptor = Some(Arc::new(interceptor));
        self
    }

    pub fn build(self) -> Result<Client, ClientBuildError> {
        url::Url::parse(&self.config.base_url).map_err(|source| ClientBuildError::InvalidBaseUrl {
            url: self.config.base_url.clone(),
            source,
        })?;
        if self.config.secure_requests && self.config.app_secret.is_empty() {
            return Err(ClientBuildError::MissingAppSecret);
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => HyperTransport::new()?,
        };

        let mut sender = Sender::new(transport).with_timeout(self.config.timeout());
        if let Some(interceptor) = self.request_interceptor {
            sender = sender.with_request_interceptor(interceptor);
        }
        if let Some(interceptor) = self.response_interceptor {
            sender = sender.with_response_interceptor(interceptor);
        }

        Ok(Client::from_parts(self.config, sender))
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("transport", &self.transport.is_some())
            .field("request_interceptor", &self.request_interceptor.is_some())
            .field("response_interceptor", &self.response_interceptor.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = ClientBuilder::new("https://graph.facebook.com").build().unwrap();
        let config = client.config();
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert!(!config.secure_requests);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_timeout_saturates_instead_of_truncating() {
        let builder = ClientBuilder::new(DEFAULT_BASE_URL).timeout(Duration::MAX);
        assert_eq!(builder.config.timeout_ms, Some(u64::MAX));

        let builder = ClientBuilder::new(DEFAULT_BASE_URL).timeout(Duration::from_millis(1500));
        assert_eq!(builder.config.timeout_ms, Some(1500));
    }

    #[test]
    fn test_builder_rejects_bad_base_url() {
        let err = ClientBuilder::new("graph.facebook.com").build().unwrap_err();
        assert!(matches!(err, ClientBuildError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn test_builder_requires_secret_for_secure_requests() {
        let err = ClientBuilder::new(DEFAULT_BASE_URL)
            .access_token("tok")
            .secure_requests(true)
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientBuildError::MissingAppSecret));
    }

    #[test]
    fn test_config_from_json() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"access_token":"tok","app_secret":"sec","secure_requests":true,"debug":"info","timeout_ms":2500}"#,
        )
        .unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.debug, DebugLevel::Info);
        assert_eq!(config.timeout(), Some(Duration::from_millis(2500)));

        let client = ClientBuilder::from_config(config).build().unwrap();
        assert!(client.config().secure_requests);
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let config = ClientConfig {
            access_token: "EAAG-token".into(),
            app_secret: "shh".into(),
            ..Default::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("EAAG-token"));
        assert!(!rendered.contains("shh"));
    }
}
