//! Pooled hyper client for Graph API and media CDN traffic.

use std::time::Duration;

use futures::future::BoxFuture;
use http::HeaderValue;
use http::header::USER_AGENT;
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::ClientConfig;
use tower_service::Service;

use super::body::TransportBody;
use super::connector::build_https_connector;
use crate::{ClientBuildError, ClientError};

/// `User-Agent` sent when a request carries none.
pub const DEFAULT_USER_AGENT: &str = concat!("wacloud/", env!("CARGO_PKG_VERSION"));

type Pooled = Client<HttpsConnector<HttpConnector>, TransportBody>;

/// Performs the network round-trip for every request the sender makes.
///
/// One pool serves both `graph.facebook.com` and the lookaside host media
/// is fetched from. Cloning shares the pool.
///
/// ```ignore
/// let transport = HyperTransport::builder()
///     .connect_timeout(Duration::from_secs(5))
///     .user_agent("my-bot/1.2")
///     .build()?;
/// let client = Client::builder(DEFAULT_BASE_URL).with_transport(transport).build()?;
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    pool: Pooled,
    user_agent: HeaderValue,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::default()
    }

    pub fn new() -> Result<Self, ClientBuildError> {
        Self::builder().build()
    }

    /// Send `request`, returning as soon as the response head arrives.
    pub async fn request(
        &self,
        mut request: http::Request<TransportBody>,
    ) -> Result<http::Response<Incoming>, ClientError> {
        request
            .headers_mut()
            .entry(USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());
        self.pool.request(request).await.map_err(ClientError::transport)
    }
}

/// Builder for [`HyperTransport`].
#[derive(Debug)]
pub struct HyperTransportBuilder {
    tls: Option<ClientConfig>,
    connect_timeout: Option<Duration>,
    keepalive: Option<Duration>,
    idle_timeout: Duration,
    max_idle_per_host: usize,
    user_agent: String,
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self {
            tls: None,
            connect_timeout: Some(Duration::from_secs(10)),
            keepalive: Some(Duration::from_secs(60)),
            idle_timeout: Duration::from_secs(90),
            max_idle_per_host: 16,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HyperTransportBuilder {
    /// Replace the feature-selected TLS setup, e.g. to pin a private CA.
    pub fn tls_config(mut self, config: ClientConfig) -> Self {
        self.tls = Some(config);
        self
    }

    /// Give up on a TCP connect after `timeout`. Default: 10s.
    ///
    /// A connect timeout surfaces as a transport error, which the media
    /// download retries.
    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// TCP keepalive interval. Default: 60s.
    pub fn keepalive(mut self, interval: Option<Duration>) -> Self {
        self.keepalive = interval;
        self
    }

    /// Drop pooled connections idle for longer than `timeout`. Default: 90s.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Default: 16.
    pub fn max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<HyperTransport, ClientBuildError> {
        let user_agent = HeaderValue::try_from(self.user_agent)?;

        let mut http = HttpConnector::new();
        http.set_connect_timeout(self.connect_timeout);
        http.set_keepalive(self.keepalive);
        http.set_nodelay(true);
        let connector = build_https_connector(http, self.tls)?;

        let pool = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(self.idle_timeout)
            .pool_max_idle_per_host(self.max_idle_per_host)
            .build(connector);

        Ok(HyperTransport { pool, user_agent })
    }
}

impl Service<http::Request<TransportBody>> for HyperTransport {
    type Response = http::Response<Incoming>;
    type Error = ClientError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<TransportBody>) -> Self::Future {
        let transport = self.clone();
        Box::pin(async move { transport.request(request).await })
    }
}
