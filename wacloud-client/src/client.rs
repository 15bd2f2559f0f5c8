//! The configured entry point.

use std::sync::Arc;

use http::Method;

use crate::builder::{ClientBuilder, ClientConfig};
use crate::config::{MiddlewareChain, SendFn};
use crate::request::encoder::IntoPayload;
use crate::response::Decode;
use crate::sender::Sender;
use crate::{ClientError, Request};

/// A client bound to one set of credentials.
///
/// Cheap to clone; clones share the transport and its connection pool.
///
/// # Example
///
/// ```ignore
/// use wacloud_client::{Client, Json, JsonDecoder};
///
/// let client = Client::builder("https://graph.facebook.com")
///     .access_token(token)
///     .build()?;
///
/// let request = client
///     .request(Method::POST, ["1234567890", "messages"])
///     .message(Json(message));
/// let sent: Option<SendReceipt> = client.send(request, JsonDecoder::default()).await?;
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    config: Arc<ClientConfig>,
    sender: Arc<Sender>,
}

impl Client {
    pub fn builder<S: Into<String>>(base_url: S) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    pub(crate) fn from_parts(config: ClientConfig, sender: Sender) -> Self {
        Self {
            config: Arc::new(config),
            sender: Arc::new(sender),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn sender(&self) -> &Arc<Sender> {
        &self.sender
    }

    /// Start a request against `endpoints`, relative to the API version.
    ///
    /// The request carries the configured bearer token, debug level and,
    /// when secure requests are enabled, the app secret.
    pub fn request<T, I, S>(&self, method: Method, endpoints: I) -> Request<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut request = Request::new(method, self.config.base_url.clone());
        if !self.config.api_version.is_empty() {
            request = request.endpoint(self.config.api_version.clone());
        }
        let mut request = request
            .endpoints(endpoints)
            .bearer(self.config.access_token.clone())
            .debug(self.config.debug);
        if self.config.secure_requests {
            request = request.secure(self.config.app_secret.clone());
        }
        request
    }

    pub async fn send<T, D>(&self, request: Request<T>, decoder: D) -> Result<D::Output, ClientError>
    where
        T: IntoPayload,
        D: Decode,
    {
        self.sender.send(request, decoder).await
    }

    /// Wrap the sender in `chain`, outermost middleware first.
    pub fn handler<T, D>(&self, chain: &MiddlewareChain<T, D>) -> SendFn<T, D>
    where
        T: IntoPayload + Send + 'static,
        D: Decode,
    {
        chain.then(self.sender.send_fn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryPolicy, middleware};
    use crate::request::DebugLevel;
    use crate::response::StatusDecoder;
    use axum::Router;
    use axum::routing::get;
    use http::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_request_is_prefilled() {
        let client = Client::builder("https://graph.facebook.com")
            .access_token("tok")
            .app_secret("sec")
            .secure_requests(true)
            .debug(DebugLevel::All)
            .build()
            .unwrap();

        let request: Request<()> = client.request(Method::GET, ["123", "media"]);
        assert_eq!(request.bearer, "tok");
        assert!(request.secure);
        assert_eq!(request.app_secret, "sec");
        assert_eq!(
            request.url().unwrap().as_str(),
            "https://graph.facebook.com/v21.0/123/media?debug=all&appsecret_proof=b13512356d1403d2449aa2e7369214f0459f0d3c08cb742b0aff4fe57aae36f5"
        );
    }

    #[test]
    fn test_empty_api_version_skips_segment() {
        let client = Client::builder("https://graph.facebook.com")
            .api_version("")
            .build()
            .unwrap();
        let request: Request<()> = client.request(Method::GET, ["me"]);
        assert_eq!(request.url().unwrap().as_str(), "https://graph.facebook.com/me");
    }

    #[tokio::test]
    async fn test_handler_retries_through_chain() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let base = serve(Router::new().route(
            "/v21.0/me",
            get(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        StatusCode::SERVICE_UNAVAILABLE
                    } else {
                        StatusCode::OK
                    }
                }
            }),
        ))
        .await;

        let client = Client::builder(base).access_token("tok").build().unwrap();
        let policy = RetryPolicy::new()
            .max_retries(2)
            .base_delay(Duration::from_millis(1))
            .jitter(0.0);
        let chain: MiddlewareChain<(), StatusDecoder> =
            MiddlewareChain::new().with(middleware::retry(policy));
        let send = client.handler(&chain);

        let status = send(client.request(Method::GET, ["me"]), StatusDecoder::default())
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
