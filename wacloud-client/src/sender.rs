//! The sender pipeline.
//!
//! [`Sender::send`] runs one call end to end:
//!
//! 1. check the deadline (a zero deadline fails before any I/O)
//! 2. build the URL, signing it if the request is secure
//! 3. encode the payload and assemble headers
//! 4. run the request interceptor, which may abort
//! 5. perform the round-trip and buffer the body
//! 6. run the response interceptor
//! 7. hand the buffered response to the decoder
//!
//! Steps 2 through 6 run under the call's deadline. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use http_body_util::BodyExt;

use crate::config::{
    BoxFuture, RequestContext, RequestInterceptor, ResponseContext, ResponseInterceptor, SendFn,
};
use crate::request::encoder::IntoPayload;
use crate::response::{Decode, RawResponse};
use crate::transport::HyperTransport;
use crate::{ClientError, Request};

/// Executes requests against a transport.
///
/// Holds no per-call state; one sender can serve any number of concurrent
/// calls.
#[derive(Clone)]
pub struct Sender {
    transport: HyperTransport,
    request_interceptor: Option<Arc<dyn RequestInterceptor>>,
    response_interceptor: Option<Arc<dyn ResponseInterceptor>>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("transport", &self.transport)
            .field("request_interceptor", &self.request_interceptor.is_some())
            .field("response_interceptor", &self.response_interceptor.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Sender {
    pub fn new(transport: HyperTransport) -> Self {
        Self {
            transport,
            request_interceptor: None,
            response_interceptor: None,
            timeout: None,
        }
    }

    pub fn with_request_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request_interceptor = Some(interceptor);
        self
    }

    pub fn with_response_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response_interceptor = Some(interceptor);
        self
    }

    /// Deadline for requests that do not set their own.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transport(&self) -> &HyperTransport {
        &self.transport
    }

    /// Send `request` and decode the response with `decoder`.
    pub async fn send<T, D>(&self, request: Request<T>, decoder: D) -> Result<D::Output, ClientError>
    where
        T: IntoPayload,
        D: Decode,
    {
        let response = match request.timeout.or(self.timeout) {
            Some(timeout) if timeout.is_zero() => return Err(ClientError::Timeout(timeout)),
            Some(timeout) => tokio::time::timeout(timeout, self.round_trip(request))
                .await
                .map_err(|_| ClientError::Timeout(timeout))??,
            None => self.round_trip(request).await?,
        };
        decoder.decode(&response)
    }

    /// The sender as the innermost [`SendFn`] of a middleware chain.
    pub fn send_fn<T, D>(self: &Arc<Self>) -> SendFn<T, D>
    where
        T: IntoPayload + Send + 'static,
        D: Decode,
    {
        let sender = Arc::clone(self);
        Arc::new(
            move |request: Request<T>, decoder: D| -> BoxFuture<'static, Result<D::Output, ClientError>> {
                let sender = Arc::clone(&sender);
                Box::pin(async move { sender.send(request, decoder).await })
            },
        )
    }

    async fn round_trip<T: IntoPayload>(&self, request: Request<T>) -> Result<RawResponse, ClientError> {
        let operation = request.operation.clone();
        let mut http_request = request.into_http().await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            method = %http_request.method(),
            uri = %redact_query(http_request.uri()),
            operation = operation.as_deref().unwrap_or_default(),
            "sending request"
        );

        if let Some(interceptor) = &self.request_interceptor {
            let (mut parts, body) = http_request.into_parts();
            let mut ctx = RequestContext {
                operation: operation.as_deref(),
                method: &parts.method,
                uri: &parts.uri,
                headers: &mut parts.headers,
            };
            interceptor.intercept_request(&mut ctx)?;
            http_request = http::Request::from_parts(parts, body);
        }

        let response = self.transport.request(http_request).await?;
        let (parts, body) = response.into_parts();
        let body = body.collect().await.map_err(ClientError::transport)?.to_bytes();

        #[cfg(feature = "tracing")]
        tracing::debug!(status = %parts.status, bytes = body.len(), "received response");

        let response = RawResponse::new(parts.status, parts.headers, body);
        if let Some(interceptor) = &self.response_interceptor {
            interceptor.intercept_response(&ResponseContext {
                operation: operation.as_deref(),
                status: response.status,
                headers: &response.headers,
                body: &response.body,
            })?;
        }
        Ok(response)
    }
}

// The query may carry `appsecret_proof`.
#[cfg(feature = "tracing")]
fn redact_query(uri: &http::Uri) -> String {
    match uri.query() {
        Some(_) => format!("{}?[redacted]", uri.path()),
        None => uri.path().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Chain, HeaderInterceptor, request_fn, response_fn};
    use crate::request::encoder::{Json, Payload};
    use crate::response::{DecodeOptions, JsonDecoder, StatusDecoder};
    use crate::DecodeError;
    use axum::Router;
    use axum::extract::{Query, Request as AxumRequest};
    use axum::routing::{get, post};
    use http::{Method, StatusCode};
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Echo {
        method: String,
        path: String,
        query: HashMap<String, String>,
        authorization: Option<String>,
        content_type: Option<String>,
        custom: Option<String>,
        body: String,
    }

    async fn echo(Query(query): Query<HashMap<String, String>>, request: AxumRequest) -> axum::Json<Echo> {
        let (parts, body) = request.into_parts();
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let (authorization, content_type, custom) =
            (header("authorization"), header("content-type"), header("x-custom"));
        let method = parts.method.to_string();
        let path = parts.uri.path().to_owned();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        axum::Json(Echo {
            method,
            path,
            query,
            authorization,
            content_type,
            custom,
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn sender() -> Sender {
        Sender::new(HyperTransport::new().unwrap())
    }

    #[tokio::test]
    async fn test_send_builds_full_request() {
        let base = serve(Router::new().route("/v21.0/123/messages", post(echo))).await;
        let request = Request::new(Method::POST, base)
            .endpoints(["v21.0", "123", "messages"])
            .bearer("tok")
            .secure("sec")
            .message(Json(serde_json::json!({"to": "1555"})));

        let echo = sender()
            .send(request, JsonDecoder::<Echo>::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(echo.method, "POST");
        assert_eq!(echo.path, "/v21.0/123/messages");
        assert_eq!(echo.authorization.as_deref(), Some("Bearer tok"));
        assert_eq!(echo.content_type.as_deref(), Some("application/json"));
        assert_eq!(
            echo.query.get("appsecret_proof").map(String::as_str),
            Some("b13512356d1403d2449aa2e7369214f0459f0d3c08cb742b0aff4fe57aae36f5")
        );
        assert_eq!(echo.body, r#"{"to":"1555"}"#);
    }

    #[tokio::test]
    async fn test_unsigned_secure_request_never_hits_network() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&hits);
        let base = serve(Router::new().route(
            "/v21.0/me",
            get(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { "{}" }
            }),
        ))
        .await;

        let request = Request::<()>::new(Method::GET, base)
            .endpoints(["v21.0", "me"])
            .secure("sec");
        let err = sender().send(request, StatusDecoder::default()).await.unwrap_err();

        assert!(matches!(
            err,
            ClientError::Build(crate::BuildError::Sign(wacloud_core::SignError::EmptyAccessToken))
        ));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_request_interceptor_can_edit_and_abort() {
        let base = serve(Router::new().route("/echo", get(echo))).await;
        let tagging = Arc::new(Chain(
            HeaderInterceptor::new("x-custom", "tagged").unwrap(),
            request_fn(|ctx: &mut RequestContext<'_>| {
                assert_eq!(ctx.operation, Some("echo"));
                Ok(())
            }),
        ));
        let echo = sender()
            .with_request_interceptor(tagging)
            .send(
                Request::<()>::new(Method::GET, base.clone()).endpoint("echo").operation("echo"),
                JsonDecoder::<Echo>::default(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(echo.custom.as_deref(), Some("tagged"));

        let abort = Arc::new(request_fn(|_ctx: &mut RequestContext<'_>| {
            Err(ClientError::aborted("blocked"))
        }));
        let err = sender()
            .with_request_interceptor(abort)
            .send(Request::<()>::new(Method::GET, base).endpoint("echo"), StatusDecoder::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Aborted { .. }));
    }

    #[tokio::test]
    async fn test_response_interceptor_sees_body_and_decoder_still_reads_it() {
        let base = serve(Router::new().route("/echo", get(echo))).await;
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let interceptor = Arc::new(response_fn(move |ctx: &ResponseContext<'_>| {
            sink.lock().unwrap().push(ctx.body.len());
            Ok(())
        }));

        let echo = sender()
            .with_response_interceptor(interceptor)
            .send(
                Request::<()>::new(Method::GET, base).endpoint("echo"),
                JsonDecoder::<Echo>::default(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(echo.path, "/echo");
        let lengths = seen.lock().unwrap();
        assert_eq!(lengths.len(), 1);
        assert!(lengths[0] > 0);
    }

    #[tokio::test]
    async fn test_error_inspection() {
        let base = serve(Router::new().route(
            "/fail",
            get(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    r#"{"error":{"message":"Invalid parameter","type":"OAuthException","code":100,"fbtrace_id":"Ax1"}}"#,
                )
            }),
        ))
        .await;

        let opaque = sender()
            .send(
                Request::<()>::new(Method::GET, base.clone()).endpoint("fail"),
                StatusDecoder::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(opaque, ClientError::RequestFailed { status } if status == StatusCode::BAD_REQUEST));

        let inspected = sender()
            .send(
                Request::<()>::new(Method::GET, base).endpoint("fail"),
                StatusDecoder::new(DecodeOptions::new().inspect_response_error(true)),
            )
            .await
            .unwrap_err();
        match inspected {
            ClientError::Api(err) => {
                assert_eq!(err.error.code, 100);
                assert_eq!(err.error.fbtrace_id, "Ax1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_text_and_bytes_payloads_reach_server() {
        let base = serve(Router::new().route("/echo", post(echo))).await;
        let echo = sender()
            .send(
                Request::new(Method::POST, base.clone())
                    .endpoint("echo")
                    .message(Payload::Text("plain".into())),
                JsonDecoder::<Echo>::default(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(echo.content_type.as_deref(), Some("text/plain"));
        assert_eq!(echo.body, "plain");

        let echo = sender()
            .send(
                Request::new(Method::POST, base).endpoint("echo").message(vec![0x61u8, 0x62]),
                JsonDecoder::<Echo>::default(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(echo.content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(echo.body, "ab");
    }

    #[tokio::test]
    async fn test_timeout_during_call() {
        let base = serve(Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        ))
        .await;

        let err = sender()
            .send(
                Request::<()>::new(Method::GET, base)
                    .endpoint("slow")
                    .timeout(Duration::from_millis(50)),
                StatusDecoder::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_zero_deadline_fails_before_io() {
        let err = sender()
            .with_timeout(Some(Duration::ZERO))
            .send(
                Request::<()>::new(Method::GET, "http://127.0.0.1:1").endpoint("never"),
                StatusDecoder::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Timeout(d) if d.is_zero()));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = sender()
            .send(
                Request::<()>::new(Method::GET, format!("http://{addr}")),
                StatusDecoder::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[tokio::test]
    async fn test_send_fn_composes_with_middleware() {
        let base = serve(Router::new().route("/echo", get(echo))).await;
        let sender = Arc::new(sender());
        let send: SendFn<(), JsonDecoder<Echo>> = sender.send_fn();

        let echo = send(
            Request::new(Method::GET, base).endpoint("echo"),
            JsonDecoder::new(DecodeOptions::new().disallow_empty_response(true)),
        )
        .await
        .unwrap();
        assert_eq!(echo.unwrap().method, "GET");
    }

    #[tokio::test]
    async fn test_empty_success_body_policy() {
        let base = serve(Router::new().route("/empty", get(|| async { StatusCode::OK }))).await;
        let err = sender()
            .send(
                Request::<()>::new(Method::GET, base).endpoint("empty"),
                JsonDecoder::<Echo>::new(DecodeOptions::new().disallow_empty_response(true)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(DecodeError::EmptyBody)));
    }
}
