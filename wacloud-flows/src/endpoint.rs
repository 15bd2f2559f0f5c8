//! axum endpoint for data exchanges.

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use bytes::Bytes;
use tower_http::limit::RequestBodyLimitLayer;
use wacloud_core::SIGNATURE_HEADER;

use crate::{FlowError, FlowExchange};

/// Default request body limit (1 MiB). Envelopes are small; anything
/// larger is rejected with 413 before decryption.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Serves a [`FlowExchange`] over HTTP.
///
/// # Example
///
/// ```ignore
/// let exchange = FlowExchange::new(PemFile::new("private.pem"), handler)
///     .with_app_secret(app_secret);
/// let app = FlowEndpoint::new(exchange).router("/flows");
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
/// axum::serve(listener, app).await?;
/// ```
#[derive(Clone, Debug)]
pub struct FlowEndpoint {
    exchange: FlowExchange,
    body_limit: usize,
}

impl FlowEndpoint {
    pub fn new(exchange: FlowExchange) -> Self {
        Self {
            exchange,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// A router with a single `POST` route at `path`.
    pub fn router<S>(self, path: &str) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        Router::new()
            .route(path, post(exchange))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(self.body_limit))
            .with_state(self.exchange)
    }
}

async fn exchange(State(exchange): State<FlowExchange>, headers: HeaderMap, body: Bytes) -> Response {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    match exchange.handle(&body, signature).await {
        Ok(reply) => (
            [(CONTENT_TYPE, HeaderValue::from_static("text/plain"))],
            reply,
        )
            .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, status = err.status().as_u16(), "rejected flow exchange");
            err.into_response()
        }
    }
}

impl IntoResponse for FlowError {
    /// The status alone. The body never says why an exchange failed.
    fn into_response(self) -> Response {
        let status: StatusCode = self.status();
        status.into_response()
    }
}
