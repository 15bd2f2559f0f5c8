//! Middleware around the sender's entry point.
//!
//! A [`SendFn`] is the type-erased signature of one call through the
//! pipeline. A [`Middleware`] wraps a `SendFn` in another `SendFn`, and a
//! [`MiddlewareChain`] folds an ordered list of them around the sender once,
//! so the composed function can be reused for every call.
//!
//! Index 0 of the chain is the outermost layer: it runs first on the way in
//! and last on the way out. `None` entries are skipped.
//!
//! # Example
//!
//! ```ignore
//! use wacloud_client::{MiddlewareChain, JsonDecoder, RetryPolicy, middleware};
//!
//! let chain = MiddlewareChain::new()
//!     .with(middleware::logging())
//!     .with(middleware::retry(RetryPolicy::default()));
//! let send = client.handler::<Json<Message>, JsonDecoder<MessageResponse>>(&chain);
//!
//! let response = send(request, JsonDecoder::default()).await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::retry::{RetryPolicy, retry_with_policy};
use crate::response::Decode;
use crate::{ClientError, Request};

/// Type alias for a boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One call through the pipeline: a request and its decoder in, the decoded
/// output out.
#[allow(type_alias_bounds)]
pub type SendFn<T, D: Decode> = Arc<
    dyn Fn(Request<T>, D) -> BoxFuture<'static, Result<D::Output, ClientError>> + Send + Sync,
>;

/// Wraps a [`SendFn`] with cross-cutting behavior.
///
/// A middleware may run code before and after calling `next`, or return an
/// error without calling it at all, in which case no request is sent.
///
/// Any `Fn(SendFn<T, D>) -> SendFn<T, D>` closure is a middleware.
pub trait Middleware<T, D: Decode>: Send + Sync {
    fn wrap(&self, next: SendFn<T, D>) -> SendFn<T, D>;
}

impl<T, D, F> Middleware<T, D> for F
where
    D: Decode,
    F: Fn(SendFn<T, D>) -> SendFn<T, D> + Send + Sync,
{
    fn wrap(&self, next: SendFn<T, D>) -> SendFn<T, D> {
        self(next)
    }
}

/// An ordered list of middleware.
pub struct MiddlewareChain<T, D: Decode> {
    layers: Vec<Option<Arc<dyn Middleware<T, D>>>>,
}

impl<T: 'static, D: Decode> MiddlewareChain<T, D> {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Append a middleware as the next inner layer.
    pub fn with<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<T, D> + 'static,
    {
        self.layers.push(Some(Arc::new(middleware)));
        self
    }

    /// Append an optional slot. `None` is kept in place and skipped when
    /// the chain is composed.
    pub fn with_optional(mut self, middleware: Option<Arc<dyn Middleware<T, D>>>) -> Self {
        self.layers.push(middleware);
        self
    }

    /// Number of configured slots, including empty ones.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Compose the chain around `terminal`.
    pub fn then(&self, terminal: SendFn<T, D>) -> SendFn<T, D> {
        self.layers
            .iter()
            .rev()
            .flatten()
            .fold(terminal, |next, middleware| middleware.wrap(next))
    }
}

impl<T: 'static, D: Decode> Default for MiddlewareChain<T, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, D: Decode> Clone for MiddlewareChain<T, D> {
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.clone(),
        }
    }
}

impl<T, D: Decode> std::fmt::Debug for MiddlewareChain<T, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("slots", &self.layers.len())
            .field("active", &self.layers.iter().flatten().count())
            .finish()
    }
}

/// Retry calls that fail with a retryable error.
///
/// Each attempt sends a clone of the original request.
pub fn retry<T, D>(policy: RetryPolicy) -> impl Middleware<T, D>
where
    T: Clone + Send + 'static,
    D: Decode + Clone,
{
    move |next: SendFn<T, D>| -> SendFn<T, D> {
        let policy = policy.clone();
        Arc::new(
            move |request: Request<T>, decoder: D| -> BoxFuture<'static, Result<D::Output, ClientError>> {
                let next = Arc::clone(&next);
                let policy = policy.clone();
                Box::pin(async move {
                    retry_with_policy(&policy, move || next(request.clone(), decoder.clone())).await
                })
            },
        )
    }
}

/// Log each call with its operation name, duration and outcome.
#[cfg(feature = "tracing")]
pub fn logging<T, D>() -> impl Middleware<T, D>
where
    T: Send + 'static,
    D: Decode,
{
    use tracing::Instrument;

    |next: SendFn<T, D>| -> SendFn<T, D> {
        Arc::new(
            move |request: Request<T>, decoder: D| -> BoxFuture<'static, Result<D::Output, ClientError>> {
                let next = Arc::clone(&next);
                let operation = request
                    .operation
                    .clone()
                    .unwrap_or_else(|| request.endpoints.join("/"));
                let span = tracing::debug_span!(
                    "wacloud.request",
                    method = %request.method,
                    operation = %operation,
                );
                Box::pin(
                    async move {
                        let started = std::time::Instant::now();
                        let result = next(request, decoder).await;
                        let elapsed_ms = started.elapsed().as_millis() as u64;
                        match &result {
                            Ok(_) => tracing::debug!(elapsed_ms, "request completed"),
                            Err(err) => tracing::warn!(elapsed_ms, error = %err, "request failed"),
                        }
                        result
                    }
                    .instrument(span),
                )
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::encoder::Payload;
    use crate::response::StatusDecoder;
    use http::{Method, StatusCode};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;
    type TestFn = SendFn<Payload, StatusDecoder>;

    fn recorder(name: &'static str, log: Log) -> impl Middleware<Payload, StatusDecoder> {
        move |next: TestFn| -> TestFn {
            let log = Arc::clone(&log);
            Arc::new(
                move |request: Request<Payload>, decoder: StatusDecoder| -> BoxFuture<'static, Result<StatusCode, ClientError>> {
                    let next = Arc::clone(&next);
                    let log = Arc::clone(&log);
                    Box::pin(async move {
                        log.lock().unwrap().push(format!("{name} in"));
                        let result = next(request, decoder).await;
                        log.lock().unwrap().push(format!("{name} out"));
                        result
                    })
                },
            )
        }
    }

    fn terminal(log: Log) -> TestFn {
        Arc::new(
            move |_request: Request<Payload>, _decoder: StatusDecoder| -> BoxFuture<'static, Result<StatusCode, ClientError>> {
                let log = Arc::clone(&log);
                Box::pin(async move {
                    log.lock().unwrap().push("send".to_owned());
                    Ok(StatusCode::OK)
                })
            },
        )
    }

    fn request() -> Request<Payload> {
        Request::new(Method::GET, "http://127.0.0.1:1")
    }

    #[tokio::test]
    async fn test_onion_order() {
        let log: Log = Arc::default();
        let chain: MiddlewareChain<Payload, StatusDecoder> = MiddlewareChain::new()
            .with(recorder("A", Arc::clone(&log)))
            .with(recorder("B", Arc::clone(&log)));
        let send = chain.then(terminal(Arc::clone(&log)));

        send(request(), StatusDecoder::default()).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["A in", "B in", "send", "B out", "A out"]
        );
    }

    #[tokio::test]
    async fn test_none_slots_are_skipped() {
        let log: Log = Arc::default();
        let chain: MiddlewareChain<Payload, StatusDecoder> = MiddlewareChain::new()
            .with_optional(None)
            .with(recorder("A", Arc::clone(&log)))
            .with_optional(None)
            .with(recorder("B", Arc::clone(&log)))
            .with_optional(None);
        assert_eq!(chain.len(), 5);
        let send = chain.then(terminal(Arc::clone(&log)));

        send(request(), StatusDecoder::default()).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["A in", "B in", "send", "B out", "A out"]
        );
    }

    #[tokio::test]
    async fn test_empty_chain_is_terminal() {
        let log: Log = Arc::default();
        let chain: MiddlewareChain<Payload, StatusDecoder> = MiddlewareChain::default();
        let send = chain.then(terminal(Arc::clone(&log)));
        assert_eq!(send(request(), StatusDecoder::default()).await.unwrap(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["send"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_send() {
        let log: Log = Arc::default();
        let deny = |_next: TestFn| -> TestFn {
            Arc::new(
                |_request: Request<Payload>, _decoder: StatusDecoder| -> BoxFuture<'static, Result<StatusCode, ClientError>> {
                    Box::pin(async { Err(ClientError::aborted("denied")) })
                },
            )
        };
        let chain: MiddlewareChain<Payload, StatusDecoder> = MiddlewareChain::new()
            .with(recorder("A", Arc::clone(&log)))
            .with(deny);
        let send = chain.then(terminal(Arc::clone(&log)));

        let err = send(request(), StatusDecoder::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::Aborted { .. }));
        assert_eq!(*log.lock().unwrap(), vec!["A in", "A out"]);
    }

    #[tokio::test]
    async fn test_retry_middleware() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let flaky: SendFn<(), StatusDecoder> = Arc::new(
            move |_request: Request<()>, _decoder: StatusDecoder| -> BoxFuture<'static, Result<StatusCode, ClientError>> {
                let counter = Arc::clone(&counter);
                Box::pin(async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ClientError::transport("connection reset"))
                    } else {
                        Ok(StatusCode::OK)
                    }
                })
            },
        );
        let policy = RetryPolicy::new()
            .base_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5));
        let chain: MiddlewareChain<(), StatusDecoder> = MiddlewareChain::new().with(retry(policy));
        let send = chain.then(flaky);

        let status = send(Request::new(Method::GET, "http://127.0.0.1:1"), StatusDecoder::default())
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
