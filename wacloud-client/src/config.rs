//! Pipeline configuration.
//!
//! - [`RequestInterceptor`] / [`ResponseInterceptor`]: single-slot hooks on
//!   the transport request and the buffered response
//! - [`middleware`]: composable wrappers around the sender's entry point
//! - [`RetryPolicy`]: backoff shape for media downloads and the retry middleware

mod interceptor;
pub mod middleware;
mod retry;

pub use interceptor::{
    Chain, HeaderInterceptor, RequestContext, RequestFn, RequestInterceptor, ResponseContext,
    ResponseFn, ResponseInterceptor, request_fn, response_fn,
};
pub use middleware::{BoxFuture, Middleware, MiddlewareChain, SendFn};
pub use retry::{ExponentialBackoff, RetryPolicy, RetryPolicyError, defaults, retry_with_policy};
