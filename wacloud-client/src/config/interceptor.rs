//! Request and response interceptors.
//!
//! The sender has one request slot and one response slot. A request
//! interceptor sees the fully built transport request before it is sent and
//! may edit its headers or abort the call. A response interceptor sees the
//! buffered response before decoding and may reject it.
//!
//! To run several interceptors in one slot, compose them with [`Chain`]
//! before registering.
//!
//! # Example
//!
//! ```ignore
//! use wacloud_client::{Chain, HeaderInterceptor, request_fn, RequestContext};
//!
//! let tag = HeaderInterceptor::new("x-request-source", "billing-job")?;
//! let guard = request_fn(|ctx: &mut RequestContext<'_>| {
//!     if ctx.method == http::Method::DELETE {
//!         return Err(ClientError::aborted("deletes are disabled"));
//!     }
//!     Ok(())
//! });
//!
//! let client = Client::builder("https://graph.facebook.com")
//!     .request_interceptor(Chain(tag, guard))
//!     .build()?;
//! ```

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};

use crate::{BuildError, ClientError};

// ============================================================================
// Contexts
// ============================================================================

/// The outgoing request as seen by a [`RequestInterceptor`].
#[derive(Debug)]
pub struct RequestContext<'a> {
    /// Operation name set on the request, if any.
    pub operation: Option<&'a str>,
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a mut HeaderMap,
}

/// The completed response as seen by a [`ResponseInterceptor`].
#[derive(Debug)]
pub struct ResponseContext<'a> {
    pub operation: Option<&'a str>,
    pub status: StatusCode,
    pub headers: &'a HeaderMap,
    pub body: &'a Bytes,
}

// ============================================================================
// Traits
// ============================================================================

/// Hook run on the built transport request.
///
/// Returning an error aborts the call before any network I/O.
pub trait RequestInterceptor: Send + Sync {
    fn intercept_request(&self, ctx: &mut RequestContext<'_>) -> Result<(), ClientError>;
}

/// Hook run on the buffered response, before decoding.
///
/// Returning an error replaces the decoded result.
pub trait ResponseInterceptor: Send + Sync {
    fn intercept_response(&self, ctx: &ResponseContext<'_>) -> Result<(), ClientError>;
}

impl RequestInterceptor for () {
    #[inline]
    fn intercept_request(&self, _ctx: &mut RequestContext<'_>) -> Result<(), ClientError> {
        Ok(())
    }
}

impl ResponseInterceptor for () {
    #[inline]
    fn intercept_response(&self, _ctx: &ResponseContext<'_>) -> Result<(), ClientError> {
        Ok(())
    }
}

// ============================================================================
// Chain Combinator
// ============================================================================

/// Two interceptors run in sequence.
///
/// For requests `A` runs before `B`; for responses `B` runs before `A`.
/// The first error stops the chain.
#[derive(Clone, Debug)]
pub struct Chain<A, B>(pub A, pub B);

impl<A, B> RequestInterceptor for Chain<A, B>
where
    A: RequestInterceptor,
    B: RequestInterceptor,
{
    fn intercept_request(&self, ctx: &mut RequestContext<'_>) -> Result<(), ClientError> {
        self.0.intercept_request(ctx)?;
        self.1.intercept_request(ctx)
    }
}

impl<A, B> ResponseInterceptor for Chain<A, B>
where
    A: ResponseInterceptor,
    B: ResponseInterceptor,
{
    fn intercept_response(&self, ctx: &ResponseContext<'_>) -> Result<(), ClientError> {
        self.1.intercept_response(ctx)?;
        self.0.intercept_response(ctx)
    }
}

// ============================================================================
// Header Interceptor
// ============================================================================

/// Sets one header on every request.
#[derive(Clone, Debug)]
pub struct HeaderInterceptor {
    name: HeaderName,
    value: HeaderValue,
}

impl HeaderInterceptor {
    pub fn new(name: &str, value: &str) -> Result<Self, BuildError> {
        let invalid = || BuildError::InvalidHeader {
            name: name.to_owned(),
        };
        Ok(Self {
            name: name.parse().map_err(|_| invalid())?,
            value: value.parse().map_err(|_| invalid())?,
        })
    }

    pub fn from_parts(name: HeaderName, value: HeaderValue) -> Self {
        Self { name, value }
    }
}

impl RequestInterceptor for HeaderInterceptor {
    fn intercept_request(&self, ctx: &mut RequestContext<'_>) -> Result<(), ClientError> {
        ctx.headers.insert(self.name.clone(), self.value.clone());
        Ok(())
    }
}

// ============================================================================
// Closure Interceptors
// ============================================================================

/// A closure used as a [`RequestInterceptor`]. Built with [`request_fn`].
#[derive(Clone)]
pub struct RequestFn<F>(F);

/// A closure used as a [`ResponseInterceptor`]. Built with [`response_fn`].
#[derive(Clone)]
pub struct ResponseFn<F>(F);

pub fn request_fn<F>(f: F) -> RequestFn<F>
where
    F: Fn(&mut RequestContext<'_>) -> Result<(), ClientError> + Send + Sync,
{
    RequestFn(f)
}

pub fn response_fn<F>(f: F) -> ResponseFn<F>
where
    F: Fn(&ResponseContext<'_>) -> Result<(), ClientError> + Send + Sync,
{
    ResponseFn(f)
}

impl<F> RequestInterceptor for RequestFn<F>
where
    F: Fn(&mut RequestContext<'_>) -> Result<(), ClientError> + Send + Sync,
{
    fn intercept_request(&self, ctx: &mut RequestContext<'_>) -> Result<(), ClientError> {
        (self.0)(ctx)
    }
}

impl<F> ResponseInterceptor for ResponseFn<F>
where
    F: Fn(&ResponseContext<'_>) -> Result<(), ClientError> + Send + Sync,
{
    fn intercept_response(&self, ctx: &ResponseContext<'_>) -> Result<(), ClientError> {
        (self.0)(ctx)
    }
}

impl<F> std::fmt::Debug for RequestFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RequestFn")
    }
}

impl<F> std::fmt::Debug for ResponseFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResponseFn")
    }
}
