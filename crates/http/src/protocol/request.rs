//! The inbound request contract and an engine-agnostic request head.

use crate::ensure;
use crate::protocol::{Entries, HttpError, RawResponse, header_entries, query_entries};
use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};
use sluice_stream::ReadStream;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// An inbound request as the engine hands it over.
///
/// The entry providers may be called any number of times, each call walks the underlying data
/// again. Once the engine has finalized the request they fail with [`HttpError::Finalized`].
pub trait RawRequest: Send + Sync {
    fn method(&self) -> &Method;

    fn uri(&self) -> &Uri;

    /// The path component of the request uri, without the query string.
    fn path(&self) -> &str {
        self.uri().path()
    }

    /// All request headers, see [`header_entries`].
    fn all_headers(&self) -> Result<Entries, HttpError>;

    /// All query string parameters, see [`query_entries`].
    fn all_params(&self) -> Result<Entries, HttpError>;

    /// The response paired with this request.
    fn response(&self) -> Arc<dyn RawResponse>;

    /// The request body, for requests that carry one.
    fn body(&self) -> Option<Arc<dyn ReadStream>> {
        None
    }
}

/// A request head backed by a bodyless [`Request`].
///
/// The body, if any, is attached as a [`ReadStream`] with [`with_body`](RequestHead::with_body).
pub struct RequestHead {
    inner: Request<()>,
    body: Option<Arc<dyn ReadStream>>,
    response: Arc<dyn RawResponse>,
    finalized: AtomicBool,
}

impl RequestHead {
    pub fn new(inner: Request<()>, response: Arc<dyn RawResponse>) -> Self {
        Self { inner, body: None, response, finalized: AtomicBool::new(false) }
    }

    pub fn with_body(mut self, body: Arc<dyn ReadStream>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn from_parts(parts: Parts, response: Arc<dyn RawResponse>) -> Self {
        Self::new(Request::from_parts(parts, ()), response)
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Marks the request as complete. The entry providers stop answering afterwards.
    pub fn finalize(&self) {
        if !self.finalized.swap(true, Ordering::AcqRel) {
            trace!(path = self.inner.uri().path(), "request finalized");
        }
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }
}

impl AsRef<Request<()>> for RequestHead {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RawRequest for RequestHead {
    fn method(&self) -> &Method {
        self.inner.method()
    }

    fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    fn all_headers(&self) -> Result<Entries, HttpError> {
        ensure!(!self.is_finalized(), HttpError::finalized("request", "headers"));
        header_entries(self.inner.headers())
    }

    fn all_params(&self) -> Result<Entries, HttpError> {
        ensure!(!self.is_finalized(), HttpError::finalized("request", "params"));
        query_entries(self.inner.uri())
    }

    fn response(&self) -> Arc<dyn RawResponse> {
        Arc::clone(&self.response)
    }

    fn body(&self) -> Option<Arc<dyn ReadStream>> {
        self.body.clone()
    }
}

impl fmt::Debug for RequestHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHead")
            .field("method", self.inner.method())
            .field("uri", self.inner.uri())
            .field("has_body", &self.body.is_some())
            .field("finalized", &self.is_finalized())
            .finish_non_exhaustive()
    }
}
