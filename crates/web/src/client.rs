//! Client responses with lazily materialized headers and trailers.

use crate::lazy_map::{LazyMap, ParamMap};
use http::StatusCode;
use sluice_http::protocol::{HttpError, RawClientResponse};
use sluice_stream::{Callback, ReadStream};
use std::fmt;
use std::sync::Arc;

pub struct ClientResponse {
    raw: Arc<dyn RawClientResponse>,
    headers: LazyMap,
    trailers: LazyMap,
}

impl ClientResponse {
    pub fn new(raw: Arc<dyn RawClientResponse>) -> Self {
        Self { raw, headers: LazyMap::new(), trailers: LazyMap::new() }
    }

    pub fn status(&self) -> StatusCode {
        self.raw.status()
    }

    /// The response headers, loaded on first call.
    pub fn headers(&self) -> Result<&ParamMap, HttpError> {
        self.headers.get_or_load(|| self.raw.all_headers())
    }

    /// The response trailers, loaded on first call.
    ///
    /// Trailers arrive after the body, so call this from the body's end handler; a map loaded
    /// earlier stays empty.
    pub fn trailers(&self) -> Result<&ParamMap, HttpError> {
        self.trailers.get_or_load(|| self.raw.all_trailers())
    }

    pub fn body(&self) -> Arc<dyn ReadStream> {
        self.raw.body()
    }
}

impl fmt::Debug for ClientResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientResponse").field("status", &self.status()).finish_non_exhaustive()
    }
}

/// Adapts a handler of [`ClientResponse`]s to the raw responses a client emits.
pub fn wrap_response_handler<F>(f: F) -> Callback<Arc<dyn RawClientResponse>>
where
    F: Fn(ClientResponse) + Send + Sync + 'static,
{
    Callback::new(move |raw| f(ClientResponse::new(raw)))
}
