//! The client response contract.

use crate::protocol::response::header_pair;
use crate::protocol::{Entries, HttpError, header_entries};
use http::response::Parts;
use http::{HeaderMap, Response, StatusCode};
use sluice_stream::ReadStream;
use std::fmt;
use std::sync::Arc;

/// A response received by an HTTP client.
pub trait RawClientResponse: Send + Sync {
    fn status(&self) -> StatusCode;

    fn all_headers(&self) -> Result<Entries, HttpError>;

    /// Trailers sent after the body. Empty until the body has ended.
    fn all_trailers(&self) -> Result<Entries, HttpError>;

    fn body(&self) -> Arc<dyn ReadStream>;
}

/// A client response made of a received head, its trailers and a body stream.
pub struct ClientResponseHead {
    parts: Parts,
    trailers: HeaderMap,
    body: Arc<dyn ReadStream>,
}

impl ClientResponseHead {
    pub fn new(parts: Parts, body: Arc<dyn ReadStream>) -> Self {
        Self { parts, trailers: HeaderMap::new(), body }
    }

    pub fn from_response(response: Response<()>, body: Arc<dyn ReadStream>) -> Self {
        Self::new(response.into_parts().0, body)
    }

    /// Adds a trailer, keeping earlier values of the same name.
    pub fn with_trailer(mut self, name: &str, value: &str) -> Result<Self, HttpError> {
        let (name, value) = header_pair(name, value)?;
        self.trailers.append(name, value);
        Ok(self)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }
}

impl RawClientResponse for ClientResponseHead {
    fn status(&self) -> StatusCode {
        self.parts.status
    }

    fn all_headers(&self) -> Result<Entries, HttpError> {
        header_entries(&self.parts.headers)
    }

    fn all_trailers(&self) -> Result<Entries, HttpError> {
        header_entries(&self.trailers)
    }

    fn body(&self) -> Arc<dyn ReadStream> {
        Arc::clone(&self.body)
    }
}

impl fmt::Debug for ClientResponseHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientResponseHead")
            .field("status", &self.parts.status)
            .field("headers", &self.parts.headers)
            .field("trailers", &self.trailers)
            .finish_non_exhaustive()
    }
}
