//! The response handed to request handlers.

use bytes::Bytes;
use http::StatusCode;
use sluice_http::protocol::{HttpError, RawResponse};
use std::fmt;
use std::sync::Arc;

/// Typed access to a [`RawResponse`], with bulk header and trailer setters.
///
/// Cloning is cheap, every clone drives the same underlying response.
#[derive(Clone)]
pub struct ServerResponse {
    raw: Arc<dyn RawResponse>,
}

impl ServerResponse {
    pub fn new(raw: Arc<dyn RawResponse>) -> Self {
        Self { raw }
    }

    pub fn set_status(&self, status: StatusCode) -> Result<(), HttpError> {
        self.raw.set_status(status)
    }

    pub fn put_header(&self, name: &str, value: &str) -> Result<(), HttpError> {
        self.raw.put_header(name, value)
    }

    /// Sets every header of `headers`, in iteration order.
    ///
    /// Stops at the first rejected header; headers set before it stay set.
    pub fn put_headers<I, K, V>(&self, headers: I) -> Result<(), HttpError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers.into_iter().try_for_each(|(name, value)| self.raw.put_header(name.as_ref(), value.as_ref()))
    }

    pub fn put_trailer(&self, name: &str, value: &str) -> Result<(), HttpError> {
        self.raw.put_trailer(name, value)
    }

    /// Sets every trailer of `trailers`, in iteration order.
    pub fn put_trailers<I, K, V>(&self, trailers: I) -> Result<(), HttpError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        trailers.into_iter().try_for_each(|(name, value)| self.raw.put_trailer(name.as_ref(), value.as_ref()))
    }

    pub fn write(&self, chunk: impl Into<Bytes>) {
        self.raw.write(chunk.into());
    }

    pub fn end(&self) -> Result<(), HttpError> {
        self.raw.end()
    }

    /// The underlying response, e.g. as the sink of a [`Pump`](sluice_stream::Pump).
    pub fn raw(&self) -> Arc<dyn RawResponse> {
        Arc::clone(&self.raw)
    }
}

impl fmt::Debug for ServerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerResponse").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_http::protocol::MemoryResponse;

    #[test]
    fn bulk_setters_apply_in_order() {
        let memory = Arc::new(MemoryResponse::new());
        let response = ServerResponse::new(Arc::clone(&memory) as Arc<dyn RawResponse>);

        response.put_headers([("content-type", "text/plain"), ("x-id", "1"), ("x-id", "2")]).unwrap();
        response.write("body");
        response.put_trailers(vec![("x-checksum".to_string(), "abc".to_string())]).unwrap();
        response.end().unwrap();

        let headers = memory.headers();
        assert_eq!(headers.get("content-type").unwrap(), "text/plain");
        assert_eq!(headers.get("x-id").unwrap(), "2");
        assert_eq!(memory.trailers().get("x-checksum").unwrap(), "abc");
        assert_eq!(memory.body(), Bytes::from_static(b"body"));
    }

    #[test]
    fn bulk_setter_stops_at_the_first_invalid_header() {
        let memory = Arc::new(MemoryResponse::new());
        let response = ServerResponse::new(Arc::clone(&memory) as Arc<dyn RawResponse>);

        let result = response.put_headers([("x-first", "1"), ("bad name", "2"), ("x-third", "3")]);

        assert!(matches!(result, Err(HttpError::InvalidHeader { .. })));
        let headers = memory.headers();
        assert!(headers.contains_key("x-first"));
        assert!(!headers.contains_key("x-third"));
    }
}
