//! The outbound response contract and an in-memory response.

use crate::ensure;
use crate::protocol::HttpError;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use sluice_stream::{Attachment, DrainHandler, ExceptionHandler, HandlerSlot, StreamError, WriteStream};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// The response side of an exchange.
///
/// The body is written through the [`WriteStream`] half, so a response can be the sink of a
/// [`Pump`](sluice_stream::Pump). Status and headers can change until the first body chunk is
/// written, trailers until the response ends.
pub trait RawResponse: WriteStream {
    fn set_status(&self, status: StatusCode) -> Result<(), HttpError>;

    /// Sets header `name` to `value`, replacing earlier values of that name.
    fn put_header(&self, name: &str, value: &str) -> Result<(), HttpError>;

    /// Sets trailer `name` to `value`, replacing earlier values of that name.
    fn put_trailer(&self, name: &str, value: &str) -> Result<(), HttpError>;

    /// Completes the response. Later writes are reported as [`StreamError::WriteAfterEnd`].
    fn end(&self) -> Result<(), HttpError>;
}

pub(crate) fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), HttpError> {
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| HttpError::invalid_header(format!("{name}: {e}")))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| HttpError::invalid_header(format!("{name}: {e}")))?;
    Ok((header_name, header_value))
}

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: HeaderMap,
    trailers: HeaderMap,
    body: BytesMut,
    committed: bool,
    ended: bool,
}

/// A response that collects everything written to it.
///
/// Writes complete immediately, so its write queue is never full.
pub struct MemoryResponse {
    state: Mutex<ResponseState>,
    drain: HandlerSlot<()>,
    exception: HandlerSlot<StreamError>,
    attachment: Attachment,
}

impl MemoryResponse {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ResponseState {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                trailers: HeaderMap::new(),
                body: BytesMut::new(),
                committed: false,
                ended: false,
            }),
            drain: HandlerSlot::new(),
            exception: HandlerSlot::new(),
            attachment: Attachment::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ResponseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> StatusCode {
        self.lock().status
    }

    pub fn headers(&self) -> HeaderMap {
        self.lock().headers.clone()
    }

    pub fn trailers(&self) -> HeaderMap {
        self.lock().trailers.clone()
    }

    /// The body written so far.
    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.lock().body)
    }

    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }

    /// Snapshot of the response as an [`http::Response`]. Trailers are not included.
    pub fn to_response(&self) -> Response<Bytes> {
        let state = self.lock();
        let mut response = Response::new(Bytes::copy_from_slice(&state.body));
        *response.status_mut() = state.status;
        *response.headers_mut() = state.headers.clone();
        response
    }
}

impl Default for MemoryResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl RawResponse for MemoryResponse {
    fn set_status(&self, status: StatusCode) -> Result<(), HttpError> {
        let mut state = self.lock();
        ensure!(!state.committed, HttpError::finalized("response", "status"));
        state.status = status;
        Ok(())
    }

    fn put_header(&self, name: &str, value: &str) -> Result<(), HttpError> {
        let (name, value) = header_pair(name, value)?;
        let mut state = self.lock();
        ensure!(!state.committed, HttpError::finalized("response", "headers"));
        state.headers.insert(name, value);
        Ok(())
    }

    fn put_trailer(&self, name: &str, value: &str) -> Result<(), HttpError> {
        let (name, value) = header_pair(name, value)?;
        let mut state = self.lock();
        ensure!(!state.ended, HttpError::finalized("response", "trailers"));
        state.trailers.insert(name, value);
        Ok(())
    }

    fn end(&self) -> Result<(), HttpError> {
        let mut state = self.lock();
        ensure!(!state.ended, HttpError::finalized("response", "body"));
        state.committed = true;
        state.ended = true;
        trace!(status = %state.status, bytes = state.body.len(), "response ended");
        Ok(())
    }
}

impl WriteStream for MemoryResponse {
    fn write(&self, chunk: Bytes) {
        let accepted = {
            let mut state = self.lock();
            if state.ended {
                false
            } else {
                state.committed = true;
                state.body.extend_from_slice(&chunk);
                true
            }
        };

        if !accepted {
            self.exception.fire(StreamError::WriteAfterEnd);
        }
    }

    /// Does nothing: writes complete immediately and nothing is ever queued.
    fn set_write_queue_max_size(&self, _max_size: usize) {}

    fn write_queue_full(&self) -> bool {
        false
    }

    fn drain_handler(&self, handler: Option<DrainHandler>) {
        self.drain.set(handler);
    }

    fn exception_handler(&self, handler: Option<ExceptionHandler>) {
        self.exception.set(handler);
    }

    fn attachment(&self) -> &Attachment {
        &self.attachment
    }
}

impl fmt::Debug for MemoryResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryResponse")
            .field("status", &state.status)
            .field("headers", &state.headers)
            .field("body_len", &state.body.len())
            .field("ended", &state.ended)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_stream::Callback;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn collects_status_headers_and_body() {
        let response = MemoryResponse::new();
        response.set_status(StatusCode::CREATED).unwrap();
        response.put_header("Content-Type", "text/plain").unwrap();
        response.put_header("content-type", "text/html").unwrap();

        response.write(Bytes::from_static(b"hello "));
        response.write(Bytes::from_static(b"world"));
        response.end().unwrap();

        let http_response = response.to_response();
        assert_eq!(http_response.status(), StatusCode::CREATED);
        assert_eq!(http_response.headers().get(http::header::CONTENT_TYPE).unwrap(), "text/html");
        assert_eq!(http_response.body(), &Bytes::from_static(b"hello world"));
        assert!(response.is_ended());
    }

    #[test]
    fn headers_are_fixed_by_the_first_write() {
        let response = MemoryResponse::new();
        response.write(Bytes::from_static(b"x"));

        assert!(matches!(response.put_header("x-late", "1"), Err(HttpError::Finalized { what: "headers", .. })));
        assert!(matches!(response.set_status(StatusCode::NOT_FOUND), Err(HttpError::Finalized { .. })));
        response.put_trailer("x-checksum", "abc").unwrap();

        response.end().unwrap();
        assert!(matches!(response.put_trailer("x-late", "1"), Err(HttpError::Finalized { what: "trailers", .. })));
        assert_eq!(response.trailers().get("x-checksum").unwrap(), "abc");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let response = MemoryResponse::new();
        assert!(matches!(response.put_header("bad header", "1"), Err(HttpError::InvalidHeader { .. })));
        assert!(matches!(response.put_header("x-ok", "line\nbreak"), Err(HttpError::InvalidHeader { .. })));
        assert!(response.headers().is_empty());
    }

    #[test]
    fn write_after_end_goes_to_the_exception_handler() {
        let response = MemoryResponse::new();
        let rejected = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&rejected);
        response.exception_handler(Some(Callback::new(move |e| {
            flag.store(matches!(e, StreamError::WriteAfterEnd), Ordering::SeqCst);
        })));

        response.end().unwrap();
        response.write(Bytes::from_static(b"late"));

        assert!(rejected.load(Ordering::SeqCst));
        assert!(response.body().is_empty());
        assert!(matches!(response.end(), Err(HttpError::Finalized { what: "body", .. })));
    }

    #[test]
    fn write_queue_limit_does_not_apply() {
        let response = MemoryResponse::new();
        response.set_write_queue_max_size(1);
        response.write(Bytes::from_static(b"more than one byte"));

        assert!(!response.write_queue_full());
        assert_eq!(response.body(), "more than one byte");
    }
}
