//! Engine-facing HTTP contracts for sluice.
//!
//! This crate describes what an HTTP engine hands to the dispatch layer and what it expects
//! back, without implementing a transport:
//!
//! - [`protocol::RawRequest`]: method, uri, and ordered header / query parameter entries
//! - [`protocol::RawResponse`]: status, headers, trailers, and a body written as a
//!   [`WriteStream`](sluice_stream::WriteStream)
//! - [`protocol::RawClientResponse`]: status, headers, trailers, and a body
//!   [`ReadStream`](sluice_stream::ReadStream)
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use http::{Request, StatusCode};
//! use sluice_http::protocol::{MemoryResponse, RawRequest, RawResponse, RequestHead};
//! use sluice_stream::WriteStream;
//! use std::sync::Arc;
//!
//! let response = Arc::new(MemoryResponse::new());
//! let request = Request::get("/hello?name=world").body(()).unwrap();
//! let head = RequestHead::new(request, Arc::clone(&response) as Arc<dyn RawResponse>);
//!
//! assert_eq!(head.all_params().unwrap(), vec![("name".to_string(), "world".to_string())]);
//!
//! let reply = head.response();
//! reply.set_status(StatusCode::OK).unwrap();
//! reply.write(Bytes::from_static(b"hello world"));
//! reply.end().unwrap();
//!
//! assert_eq!(response.body(), Bytes::from_static(b"hello world"));
//! ```
//!
//! # Error Handling
//!
//! All contract methods report misuse through [`protocol::HttpError`]: reading entries from a
//! finalized request, changing headers after the body has started, or passing a header that
//! is not valid on the wire.

pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
