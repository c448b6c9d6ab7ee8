//! Request dispatch and routing for sluice.
//!
//! An HTTP engine parses requests and hands them to an [`HttpServer`] as
//! [`RawRequest`](sluice_http::protocol::RawRequest)s. The server forwards each one to the
//! installed [`Handler`]: either a single [`RequestHandler`] that sees every request, or a
//! [`RouteMatcher`](router::RouteMatcher) that picks a handler by method and path.
//!
//! Handlers receive a [`ServerRequest`] whose [`headers`](ServerRequest::headers) and
//! [`params`](ServerRequest::params) are computed from the raw request on first use and then
//! cached, and answer through its [`ServerResponse`].
//!
//! ```
//! use http::{Method, Request};
//! use sluice_http::protocol::{MemoryResponse, RawResponse, RequestHead};
//! use sluice_web::router::RouteMatcher;
//! use sluice_web::{handler_fn, Dispatch, HttpServer, ServerRequest};
//! use std::sync::Arc;
//!
//! let mut matcher = RouteMatcher::new();
//! matcher
//!     .get("/hello/:name", handler_fn(|request: ServerRequest| {
//!         let name = request.params().unwrap()["name"].clone();
//!         request.response().write(format!("hello {name}"));
//!         request.response().end().unwrap();
//!     }))
//!     .unwrap();
//!
//! let server = HttpServer::new();
//! server.request_handler(matcher);
//!
//! let response = Arc::new(MemoryResponse::new());
//! let request = Request::builder().method(Method::GET).uri("/hello/world").body(()).unwrap();
//! let head = RequestHead::new(request, Arc::clone(&response) as Arc<dyn RawResponse>);
//!
//! assert_eq!(server.dispatch(Arc::new(head)), Dispatch::Matched);
//! assert_eq!(response.body(), "hello world");
//! ```

mod client;
mod handler;
mod lazy_map;
mod request;
mod response;
mod server;

pub mod router;

pub use client::ClientResponse;
pub use client::wrap_response_handler;
pub use handler::Dispatch;
pub use handler::FnHandler;
pub use handler::Handler;
pub use handler::RequestHandler;
pub use handler::handler_fn;
pub use lazy_map::LazyMap;
pub use lazy_map::ParamMap;
pub use request::ServerRequest;
pub use response::ServerResponse;
pub use server::HttpServer;
