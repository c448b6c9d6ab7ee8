//! The contracts between an HTTP engine and the dispatch layer.
//!
//! An engine owns sockets and parsing. It hands each request over as a [`RawRequest`] whose
//! headers and query parameters are available through entry providers, and writes the reply
//! through a [`RawResponse`], which is also a [`WriteStream`](sluice_stream::WriteStream) so a
//! body can be pumped into it. Client responses come in as [`RawClientResponse`].
//!
//! [`RequestHead`], [`MemoryResponse`] and [`ClientResponseHead`] implement these contracts on
//! top of the `http` crate types, without any transport.

mod entries;
pub use entries::Entries;
pub use entries::header_entries;
pub use entries::query_entries;

mod request;
pub use request::RawRequest;
pub use request::RequestHead;

mod response;
pub use response::MemoryResponse;
pub use response::RawResponse;

mod client;
pub use client::ClientResponseHead;
pub use client::RawClientResponse;

mod error;
pub use error::HttpError;
