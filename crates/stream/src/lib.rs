//! Event driven streams with backpressure.
//!
//! This crate defines the two stream contracts the rest of sluice is built on:
//!
//! - [`ReadStream`]: emits data chunks to a data handler, can be paused and resumed, and signals
//!   its end once.
//! - [`WriteStream`]: accepts chunks without blocking, reports when its write queue is full, and
//!   fires a drain handler when it can take data again.
//!
//! A [`Pump`] couples one of each and moves data from the source to the sink, pausing the source
//! whenever the sink is full. [`pipe`] gives an in-memory stream pair, and the [`io`] module
//! adapts tokio readers and writers.
//!
//! Every event has a single replaceable callback ([`Callback`], stored in a [`HandlerSlot`]);
//! callbacks may run on any thread and may call back into the stream that fired them.

mod error;
mod handler;
pub mod io;
mod pipe;
mod pump;
mod stream;

pub use error::{PumpError, StreamError};
pub use handler::{Attachment, Callback, DataHandler, DrainHandler, EndHandler, ExceptionHandler, HandlerSlot};
pub use pipe::{PipeReader, PipeWriter, pipe};
pub use pump::Pump;
pub use stream::{DEFAULT_READ_CHUNK_SIZE, DEFAULT_WRITE_QUEUE_MAX_SIZE, ReadStream, WriteStream};
