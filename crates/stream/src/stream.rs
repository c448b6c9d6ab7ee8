//! The read and write stream contracts.
//!
//! Both traits take `&self`: a stream is a shared handle (usually an `Arc<S>`) whose events are
//! raised by whatever drives it, and whose callbacks may call back into it. Implementations keep
//! their mutable state behind atomics or short-lived locks and must never hold a lock while
//! firing a callback.

use crate::handler::{Attachment, DataHandler, DrainHandler, EndHandler, ExceptionHandler};
use bytes::Bytes;

/// Default write queue limit of a write stream, in bytes.
pub const DEFAULT_WRITE_QUEUE_MAX_SIZE: usize = 64 * 1024;

/// Default size of a single read from an underlying reader.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// A source of data chunks.
///
/// Chunks are pushed to the installed data handler in order. While paused, the stream must not
/// emit chunks; it resumes emitting after [`resume`](ReadStream::resume). Once the last chunk
/// has been delivered the end handler fires and [`is_ended`](ReadStream::is_ended) turns `true`.
pub trait ReadStream: Send + Sync {
    /// Installs the data callback, replacing the previous one. `None` clears it.
    fn data_handler(&self, handler: Option<DataHandler>);

    fn end_handler(&self, handler: Option<EndHandler>);

    fn exception_handler(&self, handler: Option<ExceptionHandler>);

    fn pause(&self);

    fn resume(&self);

    /// Returns `true` once the stream has signaled its end.
    fn is_ended(&self) -> bool;

    /// The attachment held by the pump currently reading this stream.
    fn attachment(&self) -> &Attachment;
}

/// A sink for data chunks with a bounded write queue.
///
/// `write` never blocks. Data that cannot be handed to the underlying target right away is
/// queued; once the queued amount reaches the write queue max size,
/// [`write_queue_full`](WriteStream::write_queue_full) reports `true` and the drain handler fires
/// when the sink can take data again. Write failures are delivered to the exception handler.
pub trait WriteStream: Send + Sync {
    fn write(&self, chunk: Bytes);

    fn set_write_queue_max_size(&self, max_size: usize);

    fn write_queue_full(&self) -> bool;

    /// Installs the drain callback, replacing the previous one. `None` clears it.
    fn drain_handler(&self, handler: Option<DrainHandler>);

    fn exception_handler(&self, handler: Option<ExceptionHandler>);

    /// The attachment held by the pump currently writing this stream.
    fn attachment(&self) -> &Attachment;
}
