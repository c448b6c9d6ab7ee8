//! An in-memory stream pair.
//!
//! Whatever is written to the [`PipeWriter`] comes out of the [`PipeReader`], in order. While the
//! reader is paused or has no data handler, written chunks stay queued and count against the
//! writer's write queue; once the queue drains to half the max size the writer fires its drain
//! handler. Ending the writer ends the reader after the queued chunks have been delivered.
//!
//! Delivery is serialized: whichever thread writes, resumes or installs the data handler, at
//! most one chunk is in flight to the data handler at a time.
//!
//! A pipe stands in for a socket whose peer reads at its own pace, which makes it the natural
//! glue between two pumps and a convenient endpoint in tests.

use crate::handler::{Attachment, DataHandler, DrainHandler, EndHandler, ExceptionHandler, HandlerSlot};
use crate::stream::{ReadStream, WriteStream};
use crate::StreamError;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

/// Creates a pipe whose write queue reports full at `max_size` queued bytes.
pub fn pipe(max_size: usize) -> (Arc<PipeWriter>, Arc<PipeReader>) {
    let shared = Arc::new(Shared::new(max_size));
    let writer = PipeWriter { shared: Arc::clone(&shared), attachment: Attachment::new() };
    let reader = PipeReader { shared, attachment: Attachment::new() };
    (Arc::new(writer), Arc::new(reader))
}

#[derive(Debug)]
pub struct PipeWriter {
    shared: Arc<Shared>,
    attachment: Attachment,
}

#[derive(Debug)]
pub struct PipeReader {
    shared: Arc<Shared>,
    attachment: Attachment,
}

#[derive(Debug, Default)]
struct Queue {
    chunks: VecDeque<Bytes>,
    queued_bytes: usize,
    closed: bool,
    // a thread is running the delivery loop; others only enqueue
    delivering: bool,
}

#[derive(Debug)]
struct Shared {
    queue: Mutex<Queue>,
    max_size: AtomicUsize,
    paused: AtomicBool,
    ended: AtomicBool,
    drain_wanted: AtomicBool,
    data: HandlerSlot<Bytes>,
    end: HandlerSlot<()>,
    drain: HandlerSlot<()>,
    read_exception: HandlerSlot<StreamError>,
    write_exception: HandlerSlot<StreamError>,
}

impl Shared {
    fn new(max_size: usize) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            max_size: AtomicUsize::new(max_size),
            paused: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            drain_wanted: AtomicBool::new(false),
            data: HandlerSlot::new(),
            end: HandlerSlot::new(),
            drain: HandlerSlot::new(),
            read_exception: HandlerSlot::new(),
            write_exception: HandlerSlot::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_full(&self) -> bool {
        self.lock().queued_bytes >= self.max_size.load(Ordering::Acquire)
    }

    /// Delivers queued chunks while the reader is flowing, then settles drain and end.
    ///
    /// Only one thread delivers at a time. A thread that finds delivery in progress leaves its
    /// work to the delivering thread, which re-checks the queue before giving up ownership, so
    /// the data handler never sees two chunks at once and chunks arrive in write order.
    fn flush(&self) {
        {
            let mut queue = self.lock();
            if queue.delivering {
                return;
            }
            queue.delivering = true;
        }

        loop {
            self.deliver();
            self.settle_drain();
            self.settle_end();

            let mut queue = self.lock();
            if !self.has_pending(&queue) {
                queue.delivering = false;
                return;
            }
        }
    }

    fn has_pending(&self, queue: &Queue) -> bool {
        let paused = self.paused.load(Ordering::Acquire);
        let deliverable = !paused && self.data.is_set() && !queue.chunks.is_empty();
        let drainable =
            queue.queued_bytes <= self.max_size.load(Ordering::Acquire) / 2 && self.drain_wanted.load(Ordering::Acquire);
        let endable = !paused && queue.closed && queue.chunks.is_empty() && !self.ended.load(Ordering::Acquire);
        deliverable || drainable || endable
    }

    fn deliver(&self) {
        loop {
            if self.paused.load(Ordering::Acquire) {
                break;
            }
            let Some(handler) = self.data.get() else {
                break;
            };

            let chunk = {
                let mut queue = self.lock();
                match queue.chunks.pop_front() {
                    Some(chunk) => {
                        queue.queued_bytes -= chunk.len();
                        chunk
                    }
                    None => break,
                }
            };
            handler.call(chunk);
        }
    }

    fn settle_drain(&self) {
        let queued_bytes = self.lock().queued_bytes;
        if queued_bytes <= self.max_size.load(Ordering::Acquire) / 2 && self.drain_wanted.swap(false, Ordering::AcqRel) {
            trace!(queued_bytes, "pipe drained");
            self.drain.fire(());
        }
    }

    fn settle_end(&self) {
        if self.paused.load(Ordering::Acquire) {
            return;
        }
        let finished = {
            let queue = self.lock();
            queue.closed && queue.chunks.is_empty()
        };
        if finished && !self.ended.swap(true, Ordering::AcqRel) {
            self.end.fire(());
        }
    }
}

impl PipeWriter {
    /// Closes the write side. The reader ends once it has consumed the queued chunks.
    pub fn end(&self) {
        self.shared.lock().closed = true;
        self.shared.flush();
    }

    /// Bytes written but not yet delivered to the reader.
    pub fn queued_bytes(&self) -> usize {
        self.shared.lock().queued_bytes
    }
}

impl WriteStream for PipeWriter {
    fn write(&self, chunk: Bytes) {
        let accepted = {
            let mut queue = self.shared.lock();
            if queue.closed {
                false
            } else {
                queue.queued_bytes += chunk.len();
                queue.chunks.push_back(chunk);
                if queue.queued_bytes >= self.shared.max_size.load(Ordering::Acquire) {
                    self.shared.drain_wanted.store(true, Ordering::Release);
                }
                true
            }
        };

        if !accepted {
            self.shared.write_exception.fire(StreamError::WriteAfterEnd);
            return;
        }
        self.shared.flush();
    }

    fn set_write_queue_max_size(&self, max_size: usize) {
        self.shared.max_size.store(max_size, Ordering::Release);
    }

    fn write_queue_full(&self) -> bool {
        let full = self.shared.is_full();
        if full {
            self.shared.drain_wanted.store(true, Ordering::Release);
        }
        full
    }

    fn drain_handler(&self, handler: Option<DrainHandler>) {
        self.shared.drain.set(handler);
    }

    fn exception_handler(&self, handler: Option<ExceptionHandler>) {
        self.shared.write_exception.set(handler);
    }

    fn attachment(&self) -> &Attachment {
        &self.attachment
    }
}

impl ReadStream for PipeReader {
    fn data_handler(&self, handler: Option<DataHandler>) {
        let flowing = handler.is_some();
        self.shared.data.set(handler);
        if flowing {
            self.shared.flush();
        }
    }

    fn end_handler(&self, handler: Option<EndHandler>) {
        self.shared.end.set(handler);
    }

    fn exception_handler(&self, handler: Option<ExceptionHandler>) {
        self.shared.read_exception.set(handler);
    }

    fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    fn resume(&self) {
        if self.shared.paused.swap(false, Ordering::AcqRel) {
            self.shared.flush();
        }
    }

    fn is_ended(&self) -> bool {
        self.shared.ended.load(Ordering::Acquire)
    }

    fn attachment(&self) -> &Attachment {
        &self.attachment
    }
}
