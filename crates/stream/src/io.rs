//! Streams backed by tokio readers and writers.
//!
//! [`AsyncReadStream`] drives an [`AsyncRead`] from a spawned task and pushes what it reads to
//! the data handler, honoring pause. [`AsyncWriteStream`] feeds an [`AsyncWrite`] from a spawned
//! task and accounts the bytes that were accepted but not yet written against its write queue.
//! Both must be created from within a tokio runtime.

use crate::handler::{Attachment, DataHandler, DrainHandler, EndHandler, ExceptionHandler, HandlerSlot};
use crate::stream::{DEFAULT_WRITE_QUEUE_MAX_SIZE, ReadStream, WriteStream};
use crate::StreamError;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, trace};

pub struct AsyncReadStream {
    data: HandlerSlot<Bytes>,
    end: HandlerSlot<()>,
    exception: HandlerSlot<StreamError>,
    paused: AtomicBool,
    ended: AtomicBool,
    wakeup: Arc<Notify>,
    attachment: Attachment,
}

impl AsyncReadStream {
    /// Spawns the read task. Each read asks `reader` for at most `chunk_size` bytes.
    ///
    /// Reading is deferred until a data handler is installed; the task exits on end of input, on
    /// a read error, or once the returned stream is dropped.
    pub fn spawn<R>(reader: R, chunk_size: usize) -> Arc<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let stream = Arc::new(Self {
            data: HandlerSlot::new(),
            end: HandlerSlot::new(),
            exception: HandlerSlot::new(),
            paused: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            wakeup: Arc::new(Notify::new()),
            attachment: Attachment::new(),
        });

        let wakeup = Arc::clone(&stream.wakeup);
        tokio::spawn(read_loop(reader, chunk_size.max(1), Arc::downgrade(&stream), wakeup));
        stream
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn is_flowing(&self) -> bool {
        !self.is_paused() && self.data.is_set()
    }
}

/// Waits until the stream is alive and `ready`, returns `None` once it has been dropped.
async fn until<F>(stream: &Weak<AsyncReadStream>, wakeup: &Notify, ready: F) -> Option<Arc<AsyncReadStream>>
where
    F: Fn(&AsyncReadStream) -> bool,
{
    loop {
        let notified = wakeup.notified();
        {
            let stream = stream.upgrade()?;
            if ready(&stream) {
                return Some(stream);
            }
        }
        notified.await;
    }
}

async fn read_loop<R>(mut reader: R, chunk_size: usize, stream: Weak<AsyncReadStream>, wakeup: Arc<Notify>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut buf = BytesMut::new();
    loop {
        if until(&stream, &wakeup, AsyncReadStream::is_flowing).await.is_none() {
            return;
        }

        buf.resize(chunk_size, 0);
        let read = reader.read(&mut buf).await;

        match read {
            Ok(0) => {
                let Some(stream) = until(&stream, &wakeup, |s| !s.is_paused()).await else {
                    return;
                };
                trace!("read stream reached end of input");
                stream.ended.store(true, Ordering::Release);
                stream.end.fire(());
                return;
            }
            Ok(n) => {
                buf.truncate(n);
                let chunk = buf.split().freeze();
                // a pause may have arrived while the read was pending
                let Some(stream) = until(&stream, &wakeup, AsyncReadStream::is_flowing).await else {
                    return;
                };
                stream.data.fire(chunk);
            }
            Err(e) => {
                error!(cause = %e, "read stream failed");
                if let Some(stream) = stream.upgrade() {
                    stream.exception.fire(StreamError::io(e));
                }
                return;
            }
        }
    }
}

impl ReadStream for AsyncReadStream {
    fn data_handler(&self, handler: Option<DataHandler>) {
        let flowing = handler.is_some();
        self.data.set(handler);
        if flowing {
            self.wakeup.notify_one();
        }
    }

    fn end_handler(&self, handler: Option<EndHandler>) {
        self.end.set(handler);
    }

    fn exception_handler(&self, handler: Option<ExceptionHandler>) {
        self.exception.set(handler);
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    fn resume(&self) {
        if self.paused.swap(false, Ordering::AcqRel) {
            self.wakeup.notify_one();
        }
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    fn attachment(&self) -> &Attachment {
        &self.attachment
    }
}

impl Drop for AsyncReadStream {
    fn drop(&mut self) {
        self.wakeup.notify_one();
    }
}

impl fmt::Debug for AsyncReadStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncReadStream")
            .field("paused", &self.is_paused())
            .field("ended", &self.is_ended())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
enum WriteCommand {
    Data(Bytes),
    End,
}

pub struct AsyncWriteStream {
    tx: mpsc::UnboundedSender<WriteCommand>,
    queued: AtomicUsize,
    max_size: AtomicUsize,
    drain_wanted: AtomicBool,
    closed: AtomicBool,
    drain: HandlerSlot<()>,
    exception: HandlerSlot<StreamError>,
    attachment: Attachment,
}

impl AsyncWriteStream {
    /// Spawns the write task.
    ///
    /// The returned handle resolves to the writer once [`end`](AsyncWriteStream::end) has been
    /// flushed and shut down, or to the first write error.
    pub fn spawn<W>(writer: W) -> (Arc<Self>, JoinHandle<Result<W, StreamError>>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = Arc::new(Self {
            tx,
            queued: AtomicUsize::new(0),
            max_size: AtomicUsize::new(DEFAULT_WRITE_QUEUE_MAX_SIZE),
            drain_wanted: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            drain: HandlerSlot::new(),
            exception: HandlerSlot::new(),
            attachment: Attachment::new(),
        });

        let handle = tokio::spawn(write_loop(writer, rx, Arc::downgrade(&stream)));
        (stream, handle)
    }

    /// Ends the stream after everything written so far. Later writes are rejected.
    pub fn end(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) && self.tx.send(WriteCommand::End).is_err() {
            self.exception.fire(StreamError::closed("write task has exited"));
        }
    }

    /// Bytes accepted but not yet handed to the writer.
    pub fn queued_bytes(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    fn written(&self, len: usize) {
        let queued = self.queued.fetch_sub(len, Ordering::AcqRel) - len;
        if queued <= self.max_size.load(Ordering::Acquire) / 2 && self.drain_wanted.swap(false, Ordering::AcqRel) {
            trace!(queued_bytes = queued, "write stream drained");
            self.drain.fire(());
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<WriteCommand>,
    stream: Weak<AsyncWriteStream>,
) -> Result<W, StreamError>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    while let Some(command) = rx.recv().await {
        match command {
            WriteCommand::Data(chunk) => {
                if let Err(e) = writer.write_all(&chunk).await {
                    return Err(fail(&stream, e));
                }
                if let Some(stream) = stream.upgrade() {
                    stream.written(chunk.len());
                }
            }
            WriteCommand::End => {
                if let Err(e) = writer.shutdown().await {
                    return Err(fail(&stream, e));
                }
                return Ok(writer);
            }
        }
    }

    // dropped without end
    writer.flush().await.map_err(|e| fail(&stream, e))?;
    Ok(writer)
}

fn fail(stream: &Weak<AsyncWriteStream>, e: io::Error) -> StreamError {
    error!(cause = %e, "write stream failed");
    if let Some(stream) = stream.upgrade() {
        stream.closed.store(true, Ordering::Release);
        stream.exception.fire(StreamError::io(io::Error::new(e.kind(), e.to_string())));
    }
    StreamError::io(e)
}

impl WriteStream for AsyncWriteStream {
    fn write(&self, chunk: Bytes) {
        if self.closed.load(Ordering::Acquire) {
            self.exception.fire(StreamError::WriteAfterEnd);
            return;
        }

        let len = chunk.len();
        let queued = self.queued.fetch_add(len, Ordering::AcqRel) + len;
        if queued >= self.max_size.load(Ordering::Acquire) {
            self.drain_wanted.store(true, Ordering::Release);
        }

        if self.tx.send(WriteCommand::Data(chunk)).is_err() {
            self.queued.fetch_sub(len, Ordering::AcqRel);
            self.exception.fire(StreamError::closed("write task has exited"));
        }
    }

    fn set_write_queue_max_size(&self, max_size: usize) {
        self.max_size.store(max_size, Ordering::Release);
    }

    fn write_queue_full(&self) -> bool {
        let full = self.queued_bytes() >= self.max_size.load(Ordering::Acquire);
        if full {
            self.drain_wanted.store(true, Ordering::Release);
        }
        full
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

impl fmt::Debug for AsyncWriteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncWriteStream")
            .field("queued_bytes", &self.queued_bytes())
            .field("max_size", &self.max_size.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
