//! Backpressure aware forwarding from a [`ReadStream`] to a [`WriteStream`].
//!
//! A [`Pump`] installs a data handler on the source that writes every chunk straight to the
//! sink. When the sink reports its write queue full after a write, the source is paused; when
//! the sink fires drain, the source is resumed. That is the whole protocol: the pump never
//! buffers, never retries, and never ends the sink. Ending the sink when the source ends is up
//! to the caller, typically from the source's end handler:
//!
//! ```
//! use bytes::Bytes;
//! use sluice_stream::{pipe, Callback, Pump, ReadStream, WriteStream};
//! use std::sync::Arc;
//!
//! let (input, source) = pipe(1024);
//! let (sink, output) = pipe(1024);
//!
//! let end_sink = Arc::clone(&sink);
//! source.end_handler(Some(Callback::new(move |()| end_sink.end())));
//!
//! let mut pump = Pump::new(source, sink);
//! pump.start().unwrap();
//!
//! input.write(Bytes::from_static(b"hello"));
//! input.end();
//! assert_eq!(pump.bytes_pumped(), 5);
//! assert!(!output.is_ended());
//! ```

use crate::handler::Callback;
use crate::stream::{ReadStream, WriteStream};
use crate::PumpError;
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Couples one read stream to one write stream.
///
/// A pump is created inactive; [`start`](Pump::start) and [`stop`](Pump::stop) are explicit.
/// While running it holds the [`Attachment`](crate::Attachment) of both streams, so no second
/// pump can drive either of them. Dropping a running pump stops it.
pub struct Pump<R, W>
where
    R: ReadStream + ?Sized + 'static,
    W: WriteStream + ?Sized + 'static,
{
    source: Arc<R>,
    sink: Arc<W>,
    write_queue_max_size: Option<usize>,
    state: Arc<PumpState>,
}

#[derive(Debug, Default)]
struct PumpState {
    running: AtomicBool,
    paused_by_pump: AtomicBool,
    bytes: AtomicU64,
    chunks: AtomicU64,
}

impl PumpState {
    #[inline]
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn record(&self, len: usize) {
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
        self.chunks.fetch_add(1, Ordering::Relaxed);
    }
}

impl<R, W> Pump<R, W>
where
    R: ReadStream + ?Sized + 'static,
    W: WriteStream + ?Sized + 'static,
{
    pub fn new(source: Arc<R>, sink: Arc<W>) -> Self {
        Self { source, sink, write_queue_max_size: None, state: Arc::new(PumpState::default()) }
    }

    /// Sets the sink's write queue max size when the pump starts.
    pub fn with_write_queue_max_size(mut self, max_size: usize) -> Self {
        self.write_queue_max_size = Some(max_size);
        self
    }

    /// Starts forwarding.
    ///
    /// Fails with [`PumpError::AlreadyStarted`] on a running pump, and with
    /// [`PumpError::SourceAttached`] / [`PumpError::SinkAttached`] when another pump drives one
    /// of the streams. A failed start leaves both streams untouched.
    pub fn start(&mut self) -> Result<(), PumpError> {
        if self.state.is_running() {
            return Err(PumpError::AlreadyStarted);
        }
        if !self.source.attachment().try_attach() {
            return Err(PumpError::SourceAttached);
        }
        if !self.sink.attachment().try_attach() {
            self.source.attachment().detach();
            return Err(PumpError::SinkAttached);
        }

        if let Some(max_size) = self.write_queue_max_size {
            self.sink.set_write_queue_max_size(max_size);
        }

        self.state.running.store(true, Ordering::Release);
        self.sink.drain_handler(Some(self.drain_callback()));
        self.source.data_handler(Some(self.data_callback()));

        // a pause left by an earlier run whose drain was missed while stopped
        if self.state.paused_by_pump.load(Ordering::Acquire)
            && !self.sink.write_queue_full()
            && self.state.paused_by_pump.swap(false, Ordering::AcqRel)
            && !self.source.is_ended()
        {
            trace!("sink drained while stopped, resuming read stream");
            self.source.resume();
        }

        debug!(bytes_pumped = self.bytes_pumped(), "pump started");
        Ok(())
    }

    /// Stops forwarding and releases both streams, leaving them in their last state.
    ///
    /// A source paused by this pump stays paused. Restarting resumes it if the sink is no
    /// longer full, otherwise the next drain does. Stopping a pump that is not running does
    /// nothing.
    pub fn stop(&mut self) {
        if !self.state.running.swap(false, Ordering::AcqRel) {
            return;
        }

        self.source.data_handler(None);
        self.sink.drain_handler(None);
        self.source.attachment().detach();
        self.sink.attachment().detach();

        debug!(bytes_pumped = self.bytes_pumped(), chunks_pumped = self.chunks_pumped(), "pump stopped");
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Total bytes forwarded to the sink.
    pub fn bytes_pumped(&self) -> u64 {
        self.state.bytes.load(Ordering::Relaxed)
    }

    pub fn chunks_pumped(&self) -> u64 {
        self.state.chunks.load(Ordering::Relaxed)
    }

    fn data_callback(&self) -> Callback<Bytes> {
        let source = Arc::downgrade(&self.source);
        let sink = Arc::downgrade(&self.sink);
        let state = Arc::clone(&self.state);

        Callback::new(move |chunk: Bytes| {
            let (Some(source), Some(sink)) = (source.upgrade(), sink.upgrade()) else {
                return;
            };

            state.record(chunk.len());
            sink.write(chunk);

            if sink.write_queue_full() {
                trace!("write queue full, pausing read stream");
                state.paused_by_pump.store(true, Ordering::Release);
                source.pause();

                // the sink may have drained before the pause took effect
                if !sink.write_queue_full() && state.paused_by_pump.swap(false, Ordering::AcqRel) {
                    source.resume();
                }
            }
        })
    }

    fn drain_callback(&self) -> Callback<()> {
        let source: Weak<R> = Arc::downgrade(&self.source);
        let state = Arc::clone(&self.state);

        Callback::new(move |()| {
            let Some(source) = source.upgrade() else {
                return;
            };
            if !state.paused_by_pump.swap(false, Ordering::AcqRel) {
                return;
            }
            if state.is_running() && !source.is_ended() {
                trace!("write queue drained, resuming read stream");
                source.resume();
            }
        })
    }
}

impl<R, W> Drop for Pump<R, W>
where
    R: ReadStream + ?Sized + 'static,
    W: WriteStream + ?Sized + 'static,
{
    fn drop(&mut self) {
        self.stop();
    }
}

impl<R, W> fmt::Debug for Pump<R, W>
where
    R: ReadStream + ?Sized + 'static,
    W: WriteStream + ?Sized + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pump")
            .field("running", &self.state.running.load(Ordering::Relaxed))
            .field("bytes_pumped", &self.state.bytes.load(Ordering::Relaxed))
            .field("write_queue_max_size", &self.write_queue_max_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Attachment, DataHandler, DrainHandler, EndHandler, ExceptionHandler, HandlerSlot};
    use crate::pipe::pipe;
    use crate::StreamError;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// A read stream driven by hand.
    #[derive(Default)]
    struct FakeSource {
        data: HandlerSlot<Bytes>,
        end: HandlerSlot<()>,
        exception: HandlerSlot<StreamError>,
        paused: AtomicBool,
        ended: AtomicBool,
        resumes: AtomicUsize,
        attachment: Attachment,
    }

    impl FakeSource {
        fn emit(&self, chunk: &'static str) {
            assert!(!self.paused.load(Ordering::SeqCst), "emitted while paused");
            self.data.fire(Bytes::from_static(chunk.as_bytes()));
        }

        fn finish(&self) {
            self.ended.store(true, Ordering::SeqCst);
            self.end.fire(());
        }
    }

    impl ReadStream for FakeSource {
        fn data_handler(&self, handler: Option<DataHandler>) {
            self.data.set(handler);
        }

        fn end_handler(&self, handler: Option<EndHandler>) {
            self.end.set(handler);
        }

        fn exception_handler(&self, handler: Option<ExceptionHandler>) {
            self.exception.set(handler);
        }

        fn pause(&self) {
            self.paused.store(true, Ordering::SeqCst);
        }

        fn resume(&self) {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            self.paused.store(false, Ordering::SeqCst);
        }

        fn is_ended(&self) -> bool {
            self.ended.load(Ordering::SeqCst)
        }

        fn attachment(&self) -> &Attachment {
            &self.attachment
        }
    }

    /// A write stream that records writes and reports full on demand.
    #[derive(Default)]
    struct RecordingSink {
        written: Mutex<Vec<Bytes>>,
        full: AtomicBool,
        scripted_full: Mutex<VecDeque<bool>>,
        max_size: AtomicUsize,
        ended: AtomicBool,
        drain: HandlerSlot<()>,
        exception: HandlerSlot<StreamError>,
        attachment: Attachment,
    }

    impl RecordingSink {
        fn written(&self) -> Vec<String> {
            self.written.lock().unwrap().iter().map(|chunk| String::from_utf8_lossy(chunk).into_owned()).collect()
        }

        fn set_full(&self, full: bool) {
            self.full.store(full, Ordering::SeqCst);
        }

        fn drain(&self) {
            self.set_full(false);
            self.drain.fire(());
        }

        fn end(&self) {
            self.ended.store(true, Ordering::SeqCst);
        }
    }

    impl WriteStream for RecordingSink {
        fn write(&self, chunk: Bytes) {
            self.written.lock().unwrap().push(chunk);
        }

        fn set_write_queue_max_size(&self, max_size: usize) {
            self.max_size.store(max_size, Ordering::SeqCst);
        }

        fn write_queue_full(&self) -> bool {
            self.scripted_full.lock().unwrap().pop_front().unwrap_or_else(|| self.full.load(Ordering::SeqCst))
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

    #[test]
    fn forwards_chunks_in_order_then_caller_ends_the_sink() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());

        let end_sink = Arc::clone(&sink);
        source.end_handler(Some(Callback::new(move |()| end_sink.end())));

        let mut pump = Pump::new(Arc::clone(&source), Arc::clone(&sink));
        pump.start().unwrap();

        source.emit("AAAA");
        source.emit("BBBB");
        source.finish();

        assert_eq!(sink.written(), vec!["AAAA", "BBBB"]);
        assert!(sink.ended.load(Ordering::SeqCst));
        assert_eq!(pump.bytes_pumped(), 8);
        assert_eq!(pump.chunks_pumped(), 2);
        assert_eq!(source.resumes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn full_sink_pauses_the_source_until_drain() {
        let (input, source) = pipe(1024);
        let sink = Arc::new(RecordingSink::default());

        let mut pump = Pump::new(source, Arc::clone(&sink));
        pump.start().unwrap();

        sink.set_full(true);
        input.write(Bytes::from_static(b"one"));
        input.write(Bytes::from_static(b"two"));
        input.write(Bytes::from_static(b"three"));

        assert_eq!(sink.written(), vec!["one"]);
        assert_eq!(input.queued_bytes(), 8);

        sink.drain();

        assert_eq!(sink.written(), vec!["one", "two", "three"]);
        assert_eq!(input.queued_bytes(), 0);
        assert_eq!(pump.chunks_pumped(), 3);
    }

    #[test]
    fn drain_does_not_resume_an_ended_source() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());

        let mut pump = Pump::new(Arc::clone(&source), Arc::clone(&sink));
        pump.start().unwrap();

        sink.set_full(true);
        source.emit("last");
        assert!(source.paused.load(Ordering::SeqCst));

        source.finish();
        sink.drain();

        assert_eq!(source.resumes.load(Ordering::SeqCst), 0);
        assert!(source.paused.load(Ordering::SeqCst));
    }

    #[test]
    fn drain_without_a_pump_pause_leaves_the_source_alone() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());

        let mut pump = Pump::new(Arc::clone(&source), Arc::clone(&sink));
        pump.start().unwrap();

        source.pause();
        sink.drain();

        assert_eq!(source.resumes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sink_draining_during_the_pause_resumes_immediately() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());
        sink.scripted_full.lock().unwrap().extend([true, false]);

        let mut pump = Pump::new(Arc::clone(&source), Arc::clone(&sink));
        pump.start().unwrap();

        source.emit("racy");

        assert_eq!(source.resumes.load(Ordering::SeqCst), 1);
        assert!(!source.paused.load(Ordering::SeqCst));
        source.emit("next");
        assert_eq!(sink.written(), vec!["racy", "next"]);
    }

    #[test]
    fn starting_twice_is_an_error() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());

        let mut pump = Pump::new(source, sink);
        pump.start().unwrap();

        assert_eq!(pump.start(), Err(PumpError::AlreadyStarted));
        assert!(pump.is_running());
    }

    #[test]
    fn stop_is_idempotent_and_detaches() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());

        let mut pump = Pump::new(Arc::clone(&source), Arc::clone(&sink));
        pump.stop();
        pump.start().unwrap();
        pump.stop();
        pump.stop();

        assert!(!pump.is_running());
        assert!(!source.data.is_set());
        assert!(!sink.drain.is_set());
        assert!(!source.attachment.is_attached());
        assert!(!sink.attachment.is_attached());

        source.emit("ignored");
        assert!(sink.written().is_empty());
    }

    #[test]
    fn stopped_pump_leaves_a_paused_source_paused() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());

        let mut pump = Pump::new(Arc::clone(&source), Arc::clone(&sink));
        pump.start().unwrap();
        sink.set_full(true);
        source.emit("chunk");
        pump.stop();

        sink.drain();
        assert!(source.paused.load(Ordering::SeqCst));
        assert_eq!(source.resumes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn restart_resumes_a_source_whose_sink_drained_while_stopped() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());

        let mut pump = Pump::new(Arc::clone(&source), Arc::clone(&sink));
        pump.start().unwrap();
        sink.set_full(true);
        source.emit("one");
        pump.stop();
        sink.drain();

        pump.start().unwrap();
        assert!(!source.paused.load(Ordering::SeqCst));
        assert_eq!(source.resumes.load(Ordering::SeqCst), 1);

        source.emit("two");
        assert_eq!(sink.written(), vec!["one", "two"]);
    }

    #[test]
    fn restart_onto_a_full_sink_waits_for_drain() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());

        let mut pump = Pump::new(Arc::clone(&source), Arc::clone(&sink));
        pump.start().unwrap();
        sink.set_full(true);
        source.emit("one");
        pump.stop();

        pump.start().unwrap();
        assert!(source.paused.load(Ordering::SeqCst));

        sink.drain();
        assert!(!source.paused.load(Ordering::SeqCst));
        assert_eq!(source.resumes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_stream_can_only_be_driven_by_one_pump() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());
        let other_source = Arc::new(FakeSource::default());
        let other_sink = Arc::new(RecordingSink::default());

        let mut first = Pump::new(Arc::clone(&source), Arc::clone(&sink));
        first.start().unwrap();

        let mut same_source = Pump::new(Arc::clone(&source), Arc::clone(&other_sink));
        assert_eq!(same_source.start(), Err(PumpError::SourceAttached));
        assert!(!other_sink.attachment.is_attached());

        let mut same_sink = Pump::new(Arc::clone(&other_source), Arc::clone(&sink));
        assert_eq!(same_sink.start(), Err(PumpError::SinkAttached));
        assert!(!other_source.attachment.is_attached());

        first.stop();
        assert_eq!(same_source.start(), Ok(()));
    }

    #[test]
    fn configures_the_sink_write_queue_on_start() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());

        let mut pump = Pump::new(source, Arc::clone(&sink)).with_write_queue_max_size(4096);
        assert_eq!(sink.max_size.load(Ordering::SeqCst), 0);

        pump.start().unwrap();
        assert_eq!(sink.max_size.load(Ordering::SeqCst), 4096);
    }

    #[test]
    fn dropping_a_running_pump_releases_the_streams() {
        let source = Arc::new(FakeSource::default());
        let sink = Arc::new(RecordingSink::default());

        {
            let mut pump = Pump::new(Arc::clone(&source), Arc::clone(&sink));
            pump.start().unwrap();
        }

        assert!(!source.data.is_set());
        assert!(!source.attachment.is_attached());
        assert!(!sink.attachment.is_attached());
    }

    #[test]
    fn chains_two_pumps_through_a_pipe() {
        let source = Arc::new(FakeSource::default());
        let (middle_in, middle_out) = pipe(2);
        let sink = Arc::new(RecordingSink::default());

        let mut upstream = Pump::new(Arc::clone(&source), Arc::clone(&middle_in));
        let mut downstream = Pump::new(middle_out, Arc::clone(&sink));
        upstream.start().unwrap();
        downstream.start().unwrap();

        sink.set_full(true);
        source.emit("ab");
        source.emit("cd");
        assert!(source.paused.load(Ordering::SeqCst));
        assert_eq!(sink.written(), vec!["ab"]);

        sink.drain();
        assert!(!source.paused.load(Ordering::SeqCst));
        assert_eq!(sink.written(), vec!["ab", "cd"]);
    }
}
