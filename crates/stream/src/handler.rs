//! Callback slots used by stream implementations.
//!
//! Every stream event (data, end, drain, exception) has exactly one replaceable callback. A
//! [`HandlerSlot`] stores it behind an [`ArcSwapOption`], so installing a new callback replaces
//! the previous one in a single atomic store, and firing never holds a lock while the callback
//! runs. Callbacks are therefore free to re-enter the stream they were fired from.

use crate::StreamError;
use arc_swap::ArcSwapOption;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A boxed event callback receiving a `T` each time the event fires.
pub struct Callback<T> {
    f: Box<dyn Fn(T) + Send + Sync>,
}

impl<T> Callback<T> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self { f: Box::new(f) }
    }

    #[inline]
    pub fn call(&self, arg: T) {
        (self.f)(arg);
    }
}

impl<T> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}

/// Receives each data chunk emitted by a read stream.
pub type DataHandler = Callback<Bytes>;
/// Fired once when a read stream reaches its end.
pub type EndHandler = Callback<()>;
/// Fired when a full write stream can accept data again.
pub type DrainHandler = Callback<()>;
/// Receives the errors of a stream.
pub type ExceptionHandler = Callback<StreamError>;

/// Holds at most one callback for one event type.
pub struct HandlerSlot<T> {
    inner: ArcSwapOption<Callback<T>>,
}

impl<T> HandlerSlot<T> {
    pub fn new() -> Self {
        Self { inner: ArcSwapOption::empty() }
    }

    /// Installs `handler`, or clears the slot with `None`. The previous callback is dropped.
    pub fn set(&self, handler: Option<Callback<T>>) {
        self.inner.store(handler.map(Arc::new));
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.inner.load().is_some()
    }

    /// Returns the installed callback, if any.
    pub fn get(&self) -> Option<Arc<Callback<T>>> {
        self.inner.load_full()
    }

    /// Invokes the installed callback with `arg`.
    ///
    /// Returns `false` when the slot is empty, in which case `arg` is dropped.
    pub fn fire(&self, arg: T) -> bool {
        match self.inner.load_full() {
            Some(callback) => {
                callback.call(arg);
                true
            }
            None => false,
        }
    }
}

impl<T> Default for HandlerSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for HandlerSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSlot").field("is_set", &self.is_set()).finish()
    }
}

/// Marks a stream as being driven by a pump.
///
/// Stream implementations embed one `Attachment` per direction and hand it out through
/// [`ReadStream::attachment`](crate::ReadStream::attachment) or
/// [`WriteStream::attachment`](crate::WriteStream::attachment).
#[derive(Debug, Default)]
pub struct Attachment {
    attached: AtomicBool,
}

impl Attachment {
    pub const fn new() -> Self {
        Self { attached: AtomicBool::new(false) }
    }

    /// Takes the attachment, returns `false` if someone else holds it.
    pub fn try_attach(&self) -> bool {
        self.attached.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    pub fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }
}
