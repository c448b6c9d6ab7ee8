use std::io;
use thiserror::Error;

/// Errors reported on a stream's exception channel.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("write after the stream has been ended")]
    WriteAfterEnd,

    #[error("stream closed: {reason}")]
    Closed { reason: String },
}

impl StreamError {
    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn closed<S: ToString>(str: S) -> Self {
        Self::Closed { reason: str.to_string() }
    }
}

/// Misuse of a [`Pump`](crate::Pump), returned directly to the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpError {
    #[error("pump has already been started")]
    AlreadyStarted,

    #[error("read stream is already driven by another pump")]
    SourceAttached,

    #[error("write stream is already driven by another pump")]
    SinkAttached,
}
