use bytes::Bytes;
use std::io;
use thiserror::Error;

pub type FsResult<T> = Result<T, Error>;

/// Enum for client errors
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Any errors related to I/O on the transport. The session drops its
    /// transport when this happens.
    #[error("I/O: {0}")]
    IO(String),
    /// The session was closed, either explicitly or after a transport failure
    #[error("Session closed")]
    Closed,
    /// The response sentinel did not arrive before the timeout
    #[error("Timeout waiting for response to {0}")]
    Timeout(String),
    /// A field required to continue was missing from the response
    #[error("{0}")]
    Protocol(String),
    /// The device stopped sending before the announced payload size was reached
    #[error("Short read: received {received} of {expected} bytes")]
    ShortRead {
        expected: u64,
        received: u64,
        /// Bytes received before the stream dried up. Empty when they were
        /// already handed to a sink.
        data: Bytes,
    },
    /// The local source ended before the announced payload size was reached
    #[error("Short write: sent {sent} of {expected} bytes")]
    ShortWrite { expected: u64, sent: u64 },
    /// The device answered with an `ERROR` line
    #[error("Rejected by device: {0}")]
    Rejected(String),
    /// The path cannot be expressed on the wire
    #[error("Invalid path: {0:?}")]
    InvalidPath(String),
    /// Occurs when the client is used in a way the protocol cannot follow
    #[error("{0}")]
    UnexpectedBehavior(String),
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Self::IO(error.to_string())
    }
}
