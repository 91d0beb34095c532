//! Byte channels the session can talk over.

mod serial;
mod stream;

#[cfg(test)]
pub(crate) mod mock;

use bytes::Bytes;
use std::{io, time::Duration};

pub use self::{serial::SerialTransport, stream::StreamTransport};

/// Ordered duplex byte channel to the device. This is `async_trait`
///
/// The session owns its transport exclusively and never issues two calls at
/// once.
#[async_trait]
pub trait Transport: Send {
    /// Writes all of `data`, bounded by the connection's write timeout.
    async fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Reads at most `max` bytes, waiting up to `timeout` for the first one.
    /// An empty result means nothing arrived in time.
    async fn read(&mut self, max: usize, timeout: Duration) -> io::Result<Bytes>;

    /// Number of bytes that can be read without waiting.
    async fn bytes_available(&mut self) -> io::Result<usize>;

    /// Drops everything received so far and not yet read.
    async fn flush_input(&mut self) -> io::Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write(data).await
    }

    async fn read(&mut self, max: usize, timeout: Duration) -> io::Result<Bytes> {
        (**self).read(max, timeout).await
    }

    async fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available().await
    }

    async fn flush_input(&mut self) -> io::Result<()> {
        (**self).flush_input().await
    }
}
