use bytes::{Bytes, BytesMut};
use std::{io, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time,
};

use super::Transport;

const READ_BUF: usize = 8 * 1024;

/// [`Transport`] over any tokio stream, for example a TCP serial bridge.
pub struct StreamTransport<S> {
    stream: S,
    pending: BytesMut,
    write_timeout: Duration,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pending: BytesMut::new(),
            write_timeout: Duration::from_secs(5),
        }
    }

    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Pulls whatever arrives within `wait` into the pending buffer.
    async fn fill(&mut self, wait: Duration) -> io::Result<usize> {
        self.pending.reserve(READ_BUF);

        match time::timeout(wait, self.stream.read_buf(&mut self.pending)).await {
            Err(_) => Ok(0),
            Ok(Ok(0)) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed by peer",
            )),
            Ok(result) => result,
        }
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let timeout = self.write_timeout;
        let stream = &mut self.stream;
        let write = async move {
            stream.write_all(data).await?;
            stream.flush().await
        };

        time::timeout(timeout, write)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "write timed out"))?
    }

    async fn read(&mut self, max: usize, timeout: Duration) -> io::Result<Bytes> {
        if self.pending.is_empty() {
            let _ = self.fill(timeout).await?;
        }

        let len = max.min(self.pending.len());
        Ok(self.pending.split_to(len).freeze())
    }

    async fn bytes_available(&mut self) -> io::Result<usize> {
        if self.pending.is_empty() {
            let _ = self.fill(Duration::ZERO).await?;
        }

        Ok(self.pending.len())
    }

    async fn flush_input(&mut self) -> io::Result<()> {
        while self.fill(Duration::ZERO).await? > 0 {
            self.pending.clear();
        }

        self.pending.clear();
        Ok(())
    }
}
