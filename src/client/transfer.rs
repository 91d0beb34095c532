use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time,
};

use super::rawsession::{Direction, RawSession};
use crate::{
    error::{Error, FsResult},
    path::RemotePath,
    protocol::{Command, Response},
};

/// Largest buffer reserved up front for an in-memory download.
const MAX_PREALLOC: usize = 4 * 1024 * 1024;

/// Bytes moved so far in one transfer, reported after every chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub transferred: u64,
    pub total: u64,
}

impl Progress {
    /// Share of the transfer done, `1.0` for an empty file.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.transferred as f64 / self.total as f64
        }
    }

    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.transferred >= self.total
    }
}

/// One transfer invocation: the local end and how far it got.
pub(crate) struct TransferJob<L> {
    pub local: L,
    pub remote_path: RemotePath,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
}

impl<L> TransferJob<L> {
    pub fn new(local: L, remote_path: RemotePath, total_bytes: u64) -> Self {
        Self {
            local,
            remote_path,
            total_bytes,
            transferred_bytes: 0,
        }
    }

    pub const fn remaining(&self) -> u64 {
        self.total_bytes.saturating_sub(self.transferred_bytes)
    }

    pub fn advance(&mut self, len: usize) -> Progress {
        self.transferred_bytes += len as u64;
        Progress {
            transferred: self.transferred_bytes,
            total: self.total_bytes,
        }
    }
}

impl RawSession {
    /// Streams a remote file into `sink` and returns the number of bytes.
    ///
    /// On [`Error::ShortRead`] the bytes received so far are already in the
    /// sink and the error carries no data.
    pub async fn download_to<W, F>(
        &mut self,
        path: &RemotePath,
        sink: W,
        mut progress: F,
    ) -> FsResult<u64>
    where
        W: AsyncWrite + Unpin + Send,
        F: FnMut(Progress) + Send,
    {
        let size = self.file_size(path).await?;
        let mut job = TransferJob::new(sink, path.clone(), size);

        self.receive(&mut job, &mut progress).await?;
        job.local.flush().await?;

        Ok(job.transferred_bytes)
    }

    /// Downloads a remote file into memory.
    ///
    /// On [`Error::ShortRead`] the error carries the bytes that did arrive.
    pub async fn download<F>(&mut self, path: &RemotePath, mut progress: F) -> FsResult<Bytes>
    where
        F: FnMut(Progress) + Send,
    {
        let size = self.file_size(path).await?;
        let capacity = usize::try_from(size).map_or(MAX_PREALLOC, |s| s.min(MAX_PREALLOC));
        let mut job = TransferJob::new(Vec::with_capacity(capacity), path.clone(), size);

        match self.receive(&mut job, &mut progress).await {
            Ok(()) => Ok(Bytes::from(job.local)),
            Err(Error::ShortRead {
                expected, received, ..
            }) => Err(Error::ShortRead {
                expected,
                received,
                data: Bytes::from(job.local),
            }),
            Err(error) => Err(error),
        }
    }

    /// `GETDATA` followed by exactly `total_bytes` raw bytes.
    async fn receive<W>(
        &mut self,
        job: &mut TransferJob<W>,
        progress: &mut (dyn FnMut(Progress) + Send),
    ) -> FsResult<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let command = Command::GetData(job.remote_path.clone());
        // input is flushed before GETDATA is sent, not between it and the payload
        self.announce_payload(&command, Direction::Inbound, job.total_bytes)
            .await?;

        let chunk_size = self.options.download_chunk.max(1);
        while job.remaining() > 0 {
            let chunk = self.read_payload(chunk_size).await?;
            if chunk.is_empty() {
                self.abandon_payload();
                warn!(
                    "{command}: device went quiet after {} of {} bytes",
                    job.transferred_bytes, job.total_bytes
                );
                return Err(Error::ShortRead {
                    expected: job.total_bytes,
                    received: job.transferred_bytes,
                    data: Bytes::new(),
                });
            }

            if let Err(error) = job.local.write_all(&chunk).await {
                self.abandon_payload();
                return Err(error.into());
            }

            progress(job.advance(chunk.len()));
        }

        debug!("{command}: received {} bytes", job.transferred_bytes);
        Ok(())
    }

    /// Sends `size` bytes from `source` as the content of a remote file and
    /// returns the device's completion status.
    ///
    /// A completion status with an `ERROR` line becomes [`Error::Rejected`].
    /// One that never saw its sentinel is returned as is.
    pub async fn upload<R, F>(
        &mut self,
        path: &RemotePath,
        source: R,
        size: u64,
        mut progress: F,
    ) -> FsResult<Response>
    where
        R: AsyncRead + Unpin + Send,
        F: FnMut(Progress) + Send,
    {
        let command = Command::PutFile {
            path: path.clone(),
            size,
        };
        let mut job = TransferJob::new(source, path.clone(), size);

        self.announce_payload(&command, Direction::Outbound, size)
            .await?;

        let settle = self.options.upload_settle;
        if !settle.is_zero() {
            time::sleep(settle).await;
        }

        let mut buf = vec![0; self.options.upload_chunk.max(1)];
        while job.remaining() > 0 {
            let want = usize::try_from(job.remaining()).map_or(buf.len(), |r| r.min(buf.len()));

            let read = match job.local.read(&mut buf[..want]).await {
                Ok(read) => read,
                Err(error) => {
                    self.abandon_payload();
                    return Err(error.into());
                }
            };

            if read == 0 {
                self.abandon_payload();
                return Err(Error::ShortWrite {
                    expected: job.total_bytes,
                    sent: job.transferred_bytes,
                });
            }

            self.write_payload(&buf[..read]).await?;
            progress(job.advance(read));
        }

        let timeout = command.timeout(&self.options.timeouts);
        let response = self.read_response(&command.to_string(), timeout).await?;

        if let Some(line) = response.device_error() {
            return Err(Error::Rejected(line.to_owned()));
        }

        Ok(response)
    }
}
