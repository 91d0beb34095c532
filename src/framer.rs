use bytes::BytesMut;
use std::{
    io,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::time::Instant;

use crate::{
    observer::{Observer, TraceEvent},
    protocol::{Response, SENTINEL},
    transport::Transport,
};

const MAX_READ: usize = 4 * 1024;

/// Splits the text channel into trimmed lines.
///
/// Payload bytes of `GETDATA` never pass through here.
#[derive(Debug, Default)]
pub(crate) struct LineFramer {
    buf: BytesMut,
}

impl LineFramer {
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    fn next_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|&b| b == b'\n')?;
        let raw = self.buf.split_to(end + 1);
        Some(String::from_utf8_lossy(&raw).trim().to_owned())
    }

    /// Appends lines to `response` until the sentinel or until `timeout`
    /// passes without more bytes. A trailing partial line is dropped.
    pub async fn read_response(
        &mut self,
        transport: &mut dyn Transport,
        observer: &dyn Observer,
        closed: &AtomicBool,
        response: &mut Response,
        timeout: Duration,
    ) -> io::Result<()> {
        let deadline = Instant::now() + timeout;

        loop {
            while let Some(line) = self.next_line() {
                if line.is_empty() {
                    continue;
                }

                observer.observe(TraceEvent::Received(&line));

                if line == SENTINEL {
                    response.complete = true;
                    self.buf.clear();
                    return Ok(());
                }

                response.lines.push(line);
            }

            if closed.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "session closed"));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let want = transport.bytes_available().await?.clamp(1, MAX_READ);
            let chunk = transport.read(want, remaining).await?;
            if chunk.is_empty() {
                if closed.load(Ordering::SeqCst) {
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "session closed"));
                }
                break;
            }

            self.buf.extend_from_slice(&chunk);
        }

        if !self.buf.is_empty() {
            debug!("dropping {} bytes of unterminated line", self.buf.len());
            self.buf.clear();
        }

        Ok(())
    }
}
