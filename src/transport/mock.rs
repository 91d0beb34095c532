//! Scripted in-memory transport for engine tests.
//!
//! Every complete command line is handed to a responder closure whose chunks
//! are queued for reading. Each queued chunk is returned by at most one
//! `read`, which lets tests pin down exactly how a payload is split. An
//! exhausted queue reads as an elapsed timeout without sleeping.

use bytes::Bytes;
use std::{
    collections::VecDeque,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use super::Transport;
use crate::{client::RawSession, config::Options, observer::LogObserver};

type Responder = Box<dyn FnMut(&str) -> Vec<Vec<u8>> + Send>;

/// What the client put on the wire.
#[derive(Clone, Default)]
pub(crate) struct Wire {
    commands: Arc<Mutex<Vec<String>>>,
    payload: Arc<Mutex<Vec<u8>>>,
    broken: Arc<AtomicBool>,
}

impl Wire {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn payload(&self) -> Vec<u8> {
        self.payload.lock().unwrap().clone()
    }

    /// Makes every following write fail.
    pub fn break_link(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

pub(crate) struct MockTransport {
    wire: Wire,
    responder: Responder,
    line: Vec<u8>,
    upload: Option<(String, u64)>,
    inbound: VecDeque<Bytes>,
}

/// Renders response lines the way the device prints them.
pub(crate) fn text(lines: &[&str]) -> Vec<u8> {
    lines.iter().flat_map(|l| format!("{l}\r\n").into_bytes()).collect()
}

impl MockTransport {
    pub fn new<F>(responder: F) -> (Self, Wire)
    where
        F: FnMut(&str) -> Vec<Vec<u8>> + Send + 'static,
    {
        let wire = Wire::default();
        let transport = Self {
            wire: wire.clone(),
            responder: Box::new(responder),
            line: Vec::new(),
            upload: None,
            inbound: VecDeque::new(),
        };
        (transport, wire)
    }

    fn respond(&mut self, command: &str) {
        let chunks = (self.responder)(command);
        self.inbound
            .extend(chunks.into_iter().filter(|c| !c.is_empty()).map(Bytes::from));
    }

    fn announced_upload(command: &str) -> Option<u64> {
        if !command.starts_with("PUTFILE ") {
            return None;
        }
        command.rsplit(' ').next()?.parse().ok()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        if self.wire.broken.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link down"));
        }

        for &byte in data {
            if let Some((command, remaining)) = self.upload.as_mut() {
                self.wire.payload.lock().unwrap().push(byte);
                *remaining -= 1;
                if *remaining == 0 {
                    let command = command.clone();
                    self.upload = None;
                    self.respond(&command);
                }
                continue;
            }

            if byte != b'\n' {
                self.line.push(byte);
                continue;
            }

            let command = String::from_utf8_lossy(&self.line).trim().to_owned();
            self.line.clear();
            self.wire.commands.lock().unwrap().push(command.clone());

            match Self::announced_upload(&command) {
                Some(size) if size > 0 => self.upload = Some((command, size)),
                _ => self.respond(&command),
            }
        }

        Ok(())
    }

    async fn read(&mut self, max: usize, _timeout: Duration) -> io::Result<Bytes> {
        let Some(mut chunk) = self.inbound.pop_front() else {
            return Ok(Bytes::new());
        };

        if chunk.len() > max {
            let rest = chunk.split_off(max);
            self.inbound.push_front(rest);
        }

        Ok(chunk)
    }

    async fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.inbound.front().map_or(0, Bytes::len))
    }

    async fn flush_input(&mut self) -> io::Result<()> {
        self.inbound.clear();
        Ok(())
    }
}

/// A raw session over a [`MockTransport`], without upload settle delay.
pub(crate) fn raw_session<F>(responder: F) -> (RawSession, Wire)
where
    F: FnMut(&str) -> Vec<Vec<u8>> + Send + 'static,
{
    let (transport, wire) = MockTransport::new(responder);
    let options = Options {
        upload_settle: Duration::ZERO,
        ..Options::default()
    };
    let session = RawSession::new(transport, Arc::new(options), Arc::new(LogObserver));
    (session, wire)
}
