use bytes::Bytes;
use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    config::Options,
    error::{Error, FsResult},
    framer::LineFramer,
    observer::{Observer, TraceEvent},
    path::RemotePath,
    protocol::{Command, Listing, Response, StorageStats},
    transport::Transport,
};

/// Which way an announced payload flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to host, announced by `GETDATA`.
    Inbound,
    /// Host to device, announced by `PUTFILE`.
    Outbound,
}

/// Whether the channel currently carries text or an announced raw payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    AwaitingPayload { direction: Direction, remaining: u64 },
}

macro_rules! link {
    ($session:ident) => {
        match $session.transport.as_deref_mut() {
            Some(transport) => transport,
            None => return Err(Error::Closed),
        }
    };
}

/// Implements raw work with the protocol in command-response format.
///
/// Responses are matched to commands purely by order, so every method drains
/// (or times out on) its response before returning and the next command
/// starts by flushing whatever arrived late.
pub struct RawSession {
    transport: Option<Box<dyn Transport>>,
    framer: LineFramer,
    observer: Arc<dyn Observer>,
    pub(super) options: Arc<Options>,
    closed: Arc<AtomicBool>,
    state: State,
}

impl RawSession {
    pub fn new<T>(transport: T, options: Arc<Options>, observer: Arc<dyn Observer>) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            transport: Some(Box::new(transport)),
            framer: LineFramer::default(),
            observer,
            options,
            closed: Arc::new(AtomicBool::new(false)),
            state: State::Idle,
        }
    }

    pub(super) fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.transport.is_none() || self.closed.load(Ordering::SeqCst)
    }

    /// Drops the transport. Every later call fails with [`Error::Closed`].
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        self.transport = None;
        self.framer.clear();
        self.state = State::Idle;
    }

    fn ensure_open(&mut self) -> FsResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            self.close();
        }

        if self.transport.is_none() {
            return Err(Error::Closed);
        }

        Ok(())
    }

    fn ensure_idle(&self, what: &str) -> FsResult<()> {
        match self.state {
            State::Idle => Ok(()),
            State::AwaitingPayload {
                direction,
                remaining,
            } => Err(Error::UnexpectedBehavior(format!(
                "cannot {what} while {remaining} {direction:?} payload bytes are outstanding"
            ))),
        }
    }

    /// Transport failures are fatal to the session.
    fn fail(&mut self, error: io::Error) -> Error {
        let cancelled = self.closed.load(Ordering::SeqCst);
        self.close();

        if cancelled {
            Error::Closed
        } else {
            warn!("transport failed, closing session: {error}");
            error.into()
        }
    }

    /// Discards stale input, on the transport and in the line buffer.
    pub async fn flush(&mut self) -> FsResult<()> {
        self.ensure_open()?;
        self.ensure_idle("flush input")?;
        self.framer.clear();

        let result = link!(self).flush_input().await;
        result.map_err(|e| self.fail(e))
    }

    async fn send(&mut self, command: &str) -> FsResult<()> {
        if command.contains(['\r', '\n']) {
            return Err(Error::UnexpectedBehavior(format!(
                "command must be a single line: {command:?}"
            )));
        }

        self.flush().await?;
        self.observer.observe(TraceEvent::Sent(command));

        let result = link!(self).write(format!("{command}\n").as_bytes()).await;
        result.map_err(|e| self.fail(e))
    }

    /// Collects lines until the sentinel or until `timeout` passes quietly.
    ///
    /// Does not flush first, so it can pick up the status that follows an
    /// upload payload.
    pub async fn read_response(&mut self, command: &str, timeout: Duration) -> FsResult<Response> {
        self.ensure_open()?;
        self.ensure_idle("read a response")?;

        let mut response = Response::new(command.to_owned());
        let transport = link!(self);
        let result = self
            .framer
            .read_response(transport, &*self.observer, &self.closed, &mut response, timeout)
            .await;
        result.map_err(|e| self.fail(e))?;

        if !response.complete {
            debug!("no sentinel for {command:?} within {timeout:?}");
        }

        Ok(response)
    }

    /// Sends one command line and collects its response.
    ///
    /// Running out of time is not an error: the partial response comes back
    /// with `complete == false`.
    pub async fn execute(&mut self, command: &str, timeout: Duration) -> FsResult<Response> {
        self.send(command).await?;
        self.read_response(command, timeout).await
    }

    /// [`execute`](Self::execute) with the configured timeout for the command.
    pub async fn request(&mut self, command: &Command) -> FsResult<Response> {
        let timeout = command.timeout(&self.options.timeouts);
        self.execute(&command.to_string(), timeout).await
    }

    /// Sends a command that is followed by `len` raw bytes in `direction`.
    /// Nothing else may be sent until the payload is complete or abandoned.
    pub async fn announce_payload(
        &mut self,
        command: &Command,
        direction: Direction,
        len: u64,
    ) -> FsResult<()> {
        self.send(&command.to_string()).await?;

        if len > 0 {
            self.state = State::AwaitingPayload {
                direction,
                remaining: len,
            };
        }

        Ok(())
    }

    fn outstanding(&self, expected: Direction) -> FsResult<u64> {
        match self.state {
            State::AwaitingPayload {
                direction,
                remaining,
            } if direction == expected => Ok(remaining),
            _ => Err(Error::UnexpectedBehavior(format!(
                "no {expected:?} payload is outstanding"
            ))),
        }
    }

    fn consume(&mut self, len: usize) {
        if let State::AwaitingPayload { remaining, .. } = &mut self.state {
            *remaining = remaining.saturating_sub(len as u64);
            if *remaining == 0 {
                self.state = State::Idle;
            }
        }
    }

    /// Reads up to `max` bytes of the inbound payload, never past its end.
    /// An empty chunk means the device went quiet for the read timeout.
    pub async fn read_payload(&mut self, max: usize) -> FsResult<Bytes> {
        self.ensure_open()?;
        let remaining = self.outstanding(Direction::Inbound)?;
        let want = usize::try_from(remaining).map_or(max, |r| r.min(max));
        let timeout = self.options.read_timeout;

        let result = link!(self).read(want, timeout).await;
        let chunk = result.map_err(|e| self.fail(e))?;
        if self.closed.load(Ordering::SeqCst) {
            let interrupted = io::Error::new(io::ErrorKind::Interrupted, "session closed");
            return Err(self.fail(interrupted));
        }

        self.consume(chunk.len());
        Ok(chunk)
    }

    /// Writes part of the outbound payload.
    pub async fn write_payload(&mut self, data: &[u8]) -> FsResult<()> {
        self.ensure_open()?;
        let remaining = self.outstanding(Direction::Outbound)?;
        if data.len() as u64 > remaining {
            return Err(Error::UnexpectedBehavior(format!(
                "payload overrun: {} bytes written with {remaining} outstanding",
                data.len()
            )));
        }

        let result = link!(self).write(data).await;
        result.map_err(|e| self.fail(e))?;

        self.consume(data.len());
        Ok(())
    }

    /// Gives up on the outstanding payload and returns to text mode.
    ///
    /// The device may still be sending or waiting, the next command's flush
    /// clears what it can.
    pub fn abandon_payload(&mut self) {
        if let State::AwaitingPayload {
            direction,
            remaining,
        } = self.state
        {
            warn!("abandoning {direction:?} payload with {remaining} bytes outstanding");
            self.state = State::Idle;
        }
    }

    pub async fn storage(&mut self) -> FsResult<StorageStats> {
        self.request(&Command::Storage)
            .await?
            .storage()
            .ok_or_else(|| Error::Protocol("storage statistics unavailable".to_owned()))
    }

    pub async fn list(&mut self, path: &RemotePath) -> FsResult<Listing> {
        Ok(self.request(&Command::List(path.clone())).await?.listing())
    }

    pub async fn create_dir(&mut self, path: &RemotePath) -> FsResult<Response> {
        self.request(&Command::CreateDir(path.clone())).await
    }

    pub async fn remove_dir(&mut self, path: &RemotePath) -> FsResult<Response> {
        self.request(&Command::RemoveDir(path.clone())).await
    }

    pub async fn remove_file(&mut self, path: &RemotePath) -> FsResult<Response> {
        self.request(&Command::Delete(path.clone())).await
    }

    pub async fn rename(&mut self, from: &RemotePath, to: &RemotePath) -> FsResult<Response> {
        self.request(&Command::Rename {
            from: from.clone(),
            to: to.clone(),
        })
        .await
    }

    pub async fn file_size(&mut self, path: &RemotePath) -> FsResult<u64> {
        self.request(&Command::GetSize(path.clone()))
            .await?
            .size()
            .ok_or_else(|| Error::Protocol("size unavailable".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        protocol::DirEntry,
        transport::mock::{raw_session as session, text},
    };

    #[tokio::test]
    async fn test_list_and_storage() {
        let (mut session, wire) = session(|command| match command {
            "STORAGE" => vec![text(&["TOTAL:1000000 FREE:250000", "DONE"])],
            "LIST /" => vec![text(&["DIR : photos", "FILE : notes.txt SIZE : 42", "DONE"])],
            _ => vec![],
        });

        let stats = session.storage().await.unwrap();
        assert_eq!(stats.total_bytes, 1_000_000);
        assert_eq!(stats.free_bytes, 250_000);

        let listing = session.list(&RemotePath::root()).await.unwrap();
        assert!(listing.complete);
        assert_eq!(
            listing.entries,
            [
                DirEntry::Directory {
                    name: "photos".to_owned()
                },
                DirEntry::File {
                    name: "notes.txt".to_owned(),
                    size: 42
                }
            ]
        );

        assert_eq!(wire.commands(), ["STORAGE", "LIST /"]);
    }

    #[tokio::test]
    async fn test_timeout_returns_partial_response() {
        let (mut session, _) = session(|_| vec![text(&["DIR : a"])]);

        let response = session.execute("LIST /", Duration::from_millis(10)).await.unwrap();
        assert!(!response.is_complete());
        assert_eq!(response.lines, ["DIR : a"]);
        assert!(response.ensure_complete().is_err());
    }

    #[tokio::test]
    async fn test_missing_fields_are_protocol_errors() {
        let (mut session, _) = session(|_| vec![text(&["ERROR", "DONE"])]);

        assert!(matches!(session.storage().await, Err(Error::Protocol(_))));
        let path = RemotePath::new("/missing.bin").unwrap();
        assert!(matches!(
            session.file_size(&path).await,
            Err(Error::Protocol(msg)) if msg == "size unavailable"
        ));
    }

    #[tokio::test]
    async fn test_path_forms_on_the_wire() {
        let (mut session, wire) = session(|_| vec![text(&["DONE"])]);
        let dir = RemotePath::new("/my dir").unwrap();
        let file = dir.join("a b.txt").unwrap();

        let _ = session.create_dir(&dir).await.unwrap();
        let _ = session.list(&dir).await.unwrap();
        let _ = session.remove_file(&file).await.unwrap();
        let _ = session
            .rename(&file, &dir.join("c.txt").unwrap())
            .await
            .unwrap();
        let _ = session.remove_dir(&dir).await.unwrap();

        assert_eq!(
            wire.commands(),
            [
                "CREATE_DIR /my dir",
                "LIST /my dir",
                "DELETE \"/my dir/a b.txt\"",
                "RENAME \"/my dir/a b.txt\" \"/my dir/c.txt\"",
                "REMOVE_DIR \"/my dir\"",
            ]
        );
    }

    #[tokio::test]
    async fn test_stale_input_is_flushed() {
        let mut calls = 0;
        let (mut session, _) = session(move |_| {
            calls += 1;
            if calls == 1 {
                // a second chunk trails the sentinel and is still buffered
                vec![text(&["DIR : a", "DONE"]), text(&["DIR : stale"])]
            } else {
                vec![text(&["FILE : fresh SIZE : 1", "DONE"])]
            }
        });

        let first = session.list(&RemotePath::root()).await.unwrap();
        assert_eq!(first.entries.len(), 1);

        let listing = session.list(&RemotePath::root()).await.unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].name(), "fresh");
    }

    #[tokio::test]
    async fn test_text_command_rejected_during_payload() {
        let (mut session, wire) = session(|_| vec![vec![0; 4]]);
        let path = RemotePath::new("/a.bin").unwrap();

        session
            .announce_payload(&Command::GetData(path), Direction::Inbound, 10)
            .await
            .unwrap();
        assert_eq!(
            session.state(),
            State::AwaitingPayload {
                direction: Direction::Inbound,
                remaining: 10
            }
        );

        assert!(matches!(
            session.execute("STORAGE", Duration::from_millis(10)).await,
            Err(Error::UnexpectedBehavior(_))
        ));
        assert!(matches!(
            session.write_payload(b"x").await,
            Err(Error::UnexpectedBehavior(_))
        ));
        assert_eq!(wire.commands(), ["GETDATA \"/a.bin\""]);

        let chunk = session.read_payload(64).await.unwrap();
        assert_eq!(chunk.len(), 4);
        assert_eq!(
            session.state(),
            State::AwaitingPayload {
                direction: Direction::Inbound,
                remaining: 6
            }
        );

        session.abandon_payload();
        assert_eq!(session.state(), State::Idle);
    }

    #[tokio::test]
    async fn test_multiline_command_rejected() {
        let (mut session, wire) = session(|_| vec![]);

        assert!(matches!(
            session.execute("LIST /\nDELETE \"/x\"", Duration::from_millis(10)).await,
            Err(Error::UnexpectedBehavior(_))
        ));
        assert!(wire.commands().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_closes_session() {
        let (mut session, wire) = session(|_| vec![text(&["DONE"])]);
        wire.break_link();

        assert!(matches!(session.storage().await, Err(Error::IO(_))));
        assert!(session.is_closed());
        assert!(matches!(session.storage().await, Err(Error::Closed)));
    }
}
