use bytes::Bytes;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{Mutex, RwLock},
    time,
};

use super::{Progress, RawSession, RemovalReport};
use crate::{
    config::{Config, Options},
    error::FsResult,
    observer::{LogObserver, Observer, TraceEvent},
    path::RemotePath,
    protocol::{Listing, Response, StorageStats},
    transport::{SerialTransport, Transport},
};

/// High-level client for the device file system.
///
/// Clones share the connection and the working directory. Operations are
/// serialized by one lock held for the whole operation, so a download or a
/// recursive delete never interleaves with anything else. Relative paths are
/// resolved against the working directory.
#[derive(Clone)]
pub struct Session {
    session: Arc<Mutex<RawSession>>,
    cwd: Arc<RwLock<RemotePath>>,
    closed: Arc<AtomicBool>,
    observer: Arc<dyn Observer>,
}

impl Session {
    /// Wraps an already open transport. Traces go to the `log` facade.
    pub fn new<T>(transport: T, options: Options) -> Self
    where
        T: Transport + 'static,
    {
        Self::with_observer(transport, options, Arc::new(LogObserver))
    }

    pub fn with_observer<T>(transport: T, options: Options, observer: Arc<dyn Observer>) -> Self
    where
        T: Transport + 'static,
    {
        let raw = RawSession::new(transport, Arc::new(options), observer.clone());
        let closed = raw.closed_flag();

        Self {
            session: Arc::new(Mutex::new(raw)),
            cwd: Arc::new(RwLock::new(RemotePath::root())),
            closed,
            observer,
        }
    }

    /// Opens the serial port described by `config`.
    pub async fn connect(config: &Config) -> FsResult<Self> {
        Self::connect_with_observer(config, Arc::new(LogObserver)).await
    }

    /// Opens the serial port, waits for the board to come out of reset and
    /// discards whatever it printed while booting.
    pub async fn connect_with_observer(
        config: &Config,
        observer: Arc<dyn Observer>,
    ) -> FsResult<Self> {
        let transport = SerialTransport::open(&config.serial)?;
        time::sleep(config.serial.open_delay).await;

        let session = Self::with_observer(transport, config.options.clone(), observer);
        session.session.lock().await.flush().await?;

        session.observer.observe(TraceEvent::Info(&format!(
            "Connected to {} @ {} baud",
            config.serial.port, config.serial.baud
        )));

        Ok(session)
    }

    /// Closes the session without waiting for the running operation.
    ///
    /// That operation fails with [`Error::Closed`](crate::Error::Closed) at
    /// its next transport step. The device may be left mid-transfer.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);

        if let Ok(mut raw) = self.session.try_lock() {
            raw.close();
        }

        *self.cwd.write().await = RemotePath::root();
        self.observer.observe(TraceEvent::Info("Disconnected"));
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn current_dir(&self) -> RemotePath {
        self.cwd.read().await.clone()
    }

    /// Changes the working directory. The device is not consulted.
    pub async fn set_current_dir<P: AsRef<str>>(&self, path: P) -> FsResult<RemotePath> {
        let path = self.resolve(path).await?;
        *self.cwd.write().await = path.clone();
        Ok(path)
    }

    /// Descends into `name` below the working directory.
    pub async fn enter<P: AsRef<str>>(&self, name: P) -> FsResult<RemotePath> {
        let mut cwd = self.cwd.write().await;
        *cwd = cwd.join(name)?;
        Ok(cwd.clone())
    }

    /// Moves the working directory one level up, staying at the root.
    pub async fn go_up(&self) -> RemotePath {
        let mut cwd = self.cwd.write().await;
        *cwd = cwd.parent();
        cwd.clone()
    }

    /// Turns `path` into an absolute path, relative ones starting at the
    /// working directory.
    pub async fn resolve<P: AsRef<str>>(&self, path: P) -> FsResult<RemotePath> {
        let path = path.as_ref();
        if path.starts_with('/') {
            RemotePath::new(path)
        } else {
            self.cwd.read().await.join(path)
        }
    }

    /// Runs a raw text command and returns whatever came back.
    pub async fn execute(&self, command: &str, timeout: Duration) -> FsResult<Response> {
        self.session.lock().await.execute(command, timeout).await
    }

    pub async fn storage(&self) -> FsResult<StorageStats> {
        self.session.lock().await.storage().await
    }

    pub async fn list<P: AsRef<str>>(&self, path: P) -> FsResult<Listing> {
        let path = self.resolve(path).await?;
        self.session.lock().await.list(&path).await
    }

    pub async fn create_dir<P: AsRef<str>>(&self, path: P) -> FsResult<Response> {
        let path = self.resolve(path).await?;
        self.session.lock().await.create_dir(&path).await
    }

    pub async fn remove_file<P: AsRef<str>>(&self, path: P) -> FsResult<Response> {
        let path = self.resolve(path).await?;
        self.session.lock().await.remove_file(&path).await
    }

    /// Removes an empty directory.
    pub async fn remove_dir<P: AsRef<str>>(&self, path: P) -> FsResult<Response> {
        let path = self.resolve(path).await?;
        self.session.lock().await.remove_dir(&path).await
    }

    /// Removes a directory and everything below it. See
    /// [`RawSession::remove_dir_all`].
    pub async fn remove_dir_all<P: AsRef<str>>(&self, path: P) -> FsResult<RemovalReport> {
        let path = self.resolve(path).await?;
        self.session.lock().await.remove_dir_all(&path).await
    }

    pub async fn rename<O, N>(&self, from: O, to: N) -> FsResult<Response>
    where
        O: AsRef<str>,
        N: AsRef<str>,
    {
        let from = self.resolve(from).await?;
        let to = self.resolve(to).await?;
        self.session.lock().await.rename(&from, &to).await
    }

    pub async fn file_size<P: AsRef<str>>(&self, path: P) -> FsResult<u64> {
        let path = self.resolve(path).await?;
        self.session.lock().await.file_size(&path).await
    }

    /// Reads a whole remote file into memory.
    pub async fn download<P, F>(&self, path: P, progress: F) -> FsResult<Bytes>
    where
        P: AsRef<str>,
        F: FnMut(Progress) + Send,
    {
        let path = self.resolve(path).await?;
        self.session.lock().await.download(&path, progress).await
    }

    /// Streams a remote file into `sink`, returning the number of bytes.
    pub async fn download_to<P, W, F>(&self, path: P, sink: W, progress: F) -> FsResult<u64>
    where
        P: AsRef<str>,
        W: AsyncWrite + Unpin + Send,
        F: FnMut(Progress) + Send,
    {
        let path = self.resolve(path).await?;
        self.session
            .lock()
            .await
            .download_to(&path, sink, progress)
            .await
    }

    /// Writes `size` bytes from `source` to a remote file.
    pub async fn upload<P, R, F>(
        &self,
        path: P,
        source: R,
        size: u64,
        progress: F,
    ) -> FsResult<Response>
    where
        P: AsRef<str>,
        R: AsyncRead + Unpin + Send,
        F: FnMut(Progress) + Send,
    {
        let path = self.resolve(path).await?;
        self.session
            .lock()
            .await
            .upload(&path, source, size, progress)
            .await
    }
}
