use bytes::Bytes;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::{
    io,
    time::Duration,
};
use tokio::task;

use super::Transport;
use crate::config::SerialConfig;

/// [`Transport`] over a local serial port, 8N1.
///
/// `serialport` is blocking, so every call runs on the blocking pool with the
/// port moved in and handed back afterwards.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
    write_timeout: Duration,
}

impl SerialTransport {
    pub fn open(config: &SerialConfig) -> io::Result<Self> {
        let port = serialport::new(&config.port, config.baud.get())
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(config.write_timeout)
            .open()?;

        debug!("opened {} at {} baud", config.port, config.baud);

        Ok(Self {
            port: Some(port),
            name: config.port.clone(),
            write_timeout: config.write_timeout,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn with_port<T, F>(&mut self, f: F) -> io::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn SerialPort) -> io::Result<T> + Send + 'static,
    {
        let mut port = self.port.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "serial port was lost")
        })?;

        let (port, result) = task::spawn_blocking(move || {
            let result = f(port.as_mut());
            (port, result)
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        self.port = Some(port);
        result
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let data = data.to_vec();
        let timeout = self.write_timeout;

        self.with_port(move |port| {
            port.set_timeout(timeout)?;
            port.write_all(&data)?;
            port.flush()
        })
        .await
    }

    async fn read(&mut self, max: usize, timeout: Duration) -> io::Result<Bytes> {
        self.with_port(move |port| {
            port.set_timeout(timeout)?;

            let mut buf = vec![0; max];
            match port.read(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    Ok(Bytes::from(buf))
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Bytes::new()),
                Err(e) => Err(e),
            }
        })
        .await
    }

    async fn bytes_available(&mut self) -> io::Result<usize> {
        self.with_port(|port| Ok(port.bytes_to_read()? as usize))
            .await
    }

    async fn flush_input(&mut self) -> io::Result<()> {
        self.with_port(|port| Ok(port.clear(ClearBuffer::Input)?))
            .await
    }
}
