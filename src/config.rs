//! Connection and session settings.
//!
//! Everything here deserializes with `serde`, durations are written in
//! milliseconds, and every field falls back to the value the desktop tool
//! shipped with.

use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};

use crate::error::Error;

/// Serial speeds the device firmware is built for.
pub const SUPPORTED_BAUD_RATES: [u32; 14] = [
    9600, 19200, 31250, 38400, 57600, 74880, 115_200, 230_400, 250_000, 460_800, 500_000,
    921_600, 1_000_000, 2_000_000,
];

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// One of [`SUPPORTED_BAUD_RATES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BaudRate(u32);

impl BaudRate {
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Self> {
        SUPPORTED_BAUD_RATES.into_iter().map(Self)
    }
}

impl Default for BaudRate {
    fn default() -> Self {
        Self(115_200)
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if SUPPORTED_BAUD_RATES.contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::UnexpectedBehavior(format!(
                "unsupported baud rate {value}"
            )))
        }
    }
}

impl From<BaudRate> for u32 {
    fn from(value: BaudRate) -> Self {
        value.0
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where and how to open the serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name such as `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    #[serde(default)]
    pub baud: BaudRate,
    #[serde(default = "default_write_timeout", with = "millis")]
    pub write_timeout: Duration,
    /// Pause after opening the port. Most boards reset when the port opens.
    #[serde(default = "default_open_delay", with = "millis")]
    pub open_delay: Duration,
}

const fn default_write_timeout() -> Duration {
    Duration::from_secs(5)
}

const fn default_open_delay() -> Duration {
    Duration::from_millis(1200)
}

impl SerialConfig {
    pub fn new<T: Into<String>>(port: T, baud: BaudRate) -> Self {
        Self {
            port: port.into(),
            baud,
            write_timeout: default_write_timeout(),
            open_delay: default_open_delay(),
        }
    }
}

/// How long to wait for the sentinel, per command kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandTimeouts {
    #[serde(with = "millis")]
    pub storage: Duration,
    #[serde(with = "millis")]
    pub list: Duration,
    #[serde(with = "millis")]
    pub create_dir: Duration,
    #[serde(with = "millis")]
    pub remove_dir: Duration,
    #[serde(with = "millis")]
    pub delete: Duration,
    #[serde(with = "millis")]
    pub rename: Duration,
    #[serde(with = "millis")]
    pub get_size: Duration,
    /// Wait for the completion status once an upload payload is sent.
    #[serde(with = "millis")]
    pub put_file: Duration,
}

impl Default for CommandTimeouts {
    fn default() -> Self {
        Self {
            storage: Duration::from_millis(500),
            list: Duration::from_millis(1000),
            create_dir: Duration::from_millis(500),
            remove_dir: Duration::from_millis(500),
            delete: Duration::from_millis(500),
            rename: Duration::from_millis(500),
            get_size: Duration::from_millis(800),
            put_file: Duration::from_millis(1000),
        }
    }
}

/// Session behaviour independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Bound for each raw payload read during a download.
    #[serde(with = "millis")]
    pub read_timeout: Duration,
    pub timeouts: CommandTimeouts,
    pub download_chunk: usize,
    pub upload_chunk: usize,
    /// Pause between `PUTFILE` and the payload so the device can open the file.
    #[serde(with = "millis")]
    pub upload_settle: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            timeouts: CommandTimeouts::default(),
            download_chunk: 32 * 1024,
            upload_chunk: 16 * 1024,
            upload_settle: Duration::from_millis(50),
        }
    }
}

/// Everything needed by [`Session::connect`](crate::Session::connect).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub serial: SerialConfig,
    #[serde(default)]
    pub options: Options,
}
