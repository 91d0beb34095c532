//! Client for the file manager protocol spoken by embedded storage devices
//! over a serial link.
//!
//! The device answers one text command at a time and ends every text reply
//! with a `DONE` line. Downloads and uploads switch the same channel to raw
//! bytes whose length is announced up front.
//!
//! ```no_run
//! use serialfs::{config::{BaudRate, Config, Options, SerialConfig}, Session};
//!
//! # async fn run() -> serialfs::FsResult<()> {
//! let config = Config {
//!     serial: SerialConfig::new("/dev/ttyUSB0", BaudRate::default()),
//!     options: Options::default(),
//! };
//!
//! let session = Session::connect(&config).await?;
//! for entry in session.list("/").await?.entries {
//!     println!("{}", entry.name());
//! }
//! session.close().await;
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;
#[macro_use]
extern crate async_trait;

/// Client side
pub mod client;
pub mod config;
mod error;
mod framer;
pub mod observer;
pub mod path;
/// Protocol implementation
pub mod protocol;
pub mod transport;
mod utils;

pub use self::{
    client::Session,
    config::Config,
    error::{Error, FsResult},
    path::RemotePath,
    utils::human_size,
};
