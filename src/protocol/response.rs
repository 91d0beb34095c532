use super::{decode_listing, decode_size, decode_storage, Listing, StorageStats, ERROR_PREFIX};
use crate::error::{Error, FsResult};

/// Lines collected for one command, without the sentinel.
///
/// The protocol has no status codes, so an incomplete response only tells
/// that the sentinel did not arrive in time. It may mean a slow device as
/// well as an unknown command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub command: String,
    pub lines: Vec<String>,
    pub complete: bool,
}

impl Response {
    pub(crate) fn new(command: String) -> Self {
        Self {
            command,
            lines: Vec::new(),
            complete: false,
        }
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// First line reporting a device-side failure. Advisory only.
    #[must_use]
    pub fn device_error(&self) -> Option<&str> {
        self.lines().find(|line| line.starts_with(ERROR_PREFIX))
    }

    /// Turns a response that never saw its sentinel into [`Error::Timeout`].
    pub fn ensure_complete(self) -> FsResult<Self> {
        if self.complete {
            Ok(self)
        } else {
            Err(Error::Timeout(self.command))
        }
    }

    #[must_use]
    pub fn listing(&self) -> Listing {
        Listing {
            complete: self.complete,
            ..decode_listing(self.lines())
        }
    }

    #[must_use]
    pub fn storage(&self) -> Option<StorageStats> {
        decode_storage(self.lines())
    }

    #[must_use]
    pub fn size(&self) -> Option<u64> {
        decode_size(self.lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(lines: &[&str], complete: bool) -> Response {
        Response {
            command: "LIST /".to_owned(),
            lines: lines.iter().map(ToString::to_string).collect(),
            complete,
        }
    }

    #[test]
    fn test_device_error() {
        assert_eq!(
            response(&["ERROR: Invalid directory"], true).device_error(),
            Some("ERROR: Invalid directory")
        );
        assert_eq!(response(&["DELETED"], true).device_error(), None);
    }

    #[test]
    fn test_ensure_complete() {
        assert!(response(&["DELETED"], true).ensure_complete().is_ok());
        assert!(matches!(
            response(&[], false).ensure_complete(),
            Err(Error::Timeout(command)) if command == "LIST /"
        ));
    }

    #[test]
    fn test_listing_carries_completion() {
        let listing = response(&["DIR : a"], false).listing();
        assert_eq!(listing.entries.len(), 1);
        assert!(!listing.complete);
    }
}
