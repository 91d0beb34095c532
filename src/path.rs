//! Remote path arithmetic and quoting.
//!
//! The device-side command parser wants some paths wrapped in double quotes
//! and others bare, so the canonical [`RemotePath`] never stores quotes; they
//! are added by [`RemotePath::quoted`] when a command is rendered.

use std::{fmt, str::FromStr};

use crate::error::{Error, FsResult};

const SEPARATOR: char = '/';

/// Collapses a `/`-separated string into its canonical absolute form.
///
/// Empty and `.` segments are dropped and `..` removes the previous segment,
/// never climbing above the root.
#[must_use]
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => (),
            ".." => {
                let _ = segments.pop();
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return SEPARATOR.to_string();
    }

    segments.iter().fold(String::new(), |mut acc, s| {
        acc.push(SEPARATOR);
        acc.push_str(s);
        acc
    })
}

/// Wraps the normalized form of `path` in double quotes.
#[must_use]
pub fn quote(path: &str) -> String {
    format!("\"{}\"", normalize(path))
}

/// An absolute location on the remote file system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemotePath(String);

impl RemotePath {
    /// The root directory.
    #[must_use]
    pub fn root() -> Self {
        Self(SEPARATOR.to_string())
    }

    /// Validates and normalizes `path`. Relative input is treated as rooted.
    pub fn new<P: AsRef<str>>(path: P) -> FsResult<Self> {
        let path = path.as_ref();
        if path.contains(['"', '\r', '\n']) {
            return Err(Error::InvalidPath(path.to_owned()));
        }

        Ok(Self(normalize(path)))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Appends `name` (which may itself contain separators).
    pub fn join<P: AsRef<str>>(&self, name: P) -> FsResult<Self> {
        Self::new(format!("{}{SEPARATOR}{}", self.0, name.as_ref()))
    }

    /// The containing directory; the root is its own parent.
    #[must_use]
    pub fn parent(&self) -> Self {
        match self.0.rfind(SEPARATOR) {
            Some(0) | None => Self::root(),
            Some(idx) => Self(self.0[..idx].to_owned()),
        }
    }

    /// The last segment, or `None` for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }

        self.0.rsplit(SEPARATOR).next()
    }

    /// Wire form used by commands that target a single object by full path.
    #[must_use]
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl Default for RemotePath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RemotePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for RemotePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<&str> for RemotePath {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for RemotePath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
