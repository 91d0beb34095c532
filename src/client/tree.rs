use std::{fmt, future::Future, pin::Pin};

use super::rawsession::RawSession;
use crate::{
    error::FsResult,
    path::RemotePath,
    protocol::{DirEntry, Response},
};

/// Why one step of a recursive delete did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The sentinel did not arrive in time.
    Incomplete,
    /// The device printed an `ERROR` line.
    Rejected(String),
    /// A listed name cannot be turned into a path the protocol can carry.
    Unaddressable(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete => f.write_str("no response"),
            Self::Rejected(line) => write!(f, "rejected: {line}"),
            Self::Unaddressable(name) => write!(f, "unaddressable entry {name:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalFailure {
    pub path: RemotePath,
    pub command: &'static str,
    pub reason: FailureReason,
}

/// Outcome of [`RawSession::remove_dir_all`].
///
/// The counters are commands issued, successful or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub listed: usize,
    pub files_deleted: usize,
    pub dirs_removed: usize,
    pub failures: Vec<RemovalFailure>,
}

impl RemovalReport {
    /// `true` when every step completed without a device error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, path: &RemotePath, command: &'static str, reason: FailureReason) {
        warn!("{command} {path}: {reason}");
        self.failures.push(RemovalFailure {
            path: path.clone(),
            command,
            reason,
        });
    }

    fn record(&mut self, path: &RemotePath, command: &'static str, response: &Response) {
        if let Some(line) = response.device_error() {
            self.fail(path, command, FailureReason::Rejected(line.to_owned()));
        } else if !response.is_complete() {
            self.fail(path, command, FailureReason::Incomplete);
        }
    }
}

type Step<'a> = Pin<Box<dyn Future<Output = FsResult<()>> + Send + 'a>>;

impl RawSession {
    /// Deletes a directory with everything below it, depth first.
    ///
    /// Best effort: a step that is rejected or times out is recorded in the
    /// report and the walk goes on. Nothing is rolled back. Only transport
    /// failures abort, since the session is gone with them.
    pub async fn remove_dir_all(&mut self, path: &RemotePath) -> FsResult<RemovalReport> {
        let mut report = RemovalReport::default();
        self.remove_tree(path, &mut report).await?;

        if report.is_clean() {
            info!(
                "removed {path}: {} files, {} directories",
                report.files_deleted, report.dirs_removed
            );
        }

        Ok(report)
    }

    fn remove_tree<'a>(&'a mut self, path: &'a RemotePath, report: &'a mut RemovalReport) -> Step<'a> {
        Box::pin(async move {
            let listing = self.list(path).await?;
            report.listed += 1;
            if !listing.complete {
                report.fail(path, "LIST", FailureReason::Incomplete);
            }

            for dir in listing.dirs() {
                let Some(child) = child_path(path, dir, report) else {
                    continue;
                };
                self.remove_tree(&child, report).await?;
            }

            for file in listing.files() {
                let Some(child) = child_path(path, file, report) else {
                    continue;
                };
                let response = self.remove_file(&child).await?;
                report.files_deleted += 1;
                report.record(&child, "DELETE", &response);
            }

            let response = self.remove_dir(path).await?;
            report.dirs_removed += 1;
            report.record(path, "REMOVE_DIR", &response);

            Ok(())
        })
    }
}

/// Path of a listed entry. Anything that does not land directly below
/// `parent` is refused so the walk never leaves the tree.
fn child_path(parent: &RemotePath, entry: &DirEntry, report: &mut RemovalReport) -> Option<RemotePath> {
    match parent.join(entry.name()) {
        Ok(child) if child != *parent && child.parent() == *parent => Some(child),
        _ => {
            report.fail(
                parent,
                "LIST",
                FailureReason::Unaddressable(entry.name().to_owned()),
            );
            None
        }
    }
}
