use std::{fmt, time::Duration};

use crate::{config::CommandTimeouts, path::RemotePath};

/// Commands understood by the device, one per line.
///
/// `LIST` and `CREATE_DIR` take a bare path, every other path-carrying
/// command takes it quoted. Mixing the two up is not reported by the device,
/// it just operates on the wrong name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Storage,
    List(RemotePath),
    CreateDir(RemotePath),
    RemoveDir(RemotePath),
    Delete(RemotePath),
    Rename { from: RemotePath, to: RemotePath },
    GetSize(RemotePath),
    GetData(RemotePath),
    PutFile { path: RemotePath, size: u64 },
}

impl Command {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Storage => "STORAGE",
            Self::List(_) => "LIST",
            Self::CreateDir(_) => "CREATE_DIR",
            Self::RemoveDir(_) => "REMOVE_DIR",
            Self::Delete(_) => "DELETE",
            Self::Rename { .. } => "RENAME",
            Self::GetSize(_) => "GETSIZE",
            Self::GetData(_) => "GETDATA",
            Self::PutFile { .. } => "PUTFILE",
        }
    }

    /// How long to wait for the sentinel after sending this command.
    ///
    /// For `PUTFILE` this bounds the wait after the payload went out, and
    /// `GETDATA` has no text response at all.
    #[must_use]
    pub const fn timeout(&self, timeouts: &CommandTimeouts) -> Duration {
        match self {
            Self::Storage => timeouts.storage,
            Self::List(_) => timeouts.list,
            Self::CreateDir(_) => timeouts.create_dir,
            Self::RemoveDir(_) => timeouts.remove_dir,
            Self::Delete(_) => timeouts.delete,
            Self::Rename { .. } => timeouts.rename,
            Self::GetSize(_) | Self::GetData(_) => timeouts.get_size,
            Self::PutFile { .. } => timeouts.put_file,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            Self::Storage => f.write_str(name),
            Self::List(path) | Self::CreateDir(path) => write!(f, "{name} {path}"),
            Self::RemoveDir(path)
            | Self::Delete(path)
            | Self::GetSize(path)
            | Self::GetData(path) => write!(f, "{name} {}", path.quoted()),
            Self::Rename { from, to } => write!(f, "{name} {} {}", from.quoted(), to.quoted()),
            Self::PutFile { path, size } => write!(f, "{name} {} {size}", path.quoted()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> RemotePath {
        RemotePath::new(p).unwrap()
    }

    #[test]
    fn test_wire_forms() {
        let cases = [
            (Command::Storage, "STORAGE"),
            (Command::List(path("/my dir/")), "LIST /my dir"),
            (Command::CreateDir(path("/new")), "CREATE_DIR /new"),
            (Command::RemoveDir(path("/tmp/sub")), "REMOVE_DIR \"/tmp/sub\""),
            (Command::Delete(path("/tmp/a.txt")), "DELETE \"/tmp/a.txt\""),
            (
                Command::Rename {
                    from: path("/old name.txt"),
                    to: path("/new name.txt"),
                },
                "RENAME \"/old name.txt\" \"/new name.txt\"",
            ),
            (Command::GetSize(path("/a.bin")), "GETSIZE \"/a.bin\""),
            (Command::GetData(path("/a.bin")), "GETDATA \"/a.bin\""),
            (
                Command::PutFile {
                    path: path("/up/a.bin"),
                    size: 1024,
                },
                "PUTFILE \"/up/a.bin\" 1024",
            ),
        ];

        for (command, wire) in cases {
            assert_eq!(command.to_string(), wire);
        }
    }

    #[test]
    fn test_timeouts_follow_command_kind() {
        let timeouts = CommandTimeouts::default();
        assert_eq!(Command::Storage.timeout(&timeouts), timeouts.storage);
        assert_eq!(Command::List(RemotePath::root()).timeout(&timeouts), timeouts.list);
        assert_eq!(
            Command::PutFile {
                path: RemotePath::root(),
                size: 0
            }
            .timeout(&timeouts),
            timeouts.put_file
        );
    }
}
