//! Decoding of listing, storage and size lines.
//!
//! The wire format has no checksums or versioning, so a line that fails to
//! decode is set aside and the rest of the response is still used.

use super::{DIR_PREFIX, FILE_PREFIX, FILE_SIZE_SEPARATOR, SIZE_PREFIX, STORAGE_FREE, STORAGE_TOTAL};

/// Entries returned by a `LIST` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirEntry {
    Directory { name: String },
    File { name: String, size: u64 },
}

impl DirEntry {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Directory { name } | Self::File { name, .. } => name,
        }
    }

    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }

    /// File size in bytes, `None` for directories.
    #[must_use]
    pub const fn size(&self) -> Option<u64> {
        match self {
            Self::Directory { .. } => None,
            Self::File { size, .. } => Some(*size),
        }
    }
}

/// Result of decoding one listing response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub entries: Vec<DirEntry>,
    /// Lines that looked like entries but could not be decoded.
    pub skipped: Vec<String>,
    /// Whether the response ended with the sentinel. An incomplete listing
    /// may be missing entries.
    pub complete: bool,
}

impl Listing {
    pub fn dirs(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| e.is_dir())
    }

    pub fn files(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter().filter(|e| !e.is_dir())
    }
}

/// Capacity figures reported by `STORAGE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl StorageStats {
    #[must_use]
    pub const fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

/// Devices built on older cores echo the full path in entry names.
fn entry_name(raw: &str) -> Option<String> {
    let name = raw.trim().rsplit('/').next().unwrap_or_default().trim();
    if matches!(name, "" | "." | "..") {
        None
    } else {
        Some(name.to_owned())
    }
}

fn decode_entry(line: &str) -> Option<Option<DirEntry>> {
    if let Some(rest) = line.strip_prefix(DIR_PREFIX) {
        return Some(entry_name(rest).map(|name| DirEntry::Directory { name }));
    }

    if let Some(rest) = line.strip_prefix(FILE_PREFIX) {
        let entry = rest.rsplit_once(FILE_SIZE_SEPARATOR).and_then(|(name, size)| {
            Some(DirEntry::File {
                name: entry_name(name)?,
                size: parse_u64(size)?,
            })
        });
        return Some(entry);
    }

    None
}

/// Decodes `DIR :` and `FILE :` lines, ignoring everything else.
pub fn decode_listing<'a, I>(lines: I) -> Listing
where
    I: IntoIterator<Item = &'a str>,
{
    let mut listing = Listing::default();

    for line in lines {
        match decode_entry(line) {
            Some(Some(entry)) => listing.entries.push(entry),
            Some(None) => {
                debug!("skipping malformed entry line {line:?}");
                listing.skipped.push(line.to_owned());
            }
            None => (),
        }
    }

    listing
}

/// Decodes the last valid `TOTAL:<n> FREE:<n>` line.
pub fn decode_storage<'a, I>(lines: I) -> Option<StorageStats>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .filter_map(|line| {
            let (_, rest) = line.split_once(STORAGE_TOTAL)?;
            let (total, free) = rest.split_once(STORAGE_FREE)?;
            Some(StorageStats {
                total_bytes: parse_u64(total)?,
                free_bytes: parse_u64(free)?,
            })
        })
        .last()
}

/// Decodes the first valid `SIZE:<n>` line.
pub fn decode_size<'a, I>(lines: I) -> Option<u64>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .find_map(|line| parse_u64(line.strip_prefix(SIZE_PREFIX)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_listing() {
        let lines = ["DIR : photos", "FILE : notes.txt SIZE : 42", "DONE"];
        let listing = decode_listing(lines);

        assert_eq!(
            listing.entries,
            vec![
                DirEntry::Directory {
                    name: "photos".to_owned()
                },
                DirEntry::File {
                    name: "notes.txt".to_owned(),
                    size: 42
                },
            ]
        );
        assert!(listing.skipped.is_empty());
        assert_eq!(listing.dirs().count(), 1);
        assert_eq!(listing.files().next().and_then(DirEntry::size), Some(42));
    }

    #[test]
    fn test_decode_listing_skips_malformed_lines() {
        let lines = [
            "ERROR: Invalid directory",
            "FILE : broken.bin SIZE : lots",
            "FILE : nosize.bin",
            "FILE : good.bin SIZE : 7",
            "DIR : ",
            "DIR : .",
            "DIR : /sdcard/..",
            "garbage \u{fffd}",
        ];
        let listing = decode_listing(lines);

        assert_eq!(
            listing.entries,
            vec![DirEntry::File {
                name: "good.bin".to_owned(),
                size: 7
            }]
        );
        assert_eq!(
            listing.skipped,
            vec![
                "FILE : broken.bin SIZE : lots",
                "FILE : nosize.bin",
                "DIR : ",
                "DIR : .",
                "DIR : /sdcard/.."
            ]
        );
    }

    #[test]
    fn test_decode_listing_names() {
        let lines = [
            "FILE : report SIZE : 2024.txt SIZE : 10",
            "DIR : /sdcard/music",
            "FILE : with spaces.txt SIZE : 0",
        ];
        let names: Vec<_> = decode_listing(lines)
            .entries
            .iter()
            .map(|e| e.name().to_owned())
            .collect();

        assert_eq!(names, ["report SIZE : 2024.txt", "music", "with spaces.txt"]);
    }

    #[test]
    fn test_decode_idempotent() {
        let lines = [
            "DIR : a",
            "FILE : b SIZE : 1",
            "FILE : c SIZE : x",
            "TOTAL:10 FREE:5",
        ];
        assert_eq!(decode_listing(lines), decode_listing(lines));
        assert_eq!(decode_storage(lines), decode_storage(lines));
    }

    #[test]
    fn test_decode_storage() {
        let stats = decode_storage(["TOTAL:1000000 FREE:250000", "DONE"]).unwrap();
        assert_eq!(
            stats,
            StorageStats {
                total_bytes: 1_000_000,
                free_bytes: 250_000
            }
        );
        assert!(stats.free_bytes <= stats.total_bytes);
        assert_eq!(stats.used_bytes(), 750_000);

        assert_eq!(decode_storage(["DONE"]), None);
        assert_eq!(decode_storage(["TOTAL:x FREE:1"]), None);

        // not rejected, only implausible
        let odd = decode_storage(["TOTAL:5 FREE:9"]).unwrap();
        assert_eq!(odd.used_bytes(), 0);
    }

    #[test]
    fn test_decode_size() {
        assert_eq!(decode_size(["SIZE:100000", "DONE"]), Some(100_000));
        assert_eq!(decode_size(["SIZE: 12 "]), Some(12));
        assert_eq!(decode_size(["ERROR", "DONE"]), None);
        assert_eq!(decode_size(["SIZE:oops", "SIZE:3"]), Some(3));
    }
}
