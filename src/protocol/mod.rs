mod command;
mod entry;
mod response;

pub use self::{
    command::Command,
    entry::{decode_listing, decode_size, decode_storage, DirEntry, Listing, StorageStats},
    response::Response,
};

/// Line that terminates every text-mode response.
pub const SENTINEL: &str = "DONE";

const DIR_PREFIX: &str = "DIR :";
const FILE_PREFIX: &str = "FILE :";
const FILE_SIZE_SEPARATOR: &str = " SIZE : ";
const STORAGE_TOTAL: &str = "TOTAL:";
const STORAGE_FREE: &str = " FREE:";
const SIZE_PREFIX: &str = "SIZE:";
const ERROR_PREFIX: &str = "ERROR";
