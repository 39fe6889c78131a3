#![doc(alias = "pal3")]
#![doc(alias = "rst")]

//! CPK containers
//!
//! A CPK begins with a fixed 128-byte header followed by a table of equally sized slots. Each occupied slot describes one file or directory, keyed by the CRC of its lower-cased virtual path, and names the key of the directory that contains it. Payloads are stored either raw or as an LZO1X stream, and each one is immediately followed by the entry's display name.
//!
//! Opening an archive only parses the header and the slot table. Names are decoded the first time they are needed, and payloads are read and decompressed on request, either from the file on disk or from a resident copy of the whole container.
//!
//! # Reading
//! ```rust
//! use cpk::{
//!     cpk::{Archive, ArchiveOptions, Node},
//!     prelude::*,
//! };
//! use std::path::Path;
//!
//! fn example() -> Option<()> {
//!     let path = Path::new("path/to/pal3/basedata/music.cpk");
//!     let archive = Archive::read(path, &ArchiveOptions::default()).ok()?;
//!     let _mp3 = archive.read_all_bytes_from_path("music\\P01.mp3").ok()?;
//!     for node in archive.root_entries().ok()? {
//!         if let Node::Directory(directory) = node {
//!             let count = directory.children().count();
//!             println!("{}: {count} entries", directory.path());
//!         }
//!     }
//!     Some(())
//! }
//! ```

mod archive;
mod entry;
#[cfg(test)]
mod testing;
mod tree;

pub use self::{
    archive::{Archive, Options as ArchiveOptions, OptionsBuilder as ArchiveOptionsBuilder},
    entry::{Entry, Flags as EntryFlags},
    tree::{Children, DirectoryNode, FileNode, Node, SEPARATOR},
};

use crate::lzo;
use core::num::TryFromIntError;
use std::io;

pub(crate) mod constants {
    /// `RST\x1A`, read little-endian.
    pub(crate) const MAGIC: u32 = 0x1A54_5352;
    pub(crate) const VERSION: u32 = 1;
    pub(crate) const HEADER_SIZE: usize = 0x80;
}

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("entry {hash:#010X} failed to decompress")]
    CorruptData {
        hash: u32,
        #[source]
        source: lzo::Error,
    },

    #[error("entry {hash:#010X} failed to decompress to the expected size... expected {expected} bytes, but got {actual} bytes")]
    DecompressionSizeMismatch {
        hash: u32,
        expected: usize,
        actual: usize,
    },

    #[error("an operation on an integer would have truncated and corrupted data")]
    IntegralTruncation,

    #[error("inconsistent counts read from archive header: {files} files of at most {max_files}, {occupied} occupied slots of {capacity}")]
    InvalidCounts {
        files: u32,
        max_files: u32,
        occupied: u32,
        capacity: u32,
    },

    #[error("invalid magic read from archive header: {0:#010X}")]
    InvalidMagic(u32),

    #[error("the entry table can not start inside the archive header: {0}")]
    InvalidTableStart(u32),

    #[error("invalid version read from archive header: {0}")]
    InvalidVersion(u32),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("the archive is not backed by a file, so its resident copy can not be released")]
    NoBackingFile,

    #[error("entry {0:#010X} is a directory and has no contents")]
    NotAFile(u32),

    #[error("no entry with hash {0:#010X} exists in the archive")]
    NotFound(u32),

    #[error("the entry table spans {len} bytes from offset {start}, but the archive is only {archive_len} bytes long")]
    TableOutOfBounds {
        start: u64,
        len: u64,
        archive_len: u64,
    },
}

impl Error {
    /// The header was malformed and the archive could not be opened.
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCounts { .. }
                | Self::InvalidMagic(_)
                | Self::InvalidTableStart(_)
                | Self::InvalidVersion(_)
                | Self::TableOutOfBounds { .. }
        )
    }

    /// The stored payload of an entry did not decode.
    #[must_use]
    pub fn is_corrupt_data(&self) -> bool {
        matches!(
            self,
            Self::CorruptData { .. } | Self::DecompressionSizeMismatch { .. }
        )
    }
}

impl From<TryFromIntError> for Error {
    fn from(_: TryFromIntError) -> Self {
        Self::IntegralTruncation
    }
}

pub type Result<T> = core::result::Result<T, Error>;
