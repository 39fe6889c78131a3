use crate::io::Source;
use std::io::{self, Read, Seek};

bitflags::bitflags! {
    /// The attribute word stored in every table slot.
    #[repr(transparent)]
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct Flags: u32 {
        const VALID = 1 << 0;
        const DIRECTORY = 1 << 1;
        const LARGE_FILE = 1 << 2;
        const DELETED = 1 << 4;
        const NOT_COMPRESSED = 1 << 16;
    }
}

impl Flags {
    #[must_use]
    pub fn valid(&self) -> bool {
        self.contains(Self::VALID)
    }

    #[must_use]
    pub fn directory(&self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    #[must_use]
    pub fn large_file(&self) -> bool {
        self.contains(Self::LARGE_FILE)
    }

    #[must_use]
    pub fn deleted(&self) -> bool {
        self.contains(Self::DELETED)
    }

    #[must_use]
    pub fn not_compressed(&self) -> bool {
        self.contains(Self::NOT_COMPRESSED)
    }
}

pub(crate) const ENTRY_SIZE: usize = 0x1C;

/// One occupied slot of the archive's table: a file or a directory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Entry {
    pub(crate) hash: u32,
    pub(crate) flags: Flags,
    pub(crate) parent: u32,
    pub(crate) offset: u32,
    pub(crate) packed_size: u32,
    pub(crate) original_size: u32,
    pub(crate) extra_info_size: u32,
}

impl Entry {
    /// The key of this entry, the hash of its lower-cased virtual path.
    #[must_use]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// The key of the directory containing this entry, `0` for the root.
    #[must_use]
    pub fn parent(&self) -> u32 {
        self.parent
    }

    #[must_use]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.flags.directory()
    }

    #[must_use]
    pub fn is_large_file(&self) -> bool {
        self.flags.large_file()
    }

    #[must_use]
    pub fn is_compressed(&self) -> bool {
        !self.flags.not_compressed()
    }

    /// Absolute offset of the payload within the container.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[must_use]
    pub fn packed_size(&self) -> u32 {
        self.packed_size
    }

    #[must_use]
    pub fn original_size(&self) -> u32 {
        self.original_size
    }

    #[must_use]
    pub fn extra_info_size(&self) -> u32 {
        self.extra_info_size
    }

    /// Number of bytes the payload occupies on disk.
    #[must_use]
    pub(crate) fn stored_len(&self) -> usize {
        if self.is_compressed() {
            self.packed_size as usize
        } else {
            self.original_size as usize
        }
    }

    /// The display name sits right after the payload.
    #[must_use]
    pub(crate) fn name_offset(&self) -> usize {
        self.offset as usize + self.stored_len()
    }

    /// Slots that were never written, or that no longer describe anything.
    #[must_use]
    pub(crate) fn is_vacant(&self) -> bool {
        self.flags.is_empty() || !self.flags.valid() || self.flags.deleted()
    }

    pub(crate) fn read<R>(source: &mut Source<'_, R>) -> io::Result<Self>
    where
        R: ?Sized + Read + Seek,
    {
        let (hash, flags, parent, offset, packed_size, original_size, extra_info_size) =
            source.read()?;

        // unknown bits show up in shipped archives, so they are kept rather than rejected
        let flags = Flags::from_bits_retain(flags);

        Ok(Self {
            hash,
            flags,
            parent,
            offset,
            packed_size,
            original_size,
            extra_info_size,
        })
    }
}
