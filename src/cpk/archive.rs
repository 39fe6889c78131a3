use crate::{
    containers::Bytes,
    cpk::{
        constants,
        entry::ENTRY_SIZE,
        tree::{ChildMap, Children, EntryMap, NameMap, Node, Tree},
        Entry, Error, Result,
    },
    hashing,
    io::{FileCursor, Source},
    lzo, Borrowed, Copied, ReaderWithOptions, Sealed,
};
use encoding_rs::Encoding;
use std::{
    borrow::Cow,
    collections::{hash_map, HashSet},
    fs,
    io::{self, Cursor, Read, Seek},
    path::Path,
    sync::OnceLock,
};
use tracing::{debug, trace, warn};

/// See also [`ArchiveOptionsBuilder`](OptionsBuilder).
///
/// ```rust
/// use cpk::cpk::ArchiveOptions;
///
/// // BIG5, for archives shipped in Taiwan
/// let codepage = cpk::codepage(950).unwrap();
/// let options = ArchiveOptions::builder()
///     .codepage(codepage)
///     .preload(true)
///     .build();
/// assert_eq!(options.codepage(), encoding_rs::BIG5);
/// assert!(options.preload());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Options {
    codepage: &'static Encoding,
    preload: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            codepage: encoding_rs::GBK,
            preload: false,
        }
    }
}

impl Options {
    #[must_use]
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    /// The encoding of virtual paths and display names. Defaults to GBK.
    #[must_use]
    pub fn codepage(&self) -> &'static Encoding {
        self.codepage
    }

    /// Whether the whole container is read into memory as soon as it is opened.
    #[must_use]
    pub fn preload(&self) -> bool {
        self.preload
    }
}

/// See also [`ArchiveOptions`](Options).
#[derive(Clone, Copy, Debug, Default)]
#[repr(transparent)]
pub struct OptionsBuilder(Options);

impl OptionsBuilder {
    #[must_use]
    pub fn build(self) -> Options {
        self.0
    }

    #[must_use]
    pub fn codepage(mut self, codepage: &'static Encoding) -> Self {
        self.0.codepage = codepage;
        self
    }

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn preload(mut self, preload: bool) -> Self {
        self.0.preload = preload;
        self
    }
}

struct Header {
    table_start: u32,
    file_count: u32,
    capacity: u32,
}

enum Backing<'bytes> {
    Memory(Bytes<'bytes>),
    File(fs::File),
}

/// An opened CPK container.
///
/// The index is immutable once opened, so an archive can be shared between threads and read from concurrently.
pub struct Archive<'bytes> {
    header: Header,
    entries: EntryMap,
    children: ChildMap,
    names: OnceLock<NameMap>,
    codepage: &'static Encoding,
    file: Option<fs::File>,
    memory: Option<Bytes<'bytes>>,
}

impl<'bytes> Sealed for Archive<'bytes> {}

impl<'bytes> Archive<'bytes> {
    /// Hashes `path` the way keys are stored: lower-cased, then encoded with the archive's codepage.
    #[must_use]
    pub fn hash_path(&self, path: &str) -> u32 {
        hashing::hash(&path.to_lowercase(), self.codepage)
    }

    #[must_use]
    pub fn contains(&self, hash: u32) -> bool {
        self.entries.contains_key(&hash)
    }

    /// Whether a file or directory exists at `path`. Case is ignored.
    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.contains(self.hash_path(path))
    }

    #[must_use]
    pub fn entry(&self, hash: u32) -> Option<&Entry> {
        self.entries.get(&hash)
    }

    #[must_use]
    pub fn entry_by_path(&self, path: &str) -> Option<&Entry> {
        self.entry(self.hash_path(path))
    }

    /// Every indexed entry, in no particular order.
    pub fn entries(&self) -> hash_map::Values<'_, u32, Entry> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of entries the header declares.
    #[must_use]
    pub fn file_count(&self) -> u32 {
        self.header.file_count
    }

    /// The number of slots in the entry table.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.header.capacity
    }

    #[must_use]
    pub fn codepage(&self) -> &'static Encoding {
        self.codepage
    }

    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.memory.is_some()
    }

    /// Reads the contents of the file keyed by `hash`, decompressing them if needed.
    pub fn read_all_bytes(&self, hash: u32) -> Result<Vec<u8>> {
        let entry = self.entry(hash).ok_or(Error::NotFound(hash))?;
        if entry.is_directory() {
            return Err(Error::NotAFile(hash));
        }

        let offset = usize::try_from(entry.offset)?;
        let stored = self.read_at(offset, entry.stored_len())?;
        if !entry.is_compressed() {
            return Ok(stored.into_owned());
        }

        let expected = usize::try_from(entry.original_size)?;
        let bytes = lzo::decompress(&stored, expected).map_err(|source| {
            warn!("entry {hash:#010X} at offset {offset} failed to decompress: {source}");
            Error::CorruptData { hash, source }
        })?;

        if bytes.len() == expected {
            trace!(
                "decompressed entry {hash:#010X} from {} to {expected} bytes",
                stored.len()
            );
            Ok(bytes)
        } else {
            warn!(
                "entry {hash:#010X} at offset {offset} decompressed to {} bytes instead of {expected}",
                bytes.len()
            );
            Err(Error::DecompressionSizeMismatch {
                hash,
                expected,
                actual: bytes.len(),
            })
        }
    }

    pub fn read_all_bytes_from_path(&self, path: &str) -> Result<Vec<u8>> {
        self.read_all_bytes(self.hash_path(path))
    }

    /// The display name of the entry keyed by `hash`.
    pub fn file_name(&self, hash: u32) -> Result<Option<&str>> {
        let names = self.names()?;
        Ok(names.get(&hash).map(String::as_str))
    }

    /// Enumerates the top level of the directory tree.
    ///
    /// Display names are decoded on the first call. Nodes further down are only visited as they are asked for.
    pub fn root_entries(&self) -> Result<Children<'_>> {
        let names = self.names()?;
        Ok(Tree::new(&self.entries, &self.children, names).root())
    }

    /// Reads the whole container into memory. Later reads no longer touch the disk.
    pub fn preload_into_memory(&mut self) -> Result<()> {
        if self.memory.is_some() {
            return Ok(());
        }

        let file = self.file.as_ref().ok_or(Error::NoBackingFile)?;
        let bytes = Source::new(&mut FileCursor::new(file)).read_to_end()?;
        debug!("loaded {} bytes into memory", bytes.len());
        self.memory = Some(Bytes::from_owned(bytes));
        Ok(())
    }

    /// Drops the resident copy of the container. Later reads go back to the file on disk.
    pub fn release_memory(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::NoBackingFile);
        }

        if let Some(memory) = self.memory.take() {
            debug!("released {} bytes of memory", memory.len());
        }
        Ok(())
    }

    /// Writes every file in the archive under `dir`, recreating the directory tree. Returns the number of files written.
    pub fn extract_to(&self, dir: &Path) -> Result<usize> {
        fs::create_dir_all(dir)?;
        let mut visited = HashSet::new();
        self.extract_children(self.root_entries()?, dir, &mut visited)
    }

    fn extract_children(
        &self,
        children: Children<'_>,
        dir: &Path,
        visited: &mut HashSet<u32>,
    ) -> Result<usize> {
        let mut written = 0;
        for node in children {
            if !visited.insert(node.hash()) {
                warn!("entry {:#010X} is reachable more than once", node.hash());
                continue;
            }

            let name = node.name();
            if name.is_empty()
                || name == "."
                || name == ".."
                || name.contains(|x: char| x == '/' || x == '\\')
            {
                warn!("skipping entry {:#010X} with unusable name {name:?}", node.hash());
                continue;
            }

            let path = dir.join(name);
            match node {
                Node::Directory(directory) => {
                    fs::create_dir_all(&path)?;
                    written += self.extract_children(directory.children(), &path, visited)?;
                }
                Node::File(file) => {
                    let bytes = self.read_all_bytes(file.entry().hash())?;
                    fs::write(&path, bytes)?;
                    written += 1;
                }
            }
        }
        Ok(written)
    }

    fn read_at(&self, offset: usize, len: usize) -> Result<Cow<'_, [u8]>> {
        if let Some(memory) = &self.memory {
            let bytes = offset
                .checked_add(len)
                .and_then(|end| memory.as_bytes().get(offset..end))
                .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
            Ok(Cow::Borrowed(bytes))
        } else {
            let file = self.file.as_ref().ok_or(Error::NoBackingFile)?;
            let mut cursor = FileCursor::new(file);
            let mut source = Source::new(&mut cursor);
            source.seek_absolute(offset as u64)?;
            Ok(Cow::Owned(source.read_bytes(len)?))
        }
    }

    fn names(&self) -> Result<&NameMap> {
        if let Some(names) = self.names.get() {
            return Ok(names);
        }

        let names = self.read_names()?;
        Ok(self.names.get_or_init(|| names))
    }

    fn read_names(&self) -> Result<NameMap> {
        let mut names = NameMap::with_capacity(self.entries.len());
        for entry in self.entries.values() {
            let len = usize::try_from(entry.extra_info_size)?;
            let bytes = self.read_at(entry.name_offset(), len)?;
            let bytes = match bytes.iter().position(|&x| x == 0) {
                Some(pos) => &bytes[..pos],
                None => &bytes[..],
            };
            let (name, _) = self.codepage.decode_without_bom_handling(bytes);
            names.insert(entry.hash, name.into_owned());
        }

        debug!("decoded {} entry names", names.len());
        Ok(names)
    }

    fn do_read(backing: Backing<'bytes>, options: &Options) -> Result<Self> {
        let (header, entries, children, memory, file) = match backing {
            Backing::Memory(bytes) => {
                let mut cursor = Cursor::new(bytes.as_bytes());
                let (header, entries, children) = Self::read_index(&mut cursor)?;
                (header, entries, children, Some(bytes), None)
            }
            Backing::File(file) => {
                let mut cursor = FileCursor::new(&file);
                let (header, entries, children) = Self::read_index(&mut cursor)?;
                (header, entries, children, None, Some(file))
            }
        };

        let mut archive = Self {
            header,
            entries,
            children,
            names: OnceLock::new(),
            codepage: options.codepage,
            file,
            memory,
        };

        if options.preload {
            archive.preload_into_memory()?;
        }

        Ok(archive)
    }

    fn read_index<R>(stream: &mut R) -> Result<(Header, EntryMap, ChildMap)>
    where
        R: ?Sized + Read + Seek,
    {
        let mut source = Source::new(stream);
        source.seek_absolute(0)?;
        let header = Self::read_header(&mut source)?;

        let table_len = u64::from(header.capacity) * ENTRY_SIZE as u64;
        let archive_len = source.len()?;
        if u64::from(header.table_start) + table_len > archive_len {
            return Err(Error::TableOutOfBounds {
                start: header.table_start.into(),
                len: table_len,
                archive_len,
            });
        }

        source.seek_absolute(header.table_start.into())?;
        let table = source.read_bytes(usize::try_from(table_len)?)?;
        let mut cursor = Cursor::new(&table[..]);
        let mut slots = Source::new(&mut cursor);

        let mut entries = EntryMap::with_capacity(header.file_count as usize);
        let mut children = ChildMap::new();
        let mut found = 0;
        for index in 0..header.capacity {
            if found == header.file_count {
                break;
            }

            let entry = Entry::read(&mut slots)?;
            if entry.is_vacant() {
                trace!("skipping vacant slot {index}");
                continue;
            }
            found += 1;

            if entry.hash == 0 {
                warn!("skipping slot {index} which claims the root key");
                continue;
            }

            if entry.hash == entry.parent {
                warn!("skipping entry {:#010X} which is its own parent", entry.hash);
                continue;
            }

            if let Some(previous) = entries.insert(entry.hash, entry) {
                trace!("slot {index} replaces entry {:#010X}", entry.hash);
                if let Some(siblings) = children.get_mut(&previous.parent) {
                    siblings.retain(|&x| x != entry.hash);
                }
            }
            children.entry(entry.parent).or_default().push(entry.hash);
        }

        debug!(
            "indexed {} entries from {} slots, {} declared",
            entries.len(),
            header.capacity,
            header.file_count
        );
        Ok((header, entries, children))
    }

    fn read_header<R>(source: &mut Source<'_, R>) -> Result<Header>
    where
        R: ?Sized + Read + Seek,
    {
        let (
            magic,
            version,
            table_start,
            data_start,
            max_files,
            file_count,
            is_formatted,
            header_size,
            occupied,
            capacity,
            fragment_count,
            package_size,
        ) = source.read()?;
        let _: u32 = data_start;
        let _: u32 = is_formatted;
        let _: u32 = header_size;
        let _: u32 = fragment_count;
        let _: u32 = package_size;

        if magic != constants::MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        if version != constants::VERSION {
            return Err(Error::InvalidVersion(version));
        }

        if usize::try_from(table_start)? < constants::HEADER_SIZE {
            return Err(Error::InvalidTableStart(table_start));
        }

        if file_count > max_files || file_count > occupied || occupied > capacity {
            return Err(Error::InvalidCounts {
                files: file_count,
                max_files,
                occupied,
                capacity,
            });
        }

        Ok(Header {
            table_start,
            file_count,
            capacity,
        })
    }
}

impl<'bytes> ReaderWithOptions<Borrowed<'bytes>> for Archive<'bytes> {
    type Error = Error;
    type Item = Self;
    type Options = Options;

    fn read(source: Borrowed<'bytes>, options: &Self::Options) -> Result<Self::Item> {
        Self::do_read(Backing::Memory(Bytes::from_borrowed(source.0)), options)
    }
}

impl<'bytes> ReaderWithOptions<Copied<'bytes>> for Archive<'static> {
    type Error = Error;
    type Item = Self;
    type Options = Options;

    fn read(source: Copied<'bytes>, options: &Self::Options) -> Result<Self::Item> {
        let bytes = Bytes::from_owned(source.0.to_vec());
        Self::do_read(Backing::Memory(bytes), options)
    }
}

impl ReaderWithOptions<&fs::File> for Archive<'static> {
    type Error = Error;
    type Item = Self;
    type Options = Options;

    fn read(source: &fs::File, options: &Self::Options) -> Result<Self::Item> {
        let file = source.try_clone()?;
        Self::do_read(Backing::File(file), options)
    }
}

impl ReaderWithOptions<&Path> for Archive<'static> {
    type Error = Error;
    type Item = Self;
    type Options = Options;

    fn read(source: &Path, options: &Self::Options) -> Result<Self::Item> {
        let file = fs::File::open(source)?;
        Self::do_read(Backing::File(file), options)
    }
}
