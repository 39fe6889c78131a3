use std::{
    fs,
    io::{self, Read, Seek, SeekFrom},
};

pub(crate) trait BinaryReadable: Sized {
    fn from_le_stream<R>(stream: &mut R) -> io::Result<Self>
    where
        R: ?Sized + Read;
}

macro_rules! make_binary_readable {
    ($t:ty) => {
        impl BinaryReadable for $t {
            fn from_le_stream<R>(stream: &mut R) -> io::Result<Self>
            where
                R: ?Sized + Read,
            {
                let mut bytes = [0u8; ::core::mem::size_of::<Self>()];
                stream.read_exact(&mut bytes)?;
                Ok(Self::from_le_bytes(bytes))
            }
        }
    };
}

make_binary_readable!(u32);

macro_rules! make_binary_readable_tuple {
    ($($t:ident),+) => {
        impl<$($t,)+> BinaryReadable for ($($t,)+)
        where
            $($t: BinaryReadable,)+
        {
            fn from_le_stream<R>(stream: &mut R) -> io::Result<Self>
            where
                R: ?Sized + Read,
            {
                Ok(($(
                    $t::from_le_stream(stream)?,
                )+))
            }
        }
    };
}

make_binary_readable_tuple!(T0, T1, T2, T3, T4, T5, T6);
make_binary_readable_tuple!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);

/// Little-endian reader over anything seekable: a file on disk or a cursor over memory.
pub(crate) struct Source<'stream, R>
where
    R: ?Sized + Read + Seek,
{
    stream: &'stream mut R,
}

impl<'stream, R> Source<'stream, R>
where
    R: ?Sized + Read + Seek,
{
    pub(crate) fn new(stream: &'stream mut R) -> Self {
        Self { stream }
    }

    pub(crate) fn read<T>(&mut self) -> io::Result<T>
    where
        T: BinaryReadable,
    {
        T::from_le_stream(&mut *self.stream)
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        self.stream.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    pub(crate) fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.seek_absolute(0)?;
        self.stream.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    pub(crate) fn seek_absolute(&mut self, pos: u64) -> io::Result<()> {
        self.stream.seek(SeekFrom::Start(pos)).map(|_| ())
    }

    /// Total length of the underlying stream. The current position is preserved.
    pub(crate) fn len(&mut self) -> io::Result<u64> {
        let position = self.stream.stream_position()?;
        let len = self.stream.seek(SeekFrom::End(0))?;
        self.stream.seek(SeekFrom::Start(position))?;
        Ok(len)
    }
}

#[cfg(unix)]
fn read_at(file: &fs::File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
fn read_at(file: &fs::File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

/// Reads a shared file through positional reads, keeping a cursor of its own.
///
/// Every read names its offset, so readers sharing one handle never race on its cursor.
pub(crate) struct FileCursor<'file> {
    file: &'file fs::File,
    pos: u64,
}

impl<'file> FileCursor<'file> {
    #[must_use]
    pub(crate) fn new(file: &'file fs::File) -> Self {
        Self { file, pos: 0 }
    }
}

impl<'file> Read for FileCursor<'file> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = read_at(self.file, buf, self.pos)?;
        self.pos += read as u64;
        Ok(read)
    }
}

impl<'file> Seek for FileCursor<'file> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(pos) => (pos, 0),
            SeekFrom::Current(delta) => (self.pos, delta),
            SeekFrom::End(delta) => (self.file.metadata()?.len(), delta),
        };
        self.pos = base.checked_add_signed(delta).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )
        })?;
        Ok(self.pos)
    }
}
