//! Writes small containers for tests.

use crate::{
    cpk::{
        constants,
        entry::{Flags, ENTRY_SIZE},
        tree::SEPARATOR,
    },
    hashing,
};

/// Encodes `bytes` as a single literal run followed by the end-of-stream marker.
pub(crate) fn lzo_literals(bytes: &[u8]) -> Vec<u8> {
    let mut stream = Vec::new();
    match bytes.len() {
        0 => (),
        len @ 1..=238 => stream.push(u8::try_from(len + 17).unwrap()),
        len => {
            // zero bytes are each worth 255, the last byte is added in
            let extension = len - 18;
            let zeros = (extension - 1) / 255;
            stream.push(0);
            stream.extend(core::iter::repeat(0).take(zeros));
            stream.push(u8::try_from(extension - zeros * 255).unwrap());
        }
    }
    stream.extend_from_slice(bytes);
    stream.extend_from_slice(&[0x11, 0x00, 0x00]);
    stream
}

enum Slot {
    Vacant,
    Entry {
        hash: u32,
        flags: Flags,
        parent: u32,
        stored: Vec<u8>,
        original_size: u32,
        name: String,
    },
}

pub(crate) struct Builder {
    slots: Vec<Slot>,
    capacity: Option<usize>,
}

pub(crate) fn key(path: &str) -> u32 {
    hashing::hash(&path.to_lowercase(), encoding_rs::GBK)
}

fn split(path: &str) -> (u32, String) {
    match path.rfind(SEPARATOR) {
        Some(pos) => (key(&path[..pos]), path[pos + 1..].to_owned()),
        None => (0, path.to_owned()),
    }
}

impl Builder {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            capacity: None,
        }
    }

    fn push(
        &mut self,
        path: &str,
        flags: Flags,
        stored: Vec<u8>,
        original_size: usize,
    ) -> &mut Self {
        let (parent, name) = split(path);
        self.keyed(key(path), parent, &name, flags, stored, original_size)
    }

    /// Writes a slot with an explicit key and parent, whatever the name says.
    pub(crate) fn keyed(
        &mut self,
        hash: u32,
        parent: u32,
        name: &str,
        flags: Flags,
        stored: Vec<u8>,
        original_size: usize,
    ) -> &mut Self {
        self.slots.push(Slot::Entry {
            hash,
            flags: flags | Flags::VALID,
            parent,
            stored,
            original_size: u32::try_from(original_size).unwrap(),
            name: name.to_owned(),
        });
        self
    }

    pub(crate) fn directory(&mut self, path: &str) -> &mut Self {
        self.push(path, Flags::DIRECTORY | Flags::NOT_COMPRESSED, Vec::new(), 0)
    }

    pub(crate) fn stored(&mut self, path: &str, contents: &[u8]) -> &mut Self {
        self.push(path, Flags::NOT_COMPRESSED, contents.to_vec(), contents.len())
    }

    pub(crate) fn compressed(
        &mut self,
        path: &str,
        stream: &[u8],
        original_size: usize,
    ) -> &mut Self {
        self.push(path, Flags::empty(), stream.to_vec(), original_size)
    }

    pub(crate) fn deleted(&mut self, path: &str, contents: &[u8]) -> &mut Self {
        let flags = Flags::DELETED | Flags::NOT_COMPRESSED;
        self.push(path, flags, contents.to_vec(), contents.len())
    }

    pub(crate) fn vacant(&mut self, count: usize) -> &mut Self {
        for _ in 0..count {
            self.slots.push(Slot::Vacant);
        }
        self
    }

    /// Pads the table with vacant slots up to `capacity`.
    pub(crate) fn capacity(&mut self, capacity: usize) -> &mut Self {
        self.capacity = Some(capacity);
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let capacity = self.capacity.unwrap_or(self.slots.len()).max(self.slots.len());
        let table_start = constants::HEADER_SIZE;
        let data_start = table_start + capacity * ENTRY_SIZE;

        let mut table = Vec::new();
        let mut data = Vec::new();
        let mut files = 0u32;
        let mut occupied = 0u32;
        for slot in &self.slots {
            let fields = match slot {
                Slot::Vacant => [0u32; 7],
                Slot::Entry {
                    hash,
                    flags,
                    parent,
                    stored,
                    original_size,
                    name,
                } => {
                    occupied += 1;
                    if !flags.deleted() {
                        files += 1;
                    }

                    let offset = data_start + data.len();
                    data.extend_from_slice(stored);
                    let (name, _, _) = encoding_rs::GBK.encode(name);
                    data.extend_from_slice(&name);
                    data.push(0);
                    [
                        *hash,
                        flags.bits(),
                        *parent,
                        u32::try_from(offset).unwrap(),
                        u32::try_from(stored.len()).unwrap(),
                        *original_size,
                        u32::try_from(name.len() + 1).unwrap(),
                    ]
                }
            };
            table.extend(fields.iter().flat_map(|x| x.to_le_bytes()));
        }
        table.resize(capacity * ENTRY_SIZE, 0);

        let capacity = u32::try_from(capacity).unwrap();
        let total = data_start + data.len();
        let header = [
            constants::MAGIC,
            constants::VERSION,
            u32::try_from(table_start).unwrap(),
            u32::try_from(data_start).unwrap(),
            capacity,
            files,
            1,
            u32::try_from(constants::HEADER_SIZE).unwrap(),
            occupied,
            capacity,
            0,
            u32::try_from(total).unwrap(),
        ];

        let mut bytes: Vec<u8> = header.iter().flat_map(|x| x.to_le_bytes()).collect();
        bytes.resize(constants::HEADER_SIZE, 0);
        bytes.extend_from_slice(&table);
        bytes.extend_from_slice(&data);
        bytes
    }
}

/// Overwrites the header field at `index` (counted in `u32`s).
pub(crate) fn patch_header(bytes: &mut [u8], index: usize, value: u32) {
    bytes[index * 4..index * 4 + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::lzo_literals;
    use crate::lzo;

    #[test]
    fn literal_streams_decode() -> anyhow::Result<()> {
        for len in [0usize, 1, 4, 238, 239, 273, 274, 275, 1000] {
            let bytes: Vec<u8> = (0..len).map(|i| (i % 249) as u8).collect();
            let stream = lzo_literals(&bytes);
            assert_eq!(lzo::decompress(&stream, len)?, bytes, "length {len}");
        }
        Ok(())
    }
}
