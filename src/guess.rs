use crate::cpk::constants;
use core::mem;
use std::io::Read;

/// Checks whether `source` begins with the CPK magic label. Consumes up to four bytes.
///
/// ```rust
/// let header = [0x52, 0x53, 0x54, 0x1A, 0x01, 0x00, 0x00, 0x00];
/// assert!(cpk::is_archive(&mut &header[..]));
/// assert!(!cpk::is_archive(&mut &b"BSA\0"[..]));
/// ```
pub fn is_archive<In>(source: &mut In) -> bool
where
    In: ?Sized + Read,
{
    let mut buf = [0u8; mem::size_of::<u32>()];
    if source.read_exact(&mut buf).is_err() {
        return false;
    }
    u32::from_le_bytes(buf) == constants::MAGIC
}
