use encoding_rs::Encoding;

const POLYNOMIAL: u32 = 0x04C1_1DB7;

#[must_use]
const fn build_lookup_table() -> [u32; 256] {
    let mut table = [0u32; u8::MAX as usize + 1];
    let mut i: u32 = 0;
    loop {
        let mut acc = i << 24;
        let mut bit = 0;
        while bit < 8 {
            acc = if acc & 0x8000_0000 == 0 {
                acc << 1
            } else {
                (acc << 1) ^ POLYNOMIAL
            };
            bit += 1;
        }
        table[i as usize] = acc;
        match i {
            0xFF => break,
            _ => i += 1,
        };
    }

    table
}

const LUT: [u32; 256] = build_lookup_table();

/// Hashes raw path bytes.
///
/// A zero byte terminates the input. Empty input, or input that starts with a zero byte, hashes to `0`, which is reserved for the archive root.
#[must_use]
pub(crate) fn hash_bytes(bytes: &[u8]) -> u32 {
    let len = bytes.iter().position(|&x| x == 0).unwrap_or(bytes.len());
    let bytes = &bytes[..len];
    if bytes.is_empty() {
        return 0;
    }

    let seed = usize::min(bytes.len(), 4);
    let mut acc: u32 = 0;
    for (i, &b) in bytes[..seed].iter().enumerate() {
        acc |= u32::from(b) << (24 - 8 * i);
    }

    acc = !acc;
    for &b in &bytes[seed..] {
        acc = ((acc << 8) | u32::from(b)) ^ LUT[(acc >> 24) as usize];
    }

    !acc
}

/// Produces the key used to identify an entry within an archive.
///
/// The path is encoded with `codepage` and hashed as-is. Lower-case it first: the archive stores keys for lower-case paths and no case folding happens here.
///
/// ```rust
/// let key = cpk::hash("music\\theme.mp3", encoding_rs::GBK);
/// assert_eq!(key, cpk::hash("music\\theme.mp3", encoding_rs::GBK));
/// assert_eq!(cpk::hash("", encoding_rs::GBK), 0);
/// ```
#[must_use]
pub fn hash(path: &str, codepage: &'static Encoding) -> u32 {
    let (bytes, _, _) = codepage.encode(path);
    hash_bytes(&bytes)
}

/// Maps a Windows codepage number onto its encoding.
#[must_use]
pub fn codepage(number: u16) -> Option<&'static Encoding> {
    let encoding = match number {
        932 => encoding_rs::SHIFT_JIS,
        936 => encoding_rs::GBK,
        949 => encoding_rs::EUC_KR,
        950 => encoding_rs::BIG5,
        1252 => encoding_rs::WINDOWS_1252,
        65001 => encoding_rs::UTF_8,
        _ => return None,
    };
    Some(encoding)
}
