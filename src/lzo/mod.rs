//! LZO1X decoder
//!
//! CPK entries are compressed with the LZO1X bitstream: a sequence of one-byte instructions, each either a run of literal bytes or a back-reference into the recently produced output. Which back-reference an instruction byte selects depends on how many literals the previous instruction copied, so decoding is a small state machine.
//!
//! ```rust
//! let stream = [0x16, b'h', b'e', b'l', b'l', b'o', 0x11, 0x00, 0x00];
//! let bytes = cpk::lzo::decompress(&stream, 5).unwrap();
//! assert_eq!(bytes, b"hello");
//! ```

mod window;

use self::window::Window;
use std::io::{self, Write};
use tracing::trace;

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("the stream ended unexpectedly at byte offset {offset}")]
    InputOverrun { offset: usize },

    #[error("the instruction at byte offset {offset} would produce more than the expected {expected} bytes")]
    OutputOverrun { offset: usize, expected: usize },

    #[error("the back-reference at byte offset {offset} reaches {distance} bytes back, but only {available} bytes have been produced")]
    LookbehindOverrun {
        offset: usize,
        distance: usize,
        available: usize,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// The byte offset within the compressed stream where decoding failed, if known.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::InputOverrun { offset }
            | Self::OutputOverrun { offset, .. }
            | Self::LookbehindOverrun { offset, .. } => Some(*offset),
            Self::Io(_) => None,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// Distance encoded by the end-of-stream marker.
const END_OF_STREAM: usize = 0x4000;
/// Bias applied to the far short copy that follows a long literal run.
const SHORT_FAR_BIAS: usize = 0x800;

/// How many literals the previous instruction copied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    ZeroCopy,
    SmallCopy,
    LargeCopy,
}

impl State {
    #[must_use]
    fn after_literals(count: usize) -> Self {
        match count {
            0 => Self::ZeroCopy,
            1..=3 => Self::SmallCopy,
            _ => Self::LargeCopy,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Instruction {
    /// `0..=15` with nothing copied before: a run of `3 + n` literals.
    Literals,
    /// `0..=15` after a run of 4+ literals: 3 bytes from 2049..=3072 back.
    ShortFar,
    /// `0..=15` after 1..=3 trailing literals: 2 bytes from at most 1 KiB back.
    ShortNear,
    /// `16..=31`: 16 KiB to 48 KiB back, or the end-of-stream marker.
    Distant,
    /// `32..=63`: at most 16 KiB back.
    Medium,
    /// `64..=127`: 3 or 4 bytes from at most 2 KiB back.
    Compact,
    /// `128..=255`: 5 to 8 bytes from at most 2 KiB back.
    CompactLong,
}

impl Instruction {
    #[must_use]
    fn classify(byte: u8, state: State) -> Self {
        match (byte, state) {
            (0..=15, State::ZeroCopy) => Self::Literals,
            (0..=15, State::LargeCopy) => Self::ShortFar,
            (0..=15, State::SmallCopy) => Self::ShortNear,
            (16..=31, _) => Self::Distant,
            (32..=63, _) => Self::Medium,
            (64..=127, _) => Self::Compact,
            (128..=255, _) => Self::CompactLong,
        }
    }
}

struct Decoder<'input, 'sink, Out>
where
    Out: ?Sized + Write,
{
    input: &'input [u8],
    pos: usize,
    produced: usize,
    expected: usize,
    window: Window,
    scratch: Vec<u8>,
    sink: &'sink mut Out,
}

impl<'input, 'sink, Out> Decoder<'input, 'sink, Out>
where
    Out: ?Sized + Write,
{
    fn new(input: &'input [u8], expected: usize, sink: &'sink mut Out) -> Self {
        Self {
            input,
            pos: 0,
            produced: 0,
            expected,
            window: Window::new(),
            scratch: Vec::new(),
            sink,
        }
    }

    fn next(&mut self) -> Result<u8> {
        let byte = self
            .input
            .get(self.pos)
            .copied()
            .ok_or(Error::InputOverrun { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Zero bytes are each worth 255; the first non-zero byte ends the run and is added in.
    fn extended(&mut self, base: usize) -> Result<usize> {
        let mut len = base;
        loop {
            match self.next()? {
                0 => len += 255,
                byte => return Ok(len + usize::from(byte)),
            }
        }
    }

    fn reserve(&self, offset: usize, len: usize) -> Result<()> {
        if self.produced + len > self.expected {
            Err(Error::OutputOverrun {
                offset,
                expected: self.expected,
            })
        } else {
            Ok(())
        }
    }

    fn copy_literals(&mut self, offset: usize, len: usize) -> Result<()> {
        self.reserve(offset, len)?;
        let end = self.pos + len;
        let Some(literals) = self.input.get(self.pos..end) else {
            return Err(Error::InputOverrun {
                offset: self.input.len(),
            });
        };

        self.window.extend(literals);
        self.sink.write_all(literals)?;
        self.pos = end;
        self.produced += len;
        Ok(())
    }

    fn copy_back(&mut self, offset: usize, distance: usize, len: usize) -> Result<()> {
        let available = self.window.available();
        if distance > available {
            return Err(Error::LookbehindOverrun {
                offset,
                distance,
                available,
            });
        }

        self.reserve(offset, len)?;
        self.scratch.clear();
        self.window.copy_back(distance, len, &mut self.scratch);
        self.sink.write_all(&self.scratch)?;
        self.produced += len;
        Ok(())
    }

    fn run(mut self) -> Result<usize> {
        let mut state = State::ZeroCopy;

        // a leading byte above 17 is a literal run that needs no extension
        if let Some(&first) = self.input.first() {
            if first > 17 {
                let count = usize::from(first - 17);
                self.pos = 1;
                self.copy_literals(0, count)?;
                state = State::after_literals(count);
            }
        }

        while self.produced < self.expected {
            let offset = self.pos;
            let byte = self.next()?;
            let trailing = match Instruction::classify(byte, state) {
                Instruction::Literals => {
                    let len = match byte {
                        0 => self.extended(15)?,
                        _ => usize::from(byte),
                    };
                    self.copy_literals(offset, len + 3)?;
                    state = State::LargeCopy;
                    continue;
                }
                Instruction::ShortFar => {
                    let next = usize::from(self.next()?);
                    let distance = 1 + SHORT_FAR_BIAS + usize::from(byte >> 2) + (next << 2);
                    self.copy_back(offset, distance, 3)?;
                    byte & 3
                }
                Instruction::ShortNear => {
                    let next = usize::from(self.next()?);
                    let distance = 1 + usize::from(byte >> 2) + (next << 2);
                    self.copy_back(offset, distance, 2)?;
                    byte & 3
                }
                Instruction::Distant => {
                    let len = match byte & 7 {
                        0 => self.extended(7)?,
                        len => usize::from(len),
                    };
                    let (lo, hi) = (self.next()?, self.next()?);
                    let distance = END_OF_STREAM
                        + (usize::from(byte & 8) << 11)
                        + usize::from(lo >> 2)
                        + (usize::from(hi) << 6);
                    if distance == END_OF_STREAM {
                        trace!("end of stream marker at byte offset {offset}");
                        break;
                    }
                    self.copy_back(offset, distance, len + 2)?;
                    lo & 3
                }
                Instruction::Medium => {
                    let len = match byte & 31 {
                        0 => self.extended(31)?,
                        len => usize::from(len),
                    };
                    let (lo, hi) = (self.next()?, self.next()?);
                    let distance = 1 + usize::from(lo >> 2) + (usize::from(hi) << 6);
                    self.copy_back(offset, distance, len + 2)?;
                    lo & 3
                }
                Instruction::Compact | Instruction::CompactLong => {
                    let next = usize::from(self.next()?);
                    let distance = 1 + usize::from((byte >> 2) & 7) + (next << 3);
                    self.copy_back(offset, distance, usize::from(byte >> 5) + 1)?;
                    byte & 3
                }
            };

            let count = usize::from(trailing);
            self.copy_literals(offset, count)?;
            state = State::after_literals(count);
        }

        Ok(self.produced)
    }
}

/// Decodes `input`, writing the output to `sink` as it is produced.
///
/// Decoding stops at the end-of-stream marker or once `expected_len` bytes have been written, whichever comes first. Returns the number of bytes written, which is less than `expected_len` only if the marker came first.
pub fn decompress_into<Out>(input: &[u8], expected_len: usize, sink: &mut Out) -> Result<usize>
where
    Out: ?Sized + Write,
{
    Decoder::new(input, expected_len, sink).run()
}

/// Decodes `input` into a freshly allocated buffer of at most `expected_len` bytes.
pub fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    decompress_into(input, expected_len, &mut out)?;
    Ok(out)
}
