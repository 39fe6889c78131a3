//! Reader for CPK game data archives. Start with [`cpk`] to open a container, or [`lzo`] if you only need the codec.
//!
//! A CPK stores every asset behind a flat table of fixed-size slots keyed by a CRC of the asset's lower-cased path. Entries are compressed individually with an LZO1X bitstream and carry their display name right after their payload.

#![warn(
    clippy::pedantic,
    clippy::single_char_lifetime_names,
    clippy::std_instead_of_core
)]
#![allow(
    unknown_lints,
    clippy::enum_glob_use,
    clippy::missing_errors_doc,
    clippy::struct_field_names
)]

mod containers;
pub mod cpk;
mod guess;
mod hashing;
mod io;
pub mod lzo;

pub use guess::is_archive;
pub use hashing::{codepage, hash};

/// Makes a shallow copy of the input.
///
/// The lifetime of the result is tied to the input buffer.
pub struct Borrowed<'borrow>(pub &'borrow [u8]);

/// Makes a deep copy of the input.
///
/// The lifetime of the result is independent of the input buffer.
pub struct Copied<'copy>(pub &'copy [u8]);

mod private {
    pub trait Sealed {}
}

use private::Sealed;

/// A trait that enables reading from various sources, with configuration options.
pub trait ReaderWithOptions<T>: Sealed {
    type Error;
    type Item;
    type Options;

    /// Reads an instance of `Self::Item` from the given source, using the given options.
    fn read(source: T, options: &Self::Options) -> core::result::Result<Self::Item, Self::Error>;
}

pub use encoding_rs::Encoding;

/// Convenience using statements for traits that are needed to work with the library.
pub mod prelude {
    pub use crate::ReaderWithOptions as _;
}
