enum BytesInner<'bytes> {
    Owned(Vec<u8>),
    Borrowed(&'bytes [u8]),
}

use BytesInner::*;

/// A resident copy of an archive, either owned or borrowed from the caller.
pub(crate) struct Bytes<'bytes> {
    inner: BytesInner<'bytes>,
}

impl<'bytes> Bytes<'bytes> {
    #[must_use]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        match &self.inner {
            Owned(x) => x,
            Borrowed(x) => x,
        }
    }

    #[must_use]
    pub(crate) fn from_borrowed(bytes: &'bytes [u8]) -> Self {
        Self {
            inner: Borrowed(bytes),
        }
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.as_bytes().len()
    }
}

impl Bytes<'static> {
    #[must_use]
    pub(crate) fn from_owned(bytes: Vec<u8>) -> Self {
        Self {
            inner: Owned(bytes),
        }
    }
}
