/// Large enough for the farthest back-reference the bitstream can encode (`0xBFFF`).
pub(crate) const WINDOW_SIZE: usize = 0xC000;

/// Ring buffer over the most recently produced output.
pub(crate) struct Window {
    buffer: Box<[u8]>,
    pos: usize,
    filled: usize,
}

impl Window {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            buffer: vec![0u8; WINDOW_SIZE].into_boxed_slice(),
            pos: 0,
            filled: 0,
        }
    }

    /// How far back a reference may currently reach.
    #[must_use]
    pub(crate) fn available(&self) -> usize {
        self.filled
    }

    pub(crate) fn push(&mut self, byte: u8) {
        self.buffer[self.pos] = byte;
        self.pos = (self.pos + 1) % WINDOW_SIZE;
        if self.filled < WINDOW_SIZE {
            self.filled += 1;
        }
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.push(b);
        }
    }

    /// Copies `len` bytes starting `distance` bytes back, appending each one to the window as it goes.
    ///
    /// Appending as we copy is what makes a reference shorter than its length repeat the pattern it just wrote.
    pub(crate) fn copy_back(&mut self, distance: usize, len: usize, out: &mut Vec<u8>) {
        debug_assert!(distance > 0 && distance <= self.filled);
        for _ in 0..len {
            let byte = self.buffer[(self.pos + WINDOW_SIZE - distance) % WINDOW_SIZE];
            self.push(byte);
            out.push(byte);
        }
    }
}
