//! Per-Connection Receive Buffer
//!
//! TCP is a stream protocol: one read may deliver half a command, or three
//! commands and the start of a fourth. `ByteBuffer` accumulates whatever the
//! socket hands us and lets the parser look at it without committing to
//! anything until a whole message is present.
//!
//! Lookups that run past the end of the buffered data return `None`. That is
//! "insufficient data", not an error: the caller keeps the bytes and tries
//! again after the next read. Only [`ByteBuffer::consume`] drops bytes, and
//! only bytes that belong to fully parsed messages.

use bytes::{Buf, BytesMut};

/// Initial buffer capacity
const INITIAL_CAPACITY: usize = 4096;

/// An append-only receive buffer with a consume cursor.
///
/// Offsets passed to [`peek`](Self::peek) and [`find`](Self::find) are
/// relative to the first unconsumed byte.
#[derive(Debug)]
pub struct ByteBuffer {
    data: BytesMut,
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self {
            data: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Adds newly received bytes to the end of the buffer.
    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Returns the `n` bytes starting at `offset`, or `None` if fewer than
    /// `offset + n` bytes are buffered.
    #[inline]
    pub fn peek(&self, n: usize, offset: usize) -> Option<&[u8]> {
        let end = offset.checked_add(n)?;
        self.data[..].get(offset..end)
    }

    /// Returns the position of the next occurrence of `pattern` at or after
    /// `from`, or `None` if it is not (yet) in the buffer.
    pub fn find(&self, pattern: &[u8], from: usize) -> Option<usize> {
        if pattern.is_empty() || from >= self.data.len() {
            return None;
        }
        self.data[from..]
            .windows(pattern.len())
            .position(|window| window == pattern)
            .map(|pos| from + pos)
    }

    /// Like [`find`](Self::find), but only looks at the `limit` bytes
    /// starting at `from`.
    pub fn find_within(&self, pattern: &[u8], from: usize, limit: usize) -> Option<usize> {
        if pattern.is_empty() || from >= self.data.len() {
            return None;
        }
        let end = from.saturating_add(limit).min(self.data.len());
        self.data[from..end]
            .windows(pattern.len())
            .position(|window| window == pattern)
            .map(|pos| from + pos)
    }

    /// Drops the first `through` bytes, which must belong to messages that
    /// have been fully parsed.
    pub fn consume(&mut self, through: usize) {
        debug_assert!(through <= self.data.len(), "consume past end of buffer");
        self.data.advance(through.min(self.data.len()));
    }

    /// Number of unconsumed bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Releases everything, consumed or not. Used when the connection closes.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// The unconsumed bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(bytes: &[u8]) -> Self {
        let mut buffer = Self::new();
        buffer.append(bytes);
        buffer
    }
}
