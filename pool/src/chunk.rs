use std::fmt;

/// Number of leading bytes included in a [Chunk]'s debug representation.
const DEBUG_PREFIX: usize = 16;

/// A fixed-capacity contiguous byte region, the unit of allocation and
/// recycling in a [crate::Pool].
///
/// A chunk tracks a consumed prefix (`head`) and the count of valid bytes
/// starting there (`length`):
///
/// ```text
/// [0..........head..........head+length..........capacity]
///              ^                 ^
///              first valid byte  first writable byte
/// ```
///
/// At any instant `head + length <= capacity`. A chunk is either idle inside
/// a pool free list (with `head == length == 0`) or owned by exactly one
/// buffer; ownership moves by value, so no chunk can be in both places.
pub struct Chunk {
    data: Box<[u8]>,
    head: usize,
    length: usize,
}

impl Chunk {
    /// Construct a chunk with `capacity` bytes of zeroed storage.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            length: 0,
        }
    }

    /// Total storage size, fixed at construction.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Count of valid bytes starting at `head`.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns true if the chunk holds no valid bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Offset of the first valid byte.
    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    /// The valid, unconsumed bytes: `[head, head + length)`.
    #[inline]
    pub fn unread(&self) -> &[u8] {
        &self.data[self.head..self.head + self.length]
    }

    /// Discard the first `n` valid bytes.
    ///
    /// # Panics
    ///
    /// Panics if `n > len()`. Consuming more than is staged indicates
    /// corrupted buffer bookkeeping, not a data condition.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.length, "consumed {} of {} staged bytes", n, self.length);
        self.head += n;
        self.length -= n;
    }

    /// Move the valid bytes to offset 0 and reset `head`. No-op when
    /// `head == 0`.
    ///
    /// Appends always write at offset `length`, so a chunk must be compacted
    /// after partial consumption before it can stage more bytes.
    pub fn compact(&mut self) {
        if self.head == 0 {
            return;
        }
        self.data.copy_within(self.head..self.head + self.length, 0);
        self.head = 0;
    }

    /// Copy `other`'s valid bytes to offset 0 of this chunk's storage.
    ///
    /// Used when replacing a full chunk with a larger one: the replacement
    /// absorbs the staged bytes before the original returns to the pool.
    ///
    /// # Panics
    ///
    /// Panics if `other.len()` exceeds this chunk's capacity.
    pub fn absorb(&mut self, other: &Chunk) {
        assert!(
            other.length <= self.capacity(),
            "absorbing {} bytes into a {} byte chunk",
            other.length,
            self.capacity()
        );
        self.data[..other.length].copy_from_slice(other.unread());
        self.head = 0;
        self.length = other.length;
    }

    /// Copy `bytes` into storage at offset `length`.
    ///
    /// # Panics
    ///
    /// Panics if the chunk has a consumed prefix (`head != 0`) or the bytes
    /// do not fit in the remaining capacity.
    pub fn append(&mut self, bytes: &[u8]) {
        assert_eq!(self.head, 0, "append requires a compacted chunk");
        assert!(
            self.length + bytes.len() <= self.capacity(),
            "appending {} bytes to a chunk with {} free",
            bytes.len(),
            self.capacity() - self.length
        );
        self.data[self.length..self.length + bytes.len()].copy_from_slice(bytes);
        self.length += bytes.len();
    }

    /// The writable tail of the chunk: `[head + length, capacity)`.
    ///
    /// Bytes written here become valid once accounted via [Self::commit].
    #[inline]
    pub fn spare_mut(&mut self) -> &mut [u8] {
        let start = self.head + self.length;
        &mut self.data[start..]
    }

    /// Mark `n` bytes of the writable tail as valid.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the writable tail.
    pub fn commit(&mut self, n: usize) {
        assert!(
            self.head + self.length + n <= self.capacity(),
            "committed {} bytes past capacity",
            n
        );
        self.length += n;
    }

    /// Reset to the idle state (`head == length == 0`) before returning to a
    /// free list.
    pub(crate) fn reset(&mut self) {
        self.head = 0;
        self.length = 0;
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview = &self.unread()[..self.length.min(DEBUG_PREFIX)];
        f.debug_struct("Chunk")
            .field("capacity", &self.capacity())
            .field("head", &self.head)
            .field("length", &self.length)
            .field("data", &preview)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_advances_head() {
        let mut chunk = Chunk::new(16);
        chunk.append(b"abcdef");
        chunk.consume(2);
        assert_eq!(chunk.head(), 2);
        assert_eq!(chunk.len(), 4);
        assert_eq!(chunk.unread(), b"cdef");
    }

    #[test]
    #[should_panic(expected = "staged bytes")]
    fn test_consume_past_length_panics() {
        let mut chunk = Chunk::new(16);
        chunk.append(b"ab");
        chunk.consume(3);
    }

    #[test]
    fn test_compact_moves_unread_prefix() {
        let mut chunk = Chunk::new(16);
        chunk.append(b"abcdef");
        chunk.consume(4);
        chunk.compact();
        assert_eq!(chunk.head(), 0);
        assert_eq!(chunk.unread(), b"ef");

        // Appends land immediately after the compacted bytes.
        chunk.append(b"gh");
        assert_eq!(chunk.unread(), b"efgh");
    }

    #[test]
    fn test_compact_is_idempotent_at_head_zero() {
        let mut chunk = Chunk::new(16);
        chunk.append(b"abc");
        chunk.compact();
        assert_eq!(chunk.head(), 0);
        assert_eq!(chunk.unread(), b"abc");
        chunk.compact();
        assert_eq!(chunk.head(), 0);
        assert_eq!(chunk.unread(), b"abc");
    }

    #[test]
    fn test_absorb_copies_valid_bytes() {
        let mut small = Chunk::new(8);
        small.append(b"abcdef");
        small.consume(2);

        let mut large = Chunk::new(32);
        large.absorb(&small);
        assert_eq!(large.head(), 0);
        assert_eq!(large.unread(), b"cdef");

        // The donor is untouched.
        assert_eq!(small.unread(), b"cdef");
    }

    #[test]
    #[should_panic(expected = "compacted chunk")]
    fn test_append_requires_head_zero() {
        let mut chunk = Chunk::new(16);
        chunk.append(b"abcd");
        chunk.consume(1);
        chunk.append(b"ef");
    }

    #[test]
    fn test_spare_and_commit() {
        let mut chunk = Chunk::new(8);
        chunk.append(b"ab");
        let spare = chunk.spare_mut();
        assert_eq!(spare.len(), 6);
        spare[..3].copy_from_slice(b"cde");
        chunk.commit(3);
        assert_eq!(chunk.unread(), b"abcde");
    }

    #[test]
    fn test_debug_preview_is_bounded() {
        let mut chunk = Chunk::new(64);
        chunk.append(&[7u8; 40]);
        let repr = format!("{:?}", chunk);
        assert!(repr.contains("capacity: 64"));
        assert!(repr.contains("length: 40"));
        // Only the first DEBUG_PREFIX bytes appear.
        assert_eq!(repr.matches('7').count(), DEBUG_PREFIX);
    }
}
