use super::{retry_interrupted, Base};
use crate::{Descriptor, Error, Pool};
use std::io;

/// Stages application bytes until a descriptor accepts them.
///
/// An [Output] owns at most one pooled chunk. [Self::append] copies
/// application bytes in, [Self::write_to] drains them to the descriptor.
/// Partial drains compact the chunk internally, so between calls the staged
/// bytes always start at offset 0 and the buffer is immediately ready for
/// more appends.
pub struct Output {
    base: Base,
}

impl Output {
    /// Construct an empty buffer that allocates from `pool` on first append.
    pub fn new(pool: Pool) -> Self {
        Self {
            base: Base::new(pool),
        }
    }

    /// Count of staged, undrained bytes.
    pub fn len(&self) -> usize {
        self.base.len()
    }

    /// Returns true if no bytes are staged.
    pub fn is_empty(&self) -> bool {
        self.base.len() == 0
    }

    /// Copy `data` into the owned chunk, growing or allocating it as needed.
    ///
    /// Once the chunk is sized the copy cannot fail.
    ///
    /// # Errors
    ///
    /// No chunk can serve the required size ([Error::Oversized] or
    /// [Error::BudgetExhausted]); already staged bytes are untouched.
    pub fn append(&mut self, data: &[u8]) -> Result<(), Error> {
        let chunk = self.base.reserve(data.len())?;
        chunk.append(data);
        Ok(())
    }

    /// Write the staged bytes to `descriptor`.
    ///
    /// A single write is issued, retried only while it reports interruption.
    /// Whatever the descriptor accepts is consumed from the buffer; a full
    /// drain releases the chunk back to the pool, a partial drain compacts
    /// the remainder to the front of the chunk. A would-block outcome is not
    /// an error: it reports zero bytes written and leaves the staged bytes
    /// untouched for a later retry.
    ///
    /// Returns the byte count the descriptor accepted.
    ///
    /// # Errors
    ///
    /// The write fails with anything other than an interruption or
    /// would-block.
    ///
    /// # Panics
    ///
    /// Panics if no bytes are staged: draining an empty buffer is a usage
    /// error.
    pub fn write_to<D: Descriptor>(&mut self, descriptor: &mut D) -> Result<usize, Error> {
        let chunk = self
            .base
            .chunk()
            .expect("write_to on a buffer without staged bytes");
        assert_eq!(chunk.head(), 0, "staged bytes must start at offset 0");

        let written = match retry_interrupted(|| descriptor.write(chunk.unread())) {
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(0),
            Err(err) => return Err(Error::Io(err)),
        };
        if written > 0 {
            self.base.consume(written);
            // Restore the offset-0 state for further appends and drains.
            if let Some(chunk) = self.base.chunk_mut() {
                chunk.compact();
            }
        }
        Ok(written)
    }

    /// Return any owned chunk to the pool, discarding staged bytes.
    pub fn clear(&mut self) {
        self.base.clear();
    }
}
