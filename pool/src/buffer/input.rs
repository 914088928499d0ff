use super::{retry_interrupted, Base};
use crate::{Chunk, Descriptor, Error, Pool};
use tracing::error;

/// Stages bytes read from a descriptor until the application consumes them.
///
/// An [Input] owns at most one pooled chunk. [Self::read_from] fills it from
/// the descriptor, [Self::data] exposes the unread prefix, and
/// [Self::consume] discards bytes the application has taken. After a partial
/// consume, [Self::compact] must run before the next [Self::read_from].
pub struct Input {
    base: Base,
}

impl Input {
    /// Construct an empty buffer that allocates from `pool` on first read.
    pub fn new(pool: Pool) -> Self {
        Self {
            base: Base::new(pool),
        }
    }

    /// Count of staged, unconsumed bytes.
    pub fn len(&self) -> usize {
        self.base.len()
    }

    /// Returns true if no bytes are staged.
    pub fn is_empty(&self) -> bool {
        self.base.len() == 0
    }

    /// Read queued bytes from `descriptor` into the owned chunk, growing or
    /// allocating it as needed.
    ///
    /// The descriptor is first asked how many bytes are queued; the chunk is
    /// sized to hold them on top of anything already staged. When the query
    /// reports nothing queued the read is still attempted, capped at the
    /// pool's smallest class capacity, since the descriptor may hold bytes
    /// the query cannot see. A single read is issued, retried only while it
    /// reports interruption.
    ///
    /// Returns the byte count transferred; zero is the descriptor's
    /// end-of-stream (or nothing-available) signal, surfaced unchanged.
    ///
    /// # Errors
    ///
    /// - the queued-byte query fails
    /// - no chunk can serve the required size ([Error::Oversized] or
    ///   [Error::BudgetExhausted]); already staged bytes are untouched
    /// - the read fails with anything other than an interruption
    ///
    /// # Panics
    ///
    /// Panics if the owned chunk has a consumed prefix: call
    /// [Self::compact] after a partial [Self::consume] before reading again.
    pub fn read_from<D: Descriptor>(&mut self, descriptor: &mut D) -> Result<usize, Error> {
        let pending = descriptor.pending().map_err(|err| {
            error!(?err, "failed to query queued bytes");
            Error::Io(err)
        })?;

        let block = self.base.pool.default_block();
        let chunk = self.base.reserve(pending)?;

        let want = if pending == 0 { block } else { pending };
        let read = {
            let spare = chunk.spare_mut();
            let want = want.min(spare.len());
            retry_interrupted(|| descriptor.read(&mut spare[..want]))?
        };
        if read > 0 {
            if pending > 0 {
                // Nothing else consumes from the descriptor between the
                // query and the read, so the two must agree.
                assert_eq!(
                    read, pending,
                    "descriptor returned fewer bytes than it reported queued"
                );
            }
            chunk.commit(read);
        }
        Ok(read)
    }

    /// The staged, unconsumed bytes. Empty when no chunk is owned.
    pub fn data(&self) -> &[u8] {
        self.base.chunk().map_or(&[], Chunk::unread)
    }

    /// Discard the first `n` staged bytes, releasing the chunk back to the
    /// pool if this drains it.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds [Self::len].
    pub fn consume(&mut self, n: usize) {
        self.base.consume(n);
    }

    /// Move any staged bytes to the front of the chunk, restoring the state
    /// [Self::read_from] requires after a partial [Self::consume]. No-op
    /// when nothing was consumed or no chunk is owned.
    pub fn compact(&mut self) {
        if let Some(chunk) = self.base.chunk_mut() {
            chunk.compact();
        }
    }

    /// Return any owned chunk to the pool, discarding staged bytes.
    pub fn clear(&mut self) {
        self.base.clear();
    }
}
