//! Staged buffers between a descriptor and application code.
//!
//! An [Input] reads bytes from a descriptor and exposes the unread prefix; an
//! [Output] accumulates application bytes and drains them to a descriptor.
//! Each buffer owns at most one pooled [Chunk](crate::Chunk) at a time,
//! acquired lazily on the first transfer and returned to the
//! [Pool](crate::Pool) eagerly once drained, so an idle buffer never pins
//! memory.
//!
//! Buffers are not internally synchronized: each instance belongs to a single
//! logical owner (typically one connection's I/O loop). Partial transfers are
//! ordinary outcomes, not errors; callers re-invoke the transfer operations
//! when the descriptor signals readiness.

mod input;
mod output;

pub use input::Input;
pub use output::Output;

use crate::{Chunk, Error, Pool};
use std::io;

/// Buffer state shared by [Input] and [Output]: ownership of at most one
/// chunk and the consume/clear/grow protocol around it.
pub(crate) struct Base {
    pool: Pool,
    chunk: Option<Chunk>,
}

impl Base {
    pub(crate) fn new(pool: Pool) -> Self {
        Self { pool, chunk: None }
    }

    /// Count of staged, unconsumed bytes. Zero when no chunk is owned.
    pub(crate) fn len(&self) -> usize {
        self.chunk.as_ref().map_or(0, Chunk::len)
    }

    pub(crate) fn chunk(&self) -> Option<&Chunk> {
        self.chunk.as_ref()
    }

    pub(crate) fn chunk_mut(&mut self) -> Option<&mut Chunk> {
        self.chunk.as_mut()
    }

    /// Discard the first `n` staged bytes. If this drains the chunk, it is
    /// returned to the pool immediately: a buffer that finishes draining
    /// trades a future allocation for lower steady-state memory pressure
    /// across many buffers.
    ///
    /// # Panics
    ///
    /// Panics if no chunk is owned or `n` exceeds the staged length.
    pub(crate) fn consume(&mut self, n: usize) {
        let chunk = self
            .chunk
            .as_mut()
            .expect("consume on a buffer without a chunk");
        chunk.consume(n);
        if chunk.is_empty() {
            let chunk = self.chunk.take().expect("chunk checked above");
            self.pool.retrieve(chunk);
        }
    }

    /// Unconditionally return any owned chunk to the pool.
    pub(crate) fn clear(&mut self) {
        if let Some(chunk) = self.chunk.take() {
            self.pool.retrieve(chunk);
        }
    }

    /// Ensure the owned chunk can stage `incoming` more bytes, allocating or
    /// growing as needed, and return it.
    ///
    /// With no chunk owned, one sized for `incoming` is allocated. With a
    /// chunk owned, it must have been compacted since any partial
    /// consumption; if its spare capacity is short, a larger chunk absorbs
    /// the staged bytes and the original returns to the pool. On failure the
    /// staged bytes are untouched.
    ///
    /// # Panics
    ///
    /// Panics if the owned chunk has a consumed prefix (`head != 0`): the
    /// caller skipped compaction, which indicates the staging protocol was
    /// misused.
    pub(crate) fn reserve(&mut self, incoming: usize) -> Result<&mut Chunk, Error> {
        match self.chunk.take() {
            None => {
                self.chunk = Some(self.pool.allocate(incoming)?);
            }
            Some(chunk) => {
                assert_eq!(
                    chunk.head(),
                    0,
                    "buffer must be compacted before staging more bytes"
                );
                if chunk.capacity() - chunk.len() < incoming {
                    match self.pool.allocate(chunk.len() + incoming) {
                        Ok(mut grown) => {
                            grown.absorb(&chunk);
                            self.pool.retrieve(chunk);
                            self.chunk = Some(grown);
                        }
                        Err(err) => {
                            self.chunk = Some(chunk);
                            return Err(err);
                        }
                    }
                } else {
                    self.chunk = Some(chunk);
                }
            }
        }
        Ok(self.chunk.as_mut().expect("chunk installed above"))
    }
}

impl Drop for Base {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Run an I/O operation, transparently retrying while it reports
/// [io::ErrorKind::Interrupted].
pub(crate) fn retry_interrupted<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    loop {
        match op() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Class, Config};
    use prometheus_client::registry::Registry;

    fn test_pool() -> Pool {
        let mut registry = Registry::default();
        Pool::new(
            Config {
                classes: vec![
                    Class { capacity: 64, prealloc: 2 },
                    Class { capacity: 256, prealloc: 1 },
                ],
                budget: 4096,
            },
            &mut registry,
        )
    }

    #[test]
    fn test_consume_releases_drained_chunk() {
        let pool = test_pool();
        let mut base = Base::new(pool.clone());
        base.reserve(5).expect("reserve").append(b"hello");
        assert_eq!(base.len(), 5);

        base.consume(3);
        assert_eq!(base.len(), 2);
        assert!(base.chunk().is_some());

        // Draining to zero releases the chunk immediately.
        let idle = pool.idle_bytes();
        base.consume(2);
        assert_eq!(base.len(), 0);
        assert!(base.chunk().is_none());
        assert_eq!(pool.idle_bytes(), idle + 64);
    }

    #[test]
    #[should_panic(expected = "without a chunk")]
    fn test_consume_without_chunk_panics() {
        let mut base = Base::new(test_pool());
        base.consume(1);
    }

    #[test]
    fn test_clear_returns_chunk() {
        let pool = test_pool();
        let mut base = Base::new(pool.clone());
        base.reserve(10).expect("reserve").append(b"abc");
        base.clear();
        assert_eq!(base.len(), 0);
        assert_eq!(pool.created_bytes(), pool.idle_bytes());
    }

    #[test]
    fn test_drop_returns_chunk() {
        let pool = test_pool();
        {
            let mut base = Base::new(pool.clone());
            base.reserve(10).expect("reserve").append(b"abc");
        }
        assert_eq!(pool.created_bytes(), pool.idle_bytes());
    }

    #[test]
    fn test_reserve_grows_and_preserves_content() {
        let pool = test_pool();
        let mut base = Base::new(pool.clone());
        base.reserve(60).expect("reserve").append(&[9u8; 60]);
        assert_eq!(base.chunk().expect("chunk").capacity(), 64);

        // 60 staged + 40 incoming no longer fit in 64 bytes.
        let chunk = base.reserve(40).expect("grow");
        assert_eq!(chunk.capacity(), 256);
        assert_eq!(chunk.unread(), &[9u8; 60][..]);

        // The original chunk went back to the pool.
        assert_eq!(pool.class_idle_bytes(64), Some(2 * 64));
    }

    #[test]
    fn test_reserve_failure_preserves_staged_bytes() {
        let pool = test_pool();
        let mut base = Base::new(pool.clone());
        base.reserve(4).expect("reserve").append(b"keep");

        // Growth to beyond the largest class fails...
        assert!(matches!(base.reserve(300), Err(Error::Oversized(_))));

        // ...but the staged bytes survive for the caller to drain.
        assert_eq!(base.chunk().expect("chunk").unread(), b"keep");
    }

    #[test]
    #[should_panic(expected = "compacted")]
    fn test_reserve_requires_compacted_chunk() {
        let mut base = Base::new(test_pool());
        base.reserve(5).expect("reserve").append(b"hello");
        base.chunk_mut().expect("chunk").consume(1);
        let _ = base.reserve(1);
    }

    #[test]
    fn test_retry_interrupted() {
        use std::io;

        let mut attempts = 0;
        let result = retry_interrupted(|| {
            attempts += 1;
            if attempts < 3 {
                Err(io::Error::from(io::ErrorKind::Interrupted))
            } else {
                Ok(attempts)
            }
        });
        assert_eq!(result.expect("eventually succeeds"), 3);
    }
}
