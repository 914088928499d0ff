//! Stage bytes between descriptors and application code with recycled,
//! size-classed chunks.
//!
//! This crate provides the memory substrate for a network service's I/O
//! path: a [Pool] that partitions memory into geometrically sized classes
//! and recycles fixed-capacity [Chunk]s under a global byte budget, and a
//! pair of buffers ([Input], [Output]) that stage partial reads and writes
//! against an opaque [Descriptor] without per-call heap allocation.
//!
//! # Design
//!
//! The pool is the only shared structure: a single mutex guards its free
//! lists and byte counters, with O(1) critical sections. Buffers belong to a
//! single logical owner each (typically one connection's I/O loop), hold at
//! most one chunk at a time, and return it to the pool the moment it drains.
//! Transient descriptor outcomes (interruption, would-block, short
//! transfers) are absorbed or surfaced as ordinary progress, never as
//! errors; misuse of the staging protocol itself panics.
//!
//! # Example
//!
//! ```
//! use chunkpool::{mocks, Class, Config, Input, Output, Pool};
//! use prometheus_client::registry::Registry;
//!
//! // One pool serves every buffer; tests use small class tables.
//! let mut registry = Registry::default();
//! let pool = Pool::new(
//!     Config {
//!         classes: vec![
//!             Class { capacity: 4 << 10, prealloc: 4 },
//!             Class { capacity: 16 << 10, prealloc: 2 },
//!         ],
//!         budget: 1 << 20,
//!     },
//!     &mut registry,
//! );
//!
//! // Stage application bytes and drain them to a descriptor.
//! let mut endpoint = mocks::Endpoint::new();
//! let mut output = Output::new(pool.clone());
//! output.append(b"hello").unwrap();
//! assert_eq!(output.write_to(&mut endpoint).unwrap(), 5);
//! assert_eq!(endpoint.written(), b"hello");
//!
//! // Read queued bytes back through an input buffer.
//! let mut endpoint = mocks::Endpoint::new();
//! endpoint.push(b"hello");
//! let mut input = Input::new(pool);
//! assert_eq!(input.read_from(&mut endpoint).unwrap(), 5);
//! assert_eq!(input.data(), b"hello");
//! input.consume(5);
//! ```

use thiserror::Error;

mod buffer;
mod chunk;
mod descriptor;
pub mod mocks;
mod pool;

pub use buffer::{Input, Output};
pub use chunk::Chunk;
pub use descriptor::Descriptor;
pub use pool::{Class, Config, Pool};

/// Errors that can occur when staging bytes through a pool.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested size exceeds the largest configured size class.
    #[error("requested {0} bytes, above the largest size class")]
    Oversized(usize),
    /// Constructing another chunk would cross the pool's byte budget.
    #[error("pool byte budget exhausted")]
    BudgetExhausted,
    /// The descriptor failed outright (not interruption or would-block).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
