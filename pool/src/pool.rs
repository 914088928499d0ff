//! Size-classed chunk allocator with free-list recycling.
//!
//! A [Pool] partitions its memory into a fixed, ordered table of size classes.
//! Each class keeps a free list of idle [Chunk]s; allocation pops the smallest
//! class that fits the request and recycling pushes the chunk back. Chunks are
//! constructed on demand under a global byte budget and are never destroyed:
//! once created, a chunk cycles between a free list and a single owner for the
//! life of the process.
//!
//! # Thread Safety
//!
//! [Pool] is a cheaply cloneable handle (`Arc` internally) and can be shared
//! across threads. A single mutex guards the free lists and byte counters;
//! critical sections are O(1) pushes, pops, and counter arithmetic. Chunk
//! storage is never constructed or copied while the lock is held.

use crate::{Chunk, Error};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};
use std::{
    fmt,
    fmt::Write as _,
    sync::{Arc, Mutex},
};
use tracing::{debug, error};

/// Number of chunks rendered by [Pool::format_class] before eliding the rest.
const FORMAT_LIMIT: usize = 5;

/// One size class: a chunk capacity and the number of chunks constructed for
/// it when the pool starts.
#[derive(Clone, Copy, Debug)]
pub struct Class {
    /// Capacity of every chunk in this class, in bytes.
    pub capacity: usize,
    /// Number of chunks constructed at pool startup.
    pub prealloc: usize,
}

/// Configuration for a [Pool].
#[derive(Clone, Debug)]
pub struct Config {
    /// Ordered table of size classes, smallest capacity first.
    pub classes: Vec<Class>,
    /// Ceiling on the total bytes of chunk storage the pool may ever
    /// construct, preallocation included.
    pub budget: u64,
}

impl Default for Config {
    /// Six classes spanning 4 KiB to 4 MiB (ratio 4 between neighbors), with
    /// smaller classes seeded more densely, under a 4 GiB budget.
    fn default() -> Self {
        Self {
            classes: vec![
                Class { capacity: 4 << 10, prealloc: 2000 },
                Class { capacity: 16 << 10, prealloc: 500 },
                Class { capacity: 64 << 10, prealloc: 250 },
                Class { capacity: 256 << 10, prealloc: 100 },
                Class { capacity: 1 << 20, prealloc: 25 },
                Class { capacity: 4 << 20, prealloc: 10 },
            ],
            budget: 4 << 30,
        }
    }
}

impl Config {
    /// Validates the configuration, panicking on invalid values.
    ///
    /// # Panics
    ///
    /// - the class table is empty
    /// - a class has zero capacity
    /// - capacities are not strictly increasing
    /// - the preallocated bytes already exceed the budget
    fn validate(&self) {
        assert!(!self.classes.is_empty(), "class table must not be empty");
        let mut last = 0;
        for class in &self.classes {
            assert!(class.capacity > 0, "class capacity must be nonzero");
            assert!(
                class.capacity > last,
                "class capacities must be strictly increasing"
            );
            last = class.capacity;
        }
        assert!(
            self.prealloc_bytes() <= self.budget,
            "preallocation ({} bytes) exceeds budget ({} bytes)",
            self.prealloc_bytes(),
            self.budget
        );
    }

    /// Total bytes constructed at startup.
    fn prealloc_bytes(&self) -> u64 {
        self.classes
            .iter()
            .map(|class| class.capacity as u64 * class.prealloc as u64)
            .sum()
    }

    /// Returns the index of the smallest class with `capacity >= size`, or
    /// None if `size` exceeds the largest class.
    fn class_index(&self, size: usize) -> Option<usize> {
        self.classes.iter().position(|class| class.capacity >= size)
    }

    /// Returns the index of the class whose capacity equals `capacity`
    /// exactly, or None.
    fn exact_class(&self, capacity: usize) -> Option<usize> {
        self.classes
            .iter()
            .position(|class| class.capacity == capacity)
    }
}

/// Label identifying a size class in pool metrics.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ClassLabel {
    capacity: u64,
}

impl ClassLabel {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity as u64,
        }
    }
}

/// Metrics for the pool.
struct Metrics {
    /// Successful allocations per size class.
    allocations: Family<ClassLabel, Counter>,
    /// Chunks constructed per size class, preallocation included.
    created: Family<ClassLabel, Counter>,
    /// Chunks currently idle in each free list.
    idle: Family<ClassLabel, Gauge>,
    /// Requests exceeding the largest size class.
    oversized: Counter,
    /// Allocations denied because they would cross the byte budget.
    denied: Counter,
}

impl Metrics {
    fn new(registry: &mut Registry) -> Self {
        let metrics = Self {
            allocations: Family::default(),
            created: Family::default(),
            idle: Family::default(),
            oversized: Counter::default(),
            denied: Counter::default(),
        };
        registry.register(
            "chunk_pool_allocations",
            "Number of successful chunk allocations",
            metrics.allocations.clone(),
        );
        registry.register(
            "chunk_pool_created",
            "Number of chunks constructed",
            metrics.created.clone(),
        );
        registry.register(
            "chunk_pool_idle",
            "Number of chunks idle in free lists",
            metrics.idle.clone(),
        );
        registry.register(
            "chunk_pool_oversized",
            "Number of allocation requests exceeding the largest size class",
            metrics.oversized.clone(),
        );
        registry.register(
            "chunk_pool_denied",
            "Number of allocations denied by the byte budget",
            metrics.denied.clone(),
        );
        metrics
    }
}

/// Mutable pool state, guarded by a single mutex.
struct State {
    /// One free list per size class, parallel to `Config::classes`. Lists are
    /// stacks: recycling pushes, allocation pops the most recently returned
    /// chunk.
    free: Vec<Vec<Chunk>>,
    /// Total bytes of chunk storage ever constructed.
    created: u64,
    /// Bytes currently idle in free lists.
    idle: u64,
}

struct Inner {
    config: Config,
    state: Mutex<State>,
    metrics: Metrics,
}

/// A size-classed chunk allocator.
///
/// Construct once at startup and pass clones to every buffer that stages
/// bytes through it. Tests can build isolated pools with small budgets.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Inner>,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Pool {
    /// Creates a new pool, constructing each class's preallocated chunks.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    pub fn new(config: Config, registry: &mut Registry) -> Self {
        config.validate();
        let metrics = Metrics::new(registry);

        let mut free = Vec::with_capacity(config.classes.len());
        for class in &config.classes {
            let mut list = Vec::with_capacity(class.prealloc);
            for _ in 0..class.prealloc {
                list.push(Chunk::new(class.capacity));
            }
            let label = ClassLabel::new(class.capacity);
            metrics.created.get_or_create(&label).inc_by(class.prealloc as u64);
            metrics.idle.get_or_create(&label).set(class.prealloc as i64);
            free.push(list);
        }

        let created = config.prealloc_bytes();
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    free,
                    created,
                    idle: created,
                }),
                config,
                metrics,
            }),
        }
    }

    /// Allocates a chunk with capacity at least `size`.
    ///
    /// The smallest size class that fits serves the request: its free list
    /// head when one is idle, otherwise a freshly constructed chunk charged
    /// against the byte budget. A fresh chunk bypasses the free list and goes
    /// straight to the caller.
    ///
    /// # Errors
    ///
    /// - [Error::Oversized]: `size` exceeds the largest class
    /// - [Error::BudgetExhausted]: constructing one more chunk of the selected
    ///   class would cross the budget ceiling
    pub fn allocate(&self, size: usize) -> Result<Chunk, Error> {
        let Some(index) = self.inner.config.class_index(size) else {
            self.inner.metrics.oversized.inc();
            debug!(size, "allocation exceeds largest size class");
            return Err(Error::Oversized(size));
        };
        let capacity = self.inner.config.classes[index].capacity;
        let label = ClassLabel::new(capacity);

        {
            let mut state = self.inner.state.lock().unwrap();
            if let Some(chunk) = state.free[index].pop() {
                state.idle -= capacity as u64;
                drop(state);
                self.inner.metrics.allocations.get_or_create(&label).inc();
                self.inner.metrics.idle.get_or_create(&label).dec();
                return Ok(chunk);
            }

            // The free list is empty: reserve budget for a new chunk while
            // still holding the lock, then construct it after release.
            if state.created + capacity as u64 >= self.inner.config.budget {
                drop(state);
                self.inner.metrics.denied.inc();
                error!(
                    capacity,
                    budget = self.inner.config.budget,
                    "chunk would cross the pool byte budget"
                );
                return Err(Error::BudgetExhausted);
            }
            state.created += capacity as u64;
        }

        self.inner.metrics.allocations.get_or_create(&label).inc();
        self.inner.metrics.created.get_or_create(&label).inc();
        Ok(Chunk::new(capacity))
    }

    /// Returns a chunk to its class's free list, resetting it to the idle
    /// state.
    ///
    /// # Panics
    ///
    /// Panics if the chunk's capacity matches no configured class: such a
    /// chunk cannot have come from this pool, and accepting it would corrupt
    /// the free lists.
    pub fn retrieve(&self, mut chunk: Chunk) {
        let capacity = chunk.capacity();
        let index = self
            .inner
            .config
            .exact_class(capacity)
            .expect("chunk capacity matches no size class");
        chunk.reset();

        let mut state = self.inner.state.lock().unwrap();
        state.free[index].push(chunk);
        state.idle += capacity as u64;
        drop(state);
        self.inner
            .metrics
            .idle
            .get_or_create(&ClassLabel::new(capacity))
            .inc();
    }

    /// Capacity of the smallest size class, used as the fallback transfer
    /// size when a descriptor reports nothing queued.
    pub(crate) fn default_block(&self) -> usize {
        self.inner.config.classes[0].capacity
    }

    /// Total bytes of chunk storage ever constructed.
    pub fn created_bytes(&self) -> u64 {
        self.inner.state.lock().unwrap().created
    }

    /// Bytes currently idle in free lists.
    pub fn idle_bytes(&self) -> u64 {
        self.inner.state.lock().unwrap().idle
    }

    /// Bytes idle in the free list of the class with exactly `capacity`, or
    /// None if no such class is configured.
    ///
    /// Diagnostic only: reads the free list under the lock and has no other
    /// side effects.
    pub fn class_idle_bytes(&self, capacity: usize) -> Option<u64> {
        let index = self.inner.config.exact_class(capacity)?;
        let state = self.inner.state.lock().unwrap();
        Some(
            state.free[index]
                .iter()
                .map(|chunk| chunk.capacity() as u64)
                .sum(),
        )
    }

    /// Renders the free list of the class with exactly `capacity`: the first
    /// few idle chunks and the total count. Returns None if no such class is
    /// configured.
    ///
    /// Diagnostic only, intended for log output during debugging.
    pub fn format_class(&self, capacity: usize) -> Option<String> {
        let index = self.inner.config.exact_class(capacity)?;
        let state = self.inner.state.lock().unwrap();
        let list = &state.free[index];
        let mut out = format!("class {} bytes: {} idle chunks", capacity, list.len());
        for chunk in list.iter().take(FORMAT_LIMIT) {
            write!(out, "\n  {:?}", chunk).expect("write to string");
        }
        if list.len() > FORMAT_LIMIT {
            out.push_str("\n  ...");
        }
        Some(out)
    }
}
