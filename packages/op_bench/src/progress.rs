use std::sync::atomic::{AtomicI64, Ordering};

/// A shared tally of completed operations, updated concurrently without locks.
///
/// Workers normally tally operations locally and publish them with a single
/// [`add()`][Self::add] at the end of their run loop. [`increment()`][Self::increment] exists for
/// workloads whose progress must be visible to other threads while the run is in flight.
///
/// # Examples
///
/// ```
/// use op_bench::ProgressCounter;
///
/// let counter = ProgressCounter::new();
/// counter.increment();
/// counter.add(41);
///
/// assert_eq!(counter.read(), 42);
/// ```
#[derive(Debug, Default)]
pub struct ProgressCounter {
    value: AtomicI64,
}

impl ProgressCounter {
    /// Creates a counter starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            value: AtomicI64::new(0),
        }
    }

    /// Atomically adds `delta`, which may be negative.
    pub fn add(&self, delta: i64) {
        // Relaxed is enough for the counter itself. Readers that need to see every published
        // count synchronize through thread joins.
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Atomically adds one.
    pub fn increment(&self) {
        self.add(1);
    }

    /// Atomically adds one unless the counter has already reached `limit`.
    ///
    /// Returns whether the increment happened. Concurrent callers never push the counter past
    /// `limit`, which makes this usable for handing out a fixed number of tickets.
    pub fn increment_below(&self, limit: i64) -> bool {
        self.value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |value| {
                value.checked_add(1).filter(|next| *next <= limit)
            })
            .is_ok()
    }

    /// Returns the current value.
    #[must_use]
    pub fn read(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}
