use std::num::NonZero;

use parking_lot::{Condvar, Mutex};

/// A reusable rendezvous point for a fixed number of threads.
///
/// Every call to [`join()`][Self::join] blocks until `parties` threads have called it since the
/// barrier was last released. The last arriving thread releases all of them and resets the
/// arrival count, after which the barrier can be used for the next round.
///
/// Fewer than `parties` live threads calling `join()` is a programming error that deadlocks.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
/// use std::thread;
///
/// use op_bench::Barrier;
///
/// let barrier = Barrier::new(NonZero::new(3).unwrap());
///
/// thread::scope(|s| {
///     for _ in 0..3 {
///         s.spawn(|| {
///             barrier.join(); // Nobody passes until all three have arrived.
///             barrier.join(); // The same barrier works for the next round.
///         });
///     }
/// });
/// ```
#[derive(Debug)]
pub struct Barrier {
    parties: NonZero<usize>,
    state: Mutex<Round>,
    released: Condvar,
}

#[derive(Debug)]
struct Round {
    arrived: usize,

    // Incremented on every release. Waiters compare against the value they saw on arrival,
    // which makes them immune to spurious wakeups and to early arrivals for the next round.
    generation: u64,
}

impl Barrier {
    /// Creates a barrier that releases its waiters once `parties` threads have arrived.
    #[must_use]
    pub fn new(parties: NonZero<usize>) -> Self {
        Self {
            parties,
            state: Mutex::new(Round {
                arrived: 0,
                generation: 0,
            }),
            released: Condvar::new(),
        }
    }

    /// The number of threads the barrier waits for.
    #[must_use]
    pub fn parties(&self) -> NonZero<usize> {
        self.parties
    }

    /// Blocks until all parties have joined, then releases them together.
    pub fn join(&self) {
        let mut round = self.state.lock();
        let generation = round.generation;

        round.arrived = round.arrived.wrapping_add(1);

        if round.arrived == self.parties.get() {
            round.arrived = 0;
            round.generation = round.generation.wrapping_add(1);
            self.released.notify_all();
            return;
        }

        while round.generation == generation {
            self.released.wait(&mut round);
        }
    }
}
