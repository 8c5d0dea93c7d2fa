use std::num::NonZero;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::SeedMode;

/// Seed of the generator that hands out per-worker seeds in deterministic mode.
const DETERMINISTIC_ROOT_SEED: u64 = 0x5EED_0F_0B_BE_4C;

/// A per-worker pseudo-random generator state, owned exclusively by one worker thread.
///
/// This is a xorshift64 generator: very cheap to advance, so payloads can draw random numbers
/// inside the timed portion without the generator dominating the measurement. The state is
/// never zero.
///
/// `Seed` implements [`RngCore`], so the [`Rng`] helper methods are available on it.
///
/// # Examples
///
/// ```
/// use std::num::NonZero;
///
/// use op_bench::Seed;
/// use rand::Rng;
///
/// let mut seed = Seed::new(NonZero::new(42).unwrap());
///
/// let index = seed.random_range(0..1024_usize);
/// assert!(index < 1024);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Seed {
    state: NonZero<u64>,
}

impl Seed {
    /// Creates a generator from a non-zero seed.
    #[must_use]
    pub const fn new(seed: NonZero<u64>) -> Self {
        Self { state: seed }
    }

    /// The current generator state.
    #[must_use]
    pub const fn state(&self) -> NonZero<u64> {
        self.state
    }

    /// Advances the generator and returns the new state.
    pub fn advance(&mut self) -> u64 {
        let mut x = self.state.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;

        // Xorshift maps every non-zero state to a non-zero state.
        self.state = NonZero::new(x).expect("xorshift never produces zero from a non-zero state");
        x
    }
}

impl RngCore for Seed {
    fn next_u32(&mut self) -> u32 {
        // The high bits of xorshift64 are the better-mixed ones.
        (self.advance() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.advance()
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(size_of::<u64>()) {
            let bytes = self.advance().to_le_bytes();
            chunk.copy_from_slice(
                bytes
                    .get(..chunk.len())
                    .expect("chunks are never longer than 8 bytes"),
            );
        }
    }
}

/// Hands out independent non-zero seeds, one per worker.
#[derive(Debug)]
pub(crate) struct SeedSource {
    rng: StdRng,
}

impl SeedSource {
    pub(crate) fn new(mode: SeedMode) -> Self {
        let rng = match mode {
            SeedMode::Deterministic => StdRng::seed_from_u64(DETERMINISTIC_ROOT_SEED),
            SeedMode::Nondeterministic => StdRng::from_rng(&mut rand::rng()),
        };

        Self { rng }
    }

    pub(crate) fn next_seed(&mut self) -> Seed {
        loop {
            if let Some(seed) = NonZero::new(self.rng.random::<u64>()) {
                return Seed::new(seed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn advance_is_deterministic_and_never_zero() {
        let mut a = Seed::new(NonZero::new(1).unwrap());
        let mut b = Seed::new(NonZero::new(1).unwrap());

        for _ in 0..10_000 {
            let value = a.advance();
            assert_ne!(value, 0);
            assert_eq!(value, b.advance());
        }
    }

    #[test]
    fn range_helpers_stay_in_range() {
        let mut seed = Seed::new(NonZero::new(7).unwrap());

        for _ in 0..1_000 {
            assert!(seed.random_range(0..13_u64) < 13);
        }
    }

    #[test]
    fn fill_bytes_handles_partial_chunks() {
        let mut seed = Seed::new(NonZero::new(99).unwrap());
        let mut buffer = [0_u8; 13];

        seed.fill_bytes(&mut buffer);

        assert!(buffer.iter().any(|b| *b != 0));
    }

    #[test]
    fn deterministic_source_repeats() {
        let mut first = SeedSource::new(SeedMode::Deterministic);
        let mut second = SeedSource::new(SeedMode::Deterministic);

        for _ in 0..16 {
            assert_eq!(first.next_seed(), second.next_seed());
        }
    }

    #[test]
    fn seeds_are_distinct_per_worker() {
        let mut source = SeedSource::new(SeedMode::Nondeterministic);

        let seeds = (0..64)
            .map(|_| source.next_seed().state())
            .collect::<HashSet<_>>();

        assert_eq!(seeds.len(), 64);
    }
}
