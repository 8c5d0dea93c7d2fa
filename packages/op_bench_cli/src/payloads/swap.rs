use std::sync::atomic::{AtomicU64, Ordering};

use argh::FromArgs;
use op_bench::{Engine, Footprint, RunOutcome, Seed};
use rand::Rng;
use tracing::debug;

use crate::Result;
use crate::payloads::{prepare_workers, take_prepared};

const ELEMENT_SIZE: u64 = size_of::<u64>() as u64;

/// swap two random elements of an array sized by the footprint
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "swap")]
pub(crate) struct SwapArgs {
    /// all workers swap elements of one shared array instead of each owning a part
    #[argh(switch)]
    shared: bool,
}

pub(super) fn run(engine: &Engine, args: &SwapArgs) -> Result<RunOutcome> {
    let config = engine.config();
    let threads = config.thread_count().get() as u64;

    if args.shared {
        let footprint = config.require_footprint(Footprint::from_bytes(ELEMENT_SIZE))?;
        let array = (0..footprint.bytes() / ELEMENT_SIZE)
            .map(AtomicU64::new)
            .collect::<Box<[_]>>();

        debug!(elements = array.len(), "prepared shared array");

        Ok(engine.run_ops(&*array, |_, array, seed| swap_shared(array, seed)))
    } else {
        let footprint =
            config.require_footprint(Footprint::from_bytes(ELEMENT_SIZE.saturating_mul(threads)))?;
        let elements = footprint.bytes() / ELEMENT_SIZE / threads;

        let arrays = prepare_workers(config, |_| Ok((0..elements).collect::<Box<[u64]>>()))?;

        debug!(elements, "prepared one array per worker");

        Ok(engine.run_ops_per_worker(take_prepared(arrays), |_, array, seed| {
            swap_private(array, seed);
        }))
    }
}

/// Swaps two random elements. Each element is accessed atomically, the pair is not.
fn swap_shared(array: &[AtomicU64], seed: &mut Seed) {
    let a = seed.random_range(0..array.len());
    let b = seed.random_range(0..array.len());

    #[expect(
        clippy::indexing_slicing,
        reason = "indexes are drawn from the array's own range"
    )]
    let (a, b) = (&array[a], &array[b]);

    let value = a.load(Ordering::Relaxed);
    a.store(b.load(Ordering::Relaxed), Ordering::Relaxed);
    b.store(value, Ordering::Relaxed);
}

fn swap_private(array: &mut [u64], seed: &mut Seed) {
    let a = seed.random_range(0..array.len());
    let b = seed.random_range(0..array.len());

    array.swap(a, b);
}

#[cfg(test)]
mod tests {
    use std::num::NonZero;

    use op_bench::Config;

    use super::*;

    fn seed() -> Seed {
        Seed::new(NonZero::new(7).unwrap())
    }

    #[test]
    fn private_swaps_keep_every_value() {
        let mut array = (0..64).collect::<Vec<u64>>();
        let mut seed = seed();

        for _ in 0..1000 {
            swap_private(&mut array, &mut seed);
        }

        array.sort_unstable();
        assert_eq!(array, (0..64).collect::<Vec<u64>>());
    }

    #[test]
    fn shared_swaps_on_one_thread_keep_every_value() {
        let array = (0..64).map(AtomicU64::new).collect::<Vec<_>>();
        let mut seed = seed();

        for _ in 0..1000 {
            swap_shared(&array, &mut seed);
        }

        let mut values = array
            .iter()
            .map(|value| value.load(Ordering::Relaxed))
            .collect::<Vec<_>>();
        values.sort_unstable();
        assert_eq!(values, (0..64).collect::<Vec<u64>>());
    }

    #[test]
    #[cfg_attr(miri, ignore = "real threads are too slow under Miri")]
    fn runs_in_both_modes() {
        for shared in [false, true] {
            let engine = Engine::new(
                Config::builder("gsps", "test")
                    .threads(4)
                    .max_operations(4000)
                    .footprint(Footprint::from_kib(64))
                    .build()
                    .unwrap(),
            );

            let outcome = run(&engine, &SwapArgs { shared }).unwrap();

            assert_eq!(outcome.total_operations(), 4000, "shared: {shared}");
        }
    }

    #[test]
    fn footprint_must_hold_an_element_per_worker() {
        let engine = Engine::new(
            Config::builder("gsps", "test")
                .threads(4)
                .max_operations(4)
                .footprint(Footprint::from_bytes(16))
                .build()
                .unwrap(),
        );

        assert!(run(&engine, &SwapArgs { shared: false }).is_err());
    }
}
