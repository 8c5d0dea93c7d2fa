use std::hint::black_box;

use argh::FromArgs;
use op_bench::{Engine, RunOutcome};

/// advance each worker's random number generator once per operation
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "lfsr")]
pub(crate) struct LfsrArgs {}

/// Each operation advances the worker's generator, which shows what the harness itself costs.
pub(super) fn run(engine: &Engine) -> RunOutcome {
    engine.run_ops(&(), |_, (), seed| {
        black_box(seed.advance());
    })
}

#[cfg(test)]
#[cfg(not(miri))] // Real threads.
mod tests {
    use op_bench::Config;

    use super::*;

    #[test]
    fn runs_requested_operations() {
        let engine = Engine::new(
            Config::builder("test", "lfsr")
                .threads(2)
                .max_operations(1000)
                .build()
                .unwrap(),
        );

        let outcome = run(&engine);

        assert_eq!(outcome.total_operations(), 1000);
        assert_eq!(engine.report().operations(), 1000);
    }
}
