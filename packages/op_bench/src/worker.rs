use std::num::NonZero;

use tracing::debug;

use crate::{Barrier, Counting, Engine, RunMode, Seed};

/// Identifies a worker thread within a run. Workers are numbered from 0 to the thread count
/// minus one.
#[derive(Clone, Copy, Debug, derive_more::Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{_0}")]
pub struct WorkerId(usize);

impl WorkerId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The zero-based index of the worker.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    /// Whether this is worker 0, the one that starts the benchmark clock.
    #[must_use]
    pub const fn is_first(self) -> bool {
        self.0 == 0
    }
}

/// The three rendezvous points every worker passes through during a run.
#[derive(Debug)]
pub(crate) struct Barriers {
    /// Nobody begins until every worker exists.
    pub(crate) start: Barrier,

    /// Nobody runs an operation until the clock has started.
    pub(crate) run: Barrier,

    /// Every worker has published its count.
    pub(crate) end: Barrier,
}

impl Barriers {
    pub(crate) fn new(parties: NonZero<usize>) -> Self {
        Self {
            start: Barrier::new(parties),
            run: Barrier::new(parties),
            end: Barrier::new(parties),
        }
    }
}

/// Joins the `end` barrier when dropped, so a worker that unwinds out of a panicking operation
/// still releases the workers waiting for it.
struct JoinOnDrop<'a>(&'a Barrier);

impl Drop for JoinOnDrop<'_> {
    fn drop(&mut self) {
        self.0.join();
    }
}

/// Everything a worker owns privately for the duration of a run.
#[derive(Debug)]
pub(crate) struct WorkerContext<S> {
    pub(crate) id: WorkerId,
    pub(crate) state: S,
    pub(crate) seed: Seed,
}

/// The life of one worker thread. Returns the number of operations the worker executed.
///
/// `quota` is the fixed number of operations to execute, or zero to keep going until the engine
/// reports that the run is done.
pub(crate) fn run_worker<S, F>(
    engine: &Engine,
    barriers: &Barriers,
    quota: u64,
    op: &F,
    context: WorkerContext<S>,
) -> u64
where
    F: Fn(WorkerId, &mut S, &mut Seed),
{
    let WorkerContext {
        id,
        mut state,
        mut seed,
    } = context;

    barriers.start.join();

    if id.is_first() {
        engine.start_timing();
    }

    // Ready, set...
    barriers.run.join();

    let _end = JoinOnDrop(&barriers.end);

    debug!(worker = %id, quota, "worker started");

    let per_operation = engine.config().counting() == Counting::PerOperation;

    let completed = if quota != 0 {
        // The count itself ends the run, so the deadline is not consulted.
        for _ in 0..quota {
            op(id, &mut state, &mut seed);
        }

        quota
    } else if per_operation && matches!(engine.config().run_mode(), RunMode::Operations(_)) {
        // Every operation is claimed in the shared tally before it executes, so the workers
        // together never exceed the operation count.
        let mut completed: u64 = 0;

        while engine.claim_operation() {
            op(id, &mut state, &mut seed);
            completed = completed.wrapping_add(1);
        }

        completed
    } else {
        let mut completed: u64 = 0;

        while !engine.is_done() {
            op(id, &mut state, &mut seed);
            completed = completed.wrapping_add(1);

            if per_operation {
                engine.completed_operation();
            }
        }

        completed
    };

    if engine.config().counting() == Counting::Batched {
        engine.completed_operations(i64::try_from(completed).unwrap_or(i64::MAX));
    }

    debug!(worker = %id, completed, "worker finished");

    completed
}
