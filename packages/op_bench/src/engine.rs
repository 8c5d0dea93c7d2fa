use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::{
    Barriers, Config, Counting, Deadline, Phase, ProgressCounter, Report, RunMode, Seed,
    SeedSource, WorkerContext, WorkerId, run_worker,
};

/// Runs an operation on a fixed number of worker threads, either for a fixed duration or for a
/// fixed total number of operations, and counts how many operations completed.
///
/// The engine owns the run configuration and the run state (the benchmark clock and the
/// completed-operation tally). One engine drives one run: the clock and the tally are not
/// reset between runs, so starting a second run on the same engine panics.
///
/// # Run protocol
///
/// For every run, the engine creates three barriers sized to the thread count and spawns one
/// worker per thread. Each worker:
///
/// 1. Joins the `start` barrier, so nobody begins before every worker exists.
/// 2. If it is worker 0, starts the benchmark clock.
/// 3. Joins the `run` barrier, so every worker begins with the clock already running.
/// 4. Executes the operation, either exactly its share of the operation count, or once per
///    operation it manages to [claim][Self::claim_operation] from the shared tally, or
///    repeatedly until [`is_done()`][Self::is_done] becomes true.
/// 5. Publishes its local operation count to the shared tally.
/// 6. Joins the `end` barrier, even if the operation panicked.
///
/// The engine waits for every worker thread to terminate before returning and stops the clock
/// if it is still running.
///
/// In duration mode, a worker finishes the operation it is executing before it notices the
/// deadline, so a run may overshoot the deadline by up to one operation's latency.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// use op_bench::{Config, Engine};
///
/// let config = Config::builder("example", "doc")
///     .threads(4)
///     .max_operations(400)
///     .build()
///     .unwrap();
///
/// let engine = Engine::new(config);
/// let calls = AtomicU64::new(0);
///
/// let outcome = engine.run_ops(&calls, |_worker, calls, _seed| {
///     calls.fetch_add(1, Ordering::Relaxed);
/// });
///
/// assert_eq!(calls.load(Ordering::Relaxed), 400);
/// assert!(outcome.operations_per_worker().all(|ops| ops == 100));
///
/// let report = engine.report();
/// assert_eq!(report.operations(), 400);
/// println!("{report}");
/// ```
#[derive(Debug)]
pub struct Engine {
    config: Config,
    deadline: Deadline,
    completed: ProgressCounter,
    started: AtomicBool,
}

impl Engine {
    /// Creates an engine for the given configuration. The benchmark clock starts out idle.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let limit = match config.run_mode() {
            RunMode::Duration(run_time) => Some(run_time),
            RunMode::Operations(_) => None,
        };

        Self {
            config,
            deadline: Deadline::new(limit),
            completed: ProgressCounter::new(),
            started: AtomicBool::new(false),
        }
    }

    /// The configuration the engine was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current phase of the benchmark clock.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.deadline.phase()
    }

    /// Starts (or resumes) the timed portion of the run.
    ///
    /// Worker 0 calls this automatically at the beginning of a run.
    pub fn start_timing(&self) {
        self.deadline.start_timing();
    }

    /// Suspends timing, e.g. around a setup phase that should not count. The deadline cannot
    /// expire until timing is started again.
    pub fn suspend_timing(&self) {
        self.deadline.suspend_timing();
    }

    /// Ends the timed portion of the run.
    pub fn stop_timing(&self) {
        self.deadline.stop_timing();
    }

    /// The duration of the timed portion, once timing has stopped.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        self.deadline.elapsed()
    }

    /// Whether the run should end: the operation count has been reached, or the deadline has
    /// passed, depending on the run mode. An operation count of zero is done immediately.
    ///
    /// This is the predicate workers poll in their run loop.
    #[must_use]
    pub fn is_done(&self) -> bool {
        match self.config.run_mode() {
            RunMode::Operations(0) => true,
            RunMode::Operations(limit) => {
                self.completed.read() >= i64::try_from(limit).unwrap_or(i64::MAX)
            }
            RunMode::Duration(_) => self.deadline.is_expired(),
        }
    }

    /// Claims one operation of a fixed operation count in the shared tally, before executing it.
    ///
    /// Returns `false` once the operation count has been handed out in full, so concurrent
    /// workers together execute exactly the configured number of operations. Always returns
    /// `false` in duration mode.
    #[must_use]
    pub fn claim_operation(&self) -> bool {
        match self.config.run_mode() {
            RunMode::Operations(limit) => self
                .completed
                .increment_below(i64::try_from(limit).unwrap_or(i64::MAX)),
            RunMode::Duration(_) => false,
        }
    }

    /// Records one completed operation in the shared tally.
    pub fn completed_operation(&self) {
        self.completed.increment();
    }

    /// Records `count` completed operations in the shared tally.
    pub fn completed_operations(&self, count: i64) {
        self.completed.add(count);
    }

    /// The number of completed operations recorded so far.
    #[must_use]
    pub fn completed(&self) -> i64 {
        self.completed.read()
    }

    /// Runs `op` on every worker thread, passing the same shared `context` to all of them.
    ///
    /// The operation receives the worker identity, the context and the worker's private seed.
    /// Any synchronization the operation needs on the shared context is its own concern.
    ///
    /// # Panics
    ///
    /// Panics if the engine has already run, if a worker thread cannot be spawned or if the
    /// operation panics. A panic in the operation is propagated once every other worker has
    /// finished its run loop.
    pub fn run_ops<C, F>(&self, context: &C, op: F) -> RunOutcome
    where
        C: Sync + ?Sized,
        F: Fn(WorkerId, &C, &mut Seed) + Sync,
    {
        self.run_ops_per_worker(|_| context, |worker, context, seed| op(worker, *context, seed))
    }

    /// Runs `op` on every worker thread, giving each worker its own state.
    ///
    /// `prepare` is called on the current thread once per worker, in worker order, before any
    /// worker is spawned. The state it returns moves to the worker and is dropped when the
    /// worker finishes.
    ///
    /// # Panics
    ///
    /// Panics if the engine has already run, if a worker thread cannot be spawned or if the
    /// operation panics. A panic in the operation is propagated once every other worker has
    /// finished its run loop.
    pub fn run_ops_per_worker<S, P, F>(&self, mut prepare: P, op: F) -> RunOutcome
    where
        S: Send,
        P: FnMut(WorkerId) -> S,
        F: Fn(WorkerId, &mut S, &mut Seed) + Sync,
    {
        assert!(
            !self.started.swap(true, Ordering::Relaxed),
            "an engine drives only one run; create a new engine for every run"
        );

        let thread_count = self.config.thread_count();
        let quota = self.config.operations_per_thread();

        if let RunMode::Operations(operations) = self.config.run_mode() {
            let remainder = operations % thread_count.get() as u64;

            if self.config.counting() == Counting::Batched && remainder != 0 {
                warn!(
                    operations,
                    threads = thread_count.get(),
                    skipped = remainder,
                    "operation count is not divisible by the thread count"
                );
            }
        }

        info!(
            system = self.config.system(),
            name = self.config.name(),
            threads = thread_count.get(),
            mode = ?self.config.run_mode(),
            "starting run"
        );

        let barriers = Barriers::new(thread_count);
        let mut seeds = SeedSource::new(self.config.seed_mode());

        let contexts = (0..thread_count.get())
            .map(WorkerId::new)
            .map(|id| WorkerContext {
                id,
                state: prepare(id),
                seed: seeds.next_seed(),
            })
            .collect::<Vec<_>>();

        let op = &op;
        let barriers = &barriers;

        let operations_per_worker = thread::scope(|s| {
            let handles = contexts
                .into_iter()
                .map(|context| {
                    thread::Builder::new()
                        .name(format!("op_bench-worker-{}", context.id))
                        .spawn_scoped(s, move || run_worker(self, barriers, quota, op, context))
                        .expect("failed to spawn worker thread: thread spawning failure is not supported")
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|payload| panic::resume_unwind(payload))
                })
                .collect::<Vec<_>>()
        });

        self.deadline.ensure_stopped();

        info!(
            completed = self.completed(),
            elapsed = ?self.elapsed(),
            "run finished"
        );

        RunOutcome {
            operations_per_worker: operations_per_worker.into_boxed_slice(),
        }
    }

    /// Summarizes the run. Stops timing first if it is still running.
    pub fn report(&self) -> Report {
        self.deadline.ensure_stopped();

        Report::new(
            self.config.system().to_string(),
            self.config.name().to_string(),
            self.elapsed().unwrap_or_default(),
            self.completed(),
            self.config.thread_count(),
        )
    }
}

/// What the workers of one run did.
#[derive(Clone, Debug)]
#[must_use]
pub struct RunOutcome {
    operations_per_worker: Box<[u64]>,
}

impl RunOutcome {
    /// The number of operations each worker executed, in worker order.
    pub fn operations_per_worker(&self) -> impl Iterator<Item = u64> + '_ {
        self.operations_per_worker.iter().copied()
    }

    /// The total number of operations executed by all workers.
    #[must_use]
    pub fn total_operations(&self) -> u64 {
        self.operations_per_worker
            .iter()
            .fold(0_u64, |total, ops| total.saturating_add(*ops))
    }
}

#[cfg(test)]
#[cfg(not(miri))] // Real threads and clocks.
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Engine: Send, Sync);

    fn engine_with_operations(threads: usize, operations: u64) -> Engine {
        Engine::new(
            Config::builder("test", "unit")
                .threads(threads)
                .max_operations(operations)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn zero_operations_runs_nothing() {
        let engine = engine_with_operations(3, 0);
        let calls = AtomicU64::new(0);

        let outcome = engine.run_ops(&calls, |_, calls, _| {
            calls.fetch_add(1, Ordering::Relaxed);
        });

        assert!(engine.is_done());
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert_eq!(outcome.total_operations(), 0);
        assert_eq!(engine.completed(), 0);
    }

    #[test]
    fn remainder_is_not_executed() {
        let engine = engine_with_operations(4, 10);

        let outcome = engine.run_ops(&(), |_, (), _| {});

        assert_eq!(outcome.operations_per_worker().collect::<Vec<_>>(), [2, 2, 2, 2]);
        assert_eq!(engine.completed(), 8);
    }

    #[test]
    fn prepare_runs_in_worker_order_before_spawning() {
        let engine = engine_with_operations(3, 3);
        let prepared = Mutex::new(Vec::new());

        let _outcome = engine.run_ops_per_worker(
            |worker| {
                prepared.lock().unwrap().push(worker.index());
                worker.index()
            },
            |worker, state, _| assert_eq!(worker.index(), *state),
        );

        assert_eq!(*prepared.lock().unwrap(), [0, 1, 2]);
    }

    #[test]
    fn clock_is_running_when_operations_execute() {
        let engine = engine_with_operations(4, 40);

        let _outcome = engine.run_ops(&engine, |_, engine, _| {
            assert_eq!(engine.phase(), Phase::Timing);
        });

        assert_eq!(engine.phase(), Phase::Expired);
        assert!(engine.elapsed().is_some());
    }

    #[test]
    fn operation_panic_propagates() {
        let engine = engine_with_operations(1, 1);

        let result = panic::catch_unwind(|| {
            let _outcome = engine.run_ops(&(), |_, (), _| panic!("payload failure"));
        });

        assert!(result.is_err());
    }

    #[test]
    fn operation_panic_propagates_from_one_of_many_workers() {
        let engine = engine_with_operations(4, 400);
        let calls = AtomicU64::new(0);

        let result = panic::catch_unwind(|| {
            let _outcome = engine.run_ops(&calls, |worker, calls, _| {
                assert!(!worker.is_first(), "payload failure");
                calls.fetch_add(1, Ordering::Relaxed);
            });
        });

        assert!(result.is_err());

        // The other workers were not held up and finished their share.
        assert_eq!(calls.load(Ordering::Relaxed), 300);
    }

    #[test]
    fn operation_panic_in_duration_mode_propagates() {
        let engine = Engine::new(
            Config::builder("test", "unit")
                .threads(2)
                .run_time(Duration::from_millis(20))
                .build()
                .unwrap(),
        );

        let result = panic::catch_unwind(|| {
            let _outcome = engine.run_ops(&(), |worker, (), _| {
                assert!(worker.is_first(), "payload failure");
            });
        });

        assert!(result.is_err());
    }

    #[test]
    fn per_operation_claims_never_exceed_the_limit() {
        for _ in 0..50 {
            let engine = Engine::new(
                Config::builder("test", "unit")
                    .threads(8)
                    .max_operations(800)
                    .counting(Counting::PerOperation)
                    .build()
                    .unwrap(),
            );
            let calls = AtomicU64::new(0);

            let outcome = engine.run_ops(&calls, |_, calls, _| {
                calls.fetch_add(1, Ordering::Relaxed);
            });

            assert_eq!(calls.load(Ordering::Relaxed), 800);
            assert_eq!(outcome.total_operations(), 800);
            assert_eq!(engine.completed(), 800);
        }
    }

    #[test]
    fn claim_operation_is_refused_in_duration_mode() {
        let engine = Engine::new(
            Config::builder("test", "unit")
                .run_time(Duration::from_secs(1))
                .build()
                .unwrap(),
        );

        assert!(!engine.claim_operation());
        assert_eq!(engine.completed(), 0);
    }

    #[test]
    #[should_panic(expected = "only one run")]
    fn second_run_panics() {
        let engine = engine_with_operations(2, 2);

        let _first = engine.run_ops(&(), |_, (), _| {});
        let _second = engine.run_ops(&(), |_, (), _| {});
    }
}
