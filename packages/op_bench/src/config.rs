use std::num::NonZero;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{ConfigError, Footprint, Result};

/// How a benchmark run decides when it is finished.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RunMode {
    /// Run until the wall-clock duration has elapsed since timing started.
    Duration(Duration),

    /// Run until the given total number of operations has been completed, divided evenly
    /// between the threads. Zero means "run nothing".
    Operations(u64),
}

/// How worker threads publish their completed operations to the shared progress counter.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum Counting {
    /// Each worker tallies locally and publishes its total once, after its run loop.
    ///
    /// This keeps the shared counter off the hot path and is the right choice for cheap
    /// operations.
    #[default]
    Batched,

    /// Each worker publishes every operation immediately, so the running total is visible to
    /// all threads mid-run. In operation count mode, workers claim operations from the shared
    /// total before executing them, until the limit has been handed out, instead of running a
    /// fixed per-thread quota. The total executed is then exactly the limit.
    PerOperation,
}

/// How the per-worker random seeds are generated.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum SeedMode {
    /// Seeds come from a fixed-seed generator, so repeated runs see the same sequences.
    #[default]
    Deterministic,

    /// Seeds come from an OS-seeded generator and differ between runs.
    Nondeterministic,
}

/// Process-wide benchmark configuration. Immutable once built.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use op_bench::{Config, RunMode};
///
/// let config = Config::builder("test", "quick")
///     .threads(4)
///     .max_operations(400)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.thread_count().get(), 4);
/// assert_eq!(config.run_mode(), RunMode::Operations(400));
/// assert_eq!(config.operations_per_thread(), 100);
///
/// // Forgetting the run mode is a configuration error.
/// assert!(Config::builder("test", "broken").build().is_err());
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    system: String,
    name: String,
    thread_count: NonZero<usize>,
    run_mode: RunMode,
    footprint: Footprint,
    file: Option<PathBuf>,
    seed_mode: SeedMode,
    counting: Counting,
}

impl Config {
    /// Starts configuring a benchmark with a system label (e.g. the payload family) and a
    /// configuration name (a free-text identifier chosen by whoever runs the benchmark).
    pub fn builder(system: impl Into<String>, name: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(system.into(), name.into())
    }

    /// The system label, reported in the `Bench` column.
    #[must_use]
    pub fn system(&self) -> &str {
        &self.system
    }

    /// The configuration name, reported in the `Config` column.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of worker threads.
    #[must_use]
    pub fn thread_count(&self) -> NonZero<usize> {
        self.thread_count
    }

    /// The termination condition of the run.
    #[must_use]
    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// The memory or storage footprint the payload should operate over.
    #[must_use]
    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    /// The backing file path, if one was configured.
    #[must_use]
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// How per-worker seeds are generated.
    #[must_use]
    pub fn seed_mode(&self) -> SeedMode {
        self.seed_mode
    }

    /// How workers publish completed operations.
    #[must_use]
    pub fn counting(&self) -> Counting {
        self.counting
    }

    /// The number of operations each worker executes unconditionally.
    ///
    /// Zero means the worker instead loops until the engine reports it is done, which is the
    /// case in duration mode, with per-operation counting, and for an operation count of zero.
    #[must_use]
    pub fn operations_per_thread(&self) -> u64 {
        match (self.run_mode, self.counting) {
            (RunMode::Operations(operations), Counting::Batched) => {
                operations / self.thread_count.get() as u64
            }
            _ => 0,
        }
    }

    /// Checks that the footprint is at least `required`, as demanded by the payload.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FootprintTooSmall`] if the footprint is smaller.
    pub fn require_footprint(&self, required: Footprint) -> Result<Footprint> {
        if self.footprint < required {
            return Err(ConfigError::FootprintTooSmall {
                required,
                actual: self.footprint,
            });
        }

        Ok(self.footprint)
    }

    /// Returns the backing file path, for payloads that cannot work without one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingFile`] if no path was configured.
    pub fn require_file(&self) -> Result<&Path> {
        self.file().ok_or(ConfigError::MissingFile)
    }
}

/// Builds a [`Config`], validating it as a whole when [`build()`][Self::build] is called.
#[derive(Debug)]
#[must_use]
pub struct ConfigBuilder {
    system: String,
    name: String,
    threads: usize,
    run_time: Option<Duration>,
    max_operations: Option<u64>,
    footprint: Footprint,
    file: Option<PathBuf>,
    seed_mode: SeedMode,
    counting: Counting,
}

impl ConfigBuilder {
    fn new(system: String, name: String) -> Self {
        Self {
            system,
            name,
            threads: 1,
            run_time: None,
            max_operations: None,
            footprint: Footprint::default(),
            file: None,
            seed_mode: SeedMode::default(),
            counting: Counting::default(),
        }
    }

    /// Sets the number of worker threads. Defaults to 1.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Runs for a fixed wall-clock duration.
    pub fn run_time(mut self, run_time: Duration) -> Self {
        self.run_time = Some(run_time);
        self
    }

    /// Runs for a fixed total number of operations.
    pub fn max_operations(mut self, operations: u64) -> Self {
        self.max_operations = Some(operations);
        self
    }

    /// Sets the memory or storage footprint. Defaults to 1 MiB.
    pub fn footprint(mut self, footprint: Footprint) -> Self {
        self.footprint = footprint;
        self
    }

    /// Sets the backing file path used by storage payloads.
    pub fn file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Sets how per-worker seeds are generated. Defaults to [`SeedMode::Deterministic`].
    pub fn seed_mode(mut self, seed_mode: SeedMode) -> Self {
        self.seed_mode = seed_mode;
        self
    }

    /// Sets how workers publish completed operations. Defaults to [`Counting::Batched`].
    pub fn counting(mut self, counting: Counting) -> Self {
        self.counting = counting;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread count is zero, if not exactly one of run time and maximum
    /// operation count is set, if the run time is zero, or if a batched operation count would
    /// leave every thread with a zero quota.
    pub fn build(self) -> Result<Config> {
        let thread_count = NonZero::new(self.threads).ok_or(ConfigError::ZeroThreads)?;

        let run_mode = match (self.run_time, self.max_operations) {
            (None, None) => return Err(ConfigError::MissingRunMode),
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingRunModes),
            (Some(run_time), None) if run_time.is_zero() => {
                return Err(ConfigError::ZeroRunTime);
            }
            (Some(run_time), None) => RunMode::Duration(run_time),
            (None, Some(operations)) => RunMode::Operations(operations),
        };

        if let RunMode::Operations(operations) = run_mode {
            if self.counting == Counting::Batched
                && operations != 0
                && operations < thread_count.get() as u64
            {
                return Err(ConfigError::TooFewOperations {
                    operations,
                    threads: thread_count.get(),
                });
            }
        }

        Ok(Config {
            system: self.system,
            name: self.name,
            thread_count,
            run_mode,
            footprint: self.footprint,
            file: self.file,
            seed_mode: self.seed_mode,
            counting: self.counting,
        })
    }
}
