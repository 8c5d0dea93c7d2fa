use thiserror::Error;

use crate::Footprint;

/// Errors that can occur when configuring a benchmark run.
///
/// Every variant is detected before any worker thread is spawned. A benchmark driver is expected
/// to report the error and exit with a non-zero status.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Neither a run duration nor an operation count was configured.
    #[error("either a run time or a maximum operation count must be specified")]
    MissingRunMode,

    /// Both a run duration and an operation count were configured.
    #[error("only one of run time or maximum operation count may be specified")]
    ConflictingRunModes,

    /// The thread count was zero.
    #[error("thread count must be at least 1")]
    ZeroThreads,

    /// A run duration of zero was configured, which would never expire.
    #[error("run time must be greater than zero")]
    ZeroRunTime,

    /// The operation count is smaller than the thread count, so every thread would receive a
    /// zero quota.
    #[error(
        "maximum operation count {operations} is smaller than the thread count {threads}; \
         use per-operation counting or raise the operation count"
    )]
    TooFewOperations {
        /// The configured operation count.
        operations: u64,

        /// The configured thread count.
        threads: usize,
    },

    /// The configured footprint is below the minimum the payload needs.
    #[error("footprint {actual} is below the required minimum of {required}")]
    FootprintTooSmall {
        /// The smallest footprint the payload accepts.
        required: Footprint,

        /// The configured footprint.
        actual: Footprint,
    },

    /// The payload needs a backing file but none was configured.
    #[error("a backing file path must be specified")]
    MissingFile,

    /// A footprint string could not be parsed.
    #[error("invalid footprint '{value}': {problem}")]
    InvalidFootprint {
        /// The text that failed to parse.
        value: String,

        /// A human-readable description of the problem.
        problem: String,
    },
}

/// A specialized `Result` type for configuration operations, returning the crate's
/// [`ConfigError`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, ConfigError>;
