use std::io;
use std::path::PathBuf;

use op_bench::ConfigError;
use thiserror::Error;

/// Failures of the driver, all of which happen before the timed portion of a run.
#[derive(Debug, Error)]
pub(crate) enum Error {
    /// The harness configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A file or directory needed by the payload could not be prepared.
    #[error("cannot prepare {}: {source}", path.display())]
    Io {
        /// The file or directory being prepared.
        path: PathBuf,
        /// The underlying I/O failure.
        source: io::Error,
    },

    /// A command-line option has a value the payload cannot work with.
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

pub(crate) type Result<T> = std::result::Result<T, Error>;
