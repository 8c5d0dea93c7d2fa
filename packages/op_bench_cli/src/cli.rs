use std::path::PathBuf;
use std::time::Duration;

use argh::FromArgs;
use op_bench::{Config, Counting, Footprint, SeedMode};

use crate::payloads::{
    FileOpsArgs, FileReadArgs, FileWriteArgs, LfsrArgs, MemLoadArgs, MemStoreArgs, SwapArgs,
};
use crate::{Error, Result};

/// Runs a microbenchmark on a number of worker threads and prints its throughput as a
/// tab-separated table.
#[derive(Debug, FromArgs)]
pub(crate) struct Args {
    /// name of the configuration, printed in the Config column
    #[argh(option)]
    config: String,

    /// number of worker threads (default 1)
    #[argh(option, default = "1")]
    threads: usize,

    /// run for this many seconds (fractions allowed)
    #[argh(option)]
    run_time: Option<f64>,

    /// execute this many operations in total, split evenly between the threads
    #[argh(option)]
    max_ops: Option<u64>,

    /// memory or storage footprint, e.g. 64MB, 512KB or 4096B (bare numbers are megabytes)
    #[argh(option)]
    footprint: Option<Footprint>,

    /// backing file or directory used by storage and memory payloads
    #[argh(option)]
    file: Option<PathBuf>,

    /// seed the workers from system entropy instead of a fixed seed
    #[argh(switch)]
    nondet: bool,

    /// add every operation to the shared tally instead of once per worker at the end
    #[argh(switch)]
    per_op_counting: bool,

    #[argh(subcommand)]
    pub(crate) payload: Payload,
}

impl Args {
    /// Translates the harness options into an engine configuration.
    pub(crate) fn build_config(&self) -> Result<Config> {
        let mut builder = Config::builder(self.payload.system(), &self.config).threads(self.threads);

        if let Some(seconds) = self.run_time {
            let run_time = Duration::try_from_secs_f64(seconds)
                .map_err(|e| Error::InvalidOption(format!("--run-time {seconds}: {e}")))?;

            builder = builder.run_time(run_time);
        }

        if let Some(operations) = self.max_ops {
            builder = builder.max_operations(operations);
        }

        if let Some(footprint) = self.footprint {
            builder = builder.footprint(footprint);
        }

        if let Some(file) = &self.file {
            builder = builder.file(file.as_path());
        }

        if self.nondet {
            builder = builder.seed_mode(SeedMode::Nondeterministic);
        }

        if self.per_op_counting {
            builder = builder.counting(Counting::PerOperation);
        }

        Ok(builder.build()?)
    }
}

/// The operation to benchmark.
#[derive(Debug, FromArgs)]
#[argh(subcommand)]
pub(crate) enum Payload {
    Lfsr(LfsrArgs),
    Swap(SwapArgs),
    FileWrite(FileWriteArgs),
    FileRead(FileReadArgs),
    FileOps(FileOpsArgs),
    MemLoad(MemLoadArgs),
    MemStore(MemStoreArgs),
}

impl Payload {
    /// The label printed in the Bench column.
    pub(crate) fn system(&self) -> &'static str {
        match self {
            Self::Lfsr(_) => "test",
            Self::Swap(_) => "gsps",
            Self::FileWrite(_) => "write",
            Self::FileRead(_) => "read",
            Self::FileOps(_) => "fileOps",
            Self::MemLoad(_) => "DAX/LD",
            Self::MemStore(_) => "DAX/ST",
        }
    }
}
