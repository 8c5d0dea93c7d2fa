#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Command-line driver for the `op_bench` engine.
//!
//! Parses the harness options and one payload subcommand, prepares the payload, runs it on the
//! requested number of worker threads and prints the result table to stdout. Diagnostics go to
//! stderr through `tracing`, filtered by `RUST_LOG` (default `warn`).
//!
//! ```text
//! op_bench --config laptop --threads 4 --run-time 10 swap --shared
//! op_bench --config ssd --max-ops 64 --file /mnt/ssd/data file-write --file-size 64MB
//! ```

use std::io;
use std::process::ExitCode;

use op_bench::{Engine, Report};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod error;
mod payloads;

use cli::{Args, Payload};
use error::{Error, Result};

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
#[cfg_attr(coverage_nightly, coverage(off))]
fn main() -> ExitCode {
    init_logging();

    let args: Args = argh::from_env();

    let report = match run(&args) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = report.write_to(&mut io::stdout().lock()) {
        eprintln!("Error: cannot write results: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

#[cfg_attr(test, mutants::skip)] // Global subscriber, set once per process.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Validates the configuration, prepares and runs the payload, and summarizes the run.
///
/// Every error is raised before the first worker thread starts.
fn run(args: &Args) -> Result<Report> {
    let config = args.build_config()?;

    info!(
        system = config.system(),
        name = config.name(),
        footprint = %config.footprint(),
        "configured benchmark"
    );

    let engine = Engine::new(config);

    #[cfg(unix)]
    if let Err(error) = op_bench::install_interrupt_handler() {
        tracing::warn!(%error, "cannot install interrupt handler, interrupts will not be logged");
    }

    let _outcome = payloads::run(&engine, &args.payload)?;

    Ok(engine.report())
}

#[cfg(test)]
#[cfg(not(miri))] // Real threads.
mod tests {
    use argh::FromArgs;

    use super::*;

    #[test]
    fn runs_payload_and_reports() {
        let args = Args::from_args(
            &["op_bench"],
            &["--config", "unit", "--threads", "2", "--max-ops", "100", "lfsr"],
        )
        .unwrap();

        let report = run(&args).unwrap();

        assert_eq!(report.system(), "test");
        assert_eq!(report.name(), "unit");
        assert_eq!(report.operations(), 100);
        assert_eq!(report.threads().get(), 2);
    }

    #[test]
    fn configuration_errors_stop_before_running() {
        let args = Args::from_args(
            &["op_bench"],
            &["--config", "unit", "--threads", "0", "--max-ops", "100", "lfsr"],
        )
        .unwrap();

        assert!(matches!(
            run(&args),
            Err(Error::Config(op_bench::ConfigError::ZeroThreads))
        ));
    }
}
