//! The operations the driver can benchmark.
//!
//! Every payload prepares its resources (files, arrays, mappings) before the workers start,
//! so failures surface as errors before anything is timed. Once running, an operation that
//! hits an I/O error abandons the rest of that operation and the run carries on.

use std::ffi::OsString;
use std::num::NonZero;
use std::path::{Path, PathBuf};

use op_bench::{Config, Engine, RunOutcome, Seed, WorkerId};

use crate::{Payload, Result};

mod file_ops;
mod file_read;
mod file_write;
mod lfsr;
mod mem_load;
mod mem_store;
mod memory;
mod swap;

pub(crate) use file_ops::FileOpsArgs;
pub(crate) use file_read::FileReadArgs;
pub(crate) use file_write::FileWriteArgs;
pub(crate) use lfsr::LfsrArgs;
pub(crate) use mem_load::MemLoadArgs;
pub(crate) use mem_store::MemStoreArgs;
pub(crate) use swap::SwapArgs;

/// Prepares and runs the selected payload on the engine.
pub(crate) fn run(engine: &Engine, payload: &Payload) -> Result<RunOutcome> {
    match payload {
        Payload::Lfsr(_) => Ok(lfsr::run(engine)),
        Payload::Swap(args) => swap::run(engine, args),
        Payload::FileWrite(args) => file_write::run(engine, args),
        Payload::FileRead(args) => file_read::run(engine, args),
        Payload::FileOps(args) => file_ops::run(engine, args),
        Payload::MemLoad(args) => mem_load::run(engine, args),
        Payload::MemStore(args) => mem_store::run(engine, args),
    }
}

/// Runs `setup` for every worker index in order, stopping at the first failure.
fn prepare_workers<S>(
    config: &Config,
    setup: impl FnMut(usize) -> Result<S>,
) -> Result<Vec<S>> {
    (0..config.thread_count().get()).map(setup).collect()
}

/// Hands out prepared worker states in worker order.
///
/// The engine asks for exactly one state per worker, which is what [`prepare_workers`] made.
fn take_prepared<S>(states: Vec<S>) -> impl FnMut(WorkerId) -> S {
    let mut states = states.into_iter();

    move |worker| {
        states
            .next()
            .unwrap_or_else(|| panic!("no prepared state for worker {worker}"))
    }
}

/// The per-worker variant of `base`: the worker number (counting from 1) appended to the file
/// name, so `/mnt/data/file` becomes `/mnt/data/file1` for the first worker.
fn numbered_path(base: &Path, worker_index: usize) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(worker_index.saturating_add(1).to_string());
    PathBuf::from(path)
}

/// The byte a worker fills its write buffers with. Stable for a given worker index.
fn fill_byte(worker_index: usize) -> u8 {
    let mut seed = Seed::new(NonZero::<u64>::MIN.saturating_add(worker_index as u64));
    seed.advance().to_le_bytes()[0]
}
