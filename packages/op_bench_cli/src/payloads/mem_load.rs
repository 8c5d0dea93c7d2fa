use std::hint::black_box;

use argh::FromArgs;
use memmap2::Mmap;
use op_bench::{Engine, RunOutcome};
use tracing::debug;

use crate::payloads::memory::{self, AccessMode, BlockCursor};
use crate::payloads::{prepare_workers, take_prepared};
use crate::{Error, Result};

/// load blocks from a memory-mapped file into a private buffer
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "mem-load")]
pub(crate) struct MemLoadArgs {
    /// block selection: rnd or seq (default seq)
    #[argh(option, default = "AccessMode::Sequential")]
    mode: AccessMode,

    /// bytes loaded by one operation, a multiple of 64 (default 64)
    #[argh(option, default = "memory::CACHE_LINE")]
    access_size: u64,
}

#[derive(Debug)]
struct Loader {
    cursor: BlockCursor,
    buffer: Box<[u8]>,
}

/// The backing file is created (it must not exist) with the footprint as its size and mapped
/// read-only. All workers load from the whole mapping.
pub(super) fn run(engine: &Engine, args: &MemLoadArgs) -> Result<RunOutcome> {
    let config = engine.config();
    let len = memory::validate(config, args.access_size)?;
    let path = config.require_file()?;

    let file = memory::create_backing_file(path, len)?;

    // SAFETY: The file was created exclusively by this process a moment ago and nothing
    // truncates it while the mapping exists.
    let map = unsafe { Mmap::map(&file) }.map_err(Error::io(path))?;

    let blocks = len / args.access_size;
    let access_size = usize::try_from(args.access_size).map_err(|e| {
        Error::InvalidOption(format!("--access-size {}: {e}", args.access_size))
    })?;

    debug!(path = %path.display(), len, blocks, "mapped backing file for loading");

    let loaders = prepare_workers(config, |_| {
        Ok(Loader {
            cursor: BlockCursor::new(args.mode, blocks),
            buffer: vec![0; access_size].into_boxed_slice(),
        })
    })?;

    let map = &*map;

    Ok(engine.run_ops_per_worker(take_prepared(loaders), |_, loader, seed| {
        let block = loader.cursor.advance(seed);
        load_block(map, block, &mut loader.buffer);
        black_box(&loader.buffer);
    }))
}

/// Copies block `block` of `region` into `buffer`; blocks are `buffer.len()` bytes long.
fn load_block(region: &[u8], block: u64, buffer: &mut [u8]) {
    let start = usize::try_from(block)
        .unwrap_or(usize::MAX)
        .saturating_mul(buffer.len());

    #[expect(
        clippy::indexing_slicing,
        reason = "block indexes are below the region's block count"
    )]
    let source = &region[start..start.saturating_add(buffer.len())];

    buffer.copy_from_slice(source);
}
