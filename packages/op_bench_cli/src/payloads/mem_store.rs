use argh::FromArgs;
use memmap2::{MmapMut, MmapOptions};
use op_bench::{Engine, RunOutcome};
use tracing::debug;

use crate::payloads::memory::{self, AccessMode, BlockCursor};
use crate::payloads::{fill_byte, prepare_workers, take_prepared};
use crate::{Error, Result};

/// Mapping offsets must be aligned to this.
const PAGE_SIZE: u64 = 4096;

/// store a private buffer into blocks of a memory-mapped file
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "mem-store")]
pub(crate) struct MemStoreArgs {
    /// block selection: rnd or seq (default seq)
    #[argh(option, default = "AccessMode::Sequential")]
    mode: AccessMode,

    /// bytes stored by one operation, a multiple of 64 (default 64)
    #[argh(option, default = "memory::CACHE_LINE")]
    access_size: u64,

    /// flush every stored block to the backing file before the operation completes
    #[argh(switch)]
    flush: bool,
}

#[derive(Debug)]
struct Storer {
    region: MmapMut,
    cursor: BlockCursor,
    buffer: Box<[u8]>,
}

/// The backing file is created (it must not exist) with the footprint as its size. Every worker
/// maps its own page-aligned, disjoint slice of it writable and stores only there.
pub(super) fn run(engine: &Engine, args: &MemStoreArgs) -> Result<RunOutcome> {
    let config = engine.config();
    let len = memory::validate(config, args.access_size)?;
    let path = config.require_file()?;

    let threads = config.thread_count().get() as u64;
    let slice_len = len / threads / PAGE_SIZE * PAGE_SIZE;

    if slice_len < args.access_size {
        return Err(Error::InvalidOption(format!(
            "--access-size {} does not fit the {slice_len} bytes available to each of {threads} workers",
            args.access_size
        )));
    }

    let blocks = slice_len / args.access_size;
    let access_size = usize::try_from(args.access_size).map_err(|e| {
        Error::InvalidOption(format!("--access-size {}: {e}", args.access_size))
    })?;
    let map_len = usize::try_from(slice_len)
        .map_err(|e| Error::InvalidOption(format!("footprint slice {slice_len}: {e}")))?;

    let file = memory::create_backing_file(path, len)?;

    let storers = prepare_workers(config, |index| {
        let offset = (index as u64).saturating_mul(slice_len);

        // SAFETY: The file was created exclusively by this process and nothing truncates it
        // while the mapping exists. Worker slices do not overlap, so no two mappings alias.
        let region = unsafe {
            MmapOptions::new()
                .offset(offset)
                .len(map_len)
                .map_mut(&file)
        }
        .map_err(Error::io(path))?;

        debug!(path = %path.display(), offset, len = slice_len, "mapped backing file slice for storing");

        Ok(Storer {
            region,
            cursor: BlockCursor::new(args.mode, blocks),
            buffer: vec![fill_byte(index); access_size].into_boxed_slice(),
        })
    })?;

    let flush = args.flush;

    Ok(engine.run_ops_per_worker(take_prepared(storers), |worker, storer, seed| {
        let block = storer.cursor.advance(seed);
        let offset = store_block(&mut storer.region, block, &storer.buffer);

        if flush {
            if let Err(error) = storer.region.flush_range(offset, storer.buffer.len()) {
                debug!(%worker, %error, "flush failed, abandoning operation");
            }
        }
    }))
}

/// Copies `buffer` into block `block` of `region`; blocks are `buffer.len()` bytes long.
/// Returns the byte offset of the block.
fn store_block(region: &mut [u8], block: u64, buffer: &[u8]) -> usize {
    let start = usize::try_from(block)
        .unwrap_or(usize::MAX)
        .saturating_mul(buffer.len());

    #[expect(
        clippy::indexing_slicing,
        reason = "block indexes are below the region's block count"
    )]
    let target = &mut region[start..start.saturating_add(buffer.len())];

    target.copy_from_slice(buffer);
    start
}

#[cfg(test)]
#[cfg(not(miri))] // Real files and mappings.
mod tests {
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom};

    use op_bench::{Config, Footprint};

    use super::*;

    fn read_at(path: &std::path::Path, offset: u64, len: usize) -> Vec<u8> {
        let mut file = File::open(path).unwrap();
        file.seek(SeekFrom::Start(offset)).unwrap();

        let mut data = vec![0; len];
        file.read_exact(&mut data).unwrap();
        data
    }

    #[test]
    fn store_block_writes_the_right_block() {
        let mut region = vec![0_u8; 256];

        let offset = store_block(&mut region, 3, &[7; 64]);

        assert_eq!(offset, 192);
        assert!(region[..192].iter().all(|byte| *byte == 0));
        assert!(region[192..].iter().all(|byte| *byte == 7));
    }

    #[test]
    fn workers_store_into_their_own_slices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heap");

        let engine = Engine::new(
            Config::builder("DAX/ST", "test")
                .threads(2)
                .max_operations(20)
                .footprint(memory::MIN_FOOTPRINT)
                .file(&path)
                .build()
                .unwrap(),
        );

        let args = MemStoreArgs {
            mode: AccessMode::Sequential,
            access_size: 128,
            flush: true,
        };

        let outcome = run(&engine, &args).unwrap();
        assert_eq!(outcome.total_operations(), 20);

        let slice_len = memory::MIN_FOOTPRINT.bytes() / 2;

        // Sequential stores begin at the first block of each worker's slice.
        for (index, offset) in [(0, 0), (1, slice_len)] {
            let stored = read_at(&path, offset, 128);
            assert!(stored.iter().all(|byte| *byte == fill_byte(index)));
        }

        // Ten operations per worker fill exactly ten blocks; the next block is untouched.
        assert!(read_at(&path, 10 * 128, 128).iter().all(|byte| *byte == 0));
    }

    #[test]
    fn random_stores_stay_in_bounds() {
        let dir = tempfile::tempdir().unwrap();

        let engine = Engine::new(
            Config::builder("DAX/ST", "test")
                .threads(3)
                .max_operations(3000)
                .footprint(Footprint::from_mib(64))
                .file(dir.path().join("heap"))
                .build()
                .unwrap(),
        );

        let args = MemStoreArgs {
            mode: AccessMode::Random,
            access_size: 64,
            flush: false,
        };

        let outcome = run(&engine, &args).unwrap();
        assert_eq!(outcome.total_operations(), 3000);
    }
}
