use std::fs::File;
use std::hint::black_box;
use std::io::{self, Read, Seek, SeekFrom};

use argh::FromArgs;
use op_bench::{Engine, Footprint, RunOutcome};
use tracing::debug;

use crate::payloads::{numbered_path, prepare_workers, take_prepared};
use crate::{Error, Result};

/// Bytes in one cache line; the reader touches one word per line.
const CACHE_LINE: usize = 64;

/// read a file in fixed-size blocks, one file per worker
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "file-read")]
pub(crate) struct FileReadArgs {
    /// bytes read by one operation (default 2GB)
    #[argh(option, default = "Footprint::from_mib(2048)")]
    file_size: Footprint,

    /// bytes read by one read call (default 4KB)
    #[argh(option, default = "Footprint::from_kib(4)")]
    block_size: Footprint,

    /// read the blocks from the end of the file towards the start
    #[argh(switch)]
    backward: bool,
}

#[derive(Debug)]
struct Reader {
    file: File,
    block: Box<[u8]>,
}

/// Worker `i` reads `<file><i+1>`, which must already exist and is opened before timing
/// starts. Every operation reads from the start (or the end, going backward) of the file.
pub(super) fn run(engine: &Engine, args: &FileReadArgs) -> Result<RunOutcome> {
    let config = engine.config();
    let base = config.require_file()?;

    if args.block_size.bytes() == 0 {
        return Err(Error::InvalidOption("--block-size must not be zero".to_string()));
    }

    let block_size = usize::try_from(args.block_size.bytes())
        .map_err(|e| Error::InvalidOption(format!("--block-size {}: {e}", args.block_size)))?;
    let file_size = args.file_size.bytes();
    let backward = args.backward;

    let readers = prepare_workers(config, |index| {
        let path = numbered_path(base, index);
        let file = File::open(&path).map_err(Error::io(&path))?;

        debug!(path = %path.display(), "opened file for reading");

        Ok(Reader {
            file,
            block: vec![0; block_size].into_boxed_slice(),
        })
    })?;

    Ok(engine.run_ops_per_worker(take_prepared(readers), |worker, reader, _| {
        let result = if backward {
            read_backward(reader, file_size)
        } else {
            read_forward(reader, file_size)
        };

        match result {
            Ok(checksum) => {
                black_box(checksum);
            }
            Err(error) => debug!(%worker, %error, "read failed, abandoning operation"),
        }
    }))
}

fn chunk_len(remaining: u64, block: &[u8]) -> usize {
    usize::try_from(remaining).map_or(block.len(), |remaining| remaining.min(block.len()))
}

/// Reads up to `remaining` bytes from the start of the file, stopping early at end of file.
fn read_forward(reader: &mut Reader, mut remaining: u64) -> io::Result<u64> {
    reader.file.seek(SeekFrom::Start(0))?;

    let mut checksum = 0_u64;

    while remaining > 0 {
        let len = chunk_len(remaining, &reader.block);

        #[expect(
            clippy::indexing_slicing,
            reason = "len is capped at the block length"
        )]
        let chunk = &mut reader.block[..len];

        let read = reader.file.read(chunk)?;
        if read == 0 {
            break;
        }

        #[expect(
            clippy::indexing_slicing,
            reason = "read never exceeds the buffer it was given"
        )]
        let data = &chunk[..read];

        checksum = checksum.wrapping_add(crunch(data));
        remaining = remaining.saturating_sub(len as u64);
    }

    Ok(checksum)
}

/// Reads the first `remaining` bytes of the file block by block, last block first.
fn read_backward(reader: &mut Reader, mut remaining: u64) -> io::Result<u64> {
    let mut checksum = 0_u64;

    while remaining > 0 {
        let len = chunk_len(remaining, &reader.block);
        let offset = remaining.saturating_sub(len as u64);

        reader.file.seek(SeekFrom::Start(offset))?;

        #[expect(
            clippy::indexing_slicing,
            reason = "len is capped at the block length"
        )]
        let chunk = &mut reader.block[..len];

        let read = reader.file.read(chunk)?;
        if read == 0 {
            break;
        }

        #[expect(
            clippy::indexing_slicing,
            reason = "read never exceeds the buffer it was given"
        )]
        let data = &chunk[..read];

        checksum = checksum.wrapping_add(crunch(data));
        remaining = offset;
    }

    Ok(checksum)
}

/// Sums the first word of every whole cache line in `data`, so the reader actually touches
/// what it read.
fn crunch(data: &[u8]) -> u64 {
    data.chunks_exact(CACHE_LINE)
        .filter_map(|line| line.first_chunk::<8>())
        .fold(0_u64, |sum, word| sum.wrapping_add(u64::from_le_bytes(*word)))
}
