use std::fs::{File, OpenOptions};
use std::io::{self, Write};

use argh::FromArgs;
use op_bench::{Engine, Footprint, RunOutcome};
use tracing::debug;

use crate::payloads::{fill_byte, numbered_path, prepare_workers, take_prepared};
use crate::{Error, Result};

/// write a file sequentially in fixed-size blocks, one file per worker
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "file-write")]
pub(crate) struct FileWriteArgs {
    /// bytes written by one operation (default 2GB)
    #[argh(option, default = "Footprint::from_mib(2048)")]
    file_size: Footprint,

    /// bytes written by one write call (default 4KB)
    #[argh(option, default = "Footprint::from_kib(4)")]
    block_size: Footprint,
}

#[derive(Debug)]
struct Writer {
    file: File,
    block: Box<[u8]>,
}

/// Worker `i` appends to `<file><i+1>`, which is opened (and created if needed) before timing
/// starts. Successive operations keep extending the file.
pub(super) fn run(engine: &Engine, args: &FileWriteArgs) -> Result<RunOutcome> {
    let config = engine.config();
    let base = config.require_file()?;

    if args.block_size.bytes() == 0 {
        return Err(Error::InvalidOption("--block-size must not be zero".to_string()));
    }

    let block_size = usize::try_from(args.block_size.bytes())
        .map_err(|e| Error::InvalidOption(format!("--block-size {}: {e}", args.block_size)))?;
    let file_size = args.file_size.bytes();

    let writers = prepare_workers(config, |index| {
        let path = numbered_path(base, index);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(Error::io(&path))?;

        debug!(path = %path.display(), "opened file for writing");

        Ok(Writer {
            file,
            block: vec![fill_byte(index); block_size].into_boxed_slice(),
        })
    })?;

    Ok(engine.run_ops_per_worker(take_prepared(writers), |worker, writer, _| {
        if let Err(error) = write_forward(writer, file_size) {
            debug!(%worker, %error, "write failed, abandoning operation");
        }
    }))
}

/// Writes `remaining` bytes in block-sized chunks, the last chunk possibly shorter.
fn write_forward(writer: &mut Writer, mut remaining: u64) -> io::Result<()> {
    while remaining > 0 {
        let len = usize::try_from(remaining).map_or(writer.block.len(), |remaining| {
            remaining.min(writer.block.len())
        });

        #[expect(
            clippy::indexing_slicing,
            reason = "len is capped at the block length"
        )]
        let chunk = &writer.block[..len];

        writer.file.write_all(chunk)?;

        remaining = remaining.saturating_sub(len as u64);
    }

    Ok(())
}

#[cfg(test)]
#[cfg(not(miri))] // Real files.
mod tests {
    use std::fs;

    use op_bench::Config;

    use super::*;

    #[test]
    fn each_worker_extends_its_own_file() {
        let dir = tempfile::tempdir().unwrap();

        let engine = Engine::new(
            Config::builder("write", "test")
                .threads(2)
                .max_operations(6)
                .file(dir.path().join("data"))
                .build()
                .unwrap(),
        );

        let args = FileWriteArgs {
            file_size: Footprint::from_kib(10),
            block_size: Footprint::from_kib(4),
        };

        let outcome = run(&engine, &args).unwrap();
        assert_eq!(outcome.total_operations(), 6);

        for index in 0..2 {
            let contents = fs::read(dir.path().join(format!("data{}", index + 1))).unwrap();

            // Three operations of 10 KiB each.
            assert_eq!(contents.len(), 3 * 10 * 1024);
            assert!(contents.iter().all(|byte| *byte == fill_byte(index)));
        }
    }

    #[test]
    fn file_is_required() {
        let engine = Engine::new(
            Config::builder("write", "test")
                .max_operations(1)
                .build()
                .unwrap(),
        );

        let args = FileWriteArgs {
            file_size: Footprint::from_kib(4),
            block_size: Footprint::from_kib(4),
        };

        assert!(matches!(
            run(&engine, &args),
            Err(Error::Config(op_bench::ConfigError::MissingFile))
        ));
    }

    #[test]
    fn unopenable_file_fails_before_running() {
        let dir = tempfile::tempdir().unwrap();

        let engine = Engine::new(
            Config::builder("write", "test")
                .max_operations(1)
                .file(dir.path().join("missing").join("data"))
                .build()
                .unwrap(),
        );

        let args = FileWriteArgs {
            file_size: Footprint::from_kib(4),
            block_size: Footprint::from_kib(4),
        };

        assert!(matches!(run(&engine, &args), Err(Error::Io { .. })));
        assert_eq!(engine.completed(), 0);
    }
}
