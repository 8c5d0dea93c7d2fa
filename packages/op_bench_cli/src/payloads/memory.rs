//! Shared rules of the memory-mapped payloads.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::result;
use std::str::FromStr;

use op_bench::{Config, Footprint, Seed};
use rand::Rng;

use crate::{Error, Result};

/// The smallest footprint a memory-mapped payload accepts.
pub(super) const MIN_FOOTPRINT: Footprint = Footprint::from_mib(64);

/// Accesses are whole cache lines.
pub(super) const CACHE_LINE: u64 = 64;

/// How the next block to access is chosen.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) enum AccessMode {
    /// A uniformly random block.
    Random,
    /// The block after the previous one, wrapping around at the end.
    #[default]
    Sequential,
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rnd" => Ok(Self::Random),
            "seq" => Ok(Self::Sequential),
            _ => Err(format!(
                "Access mode not supported: '{s}'. Valid options are: rnd, seq"
            )),
        }
    }
}

/// Picks the block index of every access within a region of `blocks` blocks.
#[derive(Debug)]
pub(super) struct BlockCursor {
    mode: AccessMode,
    blocks: u64,
    next: u64,
}

impl BlockCursor {
    pub(super) fn new(mode: AccessMode, blocks: u64) -> Self {
        assert!(blocks > 0, "a region must hold at least one block");

        Self {
            mode,
            blocks,
            next: 0,
        }
    }

    /// The index of the block to access next.
    pub(super) fn advance(&mut self, seed: &mut Seed) -> u64 {
        match self.mode {
            AccessMode::Random => seed.random_range(0..self.blocks),
            AccessMode::Sequential => {
                let block = self.next;
                self.next = block.saturating_add(1) % self.blocks;
                block
            }
        }
    }
}

/// Checks the payload's footprint and access size rules and returns the footprint in bytes.
pub(super) fn validate(config: &Config, access_size: u64) -> Result<u64> {
    let footprint = config.require_footprint(MIN_FOOTPRINT)?;

    if access_size == 0 || access_size % CACHE_LINE != 0 {
        return Err(Error::InvalidOption(format!(
            "--access-size {access_size} is not a positive multiple of {CACHE_LINE} bytes"
        )));
    }

    if access_size > footprint.bytes() {
        return Err(Error::InvalidOption(format!(
            "--access-size {access_size} exceeds the footprint of {footprint}"
        )));
    }

    Ok(footprint.bytes())
}

/// Creates the backing file, which must not exist yet, and sizes it to `len` bytes.
pub(super) fn create_backing_file(path: &Path, len: u64) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(Error::io(path))?;

    file.set_len(len).map_err(Error::io(path))?;

    Ok(file)
}

#[cfg(test)]
mod tests {
    use std::num::NonZero;

    use op_bench::ConfigError;

    use super::*;

    fn config(footprint: Footprint) -> Config {
        Config::builder("DAX", "test")
            .max_operations(1)
            .footprint(footprint)
            .build()
            .unwrap()
    }

    #[test]
    fn parses_access_modes() {
        assert_eq!("rnd".parse::<AccessMode>().unwrap(), AccessMode::Random);
        assert_eq!("SEQ".parse::<AccessMode>().unwrap(), AccessMode::Sequential);
        assert!("stride".parse::<AccessMode>().is_err());
    }

    #[test]
    fn sequential_cursor_wraps() {
        let mut seed = Seed::new(NonZero::new(1).unwrap());
        let mut cursor = BlockCursor::new(AccessMode::Sequential, 3);

        let blocks = (0..7).map(|_| cursor.advance(&mut seed)).collect::<Vec<_>>();

        assert_eq!(blocks, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn random_cursor_stays_in_range() {
        let mut seed = Seed::new(NonZero::new(99).unwrap());
        let mut cursor = BlockCursor::new(AccessMode::Random, 5);

        assert!((0..1000).all(|_| cursor.advance(&mut seed) < 5));
    }

    #[test]
    fn footprint_below_minimum_is_refused() {
        let result = validate(&config(Footprint::from_mib(1)), CACHE_LINE);

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::FootprintTooSmall { .. }))
        ));
    }

    #[test]
    fn access_size_must_be_whole_cache_lines() {
        let config = config(MIN_FOOTPRINT);

        assert_eq!(validate(&config, 256).unwrap(), MIN_FOOTPRINT.bytes());
        assert!(matches!(validate(&config, 100), Err(Error::InvalidOption(_))));
        assert!(matches!(validate(&config, 0), Err(Error::InvalidOption(_))));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot create files")]
    fn backing_file_is_created_exclusively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heap");

        let file = create_backing_file(&path, 8192).unwrap();
        assert_eq!(file.metadata().unwrap().len(), 8192);

        assert!(matches!(
            create_backing_file(&path, 8192),
            Err(Error::Io { .. })
        ));
    }
}
