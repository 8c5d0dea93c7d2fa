use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::result;
use std::str::FromStr;

use argh::FromArgs;
use op_bench::{Engine, RunOutcome};
use tracing::debug;

use crate::payloads::{fill_byte, prepare_workers, take_prepared};
use crate::{Error, Result};

/// Bytes written to each file by [`FileOp::CreateWrite`].
const PAGE_SIZE: usize = 4096;

/// The metadata operation applied to every file of a worker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum FileOp {
    /// Create each file (opening it if it already exists).
    Create,
    /// Create each file and write one page to it.
    CreateWrite,
    /// Move each file into the worker's directory under the new directory root.
    Rename,
}

impl FromStr for FileOp {
    type Err = String;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "create-write" => Ok(Self::CreateWrite),
            "rename" => Ok(Self::Rename),
            _ => Err(format!(
                "Invalid file operation: '{s}'. Valid options are: create, create-write, rename"
            )),
        }
    }
}

/// create, write or rename a set of files, one directory per worker
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "file-ops")]
pub(crate) struct FileOpsArgs {
    /// operation applied to each file (create, create-write, rename; default create)
    #[argh(option, default = "FileOp::Create")]
    op: FileOp,

    /// number of files each worker handles per operation (default 1)
    #[argh(option, default = "1")]
    files: u64,

    /// directory root that renamed files move into (default: the --file directory)
    #[argh(option)]
    new_dir: Option<PathBuf>,
}

/// The files one worker owns: `file<k>` in its own directory for its own range of `k`.
#[derive(Debug)]
struct FileSet {
    dir: PathBuf,
    new_dir: PathBuf,
    first: u64,
    count: u64,
    page: Box<[u8]>,
}

impl FileSet {
    fn file(&self, k: u64) -> PathBuf {
        self.dir.join(format!("file{k}"))
    }

    fn renamed(&self, k: u64) -> PathBuf {
        self.new_dir.join(format!("f{k}"))
    }

    fn indexes(&self) -> impl Iterator<Item = u64> {
        (0..self.count).map(|offset| self.first.saturating_add(offset))
    }
}

/// The `--file` path is the directory root: worker `i` works in `<root>/dir<i+1>` on files
/// `file<k>` for `k` in `i*n+1 ..= i*n+n`. The directories are created before timing starts.
pub(super) fn run(engine: &Engine, args: &FileOpsArgs) -> Result<RunOutcome> {
    let config = engine.config();
    let root = config.require_file()?;
    let new_root = args.new_dir.as_deref().unwrap_or(root);
    let op = args.op;

    let sets = prepare_workers(config, |index| {
        let name = format!("dir{}", index.saturating_add(1));

        let set = FileSet {
            dir: root.join(&name),
            new_dir: new_root.join(&name),
            first: (index as u64).saturating_mul(args.files).saturating_add(1),
            count: args.files,
            page: vec![fill_byte(index); PAGE_SIZE].into_boxed_slice(),
        };

        create_dir(&set.dir)?;

        if op == FileOp::Rename {
            create_dir(&set.new_dir)?;
        }

        Ok(set)
    })?;

    Ok(engine.run_ops_per_worker(take_prepared(sets), |worker, set, _| {
        let result = match op {
            FileOp::Create => create_files(set, false),
            FileOp::CreateWrite => create_files(set, true),
            FileOp::Rename => rename_files(set),
        };

        if let Err(error) = result {
            debug!(%worker, %error, ?op, "file operation failed, abandoning operation");
        }
    }))
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(Error::io(dir))
}

fn create_files(set: &FileSet, write_page: bool) -> io::Result<()> {
    for k in set.indexes() {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(set.file(k))?;

        if write_page {
            file.write_all(&set.page)?;
        }
    }

    Ok(())
}

fn rename_files(set: &FileSet) -> io::Result<()> {
    for k in set.indexes() {
        fs::rename(set.file(k), set.renamed(k))?;
    }

    Ok(())
}

#[cfg(test)]
#[cfg(not(miri))] // Real files.
mod tests {
    use op_bench::Config;

    use super::*;

    fn engine(root: &Path, threads: usize, operations: u64) -> Engine {
        Engine::new(
            Config::builder("fileOps", "test")
                .threads(threads)
                .max_operations(operations)
                .file(root)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn parses_operations() {
        assert_eq!("create".parse::<FileOp>().unwrap(), FileOp::Create);
        assert_eq!("Create-Write".parse::<FileOp>().unwrap(), FileOp::CreateWrite);
        assert_eq!("rename".parse::<FileOp>().unwrap(), FileOp::Rename);
        assert!("delete".parse::<FileOp>().is_err());
    }

    #[test]
    fn create_gives_each_worker_its_own_files() {
        let root = tempfile::tempdir().unwrap();

        let args = FileOpsArgs {
            op: FileOp::Create,
            files: 3,
            new_dir: None,
        };

        let outcome = run(&engine(root.path(), 2, 2), &args).unwrap();
        assert_eq!(outcome.total_operations(), 2);

        for k in 1..=3 {
            assert!(root.path().join("dir1").join(format!("file{k}")).is_file());
        }

        for k in 4..=6 {
            assert!(root.path().join("dir2").join(format!("file{k}")).is_file());
        }

        assert!(!root.path().join("dir1").join("file4").exists());
    }

    #[test]
    fn create_write_writes_one_page() {
        let root = tempfile::tempdir().unwrap();

        let args = FileOpsArgs {
            op: FileOp::CreateWrite,
            files: 2,
            new_dir: None,
        };

        let _outcome = run(&engine(root.path(), 1, 1), &args).unwrap();

        let contents = fs::read(root.path().join("dir1").join("file2")).unwrap();
        assert_eq!(contents.len(), PAGE_SIZE);
        assert!(contents.iter().all(|byte| *byte == fill_byte(0)));
    }

    #[test]
    fn rename_moves_files_to_new_root() {
        let root = tempfile::tempdir().unwrap();
        let new_root = tempfile::tempdir().unwrap();

        let create = FileOpsArgs {
            op: FileOp::Create,
            files: 2,
            new_dir: None,
        };
        let _outcome = run(&engine(root.path(), 2, 2), &create).unwrap();

        let rename = FileOpsArgs {
            op: FileOp::Rename,
            files: 2,
            new_dir: Some(new_root.path().to_path_buf()),
        };
        let _outcome = run(&engine(root.path(), 2, 2), &rename).unwrap();

        assert!(!root.path().join("dir1").join("file1").exists());
        assert!(new_root.path().join("dir1").join("f1").is_file());
        assert!(new_root.path().join("dir1").join("f2").is_file());
        assert!(new_root.path().join("dir2").join("f3").is_file());
        assert!(new_root.path().join("dir2").join("f4").is_file());
    }

    #[test]
    fn repeated_rename_fails_quietly() {
        let root = tempfile::tempdir().unwrap();

        let create = FileOpsArgs {
            op: FileOp::Create,
            files: 1,
            new_dir: None,
        };
        let _outcome = run(&engine(root.path(), 1, 1), &create).unwrap();

        let rename = FileOpsArgs {
            op: FileOp::Rename,
            files: 1,
            new_dir: None,
        };

        // Only the first operation finds the file; the rest abandon and still count.
        let outcome = run(&engine(root.path(), 1, 3), &rename).unwrap();
        assert_eq!(outcome.total_operations(), 3);
        assert!(root.path().join("dir1").join("f1").is_file());
    }
}
