use std::fmt;
use std::io::{self, Write};
use std::num::NonZero;
use std::time::Duration;

/// The aggregate result of a benchmark run, rendered as a two-line tab-separated table.
///
/// # Examples
///
/// ```
/// use op_bench::{Config, Engine};
///
/// let engine = Engine::new(
///     Config::builder("gsps", "laptop")
///         .threads(2)
///         .max_operations(1000)
///         .build()
///         .unwrap(),
/// );
///
/// let _outcome = engine.run_ops(&(), |_, _, _| {});
///
/// let mut output = Vec::new();
/// engine.report().write_to(&mut output).unwrap();
///
/// let output = String::from_utf8(output).unwrap();
/// let mut lines = output.lines();
/// assert_eq!(lines.next(), Some("Bench\tConfig\tRunTime\tOperations\tThreads\topsPerSec"));
/// assert!(lines.next().unwrap().starts_with("gsps\tlaptop\t"));
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct Report {
    system: String,
    name: String,
    elapsed: Duration,
    operations: i64,
    threads: NonZero<usize>,
}

impl Report {
    /// The header line of the table, without the trailing newline.
    pub const HEADER: &'static str = "Bench\tConfig\tRunTime\tOperations\tThreads\topsPerSec";

    pub(crate) fn new(
        system: String,
        name: String,
        elapsed: Duration,
        operations: i64,
        threads: NonZero<usize>,
    ) -> Self {
        Self {
            system,
            name,
            elapsed,
            operations,
            threads,
        }
    }

    /// The system label of the benchmark.
    #[must_use]
    pub fn system(&self) -> &str {
        &self.system
    }

    /// The configuration name of the benchmark.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The duration of the timed portion of the run.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The total number of completed operations.
    #[must_use]
    pub fn operations(&self) -> i64 {
        self.operations
    }

    /// The number of worker threads.
    #[must_use]
    pub fn threads(&self) -> NonZero<usize> {
        self.threads
    }

    /// Completed operations per second of elapsed time.
    ///
    /// A zero elapsed time yields a non-finite value rather than an error.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "throughput is an approximate figure by nature"
    )]
    pub fn ops_per_sec(&self) -> f64 {
        self.operations as f64 / self.elapsed.as_secs_f64()
    }

    /// Writes the header and data lines to `out`.
    ///
    /// # Errors
    ///
    /// Returns any error reported by the output sink.
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        write!(out, "{self}")?;
        out.flush()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", Self::HEADER)?;
        writeln!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.system,
            self.name,
            self.elapsed.as_secs_f64(),
            self.operations,
            self.threads,
            self.ops_per_sec()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(elapsed: Duration, operations: i64) -> Report {
        Report::new(
            "write".to_string(),
            "ssd".to_string(),
            elapsed,
            operations,
            NonZero::new(4).unwrap(),
        )
    }

    #[test]
    fn renders_header_and_row() {
        let rendered = report(Duration::from_millis(2500), 1000).to_string();

        assert_eq!(
            rendered,
            "Bench\tConfig\tRunTime\tOperations\tThreads\topsPerSec\n\
             write\tssd\t2.5\t1000\t4\t400\n"
        );
    }

    #[test]
    fn ops_per_sec_divides_by_seconds() {
        let report = report(Duration::from_secs(4), 200);

        assert!((report.ops_per_sec() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_elapsed_is_not_finite() {
        let report = report(Duration::ZERO, 10);

        assert!(!report.ops_per_sec().is_finite());
    }

    #[test]
    fn write_to_matches_display() {
        let report = report(Duration::from_secs(1), 7);
        let mut out = Vec::new();

        report.write_to(&mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), report.to_string());
    }
}
