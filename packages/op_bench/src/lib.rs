#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Multi-threaded microbenchmark execution engine.
//!
//! This package runs a caller-supplied operation ("payload") on N worker threads, either for a
//! fixed wall-clock duration or for a fixed total number of operations, counts the completed
//! operations and reports throughput. The payload is a closure; everything it touches (memory
//! regions, files, arrays) is its own business.
//!
//! The core functionality includes:
//! - [`Config`] - The run configuration: thread count, duration or operation count, footprint,
//!   backing file and benchmark labels.
//! - [`Engine`] - Spawns the workers, drives them through the run protocol and tallies results.
//! - [`Report`] - The tab-separated summary of a run.
//! - [`Barrier`], [`ProgressCounter`] and [`Deadline`] - The synchronization, counting and timing
//!   primitives the engine is built from.
//!
//! # Operating principles
//!
//! ## Run modes
//!
//! In duration mode, every worker invokes the payload in a loop until the deadline passes. The
//! deadline is checked between payload calls, so an in-flight call always runs to completion.
//!
//! In operation count mode, the count is divided evenly between the workers and each worker
//! invokes the payload exactly its share of times. The remainder of an uneven division is not
//! executed.
//!
//! ## Timing
//!
//! Timing starts when every worker has been created, immediately before the first payload call.
//! A driver may suspend timing (for example around a setup phase) with
//! [`Engine::suspend_timing()`]; while suspended, the deadline cannot expire.
//!
//! ## Seeds
//!
//! Every worker receives its own non-zero [`Seed`], a cheap pseudo-random generator the payload
//! can use to pick random locations without coordinating with other workers.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use op_bench::{Config, Engine};
//!
//! let config = Config::builder("test", "example")
//!     .threads(2)
//!     .run_time(Duration::from_millis(50))
//!     .build()
//!     .unwrap();
//!
//! let engine = Engine::new(config);
//!
//! // Each operation advances the worker's private generator once.
//! let _outcome = engine.run_ops(&(), |_worker, _context, seed| {
//!     seed.advance();
//! });
//!
//! let report = engine.report();
//! assert!(report.elapsed() >= Duration::from_millis(50));
//! print!("{report}");
//! ```

mod barrier;
mod config;
mod deadline;
mod engine;
mod error;
mod footprint;
#[cfg(unix)]
mod interrupt;
mod progress;
mod report;
mod seed;
mod worker;

pub use barrier::*;
pub use config::*;
pub use deadline::*;
pub use engine::*;
pub use error::*;
pub use footprint::*;
#[cfg(unix)]
pub use interrupt::*;
pub use progress::*;
pub use report::*;
pub use seed::*;
pub use worker::*;
