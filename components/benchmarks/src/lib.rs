//! Micro-benchmark runner for JavaScript engines
//!
//! Benchmark scripts declare `function testXxx()` entry points. Each script
//! runs once per engine execution with a driver that warms up and times
//! every entry point inside the engine, so process startup never lands in
//! the measurement.
//!
//! # Examples
//!
//! ```rust,no_run
//! use benchmarks::{BenchOptions, BenchmarkRunner, BenchmarkSuite};
//! use fixture_harness::ProcessEngine;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(ProcessEngine::from_command("rhino", Vec::new()));
//! let runner = BenchmarkRunner::new(engine, BenchOptions::default()).unwrap();
//! let suite = BenchmarkSuite::discover(Path::new("testsrc/benchmarks/micro")).unwrap();
//! for result in runner.run_suite(&suite) {
//!     println!("{}: {:.2}ms", result.name, result.duration_ms);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod runner;
pub mod script;

pub use error::BenchError;
pub use runner::{BenchOptions, BenchmarkResult, BenchmarkRunner, BenchmarkSuite};
pub use script::{BenchmarkScript, Iterations};
