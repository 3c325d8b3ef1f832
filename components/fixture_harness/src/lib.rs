//! Fixture Harness
//!
//! Loads JavaScript fixtures (with their `load()` dependencies), runs each
//! one in a fresh environment of an external engine seeded with the
//! assertion primitives the fixtures expect, and grades the outcome.
//!
//! ```rust,no_run
//! use fixture_harness::{HarnessConfig, ProcessEngine, TestRunner};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = HarnessConfig::default();
//! let engine = Arc::new(ProcessEngine::new(config.engine.clone()));
//! let runner = TestRunner::new(config, engine).unwrap();
//! let report = runner.run(Path::new("tests/testsrc/jstests"));
//! println!("{}", report.summary());
//! ```

pub mod assertions;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod fixture;
pub mod loader;
pub mod logging;
pub mod process;
pub mod report;
pub mod result;
pub mod runner;

pub use assertions::{
    AssertionLibrary, AssertionMismatch, GlobalBindings, Program, ProgramSegment, HARNESS_PRELUDE,
};
pub use config::{EngineConfig, Gate, HarnessConfig};
pub use engine::{
    CompletionValue, EngineAdapter, EngineOutcome, ExecutionLimits, ExecutionLog, ThrownException,
};
pub use error::{ConfigError, EngineError, LoadError};
pub use filter::{Glob, SkipList};
pub use fixture::{Expectation, Fixture, FixtureMetadata};
pub use loader::{LoadedScript, ScriptLoader, Segment};
pub use process::ProcessEngine;
pub use report::{Report, ReportBuilder, ReportEntry, ReportFormat};
pub use result::{CrashReason, ErrorCause, ExecutionResult, FailureReason};
pub use runner::{DiscoveredFixture, TestRunner};
