//! Errors raised while preparing or running benchmark scripts

use fixture_harness::{EngineError, LoadError};
use std::path::PathBuf;
use thiserror::Error;

/// Benchmark failure that prevents a script from producing results
#[derive(Debug, Error)]
pub enum BenchError {
    /// The script or one of its dependencies could not be loaded
    #[error(transparent)]
    Load(#[from] LoadError),

    /// The engine could not be driven at all
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A benchmark name filter did not compile
    #[error("invalid benchmark filter '{pattern}': {source}")]
    InvalidFilter {
        /// Pattern as given
        pattern: String,
        /// Compilation error
        #[source]
        source: regex::Error,
    },

    /// The script defines no `testXxx` entry points
    #[error("no benchmark entry points in {}", .path.display())]
    NoEntryPoints {
        /// Script path
        path: PathBuf,
    },

    /// A run setting is out of range
    #[error("invalid value for {field}: {message}")]
    InvalidOption {
        /// Setting name
        field: &'static str,
        /// What is wrong with it
        message: String,
    },
}
