//! Error types for the fixture harness
//!
//! Loader and engine errors never escape a run: the runner converts them into
//! an [`ExecutionResult`](crate::result::ExecutionResult) for the fixture that
//! raised them. Configuration errors are the only ones a caller sees.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Failure to assemble a fixture's source text
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadError {
    /// A `load()` directive names a file that does not exist
    #[error("missing dependency '{requested}' (resolved to {}) loaded from {}", .resolved.display(), .from.display())]
    MissingDependency {
        /// Path exactly as written in the directive
        requested: String,
        /// Where the loader looked for it
        resolved: PathBuf,
        /// File containing the directive
        from: PathBuf,
    },

    /// A `load()` chain revisits a file that is still being resolved
    #[error("cyclic load: {}", format_chain(.chain))]
    CyclicLoad {
        /// Files on the chain, ending with the revisited one
        chain: Vec<PathBuf>,
    },

    /// The fixture itself (or a dependency) could not be read
    #[error("failed to read {}: {message}", .path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying I/O error text
        message: String,
    },
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Failure talking to the external engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine executable could not be started
    #[error("failed to spawn engine '{program}': {source}")]
    Spawn {
        /// Configured engine program
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Writing the driver script or waiting on the child failed
    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A `@@harness` record could not be decoded
    #[error("malformed harness record '{line}': {message}")]
    Protocol {
        /// Offending line without the marker
        line: String,
        /// Decoder error
        message: String,
    },
}

/// Invalid harness configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config or skip-list file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid YAML for [`HarnessConfig`](crate::config::HarnessConfig)
    #[error("invalid config file {}: {source}", .path.display())]
    Yaml {
        /// File being parsed
        path: PathBuf,
        /// Parser error
        #[source]
        source: serde_yaml::Error,
    },

    /// A glob pattern could not be compiled
    #[error("invalid glob '{pattern}': {message}")]
    InvalidGlob {
        /// Pattern as written
        pattern: String,
        /// Compiler error
        message: String,
    },

    /// A setting is out of range
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// Setting name
        field: &'static str,
        /// What is wrong with it
        message: String,
    },
}

/// Result type for loader operations
pub type LoadResult<T> = Result<T, LoadError>;
