//! Harness configuration
//!
//! Settings come from an optional YAML file; every field has a default so a
//! file only needs the keys it changes. The CLI applies its flags on top.
//!
//! ```yaml
//! engine:
//!   program: rhino
//!   args: ["-version", "200"]
//!   capabilities: [debug-properties]
//!   env:
//!     RHINO_DEBUG_PROPERTIES: "true"
//! source_root: tests
//! timeout_ms: 5000
//! jobs: 4
//! skip_list: tests/fixtures.skip
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default per-fixture timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Maps an engine capability to the text that marks a fixture as needing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    /// Capability the engine adapter must support
    pub capability: String,
    /// Text whose presence in a fixture requires the capability
    pub marker: String,
}

/// How to launch the external engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable
    pub program: String,
    /// Arguments placed before the driver script path
    pub args: Vec<String>,
    /// Extra environment variables for the engine process
    pub env: BTreeMap<String, String>,
    /// Introspection capabilities this engine build provides
    pub capabilities: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "rhino".to_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
            capabilities: Vec::new(),
        }
    }
}

/// Complete harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// External engine settings
    pub engine: EngineConfig,
    /// Directory `load()` paths are resolved against
    pub source_root: PathBuf,
    /// Per-fixture timeout in milliseconds
    pub timeout_ms: u64,
    /// Number of fixtures executed concurrently
    pub jobs: usize,
    /// File extensions treated as fixtures
    pub extensions: Vec<String>,
    /// Globs (relative to the run directory) never treated as fixtures
    pub exclude: Vec<String>,
    /// Optional `--filter` glob
    pub filter: Option<String>,
    /// File listing fixtures to skip
    pub skip_list: Option<PathBuf>,
    /// Helper files loaded implicitly from the fixture's directory chain
    pub implicit_includes: Vec<String>,
    /// Markers that gate fixtures on engine capabilities
    pub gates: Vec<Gate>,
    /// Require every fixture to complete with `"success"`
    pub require_success_sentinel: bool,
    /// Emit `enterFunc`/`exitFunc` traces from fixtures
    pub trace: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            source_root: PathBuf::from("."),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            jobs: 1,
            extensions: vec!["js".to_string()],
            exclude: Vec::new(),
            filter: None,
            skip_list: None,
            implicit_includes: vec!["shell.js".to_string()],
            gates: vec![Gate {
                capability: "debug-properties".to_string(),
                marker: "RHINO_DEBUG_PROPERTIES".to_string(),
            }],
            require_success_sentinel: false,
            trace: false,
        }
    }
}

impl HarnessConfig {
    /// Read a YAML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse YAML config text
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Per-fixture timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject settings the runner cannot honor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.jobs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "jobs",
                message: "must be at least 1".to_string(),
            });
        }
        if self.extensions.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "extensions",
                message: "at least one fixture extension is required".to_string(),
            });
        }
        if self.engine.program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "engine.program",
                message: "engine program must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
