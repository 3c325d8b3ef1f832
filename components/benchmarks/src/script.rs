//! Benchmark scripts and the in-engine timing driver
//!
//! A benchmark script is plain JavaScript declaring one global function per
//! benchmark, named `testSomething` and taking no arguments. The driver
//! appended after the script calls each one for a warmup phase, then times a
//! fixed number of calls with the engine's own clock, and prints one
//! [`BENCH_MARKER`] line per benchmark.

use crate::error::BenchError;
use fixture_harness::Segment;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Prefix of every line the timing driver prints
pub const BENCH_MARKER: &str = "@@bench ";

/// Path reported for the driver segment
pub const DRIVER_PATH: &str = "fixture-bench-driver.js";

fn entry_point_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*function[ \t]+(test[A-Za-z0-9_$]*)[ \t]*\([ \t]*\)")
            .expect("entry point pattern is valid")
    })
}

/// Names of the top-level `function testXxx()` declarations, in source order
pub fn discover_entry_points(source: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in entry_point_re().captures_iter(source) {
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// A benchmark script on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkScript {
    /// Script path
    pub path: PathBuf,
    /// Benchmarks it defines
    pub entry_points: Vec<String>,
}

impl BenchmarkScript {
    /// Read a script and find its entry points
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BenchError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| fixture_harness::LoadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::from_source(path, &source))
    }

    /// Build from already-read source
    pub fn from_source<P: AsRef<Path>>(path: P, source: &str) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entry_points: discover_entry_points(source),
        }
    }

    /// File name used to label results
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Keep only the entry points `filter` matches
    pub fn retain_matching(&mut self, filter: &Regex) {
        self.entry_points.retain(|name| filter.is_match(name));
    }
}

/// Iteration counts handed to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iterations {
    /// Untimed calls before measuring
    pub warmup: u64,
    /// Timed calls
    pub measured: u64,
}

impl Default for Iterations {
    fn default() -> Self {
        Self {
            warmup: 100,
            measured: 1_000,
        }
    }
}

const DRIVER_TEMPLATE: &str = r#"(function (global, names, warmup, iterations) {
  var MARK = "@@bench ";
  var write = typeof print === "function" ? print : function (line) { console.log(line); };
  var clock = typeof performance !== "undefined" && typeof performance.now === "function"
    ? function () { return performance.now(); }
    : function () { return new Date().getTime(); };

  function describe(e) {
    if (e !== null && typeof e === "object" && e.message !== undefined) {
      return (e.name !== undefined ? e.name + ": " : "") + e.message;
    }
    return String(e);
  }

  for (var n = 0; n < names.length; n++) {
    var record = { name: names[n] };
    try {
      var fn = global[names[n]];
      if (typeof fn !== "function") {
        throw new TypeError(names[n] + " is not a function");
      }
      for (var w = 0; w < warmup; w++) {
        fn();
      }
      var start = clock();
      for (var i = 0; i < iterations; i++) {
        fn();
      }
      record.total_ms = clock() - start;
      record.iterations = iterations;
    } catch (e) {
      record.error = describe(e);
    }
    write(MARK + JSON.stringify(record));
  }
})(typeof globalThis !== "undefined" ? globalThis : this, __NAMES__, __WARMUP__, __ITERATIONS__);
"#;

/// The segment that runs and times `names`
pub fn driver_segment(names: &[String], iterations: Iterations) -> Result<Segment, BenchError> {
    let names = serde_json::to_string(names).map_err(|e| BenchError::InvalidOption {
        field: "entry_points",
        message: e.to_string(),
    })?;
    let source = DRIVER_TEMPLATE
        .replace("__NAMES__", &names)
        .replace("__WARMUP__", &iterations.warmup.to_string())
        .replace("__ITERATIONS__", &iterations.measured.to_string());

    Ok(Segment {
        path: PathBuf::from(DRIVER_PATH),
        source,
    })
}

/// One line of driver output
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BenchRecord {
    /// Entry point name
    pub name: String,
    /// Timed calls made
    #[serde(default)]
    pub iterations: Option<u64>,
    /// Wall time of the timed calls
    #[serde(default)]
    pub total_ms: Option<f64>,
    /// What the entry point threw
    #[serde(default)]
    pub error: Option<String>,
}

/// Parse a driver line; `None` for anything else the engine printed
pub fn parse_bench_record(line: &str) -> Option<BenchRecord> {
    let payload = line.trim_end_matches('\r').strip_prefix(BENCH_MARKER)?;
    match serde_json::from_str(payload) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("malformed benchmark record '{payload}': {e}");
            None
        }
    }
}
