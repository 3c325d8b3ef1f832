//! Benchmark runner and result types
//!
//! Runs benchmark scripts through any [`EngineAdapter`], one engine
//! execution per script, and turns the driver's records into results.

use crate::error::BenchError;
use crate::script::{driver_segment, parse_bench_record, BenchRecord, BenchmarkScript, Iterations};
use fixture_harness::{
    EngineAdapter, EngineOutcome, ExecutionLimits, GlobalBindings, LoadedScript, ScriptLoader,
    Segment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

/// Result of running one benchmark entry point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Entry point name
    pub name: String,
    /// Script the entry point lives in
    pub script: String,
    /// Timed calls
    pub iterations: u64,
    /// Duration of the timed calls in milliseconds
    pub duration_ms: f64,
    /// Nanoseconds per call
    pub ns_per_op: Option<f64>,
    /// Calls per second
    pub ops_per_sec: Option<f64>,
    /// Whether the benchmark completed successfully
    pub success: bool,
    /// Error message if failed
    pub error: Option<String>,
}

impl BenchmarkResult {
    /// A successful timing
    pub fn timed(name: &str, script: &str, iterations: u64, duration_ms: f64) -> Self {
        let (ns_per_op, ops_per_sec) = if iterations > 0 && duration_ms > 0.0 {
            (
                Some(duration_ms * 1_000_000.0 / iterations as f64),
                Some(iterations as f64 / (duration_ms / 1000.0)),
            )
        } else {
            (None, None)
        };

        Self {
            name: name.to_string(),
            script: script.to_string(),
            iterations,
            duration_ms,
            ns_per_op,
            ops_per_sec,
            success: true,
            error: None,
        }
    }

    /// A benchmark that produced no timing
    pub fn failed(name: &str, script: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            script: script.to_string(),
            iterations: 0,
            duration_ms: 0.0,
            ns_per_op: None,
            ops_per_sec: None,
            success: false,
            error: Some(error.into()),
        }
    }

    fn from_record(record: &BenchRecord, script: &str) -> Self {
        match (&record.error, record.iterations, record.total_ms) {
            (Some(error), _, _) => Self::failed(&record.name, script, error.clone()),
            (None, Some(iterations), Some(total_ms)) => {
                Self::timed(&record.name, script, iterations, total_ms)
            }
            _ => Self::failed(&record.name, script, "incomplete benchmark record"),
        }
    }
}

/// Benchmark run settings
#[derive(Debug, Clone)]
pub struct BenchOptions {
    /// Warmup and measured call counts
    pub iterations: Iterations,
    /// Directory `load()` paths are resolved against
    pub source_root: PathBuf,
    /// Scripts evaluated before every benchmark script (host function shims)
    pub setup: Vec<PathBuf>,
    /// Only run entry points whose name matches
    pub filter: Option<Regex>,
    /// Limit for one script's whole execution
    pub timeout: Duration,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            iterations: Iterations::default(),
            source_root: PathBuf::from("."),
            setup: Vec::new(),
            filter: None,
            timeout: Duration::from_secs(60),
        }
    }
}

impl BenchOptions {
    /// Set the entry point name filter from a regular expression
    pub fn with_filter(mut self, pattern: &str) -> Result<Self, BenchError> {
        let regex = Regex::new(pattern).map_err(|source| BenchError::InvalidFilter {
            pattern: pattern.to_string(),
            source,
        })?;
        self.filter = Some(regex);
        Ok(self)
    }

    /// Reject settings that cannot produce a timing
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.iterations.measured == 0 {
            return Err(BenchError::InvalidOption {
                field: "iterations",
                message: "must be at least 1".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(BenchError::InvalidOption {
                field: "timeout",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Suite of benchmark scripts
#[derive(Debug, Clone, Default)]
pub struct BenchmarkSuite {
    /// Scripts in run order
    pub scripts: Vec<BenchmarkScript>,
}

impl BenchmarkSuite {
    /// Create an empty suite
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a script to this suite
    pub fn add(&mut self, script: BenchmarkScript) {
        self.scripts.push(script);
    }

    /// Collect the `.js` scripts under `path` that define entry points
    pub fn discover(path: &Path) -> Result<Self, BenchError> {
        let mut suite = Self::new();
        if path.is_file() {
            let script = BenchmarkScript::load(path)?;
            if script.entry_points.is_empty() {
                return Err(BenchError::NoEntryPoints {
                    path: path.to_path_buf(),
                });
            }
            suite.add(script);
            return Ok(suite);
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("skipping unreadable entry: {err}");
                    continue;
                }
            };
            let is_script = entry.file_type().is_file()
                && entry.path().extension().map_or(false, |ext| ext == "js");
            if !is_script {
                continue;
            }

            let script = BenchmarkScript::load(entry.path())?;
            if script.entry_points.is_empty() {
                tracing::debug!(path = %entry.path().display(), "no entry points, ignoring");
                continue;
            }
            suite.add(script);
        }
        Ok(suite)
    }

    /// Total entry points across all scripts
    pub fn len(&self) -> usize {
        self.scripts.iter().map(|s| s.entry_points.len()).sum()
    }

    /// Whether the suite has no entry points
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs benchmark scripts on an engine
pub struct BenchmarkRunner {
    engine: Arc<dyn EngineAdapter>,
    loader: ScriptLoader,
    options: BenchOptions,
}

impl BenchmarkRunner {
    /// Create a runner
    pub fn new(engine: Arc<dyn EngineAdapter>, options: BenchOptions) -> Result<Self, BenchError> {
        options.validate()?;
        let loader = ScriptLoader::new(options.source_root.clone());
        Ok(Self {
            engine,
            loader,
            options,
        })
    }

    /// Run settings
    pub fn options(&self) -> &BenchOptions {
        &self.options
    }

    /// Run every script in the suite
    ///
    /// A script that cannot be run is reported as one failed result per entry
    /// point; the remaining scripts still run.
    pub fn run_suite(&self, suite: &BenchmarkSuite) -> Vec<BenchmarkResult> {
        let mut results = Vec::new();
        for script in &suite.scripts {
            match self.run_script(script) {
                Ok(script_results) => results.extend(script_results),
                Err(e) => {
                    tracing::error!(script = %script.path.display(), "benchmark script failed: {e}");
                    let label = script.name();
                    results.extend(
                        self.selected(script)
                            .into_iter()
                            .map(|name| BenchmarkResult::failed(&name, &label, e.to_string())),
                    );
                }
            }
        }
        results
    }

    fn selected(&self, script: &BenchmarkScript) -> Vec<String> {
        let mut script = script.clone();
        if let Some(filter) = &self.options.filter {
            script.retain_matching(filter);
        }
        script.entry_points
    }

    /// Run one script's entry points in a single engine execution
    pub fn run_script(&self, script: &BenchmarkScript) -> Result<Vec<BenchmarkResult>, BenchError> {
        let names = self.selected(script);
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let loaded = self.assemble(script, &names)?;
        let label = script.name();
        tracing::info!(
            script = %script.path.display(),
            benchmarks = names.len(),
            iterations = self.options.iterations.measured,
            "running benchmarks"
        );

        let limits = ExecutionLimits::with_timeout(self.options.timeout);
        let outcome = self
            .engine
            .execute(&loaded, &GlobalBindings::default(), &limits)?;

        let records: Vec<BenchRecord> = outcome
            .log()
            .output
            .iter()
            .filter_map(|line| parse_bench_record(line))
            .collect();

        let unfinished = match &outcome {
            EngineOutcome::Completed { .. } => "benchmark did not report a result".to_string(),
            EngineOutcome::Threw { exception, .. } => format!("script threw {}", exception),
            EngineOutcome::TimedOut { limit, .. } => {
                format!("timeout after {} ms", limit.as_millis())
            }
            EngineOutcome::Crashed { reason, .. } => reason.clone(),
        };

        Ok(names
            .iter()
            .map(|name| match records.iter().find(|r| &r.name == name) {
                Some(record) => BenchmarkResult::from_record(record, &label),
                None => BenchmarkResult::failed(name, &label, unfinished.clone()),
            })
            .collect())
    }

    /// Setup scripts, then the benchmark script with its dependencies, then the driver
    fn assemble(&self, script: &BenchmarkScript, names: &[String]) -> Result<LoadedScript, BenchError> {
        let mut segments: Vec<Segment> = Vec::new();
        for path in self.options.setup.iter().chain(std::iter::once(&script.path)) {
            for segment in self.loader.load(path)?.segments() {
                if !segments.iter().any(|s| s.path == segment.path) {
                    segments.push(segment.clone());
                }
            }
        }
        Ok(LoadedScript::from_segments(segments)
            .with_epilogue(driver_segment(names, self.options.iterations)?))
    }
}

/// Format benchmark results as a human-readable table
pub fn format_results(results: &[BenchmarkResult]) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n{:<40} {:>10} {:>13} {:>12} {:>14}  {:<8}\n",
        "Benchmark", "Iterations", "Duration (ms)", "ns/op", "ops/sec", "Status"
    ));
    output.push_str(&format!("{}\n", "=".repeat(103)));

    for result in results {
        let status = if result.success { "✓ PASS" } else { "✗ FAIL" };
        let name = format!("{}:{}", result.script, result.name);
        let ns_per_op = result
            .ns_per_op
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "-".to_string());
        let ops_per_sec = result
            .ops_per_sec
            .map(|v| format!("{:.0}", v))
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!(
            "{:<40} {:>10} {:>13.2} {:>12} {:>14}  {:<8}\n",
            name, result.iterations, result.duration_ms, ns_per_op, ops_per_sec, status
        ));

        if let Some(error) = &result.error {
            output.push_str(&format!("  Error: {}\n", error));
        }
    }

    output
}

/// Format benchmark results as JSON
pub fn format_results_json(results: &[BenchmarkResult]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(results)
}
