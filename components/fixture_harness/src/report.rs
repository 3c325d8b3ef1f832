use crate::result::ExecutionResult;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;

/// Output format for a finished report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    /// Human-readable summary plus problem details
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
    /// One `LABEL path[: detail]` line per fixture
    Lines,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "lines" => Ok(ReportFormat::Lines),
            other => Err(format!(
                "unknown report format '{}' (expected text, json or lines)",
                other
            )),
        }
    }
}

/// Outcome of one fixture within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// Fixture path as discovered
    pub path: String,
    /// Classified result
    pub result: ExecutionResult,
    /// Wall-clock time spent on the fixture
    pub duration_ms: u64,
    /// `printStatus` messages, kept for failing fixtures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
}

/// Run report with per-fixture results and aggregate counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Total number of fixtures
    pub total: usize,
    /// Number of fixtures that passed
    pub passed: usize,
    /// Number of fixtures that failed an assertion or the sentinel
    pub failed: usize,
    /// Number of fixtures that raised or could not be loaded
    pub errored: usize,
    /// Number of fixtures that crashed (timeouts included)
    pub crashed: usize,
    /// Number of crashes that were timeouts
    pub timeout: usize,
    /// Number of fixtures that were not executed
    pub skipped: usize,
    /// Entries in run order
    pub entries: Vec<ReportEntry>,
}

impl Report {
    /// Create a new empty report
    pub fn new() -> Self {
        Self {
            total: 0,
            passed: 0,
            failed: 0,
            errored: 0,
            crashed: 0,
            timeout: 0,
            skipped: 0,
            entries: Vec::new(),
        }
    }

    /// Add a fixture result to the report
    pub fn add_entry(&mut self, entry: ReportEntry) {
        self.total += 1;
        match &entry.result {
            ExecutionResult::Passed => self.passed += 1,
            ExecutionResult::Failed(_) => self.failed += 1,
            ExecutionResult::Errored(_) => self.errored += 1,
            ExecutionResult::Crashed(_) => {
                self.crashed += 1;
                if entry.result.is_timeout() {
                    self.timeout += 1;
                }
            }
            ExecutionResult::Skipped(_) => self.skipped += 1,
        }
        self.entries.push(entry);
    }

    /// Shorthand for [`add_entry`](Self::add_entry) without timing
    pub fn add_result(&mut self, path: &str, result: ExecutionResult) {
        self.add_entry(ReportEntry {
            path: path.to_string(),
            result,
            duration_ms: 0,
            status: Vec::new(),
        });
    }

    /// Entries that did not pass and were not skipped
    pub fn problems(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| !e.result.is_pass() && !e.result.is_skip())
    }

    /// Calculate the pass rate as a percentage
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    /// Calculate the effective pass rate (excluding skips)
    pub fn effective_pass_rate(&self) -> f64 {
        let executed = self.total - self.skipped;
        if executed == 0 {
            0.0
        } else {
            (self.passed as f64 / executed as f64) * 100.0
        }
    }

    /// Check that nothing failed, errored or crashed
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errored == 0 && self.crashed == 0
    }

    /// Generate a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Fixture Results:\n\
             Total: {}\n\
             Passed: {} ({:.1}%)\n\
             Failed: {}\n\
             Errored: {}\n\
             Crashed: {} ({} timeout)\n\
             Skipped: {}\n\
             Effective Pass Rate: {:.1}%",
            self.total,
            self.passed,
            self.pass_rate(),
            self.failed,
            self.errored,
            self.crashed,
            self.timeout,
            self.skipped,
            self.effective_pass_rate()
        )
    }

    /// Generate a detailed report including every problem
    pub fn detailed_summary(&self) -> String {
        let mut output = self.summary();

        let mut problems = self.problems().peekable();
        if problems.peek().is_some() {
            output.push_str("\n\nProblems:\n");
            for entry in problems {
                let _ = writeln!(
                    output,
                    "  - {} [{}]\n    {}",
                    entry.path,
                    entry.result.label(),
                    entry.result.detail()
                );
                for status in &entry.status {
                    let _ = writeln!(output, "    status: {}", status);
                }
            }
        }

        output
    }

    /// One line per fixture, in run order, without timings
    pub fn to_lines(&self) -> String {
        let mut output = String::new();
        for entry in &self.entries {
            let detail = entry.result.detail();
            if detail.is_empty() {
                let _ = writeln!(output, "{} {}", entry.result.label(), entry.path);
            } else {
                let detail = detail.replace('\n', " ");
                let _ = writeln!(output, "{} {}: {}", entry.result.label(), entry.path, detail);
            }
        }
        output
    }

    /// Export report as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Import report from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Render in the requested format
    pub fn render(&self, format: ReportFormat) -> Result<String, serde_json::Error> {
        match format {
            ReportFormat::Text => Ok(self.detailed_summary()),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Lines => Ok(self.to_lines()),
        }
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: &Report) {
        for entry in &other.entries {
            self.add_entry(entry.clone());
        }
    }

    /// Get the first N problems
    pub fn top_problems(&self, n: usize) -> Vec<&ReportEntry> {
        self.problems().take(n).collect()
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

/// Report builder for aggregating multiple runs
pub struct ReportBuilder {
    reports: Vec<Report>,
}

impl ReportBuilder {
    /// Create a new report builder
    pub fn new() -> Self {
        Self {
            reports: Vec::new(),
        }
    }

    /// Add a report to be aggregated
    pub fn add_report(&mut self, report: Report) -> &mut Self {
        self.reports.push(report);
        self
    }

    /// Build an aggregated report from all added reports
    pub fn build(&self) -> Report {
        let mut combined = Report::new();
        for report in &self.reports {
            combined.merge(report);
        }
        combined
    }

    /// Get number of reports added
    pub fn count(&self) -> usize {
        self.reports.len()
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}
