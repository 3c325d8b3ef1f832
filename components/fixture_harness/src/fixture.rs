use crate::config::Gate;
use crate::error::{LoadError, LoadResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Completion value harmony-style fixtures end with
pub const SUCCESS_SENTINEL: &str = "success";

fn load_directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^[ \t]*load[ \t]*\([ \t]*(?:"([^"\n]+)"|'([^'\n]+)')[ \t]*\)"#)
            .expect("load directive pattern is valid")
    })
}

fn sentinel_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:^|[;}\n])[ \t]*(?:"success"|'success')[ \t]*;?\s*$"#)
            .expect("sentinel pattern is valid")
    })
}

fn bug_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*var\s+BUGNUMBER\s*=\s*["']?([0-9A-Za-z_-]+)["']?\s*;"#)
            .expect("bug number pattern is valid")
    })
}

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*var\s+summary\s*=\s*(?:"([^"\n]*)"|'([^'\n]*)')"#)
            .expect("summary pattern is valid")
    })
}

/// How a fixture signals that it passed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expectation {
    /// The script's completion value must be the string `"success"`
    SuccessSentinel,
    /// The script compares expected and actual values via `reportCompare`
    Comparison,
    /// Reaching the end without raising is enough
    NoCrash,
}

/// A `load("path")` directive found in a fixture or helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadDirective {
    /// Path as written in the source
    pub path: String,
    /// 1-based line of the directive
    pub line: usize,
}

/// Mozilla-suite header values, when present
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureMetadata {
    /// `var BUGNUMBER = ...`
    pub bug_number: Option<String>,
    /// `var summary = '...'`
    pub summary: Option<String>,
}

impl FixtureMetadata {
    /// Extract the header values from a fixture's source
    pub fn parse(source: &str) -> Self {
        let bug_number = bug_number_re()
            .captures(source)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let summary = summary_re()
            .captures(source)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| m.as_str().to_string());

        Self {
            bug_number,
            summary,
        }
    }
}

/// A single test or benchmark script on disk
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Path to the fixture
    pub path: PathBuf,
    /// Source code as read from disk
    pub source: String,
    /// Declared dependencies, in source order
    pub directives: Vec<LoadDirective>,
    /// How the fixture reports success
    pub expectation: Expectation,
    /// Header values from Mozilla-style fixtures
    pub metadata: FixtureMetadata,
}

impl Fixture {
    /// Load a fixture from disk
    pub fn load<P: AsRef<Path>>(path: P) -> LoadResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::from_source(path, source))
    }

    /// Build a fixture from source text already in memory
    pub fn from_source<P: AsRef<Path>>(path: P, source: impl Into<String>) -> Self {
        let source = source.into();
        let directives = parse_load_directives(&source);
        let expectation = detect_expectation(&source);
        let metadata = FixtureMetadata::parse(&source);

        Self {
            path: path.as_ref().to_path_buf(),
            source,
            directives,
            expectation,
            metadata,
        }
    }

    /// Get the fixture name (file name without extension)
    pub fn name(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    /// Capabilities this fixture needs from the engine, per the configured gates
    pub fn required_capabilities(&self, gates: &[Gate]) -> Vec<String> {
        let mut required: Vec<String> = gates
            .iter()
            .filter(|g| self.source.contains(&g.marker))
            .map(|g| g.capability.clone())
            .collect();
        required.sort();
        required.dedup();
        required
    }

    /// Whether the completion value must be the `"success"` sentinel
    pub fn expects_sentinel(&self) -> bool {
        self.expectation == Expectation::SuccessSentinel
    }
}

/// Find every `load("...")` directive that starts a line
pub fn parse_load_directives(source: &str) -> Vec<LoadDirective> {
    load_directive_re()
        .captures_iter(source)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let path = c.get(1).or_else(|| c.get(2))?.as_str().to_string();
            let line = source[..whole.start()].matches('\n').count() + 1;
            Some(LoadDirective { path, line })
        })
        .collect()
}

fn detect_expectation(source: &str) -> Expectation {
    if sentinel_re().is_match(source) {
        Expectation::SuccessSentinel
    } else if source.contains("reportCompare") {
        Expectation::Comparison
    } else {
        Expectation::NoCrash
    }
}
