//! Glob filters and skip lists
//!
//! Globs are matched against `/`-separated paths relative to the run
//! directory. `*` and `?` stay within one path component, `**` crosses them.
//! A pattern without any `/` matches the file name alone.

use crate::error::ConfigError;
use regex::Regex;
use std::path::Path;

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
    name_only: bool,
}

impl Glob {
    /// Compile a glob pattern
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(ConfigError::InvalidGlob {
                pattern: pattern.to_string(),
                message: "empty pattern".to_string(),
            });
        }

        let regex = Regex::new(&glob_to_regex(pattern)).map_err(|e| ConfigError::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            name_only: !pattern.contains('/'),
        })
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Check a relative path against the pattern
    pub fn matches(&self, relative: &Path) -> bool {
        let normalized = normalize(relative);
        if self.name_only {
            let name = normalized.rsplit('/').next().unwrap_or(&normalized);
            self.regex.is_match(name) || self.regex.is_match(&normalized)
        } else {
            self.regex.is_match(&normalized)
        }
    }
}

fn normalize(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    text.trim_start_matches("./").to_string()
}

fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                // `**/` may match zero directories
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out.push('$');
    out
}

/// One skip-list line
#[derive(Debug, Clone)]
pub struct SkipEntry {
    /// Pattern selecting the fixtures
    pub glob: Glob,
    /// Reason given after `#`, if any
    pub reason: Option<String>,
}

/// Fixtures that must not be executed
///
/// Format: one glob per line, optionally followed by `# reason`. Lines that
/// start with `#` and blank lines are ignored.
#[derive(Debug, Clone, Default)]
pub struct SkipList {
    entries: Vec<SkipEntry>,
}

impl SkipList {
    /// An empty skip list
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read a skip list from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse skip-list text
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut entries = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (pattern, reason) = match line.split_once('#') {
                Some((p, r)) => (p.trim(), Some(r.trim().to_string()).filter(|r| !r.is_empty())),
                None => (line, None),
            };

            entries.push(SkipEntry {
                glob: Glob::new(pattern)?,
                reason,
            });
        }

        Ok(Self { entries })
    }

    /// Number of patterns
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list has no patterns
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Skip reason for a fixture, if it is listed
    pub fn reason_for(&self, relative: &Path) -> Option<String> {
        self.entries
            .iter()
            .find(|e| e.glob.matches(relative))
            .map(|e| match &e.reason {
                Some(r) => format!("skip list: {}", r),
                None => format!("skip list: {}", e.glob.as_str()),
            })
    }
}
