//! Fixture source resolution
//!
//! A fixture's final source is its dependencies first (implicit helpers from
//! the directory chain, then `load()` directives, depth first) followed by
//! its own body. Each file appears once even when several files load it.

use crate::error::{LoadError, LoadResult};
use crate::fixture::{parse_load_directives, Fixture};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One file's contribution to a loaded script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// File the text came from
    pub path: PathBuf,
    /// File contents
    pub source: String,
}

/// A fixture together with everything it loads, dependency-first
///
/// Segments after the body (see [`LoadedScript::with_epilogue`]) run once
/// the body has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedScript {
    segments: Vec<Segment>,
    epilogue: usize,
}

impl LoadedScript {
    /// A script with no dependencies
    pub fn from_source<P: AsRef<Path>>(path: P, source: impl Into<String>) -> Self {
        Self::from_segments(vec![Segment {
            path: path.as_ref().to_path_buf(),
            source: source.into(),
        }])
    }

    /// Build a script from explicit segments; the last one is the fixture body
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            epilogue: 0,
        }
    }

    /// Append a segment that runs after the body
    pub fn with_epilogue(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self.epilogue += 1;
        self
    }

    /// All segments in execution order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Position of the fixture body in [`segments`](Self::segments)
    pub fn body_index(&self) -> Option<usize> {
        self.segments.len().checked_sub(self.epilogue + 1)
    }

    /// The fixture body
    pub fn main(&self) -> Option<&Segment> {
        self.body_index().map(|i| &self.segments[i])
    }

    /// Dependency paths in load order, excluding the fixture itself
    pub fn dependencies(&self) -> impl Iterator<Item = &Path> {
        let deps = self.body_index().unwrap_or(0);
        self.segments[..deps].iter().map(|s| s.path.as_path())
    }

    /// Segments appended after the body
    pub fn epilogue(&self) -> &[Segment] {
        &self.segments[self.segments.len() - self.epilogue..]
    }

    /// Whole source as a single text
    pub fn concatenated(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push_str(&segment.source);
            if !segment.source.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// Bookkeeping for one `load` call
#[derive(Default)]
struct LoadState {
    /// Files currently being resolved
    pending: HashSet<PathBuf>,
    /// Same files, in chain order
    chain: Vec<PathBuf>,
    /// Files already emitted
    included: HashSet<PathBuf>,
    segments: Vec<Segment>,
}

/// Resolves fixtures and their `load()` dependencies
#[derive(Debug, Clone)]
pub struct ScriptLoader {
    source_root: PathBuf,
    implicit_includes: Vec<String>,
}

impl ScriptLoader {
    /// Create a loader resolving `load()` paths against `source_root`
    pub fn new<P: Into<PathBuf>>(source_root: P) -> Self {
        Self {
            source_root: source_root.into(),
            implicit_includes: Vec::new(),
        }
    }

    /// Load the named helper files from each fixture's directory chain
    pub fn with_implicit_includes(mut self, names: Vec<String>) -> Self {
        self.implicit_includes = names;
        self
    }

    /// Directory `load()` paths are resolved against
    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Whether `path` is one of the implicit helper files
    pub fn is_implicit_include(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| self.implicit_includes.iter().any(|i| i == n))
            .unwrap_or(false)
    }

    /// Read a fixture from disk and resolve its dependencies
    pub fn load<P: AsRef<Path>>(&self, fixture_path: P) -> LoadResult<LoadedScript> {
        let fixture = Fixture::load(fixture_path)?;
        self.load_fixture(&fixture)
    }

    /// Resolve the dependencies of an already-read fixture
    pub fn load_fixture(&self, fixture: &Fixture) -> LoadResult<LoadedScript> {
        let mut state = LoadState::default();
        let fixture_key = canonical(&fixture.path)?;

        for include in self.implicit_includes_for(&fixture.path) {
            let key = canonical(&include)?;
            if key == fixture_key || state.included.contains(&key) {
                continue;
            }
            let source = read(&include)?;
            self.visit(&include, key, source, &mut state)?;
        }

        self.visit(&fixture.path, fixture_key, fixture.source.clone(), &mut state)?;

        tracing::trace!(
            fixture = %fixture.path.display(),
            segments = state.segments.len(),
            "resolved fixture source"
        );

        Ok(LoadedScript::from_segments(state.segments))
    }

    /// Implicit helpers for a fixture, outermost directory first
    pub fn implicit_includes_for(&self, fixture_path: &Path) -> Vec<PathBuf> {
        if self.implicit_includes.is_empty() {
            return Vec::new();
        }

        let Some(dir) = fixture_path.parent() else {
            return Vec::new();
        };

        let mut dirs = vec![dir.to_path_buf()];
        if let (Ok(root), Ok(start)) = (
            std::fs::canonicalize(&self.source_root),
            std::fs::canonicalize(dir),
        ) {
            if start.starts_with(&root) {
                dirs.clear();
                let mut current = Some(start.as_path());
                while let Some(d) = current {
                    dirs.push(d.to_path_buf());
                    if d == root {
                        break;
                    }
                    current = d.parent();
                }
                dirs.reverse();
            }
        }

        dirs.iter()
            .flat_map(|d| self.implicit_includes.iter().map(move |name| d.join(name)))
            .filter(|p| p.is_file())
            .collect()
    }

    fn resolve(&self, requested: &str) -> PathBuf {
        let requested_path = Path::new(requested);
        if requested_path.is_absolute() {
            requested_path.to_path_buf()
        } else {
            self.source_root.join(requested_path)
        }
    }

    fn visit(
        &self,
        path: &Path,
        key: PathBuf,
        source: String,
        state: &mut LoadState,
    ) -> LoadResult<()> {
        state.pending.insert(key.clone());
        state.chain.push(key.clone());

        for directive in parse_load_directives(&source) {
            let resolved = self.resolve(&directive.path);
            if !resolved.is_file() {
                return Err(LoadError::MissingDependency {
                    requested: directive.path,
                    resolved,
                    from: path.to_path_buf(),
                });
            }

            let dep_key = canonical(&resolved)?;
            if state.pending.contains(&dep_key) {
                let mut chain = state.chain.clone();
                chain.push(dep_key);
                return Err(LoadError::CyclicLoad { chain });
            }
            if state.included.contains(&dep_key) {
                continue;
            }

            let dep_source = read(&resolved)?;
            self.visit(&resolved, dep_key, dep_source, state)?;
        }

        state.chain.pop();
        state.pending.remove(&key);
        state.included.insert(key);
        state.segments.push(Segment {
            path: path.to_path_buf(),
            source,
        });
        Ok(())
    }
}

fn canonical(path: &Path) -> LoadResult<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn read(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
