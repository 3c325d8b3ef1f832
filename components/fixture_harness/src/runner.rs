//! Fixture discovery and execution
//!
//! The runner never lets one fixture affect another: every fixture is loaded
//! and executed on its own, and any failure along the way becomes that
//! fixture's [`ExecutionResult`].

use crate::assertions::{AssertionLibrary, GlobalBindings};
use crate::config::HarnessConfig;
use crate::engine::{EngineAdapter, ExecutionLimits};
use crate::error::ConfigError;
use crate::filter::{Glob, SkipList};
use crate::fixture::Fixture;
use crate::loader::ScriptLoader;
use crate::report::{Report, ReportEntry};
use crate::result::{CrashReason, ErrorCause, ExecutionResult};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use walkdir::WalkDir;

/// A fixture selected for a run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DiscoveredFixture {
    /// Path relative to the run directory (`/`-separated on every platform)
    pub relative: PathBuf,
    /// Path as found on disk
    pub path: PathBuf,
}

/// Fixture test runner
pub struct TestRunner {
    config: HarnessConfig,
    engine: Arc<dyn EngineAdapter>,
    loader: ScriptLoader,
    library: AssertionLibrary,
    filter: Option<Glob>,
    exclude: Vec<Glob>,
    skip_list: SkipList,
}

impl TestRunner {
    /// Create a runner; reads the skip list named in the config
    pub fn new(config: HarnessConfig, engine: Arc<dyn EngineAdapter>) -> Result<Self, ConfigError> {
        config.validate()?;

        let filter = config.filter.as_deref().map(Glob::new).transpose()?;
        let exclude = config
            .exclude
            .iter()
            .map(|p| Glob::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        let skip_list = match &config.skip_list {
            Some(path) => SkipList::load(path)?,
            None => SkipList::empty(),
        };

        let loader = ScriptLoader::new(config.source_root.clone())
            .with_implicit_includes(config.implicit_includes.clone());
        let library = AssertionLibrary::new(GlobalBindings { trace: config.trace })
            .with_required_sentinel(config.require_success_sentinel);

        Ok(Self {
            config,
            engine,
            loader,
            library,
            filter,
            exclude,
            skip_list,
        })
    }

    /// Replace the skip list
    pub fn with_skip_list(mut self, skip_list: SkipList) -> Self {
        self.skip_list = skip_list;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Get the engine adapter
    pub fn engine(&self) -> &dyn EngineAdapter {
        self.engine.as_ref()
    }

    /// Find the fixtures a run of `path` would execute, in run order
    pub fn discover(&self, path: &Path) -> Vec<DiscoveredFixture> {
        if path.is_file() {
            let relative = path.file_name().map(PathBuf::from).unwrap_or_default();
            return vec![DiscoveredFixture {
                relative,
                path: path.to_path_buf(),
            }];
        }

        let mut fixtures: Vec<DiscoveredFixture> = WalkDir::new(path)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!("skipping unreadable entry: {err}");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.has_fixture_extension(e.path()))
            .filter(|e| !self.loader.is_implicit_include(e.path()))
            .filter_map(|e| {
                let relative = e.path().strip_prefix(path).ok()?.to_path_buf();
                Some(DiscoveredFixture {
                    relative,
                    path: e.path().to_path_buf(),
                })
            })
            .filter(|f| !self.exclude.iter().any(|g| g.matches(&f.relative)))
            .filter(|f| self.filter.as_ref().map_or(true, |g| g.matches(&f.relative)))
            .collect();

        fixtures.sort();
        fixtures
    }

    fn has_fixture_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.config.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }

    /// Run every fixture under `path` (a directory or a single file)
    pub fn run(&self, path: &Path) -> Report {
        let fixtures = self.discover(path);
        let start = Instant::now();
        tracing::info!(
            path = %path.display(),
            fixtures = fixtures.len(),
            jobs = self.config.jobs,
            engine = self.engine.name(),
            "starting run"
        );

        let entries = if self.config.jobs > 1 && fixtures.len() > 1 {
            self.run_parallel(&fixtures)
        } else {
            fixtures.iter().map(|f| self.run_fixture(f)).collect()
        };

        let mut report = Report::new();
        for entry in entries {
            report.add_entry(entry);
        }

        tracing::info!(
            passed = report.passed,
            failed = report.failed,
            errored = report.errored,
            crashed = report.crashed,
            skipped = report.skipped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "run finished"
        );
        report
    }

    /// Run fixtures on a scoped worker pool, keeping discovery order
    fn run_parallel(&self, fixtures: &[DiscoveredFixture]) -> Vec<ReportEntry> {
        let workers = self.config.jobs.min(fixtures.len());
        let (tx, rx) = crossbeam::channel::unbounded::<(usize, &DiscoveredFixture)>();
        for job in fixtures.iter().enumerate() {
            // Unbounded and the receiver is alive, so this cannot fail
            let _ = tx.send(job);
        }
        drop(tx);

        let slots: Mutex<Vec<Option<ReportEntry>>> = Mutex::new(vec![None; fixtures.len()]);

        let scope_result = crossbeam::thread::scope(|scope| {
            for _ in 0..workers {
                let rx = rx.clone();
                let slots = &slots;
                scope.spawn(move |_| {
                    for (index, fixture) in rx.iter() {
                        let entry = self.run_fixture(fixture);
                        slots.lock()[index] = Some(entry);
                    }
                });
            }
        });
        if scope_result.is_err() {
            tracing::error!("a fixture worker panicked; its unfinished fixtures are reported as crashed");
        }

        slots
            .into_inner()
            .into_iter()
            .zip(fixtures)
            .map(|(slot, fixture)| {
                slot.unwrap_or_else(|| ReportEntry {
                    path: fixture.path.display().to_string(),
                    result: ExecutionResult::Crashed(CrashReason::Abnormal {
                        message: "fixture worker terminated".to_string(),
                    }),
                    duration_ms: 0,
                    status: Vec::new(),
                })
            })
            .collect()
    }

    /// Load, execute and classify a single fixture
    pub fn run_fixture(&self, fixture: &DiscoveredFixture) -> ReportEntry {
        let start = Instant::now();
        let (result, status) = self.execute_fixture(fixture);
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            ExecutionResult::Passed => {
                tracing::debug!(fixture = %fixture.path.display(), duration_ms, "passed")
            }
            ExecutionResult::Skipped(reason) => {
                tracing::debug!(fixture = %fixture.path.display(), %reason, "skipped")
            }
            ExecutionResult::Crashed(reason) => {
                tracing::warn!(fixture = %fixture.path.display(), %reason, "crashed")
            }
            other => {
                tracing::debug!(fixture = %fixture.path.display(), result = %other, "did not pass")
            }
        }

        ReportEntry {
            path: fixture.path.display().to_string(),
            status: if result.is_pass() { Vec::new() } else { status },
            result,
            duration_ms,
        }
    }

    fn execute_fixture(&self, discovered: &DiscoveredFixture) -> (ExecutionResult, Vec<String>) {
        if let Some(reason) = self.skip_list.reason_for(&discovered.relative) {
            return (ExecutionResult::Skipped(reason), Vec::new());
        }

        let fixture = match Fixture::load(&discovered.path) {
            Ok(f) => f,
            Err(error) => return (ExecutionResult::Errored(ErrorCause::Load { error }), Vec::new()),
        };

        let missing: Vec<String> = fixture
            .required_capabilities(&self.config.gates)
            .into_iter()
            .filter(|c| !self.engine.supports(c))
            .collect();
        if !missing.is_empty() {
            return (
                ExecutionResult::Skipped(format!(
                    "requires engine capability: {}",
                    missing.join(", ")
                )),
                Vec::new(),
            );
        }

        let script = match self.loader.load_fixture(&fixture) {
            Ok(s) => s,
            Err(error) => return (ExecutionResult::Errored(ErrorCause::Load { error }), Vec::new()),
        };

        let limits = ExecutionLimits::with_timeout(self.config.timeout());
        let executed = panic::catch_unwind(AssertUnwindSafe(|| {
            self.engine.execute(&script, self.library.bindings(), &limits)
        }));

        match executed {
            Ok(Ok(outcome)) => {
                let result = self.library.classify(&outcome, fixture.expects_sentinel());
                (result, outcome.log().status.clone())
            }
            Ok(Err(e)) => {
                tracing::error!(fixture = %discovered.path.display(), "engine error: {e}");
                (
                    ExecutionResult::Crashed(CrashReason::Abnormal {
                        message: format!("engine error: {}", e),
                    }),
                    Vec::new(),
                )
            }
            Err(_) => (
                ExecutionResult::Crashed(CrashReason::Abnormal {
                    message: format!("engine adapter '{}' panicked", self.engine.name()),
                }),
                Vec::new(),
            ),
        }
    }
}
