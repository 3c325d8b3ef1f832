//! Test doubles shared by the harness test suites

#![allow(dead_code)]

use fixture_harness::{
    CompletionValue, EngineAdapter, EngineError, EngineOutcome, ExecutionLimits, ExecutionLog,
    GlobalBindings, LoadedScript, ThrownException,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Script = dyn Fn(&LoadedScript) -> Result<EngineOutcome, EngineError> + Send + Sync;

/// Engine whose behavior is a closure over the loaded script
pub struct ScriptedEngine {
    behavior: Box<Script>,
    capabilities: Vec<String>,
    executions: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
}

impl ScriptedEngine {
    pub fn new<F>(behavior: F) -> Self
    where
        F: Fn(&LoadedScript) -> Result<EngineOutcome, EngineError> + Send + Sync + 'static,
    {
        Self {
            behavior: Box::new(behavior),
            capabilities: Vec::new(),
            executions: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Reads the fixture body for markers and reacts like a real engine would
    pub fn by_markers() -> Self {
        Self::new(|script| Ok(outcome_for(&script.concatenated())))
    }

    pub fn with_capability(mut self, capability: &str) -> Self {
        self.capabilities.push(capability.to_string());
        self
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

impl EngineAdapter for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    fn execute(
        &self,
        script: &LoadedScript,
        _bindings: &GlobalBindings,
        _limits: &ExecutionLimits,
    ) -> Result<EngineOutcome, EngineError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if let Some(main) = script.main() {
            self.seen.lock().unwrap().push(main.path.clone());
        }
        (self.behavior)(script)
    }
}

/// Outcome keyed on marker comments in the source
///
/// `//@throw`, `//@mismatch`, `//@timeout`, `//@crash`, `//@panic`, and a
/// trailing `"success";` are recognized; anything else completes with
/// `undefined`.
pub fn outcome_for(source: &str) -> EngineOutcome {
    if source.contains("//@panic") {
        panic!("scripted engine panic");
    }
    if source.contains("//@timeout") {
        return EngineOutcome::TimedOut {
            limit: std::time::Duration::from_millis(50),
            log: ExecutionLog::default(),
        };
    }
    if source.contains("//@crash") {
        return EngineOutcome::Crashed {
            reason: "engine exited with signal: 11".to_string(),
            log: ExecutionLog::default(),
        };
    }
    if source.contains("//@mismatch") {
        let mut log = ExecutionLog::default();
        log.mismatches.push(fixture_harness::AssertionMismatch {
            assertion: "assertEquals".to_string(),
            expected: "4".to_string(),
            actual: "6".to_string(),
            description: None,
        });
        return EngineOutcome::Threw {
            exception: ThrownException {
                name: "AssertionMismatch".to_string(),
                message: "expected 4 but got 6".to_string(),
                stack: None,
                file: None,
            },
            log,
        };
    }
    if source.contains("//@throw") {
        return EngineOutcome::threw(ThrownException {
            name: "TypeError".to_string(),
            message: "o.foo is not a function".to_string(),
            stack: None,
            file: None,
        });
    }
    if source.trim_end().ends_with("\"success\";") {
        return EngineOutcome::completed(CompletionValue::string("success"));
    }
    EngineOutcome::completed(CompletionValue::undefined())
}

/// Write `files` (relative path, contents) under `root`
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }
}
