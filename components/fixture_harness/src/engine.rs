//! The seam to an external JavaScript engine
//!
//! The harness never evaluates JavaScript itself. An [`EngineAdapter`] takes a
//! loaded script plus the assertion bindings and reports what happened. Every
//! call must run in a fresh global environment: nothing a fixture does may be
//! visible to the next one.

use crate::assertions::{AssertionMismatch, GlobalBindings};
use crate::error::EngineError;
use crate::fixture::SUCCESS_SENTINEL;
use crate::loader::LoadedScript;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Resource bounds for one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    /// Wall-clock limit; the engine is stopped when it is exceeded
    pub timeout: Duration,
}

impl ExecutionLimits {
    /// Limits with the given timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// The value a script completed with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionValue {
    /// `typeof` the value
    pub type_of: String,
    /// Raw text for strings, the engine's rendering otherwise
    pub display: String,
}

impl CompletionValue {
    /// A string completion value
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            type_of: "string".to_string(),
            display: value.into(),
        }
    }

    /// The `undefined` completion value
    pub fn undefined() -> Self {
        Self {
            type_of: "undefined".to_string(),
            display: "undefined".to_string(),
        }
    }

    /// Whether this is the string `"success"`
    pub fn is_success_sentinel(&self) -> bool {
        self.type_of == "string" && self.display == SUCCESS_SENTINEL
    }
}

impl fmt::Display for CompletionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.type_of == "string" {
            write!(f, "{:?}", self.display)
        } else {
            write!(f, "{}", self.display)
        }
    }
}

/// An exception that escaped the fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrownException {
    /// Exception `name` (`TypeError`, ...) or `typeof` for thrown primitives
    pub name: String,
    /// Exception message
    pub message: String,
    /// Engine stack trace, if available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// File that was executing when it was thrown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl fmt::Display for ThrownException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)?;
        if let Some(file) = &self.file {
            write!(f, " (in {})", file.display())?;
        }
        Ok(())
    }
}

/// Everything a fixture reported besides its final outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionLog {
    /// Assertion mismatches, in the order they happened
    pub mismatches: Vec<AssertionMismatch>,
    /// `printStatus` / `printBugNumber` messages
    pub status: Vec<String>,
    /// `enterFunc` / `exitFunc` trace
    pub trace: Vec<String>,
    /// Any other stdout output
    pub output: Vec<String>,
    /// Engine stderr output
    pub stderr: Vec<String>,
}

/// What an engine reports for one execution
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutcome {
    /// The script ran to completion
    Completed {
        /// Completion value of the fixture body
        value: CompletionValue,
        /// Recorded side channel
        log: ExecutionLog,
    },
    /// The script raised an exception it did not catch
    Threw {
        /// The exception
        exception: ThrownException,
        /// Recorded side channel
        log: ExecutionLog,
    },
    /// The script exceeded its timeout and was stopped
    TimedOut {
        /// The limit that was exceeded
        limit: Duration,
        /// Whatever was recorded before it was stopped
        log: ExecutionLog,
    },
    /// The engine terminated without reporting an outcome
    Crashed {
        /// What the harness observed
        reason: String,
        /// Whatever was recorded before it died
        log: ExecutionLog,
    },
}

impl EngineOutcome {
    /// Completed with no side output
    pub fn completed(value: CompletionValue) -> Self {
        EngineOutcome::Completed {
            value,
            log: ExecutionLog::default(),
        }
    }

    /// Threw with no side output
    pub fn threw(exception: ThrownException) -> Self {
        EngineOutcome::Threw {
            exception,
            log: ExecutionLog::default(),
        }
    }

    /// The side channel of this outcome
    pub fn log(&self) -> &ExecutionLog {
        match self {
            EngineOutcome::Completed { log, .. }
            | EngineOutcome::Threw { log, .. }
            | EngineOutcome::TimedOut { log, .. }
            | EngineOutcome::Crashed { log, .. } => log,
        }
    }

    /// Mutable access to the side channel
    pub fn log_mut(&mut self) -> &mut ExecutionLog {
        match self {
            EngineOutcome::Completed { log, .. }
            | EngineOutcome::Threw { log, .. }
            | EngineOutcome::TimedOut { log, .. }
            | EngineOutcome::Crashed { log, .. } => log,
        }
    }
}

/// A JavaScript-executing engine
///
/// Implementations are shared across worker threads, so any per-execution
/// state must live inside `execute`.
pub trait EngineAdapter: Send + Sync {
    /// Name used in logs and reports
    fn name(&self) -> &str;

    /// Whether the engine provides an optional introspection capability
    fn supports(&self, _capability: &str) -> bool {
        false
    }

    /// Run a script in a fresh global environment seeded with `bindings`
    fn execute(
        &self,
        script: &LoadedScript,
        bindings: &GlobalBindings,
        limits: &ExecutionLimits,
    ) -> Result<EngineOutcome, EngineError>;
}
