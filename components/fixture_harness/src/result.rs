use crate::assertions::AssertionMismatch;
use crate::engine::ThrownException;
use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a fixture failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// An assertion primitive saw differing values
    AssertionMismatch {
        /// First mismatch the fixture hit
        mismatch: AssertionMismatch,
        /// How many mismatches were recorded in total
        total: usize,
    },
    /// The fixture completed with something other than `"success"`
    SentinelMismatch {
        /// Completion value actually produced
        actual: String,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::AssertionMismatch { mismatch, total } if *total > 1 => {
                write!(f, "{} (+{} more)", mismatch, total - 1)
            }
            FailureReason::AssertionMismatch { mismatch, .. } => write!(f, "{}", mismatch),
            FailureReason::SentinelMismatch { actual } => {
                write!(f, "expected completion value \"success\" but got {}", actual)
            }
        }
    }
}

/// Why a fixture errored before it could pass or fail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum ErrorCause {
    /// The fixture raised an exception nothing caught
    UncaughtException {
        /// What was thrown
        exception: ThrownException,
    },
    /// The fixture's source could not be assembled
    Load {
        /// Loader failure
        error: LoadError,
    },
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCause::UncaughtException { exception } => {
                write!(f, "uncaught exception: {}", exception)
            }
            ErrorCause::Load { error } => write!(f, "{}", error),
        }
    }
}

/// Why a fixture crashed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrashReason {
    /// The fixture did not finish within the configured bound
    Timeout {
        /// The bound, in milliseconds
        limit_ms: u64,
    },
    /// The engine died or never reported an outcome
    Abnormal {
        /// What the harness observed
        message: String,
    },
}

impl fmt::Display for CrashReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrashReason::Timeout { limit_ms } => write!(f, "timeout after {} ms", limit_ms),
            CrashReason::Abnormal { message } => write!(f, "{}", message),
        }
    }
}

/// Result of running a single fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ExecutionResult {
    /// Fixture passed
    Passed,
    /// An assertion or the success sentinel did not hold
    Failed(FailureReason),
    /// The fixture raised, or could not be loaded
    Errored(ErrorCause),
    /// Timeout or abnormal engine termination
    Crashed(CrashReason),
    /// Not executed (skip list or missing engine capability)
    Skipped(String),
}

impl ExecutionResult {
    /// Check if the result is a pass
    pub fn is_pass(&self) -> bool {
        matches!(self, ExecutionResult::Passed)
    }

    /// Check if the result is a failure
    pub fn is_fail(&self) -> bool {
        matches!(self, ExecutionResult::Failed(_))
    }

    /// Check if the result is an error
    pub fn is_error(&self) -> bool {
        matches!(self, ExecutionResult::Errored(_))
    }

    /// Check if the result is a crash (including timeouts)
    pub fn is_crash(&self) -> bool {
        matches!(self, ExecutionResult::Crashed(_))
    }

    /// Check if the result is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionResult::Crashed(CrashReason::Timeout { .. }))
    }

    /// Check if the result is a skip
    pub fn is_skip(&self) -> bool {
        matches!(self, ExecutionResult::Skipped(_))
    }

    /// Short uppercase label used in line-oriented reports
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionResult::Passed => "PASS",
            ExecutionResult::Failed(_) => "FAIL",
            ExecutionResult::Errored(_) => "ERROR",
            ExecutionResult::Crashed(CrashReason::Timeout { .. }) => "TIMEOUT",
            ExecutionResult::Crashed(_) => "CRASH",
            ExecutionResult::Skipped(_) => "SKIP",
        }
    }

    /// Human-readable detail, empty for passes
    pub fn detail(&self) -> String {
        match self {
            ExecutionResult::Passed => String::new(),
            ExecutionResult::Failed(reason) => reason.to_string(),
            ExecutionResult::Errored(cause) => cause.to_string(),
            ExecutionResult::Crashed(reason) => reason.to_string(),
            ExecutionResult::Skipped(reason) => reason.clone(),
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionResult::Passed => write!(f, "PASS"),
            other => write!(f, "{}: {}", other.label(), other.detail()),
        }
    }
}
