//! Assertion primitives seeded into every fixture's global scope
//!
//! The primitives are plain JavaScript (see [`HARNESS_PRELUDE`]) so that any
//! engine can host them. They report back to the harness by printing one
//! JSON record per line, prefixed with a per-execution marker built by
//! [`record_marker`]. This module owns both halves of that exchange:
//! generating the driver script and turning the records into an
//! [`ExecutionResult`].

use crate::engine::EngineOutcome;
use crate::error::EngineError;
use crate::loader::LoadedScript;
use crate::result::{CrashReason, ErrorCause, ExecutionResult, FailureReason};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Common prefix of every record marker
pub const RECORD_MARKER: &str = "@@harness";

/// Globals the prelude installs
pub const PRIMITIVES: &[&str] = &[
    "assertEquals",
    "assertTrue",
    "assertFalse",
    "reportCompare",
    "enterFunc",
    "exitFunc",
    "printStatus",
    "printBugNumber",
    "inSection",
    "load",
];

/// JavaScript installing the assertion primitives
///
/// Written in ES5 so older shells can run it. `__harness.run` evaluates the
/// whole fixture, dependencies included, as one program through indirect
/// eval, so top-level `const`, `let` and `class` declarations in helper
/// files stay visible to the body. The program calls `__harness.reinstall`
/// right before the body so a helper file cannot replace the primitives,
/// while function declarations in the body itself are left alone.
pub const HARNESS_PRELUDE: &str = r#"var __harness = (function (global) {
  var stringify = JSON.stringify;
  var hasOwn = Object.prototype.hasOwnProperty;
  var compile = Function;
  var settings = { trace: false, marker: "@@harness " };
  var write;
  if (typeof print === "function") {
    var shellPrint = print;
    write = function (line) { shellPrint(line); };
  } else {
    var consoleLog = console.log;
    write = function (line) { consoleLog.call(console, line); };
  }

  function emit(record) {
    write(settings.marker + stringify(record));
  }

  function describe(value) {
    switch (typeof value) {
      case "string":
        return stringify(value);
      case "undefined":
        return "undefined";
      case "function":
        return "function " + (value.name || "<anonymous>");
      case "number":
        return value === 0 && 1 / value < 0 ? "-0" : String(value);
      case "bigint":
        return String(value) + "n";
      case "symbol":
        return value.toString();
    }
    if (value === null) {
      return "null";
    }
    try {
      var json = stringify(value);
      if (json !== undefined) {
        return json;
      }
    } catch (e) {}
    try {
      return String(value);
    } catch (e) {
      return "<unprintable>";
    }
  }

  function same(expected, actual) {
    return expected === actual || (expected !== expected && actual !== actual);
  }

  function AssertionMismatch(record) {
    this.name = "AssertionMismatch";
    this.message = (record.description !== null ? record.description + ": " : "") +
      "expected " + record.expected + " but got " + record.actual;
    try {
      var stack = new Error(this.message).stack;
      if (typeof stack === "string") {
        this.stack = stack;
      }
    } catch (e) {}
  }
  AssertionMismatch.prototype = Object.create(Error.prototype);
  AssertionMismatch.prototype.constructor = AssertionMismatch;

  function mismatch(assertion, expected, actual, description) {
    var record = {
      event: "assertion",
      assertion: assertion,
      expected: describe(expected),
      actual: describe(actual),
      description: description === undefined ? null : String(description)
    };
    emit(record);
    return new AssertionMismatch(record);
  }

  var bindings = {
    assertEquals: function (expected, actual, description) {
      if (!same(expected, actual)) {
        throw mismatch("assertEquals", expected, actual, description);
      }
    },
    assertTrue: function (value, description) {
      if (value !== true) {
        throw mismatch("assertTrue", true, value, description);
      }
    },
    assertFalse: function (value, description) {
      if (value !== false) {
        throw mismatch("assertFalse", false, value, description);
      }
    },
    reportCompare: function (expected, actual, description) {
      if (!same(expected, actual)) {
        mismatch("reportCompare", expected, actual, description);
      }
    },
    enterFunc: function (name) {
      if (settings.trace) {
        emit({ event: "trace", message: "enter " + name });
      }
    },
    exitFunc: function (name) {
      if (settings.trace) {
        emit({ event: "trace", message: "exit " + name });
      }
    },
    printStatus: function (message) {
      emit({ event: "status", message: String(message) });
    },
    printBugNumber: function (number) {
      emit({ event: "status", message: "BUGNUMBER: " + number });
    },
    inSection: function (section) {
      return "Section " + section + " of test - ";
    },
    load: function () {}
  };

  function reinstall(keep) {
    for (var name in bindings) {
      if (hasOwn.call(bindings, name) && keep.indexOf(name) === -1) {
        global[name] = bindings[name];
      }
    }
  }

  function errorName(error) {
    if (error !== null && typeof error === "object" && error.name !== undefined) {
      try {
        return String(error.name);
      } catch (e) {}
    }
    return typeof error;
  }

  function errorMessage(error) {
    if (typeof error === "string") {
      return error;
    }
    if (error !== null && typeof error === "object" && error.message !== undefined) {
      try {
        return String(error.message);
      } catch (e) {}
    }
    return describe(error);
  }

  function errorStack(error) {
    try {
      if (error !== null && typeof error === "object" && typeof error.stack === "string") {
        return error.stack;
      }
    } catch (e) {}
    return null;
  }

  function errorLine(error) {
    if (error === null || typeof error !== "object") {
      return null;
    }
    try {
      if (typeof error.lineNumber === "number" && / > eval/.test(String(error.fileName))) {
        return error.lineNumber;
      }
      var frame = /(?:<anonymous>|> eval):(\d+):\d+/.exec(String(error.stack));
      if (frame) {
        return Number(frame[1]);
      }
    } catch (e) {}
    return null;
  }

  function segmentAt(segments, line) {
    for (var i = 0; i < segments.length; i++) {
      if (line >= segments[i].start && line < segments[i].start + segments[i].lines) {
        return segments[i].path;
      }
    }
    return null;
  }

  function unparsable(program) {
    var lines = program.source.split(/\r\n|[\n\r\u2028\u2029]/);
    for (var i = 0; i < program.segments.length; i++) {
      var segment = program.segments[i];
      try {
        compile(lines.slice(segment.start - 1, segment.start - 1 + segment.lines).join("\n"));
      } catch (e) {
        if (e instanceof SyntaxError) {
          return segment.path;
        }
      }
    }
    return null;
  }

  function origin(error, program) {
    var line = errorLine(error);
    if (line !== null) {
      return segmentAt(program.segments, line);
    }
    if (error instanceof SyntaxError) {
      return unparsable(program);
    }
    return null;
  }

  function run(program) {
    var evaluate = global.eval;
    var value;
    reinstall([]);
    try {
      value = evaluate(program.source);
    } catch (error) {
      emit({
        event: "threw",
        name: errorName(error),
        message: errorMessage(error),
        stack: errorStack(error),
        file: origin(error, program)
      });
      return;
    }
    emit({
      event: "completed",
      type: typeof value,
      value: typeof value === "string" ? value : describe(value)
    });
  }

  function configure(options) {
    for (var key in options) {
      if (hasOwn.call(options, key)) {
        settings[key] = options[key];
      }
    }
  }

  var api = { configure: configure, reinstall: reinstall, run: run };
  global.__harness = api;
  return api;
})(typeof globalThis !== "undefined" ? globalThis : this);
"#;

fn function_declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*function(?:[ \t]*\*[ \t]*|[ \t]+)([A-Za-z_$][\w$]*)[ \t]*\(")
            .expect("function declaration pattern is valid")
    })
}

/// Primitives a fixture body declares as top-level functions
///
/// Those declarations are hoisted to the start of the program, so the
/// reinstall before the body must skip them or the body's own version would
/// be replaced.
pub fn declared_primitives(source: &str) -> Vec<&'static str> {
    let declared: HashSet<&str> = function_declaration_re()
        .captures_iter(source)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();
    PRIMITIVES
        .iter()
        .copied()
        .filter(|name| declared.contains(name))
        .collect()
}

/// Marker for one execution's records
///
/// The token keeps fixture output that happens to start with
/// [`RECORD_MARKER`] from being read as a record.
pub fn record_marker(token: &str) -> String {
    format!("{}:{} ", RECORD_MARKER, token)
}

/// Settings passed to the prelude before the fixture runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalBindings {
    /// Emit `enterFunc`/`exitFunc` trace records
    pub trace: bool,
}

#[derive(Serialize)]
struct DriverSettings<'a> {
    trace: bool,
    marker: &'a str,
}

/// Where a file landed inside the evaluated program
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramSegment {
    /// File the lines came from
    pub path: String,
    /// First line, 1-based
    pub start: usize,
    /// Number of lines
    pub lines: usize,
}

/// The single program a fixture is evaluated as
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Program {
    /// Dependencies, the reinstall call, the body and any trailing segments
    pub source: String,
    /// Line ranges used to attribute exceptions to files
    pub segments: Vec<ProgramSegment>,
}

impl Program {
    /// Join a loaded script into one program
    pub fn assemble(script: &LoadedScript) -> Result<Self, EngineError> {
        let body = script.body_index();
        let mut source = String::new();
        let mut segments = Vec::with_capacity(script.segments().len());
        let mut line = 1;

        for (index, segment) in script.segments().iter().enumerate() {
            if Some(index) == body {
                source.push_str("__harness.reinstall(");
                source.push_str(&js_literal(&declared_primitives(&segment.source))?);
                source.push_str(");\n");
                line += 1;
            }

            let lines = line_count(&segment.source);
            source.push_str(&segment.source);
            if !ends_with_terminator(&segment.source) {
                source.push('\n');
            }
            segments.push(ProgramSegment {
                path: segment.path.display().to_string(),
                start: line,
                lines,
            });
            line += lines;
        }

        Ok(Self { source, segments })
    }

    /// File containing `line`, if any
    pub fn segment_at(&self, line: usize) -> Option<&ProgramSegment> {
        self.segments
            .iter()
            .find(|s| line >= s.start && line < s.start + s.lines)
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn ends_with_terminator(text: &str) -> bool {
    text.chars().next_back().map(is_terminator).unwrap_or(false)
}

/// Lines `text` occupies once terminated, counted the way JavaScript does
fn line_count(text: &str) -> usize {
    let mut count = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' && chars.peek() == Some(&'\n') {
            continue;
        }
        if is_terminator(c) {
            count += 1;
        }
    }
    if ends_with_terminator(text) {
        count
    } else {
        count + 1
    }
}

impl GlobalBindings {
    /// Build the complete script an engine runs for one fixture
    ///
    /// `marker` prefixes every record the prelude prints; see
    /// [`record_marker`].
    pub fn driver_source(&self, script: &LoadedScript, marker: &str) -> Result<String, EngineError> {
        let settings = js_literal(&DriverSettings {
            trace: self.trace,
            marker,
        })?;
        let program = js_literal(&Program::assemble(script)?)?;

        let mut driver = String::with_capacity(HARNESS_PRELUDE.len() + program.len() + 64);
        driver.push_str(HARNESS_PRELUDE);
        driver.push_str("__harness.configure(");
        driver.push_str(&settings);
        driver.push_str(");\n__harness.run(");
        driver.push_str(&program);
        driver.push_str(");\n");
        Ok(driver)
    }
}

/// JSON that is also a valid ES5 literal
fn js_literal<T: Serialize + ?Sized>(value: &T) -> Result<String, EngineError> {
    let json = serde_json::to_string(value).map_err(|e| EngineError::Protocol {
        line: String::new(),
        message: e.to_string(),
    })?;
    Ok(json.replace('\u{2028}', "\\u2028").replace('\u{2029}', "\\u2029"))
}


/// A failed assertion as recorded by the prelude
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionMismatch {
    /// Primitive that failed (`assertEquals`, `reportCompare`, ...)
    pub assertion: String,
    /// Expected value, rendered by the engine
    pub expected: String,
    /// Actual value, rendered by the engine
    pub actual: String,
    /// Description passed by the fixture
    pub description: Option<String>,
}

impl std::fmt::Display for AssertionMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ", self.assertion)?;
        if let Some(description) = &self.description {
            write!(f, "{}: ", description)?;
        }
        write!(f, "expected {} but got {}", self.expected, self.actual)
    }
}

/// One line of prelude output
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HarnessRecord {
    /// An assertion primitive saw a mismatch
    Assertion(AssertionMismatch),
    /// `printStatus` / `printBugNumber`
    Status {
        /// Message text
        message: String,
    },
    /// `enterFunc` / `exitFunc`
    Trace {
        /// Message text
        message: String,
    },
    /// The fixture ran to completion
    Completed {
        /// `typeof` the completion value
        #[serde(rename = "type")]
        value_type: String,
        /// The value itself for strings, a rendering otherwise
        value: String,
    },
    /// The fixture raised an exception it did not catch
    Threw {
        /// Exception `name`, or `typeof` for non-objects
        name: String,
        /// Exception message
        message: String,
        /// Stack trace when the engine provides one
        stack: Option<String>,
        /// Segment that was executing
        file: Option<String>,
    },
}

/// Parse a line of engine output
///
/// Returns `None` for lines that do not start with `marker`.
pub fn parse_record(line: &str, marker: &str) -> Option<Result<HarnessRecord, EngineError>> {
    let payload = line.trim_end_matches('\r').strip_prefix(marker)?;
    Some(
        serde_json::from_str(payload).map_err(|e| EngineError::Protocol {
            line: payload.to_string(),
            message: e.to_string(),
        }),
    )
}

/// The assertion library: bindings for the engine plus outcome grading
#[derive(Debug, Clone, Default)]
pub struct AssertionLibrary {
    bindings: GlobalBindings,
    require_sentinel: bool,
}

impl AssertionLibrary {
    /// Create a library with the given bindings settings
    pub fn new(bindings: GlobalBindings) -> Self {
        Self {
            bindings,
            require_sentinel: false,
        }
    }

    /// Require every fixture to complete with `"success"`
    pub fn with_required_sentinel(mut self, required: bool) -> Self {
        self.require_sentinel = required;
        self
    }

    /// Bindings handed to the engine adapter
    pub fn bindings(&self) -> &GlobalBindings {
        &self.bindings
    }

    /// Grade one engine outcome
    ///
    /// `fixture_expects_sentinel` is set for fixtures that end with a
    /// `"success"` statement; the sentinel is then checked even when the
    /// library does not require it globally.
    pub fn classify(&self, outcome: &EngineOutcome, fixture_expects_sentinel: bool) -> ExecutionResult {
        let mismatches = &outcome.log().mismatches;

        match outcome {
            EngineOutcome::TimedOut { limit, .. } => ExecutionResult::Crashed(CrashReason::Timeout {
                limit_ms: limit.as_millis() as u64,
            }),
            EngineOutcome::Crashed { reason, .. } => {
                ExecutionResult::Crashed(CrashReason::Abnormal {
                    message: reason.clone(),
                })
            }
            _ if !mismatches.is_empty() => {
                ExecutionResult::Failed(FailureReason::AssertionMismatch {
                    mismatch: mismatches[0].clone(),
                    total: mismatches.len(),
                })
            }
            EngineOutcome::Threw { exception, .. } => {
                ExecutionResult::Errored(ErrorCause::UncaughtException {
                    exception: exception.clone(),
                })
            }
            EngineOutcome::Completed { value, .. } => {
                let sentinel_required = self.require_sentinel || fixture_expects_sentinel;
                if sentinel_required && !value.is_success_sentinel() {
                    ExecutionResult::Failed(FailureReason::SentinelMismatch {
                        actual: value.to_string(),
                    })
                } else {
                    ExecutionResult::Passed
                }
            }
        }
    }
}
