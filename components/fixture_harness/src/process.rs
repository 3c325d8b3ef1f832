//! Engine adapter that runs a JavaScript shell as a child process
//!
//! One process per execution gives every fixture its own global environment.
//! The driver script is written to a temp file and passed as the last
//! argument, which works for `rhino`, `d8`, `node`, `js` and `corten-js --file`
//! alike.
//!
//! On Unix the engine leads its own process group, so a timeout kills any
//! helper processes a wrapper script started along with it.

use crate::assertions::{parse_record, record_marker, GlobalBindings, HarnessRecord};
use crate::config::EngineConfig;
use crate::engine::{
    CompletionValue, EngineAdapter, EngineOutcome, ExecutionLimits, ExecutionLog, ThrownException,
};
use crate::error::EngineError;
use crate::loader::LoadedScript;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// How often the child is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How long to wait for buffered output after the child is gone
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Stderr lines quoted in crash reasons
const STDERR_TAIL: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Runs fixtures through an external engine executable
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    config: EngineConfig,
    working_dir: Option<PathBuf>,
}

impl ProcessEngine {
    /// Create an adapter for the configured engine
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            working_dir: None,
        }
    }

    /// Shorthand for an engine with arguments and no extra settings
    pub fn from_command(program: impl Into<String>, args: Vec<String>) -> Self {
        Self::new(EngineConfig {
            program: program.into(),
            args,
            ..EngineConfig::default()
        })
    }

    /// Run the engine from `dir` instead of the current directory
    pub fn with_working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn command(&self, driver: &Path) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(driver)
            .envs(&self.config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }

    /// Wait for the child, killing it once `timeout` has passed
    ///
    /// Returns `None` when the child had to be killed.
    fn wait(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>, EngineError> {
        wait_with(child, timeout, Child::try_wait)
    }
}

fn wait_with<F>(
    child: &mut Child,
    timeout: Duration,
    mut poll: F,
) -> Result<Option<ExitStatus>, EngineError>
where
    F: FnMut(&mut Child) -> io::Result<Option<ExitStatus>>,
{
    let start = Instant::now();
    loop {
        match poll(child) {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if start.elapsed() >= timeout => {
                terminate(child)?;
                return Ok(None);
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                tracing::warn!("polling engine failed, killing it: {e}");
                if let Err(kill_err) = terminate(child) {
                    tracing::debug!("terminating engine failed: {kill_err}");
                }
                return Err(e.into());
            }
        }
    }
}

/// Kill the engine with everything it started and reap it
fn terminate(child: &mut Child) -> io::Result<()> {
    kill_group(child);
    // The child may exit between the check and the kill
    if let Err(e) = child.kill() {
        tracing::debug!("kill failed: {e}");
    }
    child.wait().map(|_| ())
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    let Ok(group) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    // SAFETY: kill(2) takes no pointers. The group id is the engine's pid
    // from `process_group(0)`.
    if unsafe { libc::kill(-group, libc::SIGKILL) } != 0 {
        tracing::debug!(
            "killing process group {group} failed: {}",
            io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

impl EngineAdapter for ProcessEngine {
    fn name(&self) -> &str {
        &self.config.program
    }

    fn supports(&self, capability: &str) -> bool {
        self.config.capabilities.iter().any(|c| c == capability)
    }

    fn execute(
        &self,
        script: &LoadedScript,
        bindings: &GlobalBindings,
        limits: &ExecutionLimits,
    ) -> Result<EngineOutcome, EngineError> {
        let marker = record_marker(&Uuid::new_v4().simple().to_string());
        let driver = bindings.driver_source(script, &marker)?;
        let mut file = tempfile::Builder::new()
            .prefix("fixture-driver-")
            .suffix(".js")
            .tempfile()?;
        file.write_all(driver.as_bytes())?;
        file.flush()?;

        let mut child = self
            .command(file.path())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let (tx, rx) = channel::unbounded();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, Stream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, Stream::Stderr, tx.clone());
        }
        drop(tx);

        let status = Self::wait(&mut child, limits.timeout)?;

        let mut collector = OutputCollector::new(marker);
        for (stream, line) in drain(&rx) {
            collector.accept(stream, &line);
        }

        Ok(match status {
            Some(status) => collector.finish(status),
            None => EngineOutcome::TimedOut {
                limit: limits.timeout,
                log: collector.log,
            },
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(source: R, stream: Stream, tx: Sender<(Stream, String)>) {
    std::thread::spawn(move || {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(&['\n', '\r'][..]).to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("engine {:?} read failed: {e}", stream);
                    break;
                }
            }
        }
    });
}

/// Collect the readers' output once the child is gone
///
/// A grandchild still holding the pipes open must not stall the run, so
/// collection stops after a short quiet period.
fn drain(rx: &Receiver<(Stream, String)>) -> Vec<(Stream, String)> {
    let mut lines = Vec::new();
    loop {
        match rx.recv_timeout(DRAIN_GRACE) {
            Ok(item) => lines.push(item),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!("engine output still open after exit, stopping collection");
                break;
            }
        }
    }
    lines
}

enum Terminal {
    Completed(CompletionValue),
    Threw(ThrownException),
}

/// Turns raw engine output into an [`EngineOutcome`]
struct OutputCollector {
    marker: String,
    log: ExecutionLog,
    terminal: Option<Terminal>,
}

impl OutputCollector {
    fn new(marker: String) -> Self {
        Self {
            marker,
            log: ExecutionLog::default(),
            terminal: None,
        }
    }

    fn accept(&mut self, stream: Stream, line: &str) {
        if stream == Stream::Stderr {
            self.log.stderr.push(line.to_string());
            return;
        }

        match parse_record(line, &self.marker) {
            None => self.log.output.push(line.to_string()),
            Some(Err(e)) => {
                tracing::warn!("{e}");
                self.log.output.push(line.to_string());
            }
            Some(Ok(record)) => self.record(record),
        }
    }

    fn record(&mut self, record: HarnessRecord) {
        match record {
            HarnessRecord::Assertion(mismatch) => self.log.mismatches.push(mismatch),
            HarnessRecord::Status { message } => self.log.status.push(message),
            HarnessRecord::Trace { message } => self.log.trace.push(message),
            HarnessRecord::Completed { value_type, value } => {
                self.terminal = Some(Terminal::Completed(CompletionValue {
                    type_of: value_type,
                    display: value,
                }));
            }
            HarnessRecord::Threw {
                name,
                message,
                stack,
                file,
            } => {
                self.terminal = Some(Terminal::Threw(ThrownException {
                    name,
                    message,
                    stack,
                    file: file.map(PathBuf::from),
                }));
            }
        }
    }

    fn finish(self, status: ExitStatus) -> EngineOutcome {
        let log = self.log;
        match self.terminal {
            Some(Terminal::Completed(value)) => EngineOutcome::Completed { value, log },
            Some(Terminal::Threw(exception)) => EngineOutcome::Threw { exception, log },
            None => {
                let mut reason = format!("engine exited with {} without reporting an outcome", status);
                let tail: Vec<&str> = log
                    .stderr
                    .iter()
                    .rev()
                    .take(STDERR_TAIL)
                    .rev()
                    .map(String::as_str)
                    .collect();
                if !tail.is_empty() {
                    reason.push_str(": ");
                    reason.push_str(&tail.join(" | "));
                }
                EngineOutcome::Crashed { reason, log }
            }
        }
    }
}
