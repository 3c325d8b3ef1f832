//! Fixture Runner
//!
//! Command-line front end for the fixture harness.
//!
//! Exit codes: 0 when every fixture passed or was skipped, 1 when any
//! fixture failed, errored or crashed, 2 when the harness itself could not
//! be set up.

use clap::{ArgAction, Args, Parser, Subcommand};
use fixture_harness::logging::init_tracing;
use fixture_harness::{
    ConfigError, HarnessConfig, ProcessEngine, ReportBuilder, ReportFormat, TestRunner,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "fixture-runner", version, about = "Run JavaScript fixtures against an external engine")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute fixtures and print a report
    Run(RunArgs),
    /// Print the fixtures a run would execute
    List(ListArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Fixture files or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    #[command(flatten)]
    settings: SettingsArgs,

    /// Report format: text, json or lines
    #[arg(long, default_value = "text")]
    format: ReportFormat,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ListArgs {
    /// Fixture files or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    #[command(flatten)]
    settings: SettingsArgs,
}

#[derive(Args)]
struct SettingsArgs {
    /// YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only run fixtures whose relative path matches this glob
    #[arg(long)]
    filter: Option<String>,

    /// Per-fixture timeout in milliseconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Engine executable
    #[arg(long)]
    engine: Option<String>,

    /// Argument passed to the engine before the script (repeatable)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Engine capability to advertise (repeatable)
    #[arg(long = "capability")]
    capabilities: Vec<String>,

    /// Directory `load()` paths are resolved against
    #[arg(long)]
    root: Option<PathBuf>,

    /// Number of fixtures to run concurrently
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Skip-list file
    #[arg(long)]
    skip_list: Option<PathBuf>,

    /// Require every fixture to complete with "success"
    #[arg(long)]
    require_success: bool,

    /// Record enterFunc/exitFunc traces
    #[arg(long)]
    trace: bool,
}

impl SettingsArgs {
    /// Config file values with command-line overrides applied
    fn resolve(&self) -> Result<HarnessConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_file(path)?,
            None => HarnessConfig::default(),
        };

        if let Some(filter) = &self.filter {
            config.filter = Some(filter.clone());
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = timeout;
        }
        if let Some(engine) = &self.engine {
            config.engine.program = engine.clone();
        }
        if !self.engine_args.is_empty() {
            config.engine.args = self.engine_args.clone();
        }
        config
            .engine
            .capabilities
            .extend(self.capabilities.iter().cloned());
        if let Some(root) = &self.root {
            config.source_root = root.clone();
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs;
        }
        if let Some(skip_list) = &self.skip_list {
            config.skip_list = Some(skip_list.clone());
        }
        config.require_success_sentinel |= self.require_success;
        config.trace |= self.trace;

        config.validate()?;
        Ok(config)
    }

    fn runner(&self) -> Result<TestRunner, ConfigError> {
        let config = self.resolve()?;
        let engine = Arc::new(ProcessEngine::new(config.engine.clone()));
        TestRunner::new(config, engine)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Command::Run(args) => run(args),
        Command::List(args) => list(args),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

fn run(args: &RunArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let runner = args.settings.runner()?;
    check_paths(&args.paths)?;

    let start = Instant::now();
    let mut builder = ReportBuilder::new();
    for path in &args.paths {
        builder.add_report(runner.run(path));
    }
    let report = builder.build();
    let duration = start.elapsed();

    let rendered = report.render(args.format)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            eprintln!("{}", report.summary());
            eprintln!("Report written to {}", path.display());
        }
        None => {
            print!("{}", rendered);
            if !rendered.ends_with('\n') {
                println!();
            }
            if args.format == ReportFormat::Text {
                println!("Time: {:.2}s", duration.as_secs_f64());
            }
        }
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn list(args: &ListArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let runner = args.settings.runner()?;
    check_paths(&args.paths)?;

    let mut count = 0;
    for path in &args.paths {
        for fixture in runner.discover(path) {
            println!("{}", fixture.path.display());
            count += 1;
        }
    }
    eprintln!("{} fixture(s)", count);
    Ok(ExitCode::SUCCESS)
}

fn check_paths(paths: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    for path in paths {
        if !path.exists() {
            return Err(format!("fixture path not found: {}", path.display()).into());
        }
    }
    Ok(())
}
