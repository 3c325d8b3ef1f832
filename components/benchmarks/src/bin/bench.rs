//! Fixture Bench CLI
//!
//! Runs JavaScript micro-benchmark scripts on an external engine.

use benchmarks::runner::{format_results, format_results_json};
use benchmarks::{BenchOptions, BenchmarkRunner, BenchmarkSuite, Iterations};
use clap::{ArgAction, Parser};
use fixture_harness::logging::init_tracing;
use fixture_harness::{HarnessConfig, ProcessEngine};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "fixture-bench", version, about = "Time JavaScript micro-benchmarks on an external engine")]
struct Cli {
    /// Benchmark scripts or directories
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// YAML harness config (engine, source_root)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Engine executable
    #[arg(long)]
    engine: Option<String>,

    /// Argument passed to the engine before the script (repeatable)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Script evaluated before each benchmark script (repeatable)
    #[arg(long)]
    setup: Vec<PathBuf>,

    /// Only run entry points whose name matches this regex
    #[arg(long)]
    filter: Option<String>,

    /// Untimed calls per entry point
    #[arg(long, default_value_t = 100)]
    warmup: u64,

    /// Timed calls per entry point
    #[arg(short, long, default_value_t = 1_000)]
    iterations: u64,

    /// Limit for one script's whole run, in milliseconds
    #[arg(long, default_value_t = 60_000)]
    timeout: u64,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(engine) = &cli.engine {
        config.engine.program = engine.clone();
    }
    if !cli.engine_args.is_empty() {
        config.engine.args = cli.engine_args.clone();
    }
    config.validate()?;

    let mut options = BenchOptions {
        iterations: Iterations {
            warmup: cli.warmup,
            measured: cli.iterations,
        },
        source_root: config.source_root.clone(),
        setup: cli.setup.clone(),
        filter: None,
        timeout: Duration::from_millis(cli.timeout),
    };
    if let Some(filter) = &cli.filter {
        options = options.with_filter(filter)?;
    }

    let engine = Arc::new(ProcessEngine::new(config.engine.clone()));
    let runner = BenchmarkRunner::new(engine, options)?;

    let mut suite = BenchmarkSuite::new();
    for path in &cli.paths {
        if !path.exists() {
            return Err(format!("benchmark path not found: {}", path.display()).into());
        }
        suite.scripts.extend(BenchmarkSuite::discover(path)?.scripts);
    }

    if !cli.json {
        println!(
            "Running {} benchmark(s) from {} script(s) on {}...",
            suite.len(),
            suite.scripts.len(),
            config.engine.program
        );
    }

    let results = runner.run_suite(&suite);
    let failed = results.iter().filter(|r| !r.success).count();

    if cli.json {
        println!("{}", format_results_json(&results)?);
    } else {
        println!("{}", format_results(&results));

        let total_time: f64 = results.iter().map(|r| r.duration_ms).sum();
        println!("\nSummary:");
        println!("  Total benchmarks: {}", results.len());
        println!("  Successful: {}", results.len() - failed);
        println!("  Failed: {}", failed);
        println!("  Total time: {:.2} ms ({:.2} s)", total_time, total_time / 1000.0);
    }

    Ok(if failed > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}
