// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! The `aethonx` binary: argument parsing, config resolution, and the
//! top-level run/report/exit loop around [`aethonx_runtime::Orchestrator`].

use aethonx_config::CliOverrides;
use aethonx_core::Target;
use aethonx_error::{AethonError, ErrorCategory};
use aethonx_runtime::Orchestrator;
use aethonx_telemetry::{MetricsCollector, ScanMetrics};
use aethonx_writer::StreamingWriter;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Exit code for a scan that ran but finished with errors, or whose output
/// could not be written.
const EXIT_SCAN_ERROR: i32 = 1;
/// Exit code for a configuration or validation error.
const EXIT_CONFIG_ERROR: i32 = 2;

/// Modular reconnaissance engine: stage-scheduled source orchestration with
/// provenance-tracked artifact fusion.
#[derive(Parser, Debug)]
#[command(name = "aethonx", version, about)]
struct Cli {
    /// Target root domain.
    #[arg(long, short = 't')]
    target: Option<String>,

    /// Permit active sources in addition to passive ones.
    #[arg(long, short = 'a', default_value_t = false)]
    active: bool,

    /// Size of the shared worker pool.
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Scan-wide deadline in seconds; `0` means no deadline.
    #[arg(long, short = 'T')]
    timeout: Option<u64>,

    /// Output directory root.
    #[arg(long, short = 'o')]
    out: Option<String>,

    /// Suppress non-essential stdout/stderr output.
    #[arg(long, short = 'q', default_value_t = false)]
    quiet: bool,

    /// Artifact count above which a source's buffer spills to disk.
    #[arg(long, short = 's')]
    streaming: Option<usize>,

    /// Additional retry attempts after a source's first failed call.
    #[arg(long, short = 'r')]
    retries: Option<u32>,

    /// Wrap sources in a circuit breaker in addition to retries.
    #[arg(long, action = clap::ArgAction::Set)]
    circuit_breaker: Option<bool>,

    /// Upstream HTTP proxy URL.
    #[arg(long, short = 'p')]
    proxy: Option<String>,

    /// Per-source toggle or priority: `<name>[.priority]=<value>`. May be
    /// repeated.
    #[arg(long = "src")]
    src: Vec<String>,

    /// Occurrence-counted log verbosity (`-v` debug, `-vv` trace). Does not
    /// change the fixed flag surface above; it only tunes `tracing`.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log formatter.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

fn init_tracing(verbose: u8, format: LogFormat) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("aethonx={level}")));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match run(cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(exit_code_for(&err));
        }
    }
}

fn exit_code_for(err: &AethonError) -> i32 {
    match err.category() {
        ErrorCategory::Configuration => EXIT_CONFIG_ERROR,
        _ => EXIT_SCAN_ERROR,
    }
}

async fn run(cli: Cli) -> Result<i32, AethonError> {
    let quiet = cli.quiet;

    let mut registry = aethonx_registry::SourceRegistry::new();
    aethonx_sources_mock::register_demo_sources(&mut registry);

    let overrides = CliOverrides {
        target: cli.target,
        active: Some(cli.active),
        workers: cli.workers,
        timeout_secs: cli.timeout,
        out_dir: cli.out,
        quiet: Some(cli.quiet),
        streaming_threshold: cli.streaming,
        retries: cli.retries,
        circuit_breaker: cli.circuit_breaker,
        proxy: cli.proxy,
        src_overrides: cli.src,
    };

    let config = aethonx_config::load(overrides, &registry.names())?;
    let target = Target::new(config.target.clone(), config.mode).with_scope(aethonx_core::ScopeFilter::default());
    target.validate()?;

    let sources = registry.build(&config.source_configs)?;

    let writer = Arc::new(StreamingWriter::new(&config.out_dir, config.run_config().writer)?);
    let orchestrator = Orchestrator::new(config.run_config(), Arc::clone(&writer));

    if !quiet {
        eprintln!("aethonx: scanning {} ({} sources)", target.root, sources.len());
    }

    let started = chrono::Utc::now();
    let run = orchestrator.run(target.clone(), sources).await?;
    let duration_ms = (chrono::Utc::now() - started).num_milliseconds().max(0) as u64;

    let metrics = MetricsCollector::new();
    metrics.record(ScanMetrics {
        target: target.root.clone(),
        duration_ms,
        stages_count: 0,
        sources_run: 0,
        artifacts_count: run.document.artifacts.len() as u64,
        warnings_count: run.document.warnings.len() as u64,
        errors_count: run.document.errors.len() as u64,
        canceled: run.scan.finished_at.is_none(),
    });

    if !quiet {
        eprintln!(
            "aethonx: {} artifacts, {} warnings, {} errors -> {}/result.json",
            run.document.artifacts.len(),
            run.document.warnings.len(),
            run.document.errors.len(),
            writer.root().display()
        );
    }

    if !run.document.errors.is_empty() {
        return Ok(EXIT_SCAN_ERROR);
    }
    Ok(0)
}
