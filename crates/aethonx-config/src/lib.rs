// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading and merging: CLI flags, `AETHONX_*` environment
//! variables, and built-in defaults combine into one [`EngineConfig`].
//!
//! Precedence, highest first: explicit CLI flag, environment variable,
//! built-in default. Nothing here talks to a terminal or a registry beyond
//! the list of source names it's handed — [`aethonx_cli`] owns argument
//! parsing itself.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use aethonx_core::{ScanMode, SourceConfig};
use aethonx_error::{AethonError, ErrorCode};
use aethonx_http::HttpClientConfig;
use aethonx_resilience::CircuitBreakerConfig;
use aethonx_runtime::RunConfig;
use aethonx_writer::WriterConfig;
use std::collections::BTreeMap;
use std::time::Duration;

/// Raw overrides as parsed from the command line, before env merging. Every
/// field mirrors a flag from the fixed CLI surface; `None` means "flag not
/// given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// `--target`/`-t`.
    pub target: Option<String>,
    /// `--active`/`-a`.
    pub active: Option<bool>,
    /// `--workers`/`-w`.
    pub workers: Option<usize>,
    /// `--timeout`/`-T`, seconds; `Some(0)` means no deadline.
    pub timeout_secs: Option<u64>,
    /// `--out`/`-o`.
    pub out_dir: Option<String>,
    /// `--quiet`/`-q`.
    pub quiet: Option<bool>,
    /// `--streaming`/`-s`.
    pub streaming_threshold: Option<usize>,
    /// `--retries`/`-r`.
    pub retries: Option<u32>,
    /// `--circuit-breaker`.
    pub circuit_breaker: Option<bool>,
    /// `--proxy`/`-p`.
    pub proxy: Option<String>,
    /// Raw `--src.<name>[.priority]=<value>` payloads, one per occurrence.
    pub src_overrides: Vec<String>,
}

/// A fully resolved per-source override: either an enablement toggle or a
/// priority assignment, parsed from one `--src.<name>[.priority]=<value>`
/// flag.
#[derive(Debug, Clone, PartialEq)]
enum SrcOverride {
    Enabled(bool),
    Priority(i32),
}

/// Parse one `--src.<name>[.priority]=<value>` payload into a source name
/// and its override. `name.priority=5` sets priority; `name=false` (or
/// `name.enabled=false`) toggles enablement.
fn parse_src_override(raw: &str) -> Result<(String, SrcOverride), AethonError> {
    let (path, value) = raw.split_once('=').ok_or_else(|| {
        AethonError::new(ErrorCode::ConfigInvalid, "--src flag expects <name>[.priority]=<value>")
            .with_context("flag", raw.to_string())
    })?;
    let path = path.trim();
    let value = value.trim();

    let (name, field) = match path.rsplit_once('.') {
        Some((name, "priority")) => (name, "priority"),
        Some((name, "enabled")) => (name, "enabled"),
        _ => (path, "enabled"),
    };
    if name.is_empty() {
        return Err(AethonError::new(ErrorCode::ConfigInvalid, "--src flag missing source name")
            .with_context("flag", raw.to_string()));
    }

    let parsed = if field == "priority" {
        let priority: i32 = value.parse().map_err(|_| {
            AethonError::new(ErrorCode::ConfigInvalid, "--src priority must be an integer")
                .with_context("flag", raw.to_string())
        })?;
        SrcOverride::Priority(priority)
    } else {
        let enabled: bool = value.parse().map_err(|_| {
            AethonError::new(ErrorCode::ConfigInvalid, "--src enablement must be true or false")
                .with_context("flag", raw.to_string())
        })?;
        SrcOverride::Enabled(enabled)
    };
    Ok((name.to_string(), parsed))
}

/// Environment variable overrides, read once at startup.
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    target: Option<String>,
    active: Option<bool>,
    workers: Option<usize>,
    timeout_secs: Option<u64>,
    out_dir: Option<String>,
    quiet: Option<bool>,
    streaming_threshold: Option<usize>,
    retries: Option<u32>,
    circuit_breaker: Option<bool>,
    proxy: Option<String>,
    /// `AETHONX_SOURCES_<NAME>_ENABLED` / `AETHONX_SOURCES_<NAME>_PRIORITY`,
    /// keyed by the lower-cased source name.
    source_overrides: BTreeMap<String, Vec<SrcOverride>>,
}

fn env_bool(var: &str) -> Option<bool> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

fn env_num<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

/// Read every recognised `AETHONX_*` variable. `source_names` bounds which
/// `AETHONX_SOURCES_<NAME>_*` variables are looked up.
fn read_env_overrides(source_names: &[&str]) -> EnvOverrides {
    let mut source_overrides: BTreeMap<String, Vec<SrcOverride>> = BTreeMap::new();
    for name in source_names {
        let upper = name.to_uppercase().replace('-', "_");
        let mut overrides = Vec::new();
        if let Some(enabled) = env_bool(&format!("AETHONX_SOURCES_{upper}_ENABLED")) {
            overrides.push(SrcOverride::Enabled(enabled));
        }
        if let Some(priority) = env_num::<i32>(&format!("AETHONX_SOURCES_{upper}_PRIORITY")) {
            overrides.push(SrcOverride::Priority(priority));
        }
        if !overrides.is_empty() {
            source_overrides.insert((*name).to_string(), overrides);
        }
    }

    EnvOverrides {
        target: std::env::var("AETHONX_TARGET").ok(),
        active: env_bool("AETHONX_ACTIVE"),
        workers: env_num("AETHONX_WORKERS"),
        timeout_secs: env_num("AETHONX_TIMEOUT"),
        out_dir: std::env::var("AETHONX_OUT").ok(),
        quiet: env_bool("AETHONX_QUIET"),
        streaming_threshold: env_num("AETHONX_STREAMING"),
        retries: env_num("AETHONX_RETRIES"),
        circuit_breaker: env_bool("AETHONX_CIRCUIT_BREAKER"),
        proxy: std::env::var("AETHONX_PROXY").ok(),
        source_overrides,
    }
}

/// The fully resolved configuration for one engine run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Target root domain, not yet normalized ([`aethonx_core::Target::new`]
    /// does that).
    pub target: String,
    /// Scan mode derived from `--active`.
    pub mode: ScanMode,
    /// Output directory root.
    pub out_dir: String,
    /// Suppress non-essential stdout/stderr output.
    pub quiet: bool,
    /// Upstream HTTP proxy, if configured.
    pub proxy: Option<String>,
    /// Per-source configuration, keyed by source name; always contains an
    /// entry for every name passed to [`load`].
    pub source_configs: BTreeMap<String, SourceConfig>,
    run_config: RunConfig,
}

impl EngineConfig {
    /// The [`RunConfig`] ready to hand to [`aethonx_runtime::Orchestrator::new`].
    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        RunConfig { source_configs: self.source_configs.clone(), ..self.run_config.clone() }
    }

    /// The [`HttpClientConfig`] derived from `--proxy`, for sources that
    /// share the engine's HTTP client.
    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig { proxy: self.proxy.clone(), ..HttpClientConfig::default() }
    }
}

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_OUT_DIR: &str = "aethonx_out";
const DEFAULT_STREAMING_THRESHOLD: usize = 1000;
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_CIRCUIT_BREAKER: bool = true;

/// Build an [`EngineConfig`] from CLI overrides and the process environment.
///
/// `source_names` is the full set of registered source names; every one
/// gets a [`SourceConfig`] entry (enabled by default) unless toggled off by
/// a `--src`/`AETHONX_SOURCES_*` override. Fails with
/// [`ErrorCode::TargetInvalid`] if no target was given by either flag or
/// environment, or [`ErrorCode::ConfigInvalid`] if a numeric override is
/// out of range or a `--src` flag could not be parsed.
pub fn load(cli: CliOverrides, source_names: &[&str]) -> Result<EngineConfig, AethonError> {
    let env = read_env_overrides(source_names);

    let target = cli
        .target
        .or(env.target)
        .ok_or_else(|| AethonError::new(ErrorCode::TargetInvalid, "no --target given and AETHONX_TARGET is not set"))?;

    let active = cli.active.or(env.active).unwrap_or(false);
    let workers = cli.workers.or(env.workers).unwrap_or(DEFAULT_WORKERS);
    let timeout_secs = cli.timeout_secs.or(env.timeout_secs).unwrap_or(DEFAULT_TIMEOUT_SECS);
    let out_dir = cli.out_dir.or(env.out_dir).unwrap_or_else(|| DEFAULT_OUT_DIR.to_string());
    let quiet = cli.quiet.or(env.quiet).unwrap_or(false);
    let streaming_threshold = cli.streaming_threshold.or(env.streaming_threshold).unwrap_or(DEFAULT_STREAMING_THRESHOLD);
    let retries = cli.retries.or(env.retries).unwrap_or(DEFAULT_RETRIES);
    let circuit_breaker_enabled = cli.circuit_breaker.or(env.circuit_breaker).unwrap_or(DEFAULT_CIRCUIT_BREAKER);
    let proxy = cli.proxy.or(env.proxy);

    if workers == 0 {
        return Err(AethonError::new(ErrorCode::ConfigInvalid, "--workers must be at least 1"));
    }
    if streaming_threshold == 0 {
        return Err(AethonError::new(ErrorCode::ConfigInvalid, "--streaming must be at least 1"));
    }

    let mut source_configs: BTreeMap<String, SourceConfig> = BTreeMap::new();
    for name in source_names {
        let mut config = SourceConfig { retries, ..SourceConfig::default() };
        if let Some(env_overrides) = env.source_overrides.get(*name) {
            for o in env_overrides {
                apply_src_override(&mut config, o);
            }
        }
        source_configs.insert((*name).to_string(), config);
    }
    for raw in &cli.src_overrides {
        let (name, o) = parse_src_override(raw)?;
        let config = source_configs
            .entry(name.clone())
            .or_insert_with(|| SourceConfig { retries, ..SourceConfig::default() });
        apply_src_override(config, &o);
    }

    let scan_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

    let run_config = RunConfig {
        max_workers: workers,
        scan_timeout,
        fail_fast: false,
        circuit_breaker_enabled,
        circuit_breaker: CircuitBreakerConfig::default(),
        source_configs: BTreeMap::new(),
        writer: WriterConfig { artifact_threshold: streaming_threshold },
    };

    Ok(EngineConfig {
        target,
        mode: if active { ScanMode::Active } else { ScanMode::Passive },
        out_dir,
        quiet,
        proxy,
        source_configs,
        run_config,
    })
}

fn apply_src_override(config: &mut SourceConfig, o: &SrcOverride) {
    match o {
        SrcOverride::Enabled(enabled) => config.enabled = *enabled,
        SrcOverride::Priority(priority) => config.priority = *priority,
    }
}
