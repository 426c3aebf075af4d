// crates/ut-stats-cli/src/main.rs
// ============================================================================
// Module: ut-stats CLI Entry Point
// Description: Command dispatcher for the telemetry server and offline tools.
// Purpose: Serve reports, validate config, and read stats without HTTP.
// Dependencies: clap, serde, serde_json, thiserror, tokio, ut-stats-*.
// ============================================================================

//! ## Overview
//! The `ut-stats` binary starts the HTTP ingestion server and offers offline
//! commands that open the configured store directly: config validation, stats
//! rendering, and a full identity export. Offline commands open the store
//! read-only and fail when a `SQLite` store file does not exist yet.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;
use ut_stats_config::UtStatsConfig;
use ut_stats_core::Clock;
use ut_stats_core::IdentityRecord;
use ut_stats_core::IdentityStore;
use ut_stats_core::SharedTelemetryStore;
use ut_stats_core::StaticIgnoreList;
use ut_stats_core::StatsAggregator;
use ut_stats_core::SystemClock;
use ut_stats_core::TelemetryError;
use ut_stats_server::StatsServer;
use ut_stats_server::build_read_only_store;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "ut-stats", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the telemetry HTTP server.
    Serve(ConfigArgs),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print aggregated stats from the configured store.
    Stats(StatsCommand),
    /// Export every identity record as a JSON object keyed by installation id.
    Export(ExportCommand),
}

/// Shared `--config` argument.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Optional config file path (defaults to ut-stats.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration.
    Validate(ConfigArgs),
}

/// Stats view selector.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum StatsKind {
    /// Total, active, and outdated installation rollups.
    Segmented,
    /// Per-action usage counters.
    Usage,
    /// Per-check value distributions.
    Checks,
    /// Launch counter totals.
    Launch,
}

/// Configuration for the `stats` command.
#[derive(Args, Debug)]
struct StatsCommand {
    /// Stats view to render.
    #[arg(value_enum)]
    kind: StatsKind,
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Configuration for the `export` command.
#[derive(Args, Debug)]
struct ExportCommand {
    /// Output file for the exported records.
    #[arg(long, value_name = "PATH")]
    output: PathBuf,
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<TelemetryError> for CliError {
    fn from(error: TelemetryError) -> Self {
        Self::new(format!("stats failed: {error}"))
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => command_serve(args).await,
        Commands::Config {
            command: ConfigCommand::Validate(args),
        } => command_config_validate(&args),
        Commands::Stats(command) => command_stats(&command),
        Commands::Export(command) => command_export(&command),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs the HTTP server until it fails.
async fn command_serve(args: ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(args.config.as_deref())?;
    let server = tokio::task::spawn_blocking(move || StatsServer::from_config(config))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!("ut-stats listening on {}", server.bind_addr()))
        .map_err(|err| output_error("stderr", &err))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Validates the configuration and reports success.
fn command_config_validate(args: &ConfigArgs) -> CliResult<ExitCode> {
    let _config = load_config(args.config.as_deref())?;
    write_stdout_line("config ok").map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

/// Prints one stats view as pretty JSON.
fn command_stats(command: &StatsCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.config.as_deref())?;
    let store = open_store(&config)?;
    let ignore: StaticIgnoreList = config.ignore_list().clone();
    let aggregator = StatsAggregator::new(store, ignore, config.aggregate_options());
    let bytes = match command.kind {
        StatsKind::Segmented => {
            pretty_json(&aggregator.compute_segmented_stats(SystemClock.now())?)?
        }
        StatsKind::Usage => pretty_json(&aggregator.compute_usage_stats()?)?,
        StatsKind::Checks => pretty_json(&aggregator.compute_check_stats()?)?,
        StatsKind::Launch => pretty_json(&aggregator.compute_launch_stats()?)?,
    };
    write_stdout_bytes_with_newline(&bytes)?;
    Ok(ExitCode::SUCCESS)
}

/// Writes every identity record to the output file.
fn command_export(command: &ExportCommand) -> CliResult<ExitCode> {
    let config = load_config(command.config.config.as_deref())?;
    let store = open_store(&config)?;
    let records = store
        .scan_identities()
        .map_err(|err| CliError::new(format!("export failed: {err}")))?;
    let count = records.len();
    let keyed: BTreeMap<String, IdentityRecord> =
        records.into_iter().map(|record| (record.id.to_string(), record)).collect();
    let mut bytes = pretty_json(&keyed)?;
    bytes.push(b'\n');
    fs::write(&command.output, bytes).map_err(|err| {
        CliError::new(format!("failed to write {}: {err}", command.output.display()))
    })?;
    write_stdout_line(&format!("exported {count} records to {}", command.output.display()))
        .map_err(|err| output_error("stdout", &err))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates the configuration.
fn load_config(path: Option<&Path>) -> CliResult<UtStatsConfig> {
    UtStatsConfig::load(path).map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Opens the configured store for offline reads.
fn open_store(config: &UtStatsConfig) -> CliResult<SharedTelemetryStore> {
    build_read_only_store(&config.store)
        .map_err(|err| CliError::new(format!("store open failed: {err}")))
}

/// Serializes a value as pretty JSON.
fn pretty_json<T: Serialize>(value: &T) -> CliResult<Vec<u8>> {
    serde_json::to_vec_pretty(value)
        .map_err(|err| CliError::new(format!("json serialization failed: {err}")))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout with a trailing newline.
fn write_stdout_bytes_with_newline(bytes: &[u8]) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    stdout
        .write_all(bytes)
        .and_then(|()| stdout.write_all(b"\n"))
        .map_err(|err| output_error("stdout", &err))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output stream failure.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write {stream}: {error}"))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
