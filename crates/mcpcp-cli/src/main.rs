// crates/mcpcp-cli/src/main.rs
// ============================================================================
// Module: MCPCP CLI Entry Point
// Description: Command dispatcher for the MCPCP proxy.
// Purpose: Start the proxy server and validate configuration files.
// Dependencies: clap, mcpcp-config, mcpcp-proxy, tokio
// ============================================================================

//! ## Overview
//! The `mcpcp` binary has two jobs: run the proxy (`mcpcp serve`) and check
//! a configuration file without starting anything (`mcpcp config check`).
//! Configuration resolution follows the library rules: an explicit path,
//! then `MCPCP_CONFIG`, then `./mcpcp.toml`. Errors go to stderr and map to
//! a failure exit code.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use mcpcp_config::McpcpConfig;
use mcpcp_proxy::ProxyServer;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "mcpcp", version, about = "Authenticating MCP proxy")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCPCP proxy server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for the `serve` command.
#[derive(clap::Args, Debug)]
struct ServeCommand {
    /// Path to the configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a configuration file, then exit.
    Check(CheckCommand),
}

/// Arguments for the `config check` command.
#[derive(clap::Args, Debug)]
struct CheckCommand {
    /// Path to the configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
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
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
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
        Err(err) => {
            let _ = write_stderr_line(&format!("error: {err}"));
            ExitCode::FAILURE
        }
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(&command),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = McpcpConfig::load(command.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    let server = ProxyServer::from_config(&config)
        .map_err(|err| CliError::new(format!("proxy init failed: {err}")))?;
    write_stderr_line(&format!("mcpcp listening on {}", server.bind_addr()))
        .map_err(|err| CliError::new(format!("stderr write failed: {err}")))?;
    server.serve().await.map_err(|err| CliError::new(format!("proxy failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `config check` command.
fn command_config(command: &ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Check(check) => {
            let config = McpcpConfig::load(check.config.as_deref())
                .map_err(|err| CliError::new(format!("config check failed: {err}")))?;
            let summary = format!(
                "config ok: {} backend(s), {} agent(s)",
                config.backends.len(),
                config.policy.agents.len()
            );
            write_stdout_line(&summary)
                .map_err(|err| CliError::new(format!("stdout write failed: {err}")))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes one line to stdout.
fn write_stdout_line(line: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")
}

/// Writes one line to stderr.
fn write_stderr_line(line: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr().lock();
    writeln!(stderr, "{line}")
}
