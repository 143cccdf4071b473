// crates/lti-toolbox-cli/src/main.rs
// ============================================================================
// Module: LTI Toolbox CLI Entry Point
// Description: Administrative commands for an LTI Tool Provider.
// Purpose: Reset cached configuration, inspect metadata, manage consumers.
// Dependencies: clap, lti-toolbox, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The `lti-toolbox` binary opens a toolbox for the configuration named by
//! `--config` and runs one administrative flow against it. JSON output is
//! pretty-printed to stdout; errors go to stderr with a failure exit code.
//! Secrets are only printed once, when a consumer is created.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use lti_toolbox::Toolbox;
use lti_toolbox::ToolboxError;
use lti_toolbox_core::ToolConsumer;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "lti-toolbox", version, disable_help_subcommand = true)]
struct Cli {
    /// Path to the tool's TOML configuration description.
    #[arg(long, value_name = "PATH", global = true, default_value = "lti-toolbox.toml")]
    config: PathBuf,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Reload every metadata group from the configuration description.
    Reset,
    /// Print the cached tool metadata as JSON.
    Metadata,
    /// Tool Consumer administration.
    Consumer {
        /// Selected consumer subcommand.
        #[command(subcommand)]
        command: ConsumerCommand,
    },
    /// Print the cartridge configuration XML.
    Xml,
}

/// Consumer subcommands.
#[derive(Subcommand, Debug)]
enum ConsumerCommand {
    /// Create a consumer, generating credentials unless supplied.
    Create(ConsumerCreateCommand),
    /// List consumers without their secrets.
    List,
}

/// Arguments for `consumer create`.
#[derive(Args, Debug)]
struct ConsumerCreateCommand {
    /// Consumer name, unique within the tool.
    name: String,
    /// Consumer key to use instead of a generated one.
    #[arg(long)]
    key: Option<String>,
    /// Shared secret to use instead of a generated one.
    #[arg(long)]
    secret: Option<String>,
}

/// Consumer entry printed by `consumer list`.
#[derive(Debug, Serialize)]
struct ConsumerSummary<'a> {
    /// Consumer key.
    key: &'a str,
    /// Consumer name.
    name: &'a str,
    /// Whether launches are accepted.
    enabled: bool,
    /// Creation time in unix milliseconds.
    created_at_ms: i64,
}

impl<'a> From<&'a ToolConsumer> for ConsumerSummary<'a> {
    fn from(consumer: &'a ToolConsumer) -> Self {
        Self {
            key: consumer.key.as_str(),
            name: &consumer.name,
            enabled: consumer.enabled,
            created_at_ms: consumer.created_at_ms,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
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

impl From<ToolboxError> for CliError {
    fn from(error: ToolboxError) -> Self {
        Self::new(error.to_string())
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(&cli) {
        Ok(output) => match write_stdout_line(&output) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => emit_error(&output_error("stdout", &err)),
        },
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Runs the selected command and returns its rendered output.
fn execute(cli: &Cli) -> CliResult<String> {
    match &cli.command {
        Commands::Reset => {
            let toolbox = Toolbox::from_configuration(&cli.config, true)?;
            render_json(toolbox.load_report())
        }
        Commands::Metadata => {
            let toolbox = Toolbox::from_configuration(&cli.config, false)?;
            let mut metadata = serde_json::to_value(toolbox.metadata()?)
                .map_err(|err| CliError::new(format!("failed to encode metadata: {err}")))?;
            redact_token(&mut metadata);
            render_json(&metadata)
        }
        Commands::Consumer {
            command,
        } => {
            let toolbox = Toolbox::from_configuration(&cli.config, false)?;
            command_consumer(&toolbox, command)
        }
        Commands::Xml => {
            let toolbox = Toolbox::from_configuration(&cli.config, false)?;
            Ok(toolbox.configuration_xml()?.trim_end().to_string())
        }
    }
}

// ============================================================================
// SECTION: Consumer Commands
// ============================================================================

/// Executes a `consumer` subcommand.
fn command_consumer(toolbox: &Toolbox, command: &ConsumerCommand) -> CliResult<String> {
    match command {
        ConsumerCommand::Create(create) => {
            let created = toolbox.create_consumer(
                &create.name,
                create.key.as_deref(),
                create.secret.as_deref(),
            )?;
            if !created {
                return Err(CliError::new(format!("consumer '{}' already exists", create.name)));
            }
            let consumers = toolbox.list_consumers()?;
            let consumer = consumers
                .iter()
                .find(|consumer| consumer.name == create.name)
                .ok_or_else(|| {
                    CliError::new(format!("consumer '{}' was not stored", create.name))
                })?;
            render_json(&serde_json::json!({
                "name": consumer.name,
                "key": consumer.key.as_str(),
                "secret": consumer.secret,
            }))
        }
        ConsumerCommand::List => {
            let consumers = toolbox.list_consumers()?;
            let summaries: Vec<ConsumerSummary<'_>> =
                consumers.iter().map(ConsumerSummary::from).collect();
            render_json(&summaries)
        }
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Renders a value as pretty JSON.
fn render_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render json: {err}")))
}

/// Masks the Canvas API token in rendered metadata.
fn redact_token(metadata: &mut Value) {
    if let Some(token) = metadata.pointer_mut("/canvas/token")
        && token.as_str().is_some_and(|token| !token.is_empty())
    {
        *token = Value::String("<redacted>".to_string());
    }
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
