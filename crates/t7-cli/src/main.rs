//! t7log - Command-line datalogger for Trionic 7 ECUs
//!
//! Logs ECU variables over KWP2000-on-CAN at a fixed rate and acquires the
//! ECU's symbol table, live or from a firmware image.

mod commands;
mod config;
mod demo;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use t7_kwp::{TransportConfig, TransportFactory};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::SymbolSource;
use crate::config::{ArgOverrides, Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "t7log")]
#[command(author, version, about = "Trionic 7 datalogger")]
#[command(propagate_version = true)]
struct Cli {
    /// CAN interface (SocketCAN)
    #[arg(short, long, env = "T7LOG_INTERFACE")]
    interface: Option<String>,

    /// Use the simulated ECU instead of a CAN interface
    #[arg(long)]
    mock: bool,

    /// Configuration file path
    #[arg(short, long, env = "T7LOG_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log variables to file until Ctrl+C
    Log {
        /// Variable definitions (JSON)
        #[arg(long)]
        vars: PathBuf,

        /// Polls per second
        #[arg(short, long)]
        frequency: Option<u32>,

        /// Session attempts before giving up
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Directory for log files
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },

    /// Read the symbol table
    #[command(subcommand)]
    Symbols(SymbolsCommand),

    /// Update variable definitions from a symbol list
    Sync {
        /// Variable definitions (JSON), rewritten in place unless --out is given
        #[arg(long)]
        vars: PathBuf,

        /// Write the synced list here instead
        #[arg(long)]
        out: Option<PathBuf>,

        /// Symbol list saved with `symbols --save`
        #[arg(long, conflicts_with_all = ["firmware", "ecu"])]
        symbols: Option<PathBuf>,

        /// Firmware image to read symbols from
        #[arg(long, conflicts_with = "ecu")]
        firmware: Option<PathBuf>,

        /// Read symbols from the connected ECU
        #[arg(long)]
        ecu: bool,
    },

    /// Push random samples without an ECU
    Mock {
        /// Variable definitions (JSON)
        #[arg(long)]
        vars: PathBuf,

        /// Samples per second
        #[arg(short, long)]
        frequency: Option<u32>,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },
}

#[derive(Subcommand)]
enum SymbolsCommand {
    /// Export the symbol table from the connected ECU
    Ecu {
        /// Only list symbols whose name contains this text
        #[arg(long)]
        filter: Option<String>,

        /// Save the symbols as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Extract the symbol table from a firmware image
    File {
        /// Firmware image
        firmware: PathBuf,

        /// Only list symbols whose name contains this text
        #[arg(long)]
        filter: Option<String>,

        /// Save the symbols as JSON
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    // Merge CLI args with config
    let merged = config.merge_with_args(&overrides(&cli));
    let format = OutputFormat::parse(&merged.output).unwrap_or_default();
    let ctx = OutputContext::new(format, merged.no_color, cli.quiet);

    // Execute command
    match &cli.command {
        Commands::Log { vars, .. } => {
            let transports = create_transports(&merged)?;
            commands::log(vars, transports, &merged.logger, &merged.protocol, &ctx).await?;
        }

        Commands::Symbols(SymbolsCommand::Ecu { filter, save }) => {
            let transports = create_transports(&merged)?;
            commands::symbols(
                &SymbolSource::Ecu,
                &transports,
                &merged.protocol,
                filter.as_deref(),
                save.as_deref(),
                &ctx,
            )
            .await?;
        }

        Commands::Symbols(SymbolsCommand::File {
            firmware,
            filter,
            save,
        }) => {
            let transports = create_transports(&merged)?;
            commands::symbols(
                &SymbolSource::Firmware(firmware.clone()),
                &transports,
                &merged.protocol,
                filter.as_deref(),
                save.as_deref(),
                &ctx,
            )
            .await?;
        }

        Commands::Sync {
            vars,
            out,
            symbols,
            firmware,
            ecu,
        } => {
            let source = match (symbols, firmware, ecu) {
                (Some(path), _, _) => SymbolSource::Saved(path.clone()),
                (None, Some(path), _) => SymbolSource::Firmware(path.clone()),
                (None, None, true) => SymbolSource::Ecu,
                (None, None, false) => {
                    anyhow::bail!("One of --symbols, --firmware or --ecu is required")
                }
            };
            let transports = create_transports(&merged)?;
            commands::sync(
                vars,
                out.as_deref(),
                &source,
                &transports,
                &merged.protocol,
                &ctx,
            )
            .await?;
        }

        Commands::Mock {
            vars,
            frequency,
            duration,
        } => {
            let frequency = frequency.unwrap_or(merged.logger.frequency);
            commands::mock(vars, frequency, *duration, &ctx).await?;
        }
    }

    Ok(())
}

/// Command-line values that override the config file
fn overrides(cli: &Cli) -> ArgOverrides {
    let mut args = ArgOverrides {
        interface: cli.interface.clone(),
        mock: cli.mock,
        output: cli.output.map(OutputFormat::as_str),
        no_color: cli.no_color,
        ..Default::default()
    };
    if let Commands::Log {
        frequency,
        max_attempts,
        log_dir,
        ..
    } = &cli.command
    {
        args.frequency = *frequency;
        args.max_attempts = *max_attempts;
        args.log_dir = log_dir.clone();
    }
    args
}

/// Transport factory for the configured link
///
/// The simulated ECU is created once and shared by every attempt.
fn create_transports(merged: &MergedConfig) -> Result<Arc<dyn TransportFactory>> {
    match &merged.transport {
        TransportConfig::Mock(cfg) => {
            let ecu = demo::demo_ecu(cfg).context("Failed to create the simulated ECU")?;
            Ok(Arc::new(ecu))
        }
        other => Ok(Arc::new(other.clone())),
    }
}
