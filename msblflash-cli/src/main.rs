//! msblflash CLI - Command-line tool for flashing MAX32664 sensor hubs.
//!
//! ## Features
//!
//! - Flash MSBL firmware through the bootloader bridge board
//! - Inspect MSBL images (text or JSON)
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;

use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if progress bars and symbols should be used (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// msblflash - Flash MSBL firmware onto MAX32664 sensor hubs.
///
/// Environment variables:
///   MSBLFLASH_PORT        - Serial port of the bridge board
///   MSBLFLASH_BAUD        - Baud rate (default: 9600)
///   MSBLFLASH_TIMEOUT_MS  - Response timeout in milliseconds (default: 3000)
///   MSBLFLASH_SETTLE_MS   - Delay after `exit` in milliseconds (default: 3000)
#[derive(Parser)]
#[command(name = "msblflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Serial port of the bridge board.
    #[arg(short, long, global = true, env = "MSBLFLASH_PORT")]
    port: Option<String>,

    /// Baud rate [default: 9600].
    #[arg(short, long, global = true, env = "MSBLFLASH_BAUD")]
    baud: Option<u32>,

    /// Response timeout in milliseconds [default: 3000].
    #[arg(long, global = true, value_name = "MS", env = "MSBLFLASH_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Flash an MSBL image onto the sensor hub.
    Flash {
        /// Path to the .msbl file.
        firmware: PathBuf,

        /// Delay after `exit` in milliseconds [default: 3000].
        #[arg(long, value_name = "MS", env = "MSBLFLASH_SETTLE_MS")]
        settle_ms: Option<u64>,
    },

    /// Show the contents of an MSBL image.
    Info {
        /// Path to the .msbl file.
        firmware: PathBuf,

        /// Print machine-readable JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Errors that change the exit status.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// The invocation is incomplete or inconsistent (exit code 2).
    #[error("{0}")]
    Usage(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Usage(_) => ExitCode::from(2),
        }
    }
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
            Ok(())
        },
        Commands::Info { firmware, json } => commands::info::cmd_info(firmware, *json),
        Commands::Flash {
            firmware,
            settle_ms,
        } => {
            let config = match &cli.config_path {
                Some(path) => Config::load_from_path(path),
                None => Config::load(),
            };
            commands::flash::cmd_flash(cli, &config, firmware, *settle_ms)
        },
    }
}

fn main() -> ExitCode {
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);
    if env::var_os("NO_COLOR").is_some() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(&cli);

    debug!(
        "msblflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            err.downcast_ref::<CliError>()
                .map_or(ExitCode::FAILURE, CliError::exit_code)
        },
    }
}
