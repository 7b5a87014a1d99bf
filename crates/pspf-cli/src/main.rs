//! PSPF command-line interface.
//!
//! Builds, inspects and verifies signed self-contained plugin packages.
//!
//! # Examples
//!
//! ```bash
//! # Generate a signing key pair
//! pspf keygen --out-dir keys
//!
//! # Build from ./pspf.toml
//! pspf build
//!
//! # Check a package against a trusted key
//! pspf verify dist/provider --public-key keys/provider-public.key --manifest
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use pspf_cli::cli::{ExitCode, LogFormat, OutputFormat};
use pspf_cli::commands;
use pspf_cli::commands::build::BuildArgs;
use pspf_format::{DEFAULT_KEY_BITS, SegmentKind};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// PSPF - signed self-contained plugin packages.
#[derive(Parser, Debug)]
#[command(name = "pspf")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build and sign a package.
    ///
    /// Settings come from pspf.toml and/or flags; flags take precedence.
    Build(BuildArgs),

    /// Verify a package against a trusted public key.
    ///
    /// Checks the trailer, footer checksum and layout, then the signature.
    /// With --manifest also checks the runtime checksum recorded in the
    /// metadata manifest.
    Verify {
        /// Package file
        package: PathBuf,

        /// Trusted PEM public key
        #[arg(long, env = "PSPF_PUBLIC_KEY")]
        public_key: PathBuf,

        /// Also check the metadata manifest
        #[arg(long)]
        manifest: bool,
    },

    /// Show the structural layout of a package.
    Info {
        /// Package file
        package: PathBuf,
    },

    /// Write one segment of a package to a file.
    Extract {
        /// Package file
        package: PathBuf,

        /// Segment name (launcher, runtime, metadata, payload, signature, public-key)
        segment: SegmentKind,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite the destination if it exists
        #[arg(long)]
        force: bool,
    },

    /// Generate an RSA key pair for signing.
    Keygen {
        /// Directory for provider-private.key and provider-public.key
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// Key size in bits
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell for completion generation
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_format) {
        eprintln!("Error: failed to initialize logging: {e:#}");
        std::process::exit(ExitCode::ERROR.as_i32());
    }

    let exit_code = match execute_command(cli.command, cli.format) {
        Ok(code) => code,
        Err(e) => {
            let code = ExitCode::from_error(&e);
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            code
        }
    };

    std::process::exit(exit_code.as_i32());
}

/// Initializes logging infrastructure.
///
/// `RUST_LOG` selects the level unless `--verbose` forces debug.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
fn init_logging(verbose: bool, log_format: LogFormat) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match log_format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }

    Ok(())
}

/// Executes the specified CLI command.
///
/// # Errors
///
/// Returns an error if command execution fails.
fn execute_command(command: Commands, output_format: OutputFormat) -> Result<ExitCode> {
    match command {
        Commands::Build(args) => commands::build::run(&args, output_format),
        Commands::Verify {
            package,
            public_key,
            manifest,
        } => commands::verify::run(&package, &public_key, manifest, output_format),
        Commands::Info { package } => commands::info::run(&package, output_format),
        Commands::Extract {
            package,
            segment,
            output,
            force,
        } => commands::extract::run(&package, segment, &output, force, output_format),
        Commands::Keygen { out_dir, bits } => commands::keygen::run(&out_dir, bits, output_format),
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            commands::completions::run(shell, &mut cmd)
        }
    }
}
