//! Build command implementation.
//!
//! Assembles and signs a package from a `pspf.toml` file, flags, or both.

use crate::cli::{CliError, ExitCode, OutputFormat};
use crate::config::{BuildConfig, BuildPlan, CONFIG_FILE_NAME, MetadataInput, PackageConfig, SigningConfig};
use anyhow::{Context, Result};
use clap::Args;
use pspf_format::{BuildReport, MetadataManifest, PackageBuilder, PublicKey, SegmentSource, SigningKey};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Arguments for `pspf build`.
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Build config file (defaults to ./pspf.toml when it exists)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Destination of the package
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Launcher stub
    #[arg(long)]
    pub launcher: Option<PathBuf>,

    /// Runtime archive
    #[arg(long)]
    pub runtime: Option<PathBuf>,

    /// Payload archive
    #[arg(long)]
    pub payload: Option<PathBuf>,

    /// Ready-made metadata segment
    #[arg(long)]
    pub metadata: Option<PathBuf>,

    /// Entry point (`module:function`) for a generated metadata manifest
    #[arg(long)]
    pub entry_point: Option<String>,

    /// PEM private key used to sign
    #[arg(long, env = "PSPF_PRIVATE_KEY")]
    pub private_key: Option<PathBuf>,

    /// PEM public key to embed (derived from the private key by default)
    #[arg(long)]
    pub public_key: Option<PathBuf>,
}

impl BuildArgs {
    fn overrides(&self) -> BuildConfig {
        BuildConfig {
            package: PackageConfig {
                output: self.output.clone(),
                launcher: self.launcher.clone(),
                runtime: self.runtime.clone(),
                payload: self.payload.clone(),
                metadata: self.metadata.clone(),
                entry_point: self.entry_point.clone(),
            },
            signing: SigningConfig {
                private_key: self.private_key.clone(),
                public_key: self.public_key.clone(),
            },
        }
    }
}

/// Runs the build command.
///
/// # Errors
///
/// Returns an error if the configuration is incomplete, an input is missing,
/// the key cannot be loaded, or the package cannot be written.
pub fn run(args: &BuildArgs, output_format: OutputFormat) -> Result<ExitCode> {
    let file_config = match &args.config {
        Some(path) => BuildConfig::load(path)?,
        None if Path::new(CONFIG_FILE_NAME).is_file() => {
            BuildConfig::load(Path::new(CONFIG_FILE_NAME))?
        }
        None => BuildConfig::default(),
    };
    let plan = file_config.merge(args.overrides()).into_plan()?;

    let report = build_package(&plan)?;

    let formatted = crate::formatters::format_output(&report, output_format)?;
    println!("{formatted}");

    Ok(ExitCode::SUCCESS)
}

/// Builds the package described by `plan`.
///
/// # Errors
///
/// See [`run`].
pub fn build_package(plan: &BuildPlan) -> Result<BuildReport> {
    info!("Building package {}", plan.output.display());

    let key = SigningKey::load(&plan.private_key)
        .with_context(|| format!("failed to load private key {}", plan.private_key.display()))?;
    debug!("Loaded {} bit signing key", key.bits());

    let public_key_pem = match &plan.public_key {
        Some(path) => {
            let public = PublicKey::load(path)
                .with_context(|| format!("failed to load public key {}", path.display()))?;
            if public != key.public_key() {
                return Err(CliError::KeyMismatch {
                    path: path.display().to_string(),
                }
                .into());
            }
            public.to_pem()?
        }
        None => key.public_key().to_pem()?,
    };

    let runtime = SegmentSource::file(&plan.runtime);
    let metadata = match &plan.metadata {
        MetadataInput::File(path) => SegmentSource::file(path),
        MetadataInput::Generate(entry_point) => {
            info!("Generating metadata manifest for {}", entry_point);
            let manifest = MetadataManifest::new(entry_point.clone(), &runtime)
                .context("failed to hash runtime archive")?;
            SegmentSource::Bytes(manifest.to_bytes()?)
        }
    };

    let report = PackageBuilder::new()
        .launcher(SegmentSource::file(&plan.launcher))
        .runtime(runtime)
        .metadata(metadata)
        .payload(SegmentSource::file(&plan.payload))
        .build_with(&plan.output, &key, public_key_pem.as_bytes())
        .with_context(|| format!("failed to build package {}", plan.output.display()))?;

    info!(
        "Built {} ({} bytes)",
        report.output.display(),
        report.package.total_size
    );
    Ok(report)
}
