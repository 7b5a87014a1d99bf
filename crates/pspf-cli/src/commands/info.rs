//! Info command implementation.
//!
//! Prints the structural report of a package. Only the footer and trailer
//! are read; no signature is checked.

use crate::cli::{ExitCode, OutputFormat};
use anyhow::{Context, Result};
use pspf_format::{PackageReport, PackageVerifier};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Result of inspecting a package.
#[derive(Debug, Serialize)]
pub struct InfoResult {
    /// Package path
    pub package: String,
    /// Structural report
    #[serde(flatten)]
    pub report: PackageReport,
}

/// Reads the structural report of a package.
///
/// # Errors
///
/// Returns an error if the package fails the structural checks.
pub fn inspect(package: &Path) -> Result<InfoResult> {
    let verifier = PackageVerifier::open(package)
        .with_context(|| format!("{} is not a valid package", package.display()))?;
    Ok(InfoResult {
        package: package.display().to_string(),
        report: verifier.report(),
    })
}

/// Runs the info command.
///
/// # Errors
///
/// See [`inspect`].
pub fn run(package: &Path, output_format: OutputFormat) -> Result<ExitCode> {
    info!("Inspecting package: {}", package.display());

    let result = inspect(package)?;
    let formatted = crate::formatters::format_output(&result, output_format)?;
    println!("{formatted}");

    Ok(ExitCode::SUCCESS)
}
