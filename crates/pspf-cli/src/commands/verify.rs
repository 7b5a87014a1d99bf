//! Verify command implementation.
//!
//! Runs the structural checks, then checks the signature against a trusted
//! public key and, on request, the runtime checksum in the metadata manifest.

use crate::cli::{ExitCode, OutputFormat};
use anyhow::{Context, Result};
use pspf_format::{ContentDigest, PackageReport, PackageVerifier, PublicKey};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Result of verifying a package.
#[derive(Debug, Serialize)]
pub struct VerifyResult {
    /// Package path
    pub package: String,
    /// Structural report
    pub report: PackageReport,
    /// SHA-256 over the signed content
    pub content_digest: ContentDigest,
    /// Fingerprint of the trusted key the signature verified against
    pub key_fingerprint: String,
    /// Whether the embedded public key is the trusted key
    pub embedded_key_matches: bool,
    /// Manifest check result, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ManifestSummary>,
}

/// Summary of a verified metadata manifest.
#[derive(Debug, Serialize)]
pub struct ManifestSummary {
    /// Plugin entry point
    pub entry_point: String,
    /// Runtime checksum recorded in the manifest
    pub runtime_sha256: String,
    /// Whether the manifest carries a schema
    pub has_schema: bool,
}

/// Verifies a package against a trusted public key.
///
/// # Errors
///
/// Returns an error if any verification tier fails; the error chain carries
/// the package error that decides the exit code.
pub fn verify_package(
    package: &Path,
    public_key: &Path,
    check_manifest: bool,
) -> Result<VerifyResult> {
    info!("Verifying package: {}", package.display());

    let trusted = PublicKey::load(public_key)
        .with_context(|| format!("failed to load public key {}", public_key.display()))?;

    let verifier = PackageVerifier::open(package)
        .with_context(|| format!("{} is not a valid package", package.display()))?;

    let content_digest = verifier
        .verify_signature(&trusted)
        .with_context(|| format!("signature check failed for {}", package.display()))?;

    // An unparsable embedded key does not weaken a signature that verified
    // against the trusted key
    let embedded_key_matches = verifier
        .embedded_public_key()
        .is_ok_and(|embedded| embedded == trusted);

    let manifest = if check_manifest {
        let manifest = verifier
            .verify_manifest()
            .with_context(|| format!("manifest check failed for {}", package.display()))?;
        Some(ManifestSummary {
            entry_point: manifest.entry_point.to_string(),
            runtime_sha256: manifest.runtime_sha256,
            has_schema: manifest.schema.is_some(),
        })
    } else {
        None
    };

    Ok(VerifyResult {
        package: package.display().to_string(),
        report: verifier.report(),
        content_digest,
        key_fingerprint: trusted.fingerprint()?,
        embedded_key_matches,
        manifest,
    })
}

/// Runs the verify command.
///
/// # Errors
///
/// See [`verify_package`].
pub fn run(
    package: &Path,
    public_key: &Path,
    check_manifest: bool,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    let result = verify_package(package, public_key, check_manifest)?;

    let formatted = crate::formatters::format_output(&result, output_format)?;
    println!("{formatted}");

    info!("Package {} verified", result.package);
    Ok(ExitCode::SUCCESS)
}
