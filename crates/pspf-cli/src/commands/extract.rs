//! Extract command implementation.
//!
//! Copies one segment of a structurally valid package into a file.

use crate::cli::{CliError, ExitCode, OutputFormat};
use anyhow::{Context, Result};
use pspf_format::{PackageVerifier, SegmentKind};
use serde::Serialize;
use std::fs;
use std::io::{self, BufWriter};
use std::path::Path;
use tracing::{info, warn};

/// Result of extracting a segment.
#[derive(Debug, Serialize)]
pub struct ExtractResult {
    /// Segment name
    pub segment: SegmentKind,
    /// Bytes written
    pub size: u64,
    /// Destination file
    pub output: String,
}

/// Writes one segment of `package` to `output`.
///
/// The segment is copied into a temporary file next to `output`, which only
/// replaces the destination once the copy is complete. A failed extract
/// leaves any existing destination untouched.
///
/// # Errors
///
/// Returns an error if the package is invalid, `output` is the package
/// itself, the destination already exists and `force` is not set, or the
/// copy fails.
pub fn extract_segment(
    package: &Path,
    segment: SegmentKind,
    output: &Path,
    force: bool,
) -> Result<ExtractResult> {
    info!("Extracting {} segment from {}", segment, package.display());

    if output.exists() && !force {
        return Err(would_overwrite(output));
    }

    let verifier = PackageVerifier::open(package)
        .with_context(|| format!("{} is not a valid package", package.display()))?;

    if is_same_file(package, output) {
        return Err(CliError::SameFile {
            path: output.display().to_string(),
        }
        .into());
    }

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = tempfile::Builder::new()
        .prefix(".pspf-extract-")
        .suffix(".partial")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;
    let mut writer = BufWriter::new(temp);

    let size = verifier
        .copy_segment(segment, &mut writer)
        .inspect_err(|e| warn!("Discarding partial {} segment: {}", segment, e))
        .with_context(|| format!("failed to extract {segment} segment"))?;

    let temp = writer
        .into_inner()
        .map_err(io::IntoInnerError::into_error)
        .with_context(|| format!("failed to extract {segment} segment"))?;
    temp.as_file()
        .sync_all()
        .with_context(|| format!("failed to extract {segment} segment"))?;

    let persisted = if force {
        temp.persist(output)
    } else {
        temp.persist_noclobber(output)
    };
    persisted.map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            would_overwrite(output)
        } else {
            anyhow::Error::new(e.error).context(format!("failed to write {}", output.display()))
        }
    })?;

    Ok(ExtractResult {
        segment,
        size,
        output: output.display().to_string(),
    })
}

fn would_overwrite(path: &Path) -> anyhow::Error {
    CliError::WouldOverwrite {
        path: path.display().to_string(),
    }
    .into()
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Runs the extract command.
///
/// # Errors
///
/// See [`extract_segment`].
pub fn run(
    package: &Path,
    segment: SegmentKind,
    output: &Path,
    force: bool,
    output_format: OutputFormat,
) -> Result<ExitCode> {
    let result = extract_segment(package, segment, output, force)?;

    let formatted = crate::formatters::format_output(&result, output_format)?;
    println!("{formatted}");

    Ok(ExitCode::SUCCESS)
}
