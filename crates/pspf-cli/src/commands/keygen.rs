//! Keygen command implementation.
//!
//! Generates an RSA key pair for package signing.

use crate::cli::{CliError, ExitCode, OutputFormat};
use anyhow::{Context, Result};
use pspf_format::{PspfError, PublicKey, SigningKey};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{info, warn};

/// File name of the generated private key.
pub const PRIVATE_KEY_FILE: &str = "provider-private.key";

/// File name of the generated public key.
pub const PUBLIC_KEY_FILE: &str = "provider-public.key";

/// Result of generating a key pair.
#[derive(Debug, Serialize)]
pub struct KeygenResult {
    /// Private key path
    pub private_key: String,
    /// Public key path
    pub public_key: String,
    /// Key size in bits
    pub bits: usize,
    /// SHA-256 fingerprint of the public key
    pub fingerprint: String,
}

/// Generates a key pair into `out_dir`.
///
/// Both files are created exclusively. If the public key cannot be written
/// the private key is removed again, so a failed run can be retried.
///
/// # Errors
///
/// Returns an error if either key file already exists, `bits` is too small,
/// or the files cannot be written.
pub fn generate_keys(out_dir: &Path, bits: usize) -> Result<KeygenResult> {
    let private_path = out_dir.join(PRIVATE_KEY_FILE);
    let public_path = out_dir.join(PUBLIC_KEY_FILE);

    for path in [&private_path, &public_path] {
        if path.exists() {
            return Err(CliError::WouldOverwrite {
                path: path.display().to_string(),
            }
            .into());
        }
    }

    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    info!("Generating {} bit RSA key pair in {}", bits, out_dir.display());
    let key = SigningKey::generate(bits)?;
    let public = key.public_key();

    key.write_pem(&private_path).map_err(|e| match e {
        PspfError::Io(io) if io.kind() == ErrorKind::AlreadyExists => {
            anyhow::Error::new(CliError::WouldOverwrite {
                path: private_path.display().to_string(),
            })
        }
        other => anyhow::Error::new(other)
            .context(format!("failed to write {}", private_path.display())),
    })?;

    if let Err(e) = write_public_key(&public_path, &public) {
        if let Err(cleanup) = fs::remove_file(&private_path) {
            warn!(
                "Failed to remove private key {}: {}",
                private_path.display(),
                cleanup
            );
        }
        return Err(e);
    }

    Ok(KeygenResult {
        private_key: private_path.display().to_string(),
        public_key: public_path.display().to_string(),
        bits: key.bits(),
        fingerprint: public.fingerprint()?,
    })
}

fn write_public_key(path: &Path, public: &PublicKey) -> Result<()> {
    let pem = public.to_pem()?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => anyhow::Error::new(CliError::WouldOverwrite {
                path: path.display().to_string(),
            }),
            _ => anyhow::Error::new(e).context(format!("failed to create {}", path.display())),
        })?;
    file.write_all(pem.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Runs the keygen command.
///
/// # Errors
///
/// See [`generate_keys`].
pub fn run(out_dir: &Path, bits: usize, output_format: OutputFormat) -> Result<ExitCode> {
    let result = generate_keys(out_dir, bits)?;

    let formatted = crate::formatters::format_output(&result, output_format)?;
    println!("{formatted}");

    info!("Key pair written to {}", out_dir.display());
    Ok(ExitCode::SUCCESS)
}
