//! Build configuration (`pspf.toml`).
//!
//! Every setting can come from the config file, from command-line flags, or
//! both; flags win. Relative paths in the file are resolved against the
//! directory containing it, so a project can be built from anywhere.
//!
//! ```toml
//! [package]
//! output = "dist/provider"
//! launcher = "bin/launcher"
//! runtime = "build/runtime.tgz"
//! payload = "build/payload.tgz"
//! metadata = "build/metadata.json"   # optional; generated when absent
//! entry_point = "my_provider:setup"  # used when metadata is generated
//!
//! [signing]
//! private_key = "keys/provider-private.key"
//! public_key = "keys/provider-public.key" # optional
//! ```

use crate::cli::CliError;
use anyhow::{Context, Result};
use pspf_format::EntryPoint;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "pspf.toml";

/// Contents of a `pspf.toml` file, or the equivalent set of flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Package inputs and output
    #[serde(default)]
    pub package: PackageConfig,

    /// Key material
    #[serde(default)]
    pub signing: SigningConfig,
}

/// `[package]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// Destination of the built package
    pub output: Option<PathBuf>,
    /// Launcher stub
    pub launcher: Option<PathBuf>,
    /// Runtime archive
    pub runtime: Option<PathBuf>,
    /// Payload archive
    pub payload: Option<PathBuf>,
    /// Ready-made metadata segment
    pub metadata: Option<PathBuf>,
    /// Entry point recorded when the metadata segment is generated
    pub entry_point: Option<String>,
}

/// `[signing]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SigningConfig {
    /// PEM private key used to sign
    pub private_key: Option<PathBuf>,
    /// PEM public key to embed; derived from the private key when absent
    pub public_key: Option<PathBuf>,
}

/// Where the metadata segment comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataInput {
    /// Existing file, embedded as is
    File(PathBuf),
    /// Manifest generated for this entry point
    Generate(EntryPoint),
}

/// Fully resolved build inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// Destination of the package
    pub output: PathBuf,
    /// Launcher stub
    pub launcher: PathBuf,
    /// Runtime archive
    pub runtime: PathBuf,
    /// Payload archive
    pub payload: PathBuf,
    /// Metadata source
    pub metadata: MetadataInput,
    /// Signing key
    pub private_key: PathBuf,
    /// Public key to embed, if given explicitly
    pub public_key: Option<PathBuf>,
}

impl BuildConfig {
    /// Reads a config file and resolves its relative paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid config.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading build config from {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                anyhow::Error::new(CliError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                anyhow::Error::new(e)
                    .context(format!("failed to read config file {}", path.display()))
            }
        })?;

        let mut config = Self::from_toml(&content).map_err(|e| CliError::InvalidConfig {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_relative_to(base);
        Ok(config)
    }

    /// Parses config text without touching paths.
    ///
    /// # Errors
    ///
    /// Returns the TOML parser error for malformed input or unknown keys.
    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Rewrites every relative path as `base.join(path)`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let package = &mut self.package;
        let signing = &mut self.signing;
        for slot in [
            &mut package.output,
            &mut package.launcher,
            &mut package.runtime,
            &mut package.payload,
            &mut package.metadata,
            &mut signing.private_key,
            &mut signing.public_key,
        ] {
            if let Some(path) = slot.as_mut().filter(|p| p.is_relative()) {
                *path = base.join(&*path);
            }
        }
    }

    /// Layers `overrides` on top of this config; set values in `overrides` win.
    #[must_use]
    pub fn merge(self, overrides: Self) -> Self {
        Self {
            package: PackageConfig {
                output: overrides.package.output.or(self.package.output),
                launcher: overrides.package.launcher.or(self.package.launcher),
                runtime: overrides.package.runtime.or(self.package.runtime),
                payload: overrides.package.payload.or(self.package.payload),
                metadata: overrides.package.metadata.or(self.package.metadata),
                entry_point: overrides.package.entry_point.or(self.package.entry_point),
            },
            signing: SigningConfig {
                private_key: overrides.signing.private_key.or(self.signing.private_key),
                public_key: overrides.signing.public_key.or(self.signing.public_key),
            },
        }
    }

    /// Checks that every required setting is present.
    ///
    /// Settings are checked in the order output, launcher, runtime, payload,
    /// metadata, private key. An explicit metadata file takes precedence
    /// over the entry point.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::MissingSetting`] for the first missing setting, or
    /// an input error if the entry point is malformed.
    pub fn into_plan(self) -> Result<BuildPlan> {
        let PackageConfig {
            output,
            launcher,
            runtime,
            payload,
            metadata,
            entry_point,
        } = self.package;

        let output = required(output, "package.output", "output")?;
        let launcher = required(launcher, "package.launcher", "launcher")?;
        let runtime = required(runtime, "package.runtime", "runtime")?;
        let payload = required(payload, "package.payload", "payload")?;

        let metadata = match (metadata, entry_point) {
            (Some(path), _) => MetadataInput::File(path),
            (None, Some(entry)) => MetadataInput::Generate(
                entry
                    .parse()
                    .with_context(|| format!("invalid entry point '{entry}'"))?,
            ),
            (None, None) => {
                return Err(CliError::MissingSetting {
                    name: "package.metadata",
                    flag: "metadata or --entry-point",
                }
                .into());
            }
        };

        Ok(BuildPlan {
            output,
            launcher,
            runtime,
            payload,
            metadata,
            private_key: required(self.signing.private_key, "signing.private_key", "private-key")?,
            public_key: self.signing.public_key,
        })
    }
}

fn required(value: Option<PathBuf>, name: &'static str, flag: &'static str) -> Result<PathBuf> {
    value.ok_or_else(|| CliError::MissingSetting { name, flag }.into())
}
