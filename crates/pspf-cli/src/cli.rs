//! CLI-specific types: output selection, exit codes and usage errors.

use clap::ValueEnum;
use pspf_format::PspfError;
use std::fmt;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON, for scripts
    Text,
    /// Colorized human-readable output
    #[default]
    Pretty,
}

impl OutputFormat {
    /// Returns the string representation of the format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
            Self::Pretty => "pretty",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line encoding on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Json => "json",
        })
    }
}

/// Process exit code with semantic meaning.
///
/// # Examples
///
/// ```
/// use pspf_cli::cli::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert!(!ExitCode::SIGNATURE_INVALID.is_success());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Command completed successfully.
    pub const SUCCESS: Self = Self(0);

    /// Unclassified failure, including I/O errors.
    pub const ERROR: Self = Self(1);

    /// Bad arguments, bad configuration, unreadable keys or missing files.
    pub const INVALID_INPUT: Self = Self(2);

    /// The file is not a well-formed package.
    pub const INVALID_PACKAGE: Self = Self(3);

    /// The package signature did not verify.
    pub const SIGNATURE_INVALID: Self = Self(4);

    /// Returns the exit code as an i32.
    #[must_use]
    pub const fn as_i32(&self) -> i32 {
        self.0
    }

    /// Returns true if this represents success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.0 == 0
    }

    /// Picks the exit code for a failed command.
    ///
    /// The first package or usage error found in the error chain decides;
    /// anything else is a general failure.
    #[must_use]
    pub fn from_error(error: &anyhow::Error) -> Self {
        for cause in error.chain() {
            if let Some(err) = cause.downcast_ref::<PspfError>() {
                return Self::from_pspf(err);
            }
            if cause.downcast_ref::<CliError>().is_some() {
                return Self::INVALID_INPUT;
            }
        }
        Self::ERROR
    }

    const fn from_pspf(error: &PspfError) -> Self {
        if error.is_signature_invalid() {
            Self::SIGNATURE_INVALID
        } else if error.is_structural() {
            Self::INVALID_PACKAGE
        } else if error.is_input() || error.is_not_found() {
            Self::INVALID_INPUT
        } else {
            Self::ERROR
        }
    }
}

impl Default for ExitCode {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Usage errors raised by the CLI itself rather than the package library.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A required build setting was given neither as a flag nor in the config file.
    #[error("missing required setting '{name}' (pass --{flag} or set it in pspf.toml)")]
    MissingSetting {
        /// Config key, e.g. `package.runtime`
        name: &'static str,
        /// Equivalent command-line flag
        flag: &'static str,
    },

    /// The config file could not be parsed.
    #[error("invalid config file {path}: {reason}")]
    InvalidConfig {
        /// Config file path
        path: String,
        /// Parser message
        reason: String,
    },

    /// A file would be overwritten.
    #[error("refusing to overwrite existing file {path}")]
    WouldOverwrite {
        /// Existing file
        path: String,
    },

    /// Output and input are the same file.
    #[error("refusing to write over the package being read: {path}")]
    SameFile {
        /// Shared path
        path: String,
    },

    /// A file named on the command line or in pspf.toml does not exist.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Missing file
        path: String,
    },

    /// The supplied public key does not belong to the private key.
    #[error("public key {path} does not match the signing key")]
    KeyMismatch {
        /// Public key file
        path: String,
    },
}
