//! Error types for package format operations.

use std::path::PathBuf;

/// Result type for package format operations.
pub type Result<T> = std::result::Result<T, PspfError>;

/// Errors that can occur while building, reading or verifying a package.
///
/// Variants group into the categories callers usually branch on:
/// structural failures ([`Format`](Self::Format), [`Integrity`](Self::Integrity)),
/// authentication failures ([`SignatureInvalid`](Self::SignatureInvalid)),
/// missing inputs ([`NotFound`](Self::NotFound)), caller mistakes
/// ([`Input`](Self::Input), [`Key`](Self::Key)) and I/O failures
/// ([`Io`](Self::Io), [`ShortRead`](Self::ShortRead)).
#[derive(thiserror::Error, Debug)]
pub enum PspfError {
    /// The file is not a well-formed package.
    ///
    /// Raised for a missing or wrong trailer, a footer of the wrong size,
    /// an unsupported magic or version, a non-zero reserved field, or a
    /// segment layout that does not fit the file.
    ///
    /// # Examples
    ///
    /// ```
    /// use pspf_format::{Footer, PspfError};
    ///
    /// let result = Footer::unpack(&[0u8; 12]);
    /// assert!(matches!(result, Err(PspfError::Format { .. })));
    /// ```
    #[error("Invalid package format: {reason}")]
    Format {
        /// Description of what is malformed
        reason: String,
    },

    /// The footer checksum does not match its contents.
    ///
    /// The CRC32 only detects corruption. It is not a security boundary:
    /// anyone can recompute it after editing the footer.
    #[error("Integrity check failed: {reason}")]
    Integrity {
        /// Description of the mismatch
        reason: String,
    },

    /// The package signature does not verify against the supplied key.
    ///
    /// Either the content was modified after signing or the package was
    /// signed by a different key.
    #[error("Signature verification failed: {reason}")]
    SignatureInvalid {
        /// Description of the failure
        reason: String,
    },

    /// A package file or segment source does not exist.
    #[error("Not found: {}", path.display())]
    NotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Malformed input to a format operation.
    ///
    /// Raised for a digest of the wrong length, a segment list that does not
    /// follow the canonical order, or an invalid entry point.
    #[error("Invalid input: {reason}")]
    Input {
        /// Description of the invalid input
        reason: String,
    },

    /// Key material could not be parsed, generated or encoded.
    #[error("Invalid key: {reason}")]
    Key {
        /// Description of the key problem
        reason: String,
    },

    /// A segment read ended before the size recorded in the footer.
    #[error("Short read in {segment} segment: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Segment being read
        segment: &'static str,
        /// Size recorded in the footer
        expected: u64,
        /// Bytes actually read
        actual: u64,
    },

    /// I/O error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization error for metadata manifests.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PspfError {
    /// Creates a [`Format`](Self::Format) error.
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        Self::Format {
            reason: reason.into(),
        }
    }

    /// Creates an [`Input`](Self::Input) error.
    pub(crate) fn input(reason: impl Into<String>) -> Self {
        Self::Input {
            reason: reason.into(),
        }
    }

    /// Creates a [`Key`](Self::Key) error.
    pub(crate) fn key(reason: impl std::fmt::Display) -> Self {
        Self::Key {
            reason: reason.to_string(),
        }
    }

    /// Returns true for structural failures (format or integrity).
    ///
    /// These mean the file is corrupt or not a package at all, as opposed to
    /// a well-formed package whose content cannot be authenticated.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(self, Self::Format { .. } | Self::Integrity { .. })
    }

    /// Returns true if the signature did not verify.
    #[must_use]
    pub const fn is_signature_invalid(&self) -> bool {
        matches!(self, Self::SignatureInvalid { .. })
    }

    /// Returns true if a package or source file was missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for caller-side input errors.
    #[must_use]
    pub const fn is_input(&self) -> bool {
        matches!(self, Self::Input { .. } | Self::Key { .. })
    }

    /// Returns true for I/O failures, including truncated segment reads.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ShortRead { .. })
    }
}
