//! SHA-256 content digest and counting writers.
//!
//! The content digest covers the launcher, runtime, metadata and payload
//! segments exactly as they appear on disk, in file order. The builder
//! computes it while streaming those segments out; the verifier recomputes
//! it from the finished file.

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Write};

/// Length of a SHA-256 digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// SHA-256 digest of a package's content segments.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Digests a single buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use pspf_format::ContentDigest;
    ///
    /// let digest = ContentDigest::of(b"abc");
    /// assert_eq!(
    ///     digest.to_hex(),
    ///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    /// );
    /// ```
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hexadecimal form.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Writer adapter that counts bytes and optionally hashes them.
///
/// Hashing is switched on for the content segments and off for the
/// signature, public key and footer, so one pass over the output yields both
/// the segment offsets and the content digest.
pub(crate) struct TrackingWriter<W> {
    inner: W,
    position: u64,
    hasher: Option<Sha256>,
}

impl<W: Write> TrackingWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            inner,
            position: 0,
            hasher: Some(Sha256::new()),
        }
    }

    /// Bytes written so far.
    pub(crate) const fn position(&self) -> u64 {
        self.position
    }

    /// Stops hashing and returns the digest of everything written so far.
    ///
    /// Returns `None` if the digest was already taken.
    pub(crate) fn finish_digest(&mut self) -> Option<ContentDigest> {
        self.hasher
            .take()
            .map(|hasher| ContentDigest(hasher.finalize().into()))
    }

    pub(crate) fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for TrackingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        if let Some(hasher) = self.hasher.as_mut() {
            hasher.update(&buf[..written]);
        }
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W> fmt::Debug for TrackingWriter<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingWriter")
            .field("position", &self.position)
            .field("hashing", &self.hasher.is_some())
            .finish_non_exhaustive()
    }
}

/// Incremental SHA-256 used when re-reading content segments.
#[derive(Debug, Default, Clone)]
pub(crate) struct DigestSink(Sha256);

impl DigestSink {
    pub(crate) fn finish(self) -> ContentDigest {
        ContentDigest(self.0.finalize().into())
    }
}

impl Write for DigestSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
