//! Package verification.
//!
//! [`PackageVerifier::open`] performs the structural tier: it reads only the
//! trailer and footer and checks that the recorded layout accounts for every
//! byte of the file. Everything else is opt-in and re-reads segment content
//! through the validated layout.

use crate::digest::{ContentDigest, DigestSink};
use crate::error::{PspfError, Result};
use crate::footer::{FOOTER_SIZE, Footer, PACKAGE_OVERHEAD, TRAILER_MAGIC};
use crate::keys::PublicKey;
use crate::layout::{SegmentKind, SegmentLayout};
use crate::metadata::MetadataManifest;
use crate::report::PackageReport;
use crate::signing::DigestVerifier;
use crate::source::not_found_or_io;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Largest segment [`PackageVerifier::read_segment`] will load into memory.
pub const MAX_SEGMENT_READ: u64 = 2 * 1024 * 1024 * 1024;

/// A package that passed the structural tier.
///
/// Holds the path and the validated footer, never an open handle; each
/// operation opens the file, reads what it needs and closes it again.
///
/// # Examples
///
/// ```no_run
/// use pspf_format::{PackageVerifier, PublicKey, SegmentKind};
///
/// # fn main() -> Result<(), pspf_format::PspfError> {
/// let package = PackageVerifier::open("dist/provider")?;
/// println!("{}", package.report());
///
/// let trusted = PublicKey::load("keys/provider-public.key")?;
/// package.verify_signature(&trusted)?;
///
/// let payload = package.read_segment(SegmentKind::Payload)?;
/// # let _ = payload;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PackageVerifier {
    path: PathBuf,
    footer: Footer,
    file_len: u64,
}

impl PackageVerifier {
    /// Opens a package and runs the structural checks.
    ///
    /// # Errors
    ///
    /// * [`PspfError::NotFound`] - the file does not exist
    /// * [`PspfError::Format`] - the file is too short, lacks the trailer,
    ///   or its footer does not describe the file
    /// * [`PspfError::Integrity`] - the footer checksum does not match
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| not_found_or_io(path, e))?;
        let file_len = file.metadata()?.len();

        if file_len < PACKAGE_OVERHEAD {
            return Err(PspfError::format(format!(
                "file is {file_len} bytes, too small to hold the {PACKAGE_OVERHEAD}-byte footer and trailer"
            )));
        }

        let mut tail = [0u8; PACKAGE_OVERHEAD as usize];
        file.seek(SeekFrom::Start(file_len - PACKAGE_OVERHEAD))?;
        file.read_exact(&mut tail)?;

        let (footer_bytes, trailer) = tail.split_at(FOOTER_SIZE);
        if trailer != TRAILER_MAGIC {
            return Err(PspfError::format(format!(
                "trailer magic not found at end of file (got {})",
                hex::encode(trailer)
            )));
        }

        let footer = Footer::unpack(footer_bytes)?;
        let footer_offset = file_len - PACKAGE_OVERHEAD;
        if footer.layout().end() != footer_offset {
            return Err(PspfError::format(format!(
                "segments end at {} but the footer starts at {footer_offset}",
                footer.layout().end()
            )));
        }

        tracing::debug!(
            "Opened package {}: {} bytes, version {:#06x}",
            path.display(),
            file_len,
            footer.version()
        );

        Ok(Self {
            path: path.to_path_buf(),
            footer,
            file_len,
        })
    }

    /// Path the package was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File size observed when the package was opened.
    #[must_use]
    pub const fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Validated footer.
    #[must_use]
    pub const fn footer(&self) -> &Footer {
        &self.footer
    }

    /// Validated segment layout.
    #[must_use]
    pub const fn layout(&self) -> &SegmentLayout {
        self.footer.layout()
    }

    /// Structural report derived from the footer alone.
    #[must_use]
    pub fn report(&self) -> PackageReport {
        PackageReport::from_footer(&self.footer)
    }

    /// Recomputes the SHA-256 digest over the four content segments.
    ///
    /// # Errors
    ///
    /// Returns [`PspfError::ShortRead`] if the file ends inside a content
    /// segment, or an I/O error.
    pub fn content_digest(&self) -> Result<ContentDigest> {
        let mut reader = BufReader::new(self.reopen()?);
        let mut sink = DigestSink::default();
        for kind in SegmentKind::CONTENT {
            let size = self.layout().get(kind).size;
            let copied = io::copy(&mut (&mut reader).take(size), &mut sink)?;
            check_complete(kind, size, copied)?;
        }
        Ok(sink.finish())
    }

    /// Verifies the package signature against a trusted key.
    ///
    /// Returns the verified content digest.
    ///
    /// # Errors
    ///
    /// * [`PspfError::SignatureInvalid`] - the signature does not match
    /// * [`PspfError::ShortRead`] - the file ended inside a segment
    pub fn verify_signature(&self, key: &dyn DigestVerifier) -> Result<ContentDigest> {
        let digest = self.content_digest()?;
        let signature = self.read_segment(SegmentKind::Signature)?;
        key.verify_digest(digest.as_bytes(), &signature)?;
        tracing::info!("Signature verified for {}", self.path.display());
        Ok(digest)
    }

    /// Verifies the signature against the public key embedded in the package.
    ///
    /// This is a self-consistency check only: anyone who can rewrite the
    /// package can also replace the embedded key. Use
    /// [`verify_signature`](Self::verify_signature) with a key obtained out
    /// of band to establish authenticity.
    ///
    /// # Errors
    ///
    /// * [`PspfError::Key`] - the embedded key cannot be parsed
    /// * Same as [`verify_signature`](Self::verify_signature)
    pub fn verify_embedded(&self) -> Result<ContentDigest> {
        let key = self.embedded_public_key()?;
        self.verify_signature(&key)
    }

    /// Parses the public-key segment.
    ///
    /// # Errors
    ///
    /// Returns [`PspfError::Key`] if the segment is not a PEM RSA public key.
    pub fn embedded_public_key(&self) -> Result<PublicKey> {
        PublicKey::from_pem_bytes(&self.read_segment(SegmentKind::PublicKey)?)
    }

    /// Parses the metadata manifest and checks the runtime checksum it records.
    ///
    /// # Errors
    ///
    /// * [`PspfError::Format`] - the metadata segment is not a manifest
    /// * [`PspfError::Integrity`] - the runtime segment does not match
    pub fn verify_manifest(&self) -> Result<MetadataManifest> {
        let manifest = MetadataManifest::from_bytes(&self.read_segment(SegmentKind::Metadata)?)?;
        let mut sink = DigestSink::default();
        self.copy_segment(SegmentKind::Runtime, &mut sink)?;
        manifest.check_runtime(&sink.finish())?;
        tracing::info!(
            "Manifest verified for {} (entry point {})",
            self.path.display(),
            manifest.entry_point
        );
        Ok(manifest)
    }

    /// Reads one segment into memory.
    ///
    /// # Errors
    ///
    /// * [`PspfError::Format`] - the segment exceeds [`MAX_SEGMENT_READ`]
    /// * [`PspfError::ShortRead`] - the file ended inside the segment
    pub fn read_segment(&self, kind: SegmentKind) -> Result<Vec<u8>> {
        let size = self.layout().get(kind).size;
        if size > MAX_SEGMENT_READ {
            return Err(PspfError::format(format!(
                "{kind} segment is {size} bytes, larger than the {MAX_SEGMENT_READ}-byte read limit"
            )));
        }
        let capacity = usize::try_from(size)
            .map_err(|_| PspfError::format(format!("{kind} segment does not fit in memory")))?;

        let mut buffer = Vec::with_capacity(capacity);
        self.copy_segment(kind, &mut buffer)?;
        Ok(buffer)
    }

    /// Streams one segment into `writer`, returning the number of bytes copied.
    ///
    /// # Errors
    ///
    /// Returns [`PspfError::ShortRead`] if the file ended inside the segment,
    /// or an I/O error from either side.
    pub fn copy_segment<W: Write + ?Sized>(&self, kind: SegmentKind, writer: &mut W) -> Result<u64> {
        let descriptor = self.layout().get(kind);
        let mut file = self.reopen()?;
        file.seek(SeekFrom::Start(descriptor.offset))?;

        let copied = io::copy(&mut BufReader::new(file).take(descriptor.size), writer)?;
        check_complete(kind, descriptor.size, copied)?;
        Ok(copied)
    }

    fn reopen(&self) -> Result<File> {
        File::open(&self.path).map_err(|e| not_found_or_io(&self.path, e))
    }
}

fn check_complete(kind: SegmentKind, expected: u64, actual: u64) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(PspfError::ShortRead {
            segment: kind.as_str(),
            expected,
            actual,
        })
    }
}
