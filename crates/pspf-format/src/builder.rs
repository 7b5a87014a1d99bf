//! Package assembly.
//!
//! Segments are streamed into a temporary file next to the destination in
//! canonical order while a running cursor records each offset. The content
//! digest is computed on the way out, so signing needs no second pass over
//! the data. Once the footer and trailer are written the temporary file is
//! renamed over the destination; on any error it is deleted instead.

use crate::digest::{ContentDigest, TrackingWriter};
use crate::error::{PspfError, Result};
use crate::footer::{Footer, PACKAGE_OVERHEAD, TRAILER_MAGIC};
use crate::keys::SigningKey;
use crate::layout::{SEGMENT_COUNT, SegmentDescriptor, SegmentKind, SegmentLayout};
use crate::report::PackageReport;
use crate::signing::DigestSigner;
use crate::source::SegmentSource;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Outcome of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Destination path of the package
    pub output: PathBuf,
    /// SHA-256 over the launcher, runtime, metadata and payload segments
    pub content_digest: ContentDigest,
    /// Layout as recorded in the footer
    pub package: PackageReport,
}

/// Builds a signed package from its four content segments.
///
/// # Examples
///
/// ```no_run
/// use pspf_format::{PackageBuilder, SegmentSource, SigningKey};
///
/// # fn main() -> Result<(), pspf_format::PspfError> {
/// let key = SigningKey::load("keys/provider-private.key")?;
///
/// let report = PackageBuilder::new()
///     .launcher(SegmentSource::file("bin/launcher"))
///     .runtime(SegmentSource::file("build/runtime.tgz"))
///     .metadata(SegmentSource::file("build/metadata.json"))
///     .payload(SegmentSource::file("build/payload.tgz"))
///     .build("dist/provider", &key)?;
///
/// println!("{} bytes, digest {}", report.package.total_size, report.content_digest);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone)]
pub struct PackageBuilder {
    launcher: Option<SegmentSource>,
    runtime: Option<SegmentSource>,
    metadata: Option<SegmentSource>,
    payload: Option<SegmentSource>,
}

impl PackageBuilder {
    /// Creates a builder with no segments set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the launcher stub.
    #[must_use]
    pub fn launcher(mut self, source: impl Into<SegmentSource>) -> Self {
        self.launcher = Some(source.into());
        self
    }

    /// Sets the runtime installation archive.
    #[must_use]
    pub fn runtime(mut self, source: impl Into<SegmentSource>) -> Self {
        self.runtime = Some(source.into());
        self
    }

    /// Sets the metadata archive.
    #[must_use]
    pub fn metadata(mut self, source: impl Into<SegmentSource>) -> Self {
        self.metadata = Some(source.into());
        self
    }

    /// Sets the payload archive.
    #[must_use]
    pub fn payload(mut self, source: impl Into<SegmentSource>) -> Self {
        self.payload = Some(source.into());
        self
    }

    /// Builds and signs the package with `key`, embedding its public key.
    ///
    /// # Errors
    ///
    /// * [`PspfError::Input`] - a content segment was not set
    /// * [`PspfError::NotFound`] - a file source does not exist
    /// * I/O or signing errors
    ///
    /// The destination is left untouched on error.
    pub fn build(&self, output: impl AsRef<Path>, key: &SigningKey) -> Result<BuildReport> {
        let public_key_pem = key.public_key().to_pem()?;
        self.build_with(output, key, public_key_pem.as_bytes())
    }

    /// Builds the package with an arbitrary signer and public-key blob.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build).
    pub fn build_with(
        &self,
        output: impl AsRef<Path>,
        signer: &dyn DigestSigner,
        public_key_pem: &[u8],
    ) -> Result<BuildReport> {
        let content = [
            required(self.launcher.as_ref(), SegmentKind::Launcher)?,
            required(self.runtime.as_ref(), SegmentKind::Runtime)?,
            required(self.metadata.as_ref(), SegmentKind::Metadata)?,
            required(self.payload.as_ref(), SegmentKind::Payload)?,
        ];

        write_package(output.as_ref(), content, |digest| {
            let signature = signer.sign_digest(digest.as_bytes())?;
            tracing::debug!("Signed content digest {} ({} byte signature)", digest, signature.len());
            Ok([
                SegmentSource::Bytes(signature),
                SegmentSource::bytes(public_key_pem),
            ])
        })
    }
}

fn required(source: Option<&SegmentSource>, kind: SegmentKind) -> Result<&SegmentSource> {
    source.ok_or_else(|| PspfError::input(format!("{kind} segment source not set")))
}

/// Writes a package from six pre-made segments in canonical order.
///
/// Used when the detached signature already exists. No signing happens
/// here, and nothing checks that the signature matches the content.
///
/// # Errors
///
/// * [`PspfError::Input`] - not exactly six segments, or not in canonical order
/// * [`PspfError::NotFound`] - a file source does not exist
/// * I/O errors
///
/// # Examples
///
/// ```
/// use pspf_format::{assemble, SegmentKind, SegmentSource};
///
/// # fn main() -> Result<(), pspf_format::PspfError> {
/// let dir = tempfile::tempdir()?;
/// let segments = SegmentKind::ALL
///     .into_iter()
///     .map(|kind| (kind, SegmentSource::bytes(kind.as_str().as_bytes())))
///     .collect();
///
/// let report = assemble(dir.path().join("provider"), segments)?;
/// assert_eq!(report.package.total_size, 49 + 116);
/// # Ok(())
/// # }
/// ```
pub fn assemble(
    output: impl AsRef<Path>,
    segments: Vec<(SegmentKind, SegmentSource)>,
) -> Result<BuildReport> {
    if segments.len() != SEGMENT_COUNT {
        return Err(PspfError::input(format!(
            "expected {SEGMENT_COUNT} segments, got {}",
            segments.len()
        )));
    }
    for (position, ((kind, _), expected)) in segments.iter().zip(SegmentKind::ALL).enumerate() {
        if *kind != expected {
            return Err(PspfError::input(format!(
                "segment {position} must be {expected}, got {kind}"
            )));
        }
    }

    let mut sources = segments.into_iter().map(|(_, source)| source);
    let mut next = || {
        sources
            .next()
            .ok_or_else(|| PspfError::input("segment list ended early"))
    };
    let content = [next()?, next()?, next()?, next()?];
    let trailing = [next()?, next()?];

    let [launcher, runtime, metadata, payload] = &content;
    write_package(
        output.as_ref(),
        [launcher, runtime, metadata, payload],
        move |_| Ok(trailing),
    )
}

/// Streams all segments, footer and trailer into a temporary file and
/// moves it into place.
///
/// `trailing` receives the content digest and returns the signature and
/// public-key segments.
fn write_package<F>(
    output: &Path,
    content: [&SegmentSource; 4],
    trailing: F,
) -> Result<BuildReport>
where
    F: FnOnce(&ContentDigest) -> Result<[SegmentSource; 2]>,
{
    tracing::info!("Assembling package: {}", output.display());

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    // Dropping the temp file on any early return deletes it
    let temp = tempfile::Builder::new()
        .prefix(".pspf-")
        .suffix(".partial")
        .tempfile_in(dir)?;
    let temp_path = temp.path().to_path_buf();
    let mut out = TrackingWriter::new(BufWriter::new(temp));

    let (digest, footer) = write_body(&mut out, content, trailing).inspect_err(|e| {
        tracing::warn!("Discarding partial package {}: {}", temp_path.display(), e);
    })?;
    let total_size = out.position();

    let temp = out
        .into_inner()
        .into_inner()
        .map_err(io::IntoInnerError::into_error)?;
    finalize(temp, output)?;

    tracing::info!(
        "Package written: {} ({} bytes, content digest {})",
        output.display(),
        total_size,
        digest
    );

    Ok(BuildReport {
        output: output.to_path_buf(),
        content_digest: digest,
        package: PackageReport::from_footer(&footer),
    })
}

/// Writes segments, footer and trailer, returning the content digest and footer.
fn write_body<W, F>(
    out: &mut TrackingWriter<W>,
    content: [&SegmentSource; 4],
    trailing: F,
) -> Result<(ContentDigest, Footer)>
where
    W: Write,
    F: FnOnce(&ContentDigest) -> Result<[SegmentSource; 2]>,
{
    let mut descriptors = [SegmentDescriptor::default(); SEGMENT_COUNT];
    for (kind, source) in SegmentKind::CONTENT.into_iter().zip(content) {
        descriptors[kind.index()] = write_segment(out, kind, source)?;
    }

    let digest = out
        .finish_digest()
        .ok_or_else(|| PspfError::input("content digest already taken"))?;
    let [signature, public_key] = trailing(&digest)?;

    descriptors[SegmentKind::Signature.index()] =
        write_segment(out, SegmentKind::Signature, &signature)?;
    descriptors[SegmentKind::PublicKey.index()] =
        write_segment(out, SegmentKind::PublicKey, &public_key)?;

    let layout = SegmentLayout::from_descriptors(descriptors)?;
    let footer = Footer::new(layout);
    out.write_all(&footer.pack())?;
    out.write_all(&TRAILER_MAGIC)?;

    let written = out.position();
    if written != layout.end() + PACKAGE_OVERHEAD {
        return Err(PspfError::Io(io::Error::other(format!(
            "wrote {written} bytes but the layout accounts for {}",
            layout.end() + PACKAGE_OVERHEAD
        ))));
    }

    Ok((digest, footer))
}

fn write_segment<W: Write>(
    out: &mut TrackingWriter<W>,
    kind: SegmentKind,
    source: &SegmentSource,
) -> Result<SegmentDescriptor> {
    let offset = out.position();
    let mut reader = source.open()?;
    let size = io::copy(&mut reader, out)?;
    tracing::debug!("Wrote {} segment: {} bytes at offset {}", kind, size, offset);
    Ok(SegmentDescriptor::new(offset, size))
}

/// Flushes the temporary file to disk, marks it executable and renames it
/// over the destination.
fn finalize(temp: NamedTempFile, output: &Path) -> Result<()> {
    let file: &File = temp.as_file();
    file.sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o755))?;
    }

    temp.persist(output).map_err(|e| {
        tracing::warn!("Failed to move package into place at {}: {}", output.display(), e.error);
        PspfError::Io(e.error)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footer::FOOTER_SIZE;
    use std::fs;

    /// Signer that returns a fixed-size pattern, so layout tests need no RSA.
    struct FixedSigner(usize);

    impl DigestSigner for FixedSigner {
        fn sign_digest(&self, digest: &[u8]) -> Result<Vec<u8>> {
            Ok(digest.iter().copied().cycle().take(self.0).collect())
        }
    }

    struct FailingSigner;

    impl DigestSigner for FailingSigner {
        fn sign_digest(&self, _digest: &[u8]) -> Result<Vec<u8>> {
            Err(PspfError::Key {
                reason: "hardware token unplugged".to_string(),
            })
        }
    }

    fn builder() -> PackageBuilder {
        PackageBuilder::new()
            .launcher(vec![1u8; 10])
            .runtime(vec![2u8; 20])
            .metadata(vec![3u8; 30])
            .payload(vec![4u8; 40])
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_build_with_layout() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("provider");

        let report = builder()
            .build_with(&output, &FixedSigner(256), &[9u8; 300])
            .unwrap();

        assert_eq!(report.package.sizes(), vec![10, 20, 30, 40, 256, 300]);
        assert_eq!(report.package.total_size, 772);
        assert_eq!(fs::metadata(&output).unwrap().len(), 772);

        let bytes = fs::read(&output).unwrap();
        assert_eq!(&bytes[..10], &[1u8; 10]);
        assert_eq!(&bytes[60..100], &[4u8; 40]);
        assert_eq!(&bytes[bytes.len() - 8..], &TRAILER_MAGIC);
        let footer = Footer::unpack(&bytes[656..656 + FOOTER_SIZE]).unwrap();
        assert_eq!(footer.layout().get(SegmentKind::PublicKey).offset, 356);
    }

    #[test]
    fn test_digest_covers_content_only() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("provider");
        let report = builder()
            .build_with(&output, &FixedSigner(64), b"pem")
            .unwrap();

        let bytes = fs::read(&output).unwrap();
        assert_eq!(report.content_digest, ContentDigest::of(&bytes[..100]));
        // The fixed signer echoes the digest, so the signature segment proves
        // the signer saw the content digest
        assert_eq!(&bytes[100..132], report.content_digest.as_bytes());
    }

    #[test]
    fn test_missing_segment_is_input_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = PackageBuilder::new()
            .launcher(vec![0u8])
            .runtime(vec![0u8])
            .payload(vec![0u8])
            .build_with(temp.path().join("provider"), &FixedSigner(1), b"")
            .unwrap_err();
        assert!(err.is_input());
        assert!(err.to_string().contains("metadata"));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[test]
    fn test_missing_file_leaves_nothing_behind() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("provider");

        let err = builder()
            .payload(SegmentSource::file(temp.path().join("missing.tgz")))
            .build_with(&output, &FixedSigner(16), b"pem")
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(!output.exists());
        assert!(dir_entries(temp.path()).is_empty(), "temporary file left behind");
    }

    #[test]
    fn test_signer_failure_leaves_nothing_behind() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("provider");

        let err = builder()
            .build_with(&output, &FailingSigner, b"pem")
            .unwrap_err();
        assert!(err.to_string().contains("hardware token"));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_package() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("provider");
        builder()
            .build_with(&output, &FixedSigner(16), b"pem")
            .unwrap();
        let before = fs::read(&output).unwrap();

        builder()
            .build_with(&output, &FailingSigner, b"pem")
            .unwrap_err();
        assert_eq!(fs::read(&output).unwrap(), before);
        assert_eq!(dir_entries(temp.path()), vec!["provider".to_string()]);
    }

    #[test]
    fn test_rebuild_replaces_existing_package() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("provider");
        fs::write(&output, b"stale").unwrap();

        builder()
            .build_with(&output, &FixedSigner(16), b"pem")
            .unwrap();
        assert_eq!(fs::metadata(&output).unwrap().len(), 100 + 16 + 3 + 116);
    }

    #[test]
    fn test_creates_missing_output_directory() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("dist/nested/provider");
        builder()
            .build_with(&output, &FixedSigner(8), b"pem")
            .unwrap();
        assert!(output.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_package_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("provider");
        builder()
            .build_with(&output, &FixedSigner(8), b"pem")
            .unwrap();
        let mode = fs::metadata(&output).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_assemble_rejects_wrong_count() {
        let temp = tempfile::tempdir().unwrap();
        let segments = SegmentKind::CONTENT
            .into_iter()
            .map(|kind| (kind, SegmentSource::bytes(vec![0u8])))
            .collect();
        let err = assemble(temp.path().join("provider"), segments).unwrap_err();
        assert!(err.is_input());
        assert!(err.to_string().contains("expected 6"));
    }

    #[test]
    fn test_assemble_rejects_wrong_order() {
        let temp = tempfile::tempdir().unwrap();
        let mut segments: Vec<_> = SegmentKind::ALL
            .into_iter()
            .map(|kind| (kind, SegmentSource::bytes(vec![0u8])))
            .collect();
        segments.swap(1, 2);

        let err = assemble(temp.path().join("provider"), segments).unwrap_err();
        assert!(err.is_input());
        assert!(err.to_string().contains("segment 1 must be runtime"));
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[test]
    fn test_assemble_running_offsets() {
        let temp = tempfile::tempdir().unwrap();
        let sizes = [7u64, 0, 13, 1024, 0, 5];
        let segments = SegmentKind::ALL
            .into_iter()
            .zip(sizes)
            .map(|(kind, size)| (kind, SegmentSource::bytes(vec![0xaa; usize::try_from(size).unwrap()])))
            .collect();

        let report = assemble(temp.path().join("provider"), segments).unwrap();
        let mut running = 0;
        for (entry, size) in report.package.segments.iter().zip(sizes) {
            assert_eq!(entry.offset, running);
            assert_eq!(entry.size, size);
            running += size;
        }
        assert_eq!(report.package.total_size, running + 108 + 8);
    }

    #[test]
    fn test_signed_build_with_real_key() {
        use crate::signing::{DigestVerifier, test_keys};

        let temp = tempfile::tempdir().unwrap();
        let key = test_keys::primary();
        let report = builder().build(temp.path().join("provider"), key).unwrap();

        let bytes = fs::read(temp.path().join("provider")).unwrap();
        let signature = &bytes[100..356];
        assert_eq!(report.package.size_of(SegmentKind::Signature), 256);
        key.public_key()
            .verify_digest(report.content_digest.as_bytes(), signature)
            .unwrap();

        let pem_end = 356 + usize::try_from(report.package.size_of(SegmentKind::PublicKey)).unwrap();
        let embedded = std::str::from_utf8(&bytes[356..pem_end]).unwrap();
        assert_eq!(embedded, key.public_key().to_pem().unwrap());
    }
}
