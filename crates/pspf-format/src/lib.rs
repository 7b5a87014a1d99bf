//! Container format for signed, self-contained PSPF plugin packages.
//!
//! A package is a single executable file: a native launcher stub followed by
//! the archives the launcher unpacks at run time, a detached signature and
//! the signer's public key. A fixed-size footer at the very end of the file
//! records where each segment lives, so a reader can locate everything by
//! looking only at the last 116 bytes.
//!
//! # Layout
//!
//! ```text
//! offset 0
//! ├── launcher      native stub, executed directly by the OS
//! ├── runtime       interpreter installation archive
//! ├── metadata      package manifest
//! ├── payload       application code and dependencies
//! ├── signature     RSA-PSS over SHA-256(launcher..payload)
//! ├── public-key    PEM of the signing key
//! ├── footer        108 bytes: 6 x (offset, size), version, reserved, crc32, magic
//! └── trailer       8 bytes: "!PSPF\0\0\0"
//! ```
//!
//! All integers are little-endian. Segments are contiguous and in canonical
//! order; the footer CRC32 detects corruption, the signature detects
//! tampering.
//!
//! # Examples
//!
//! ## Building a package
//!
//! ```no_run
//! use pspf_format::{PackageBuilder, SegmentSource, SigningKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let key = SigningKey::load("keys/provider-private.key")?;
//!
//! let report = PackageBuilder::new()
//!     .launcher(SegmentSource::file("bin/launcher"))
//!     .runtime(SegmentSource::file("build/runtime.tgz"))
//!     .metadata(SegmentSource::file("build/metadata.json"))
//!     .payload(SegmentSource::file("build/payload.tgz"))
//!     .build("dist/provider", &key)?;
//!
//! println!("{}", report.package);
//! # Ok(())
//! # }
//! ```
//!
//! ## Verifying a package
//!
//! ```no_run
//! use pspf_format::{PackageVerifier, PublicKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Structural checks only: trailer, footer checksum, layout
//! let package = PackageVerifier::open("dist/provider")?;
//!
//! // Authenticity requires a key obtained out of band
//! let trusted = PublicKey::load("keys/provider-public.key")?;
//! let digest = package.verify_signature(&trusted)?;
//! println!("content digest {digest}");
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! The footer checksum is not a security boundary. Only
//! [`PackageVerifier::verify_signature`] with a trusted key says anything
//! about who produced a package; [`PackageVerifier::verify_embedded`] merely
//! checks that the package agrees with itself.

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod builder;
pub mod digest;
pub mod error;
pub mod footer;
pub mod keys;
pub mod layout;
pub mod metadata;
pub mod report;
pub mod signing;
pub mod source;
pub mod verifier;

// Re-export main types
pub use builder::{BuildReport, PackageBuilder, assemble};
pub use digest::{ContentDigest, DIGEST_LEN};
pub use error::{PspfError, Result};
pub use footer::{
    FOOTER_MAGIC, FOOTER_SIZE, FORMAT_VERSION, Footer, PACKAGE_OVERHEAD, TRAILER_MAGIC,
    TRAILER_SIZE,
};
pub use keys::{DEFAULT_KEY_BITS, MIN_KEY_BITS, PublicKey, SigningKey};
pub use layout::{SEGMENT_COUNT, SegmentDescriptor, SegmentKind, SegmentLayout};
pub use metadata::{
    EntryPoint, MANIFEST_FORMAT_VERSION, ManifestEntry, MetadataManifest, SchemaProvider,
    SchemaRegistry,
};
pub use report::{PackageReport, SegmentEntry};
pub use signing::{DigestSigner, DigestVerifier};
pub use source::SegmentSource;
pub use verifier::{MAX_SEGMENT_READ, PackageVerifier};
