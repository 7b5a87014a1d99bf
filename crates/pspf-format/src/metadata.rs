//! Metadata segment contents and plugin schema resolution.
//!
//! The metadata segment carries a JSON [`MetadataManifest`]: the plugin's
//! entry point, a SHA-256 of the runtime segment, an optional schema
//! document and checksums of any extra files. The schema comes from a
//! [`SchemaProvider`], resolved by entry point, so this crate never needs to
//! know how plugins are actually loaded.

use crate::digest::{ContentDigest, DigestSink};
use crate::error::{PspfError, Result};
use crate::source::SegmentSource;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::str::FromStr;

/// Manifest format version written by this crate.
pub const MANIFEST_FORMAT_VERSION: &str = "1";

/// Plugin entry point in `module:function` form, e.g. `my_provider.core:setup`.
///
/// # Examples
///
/// ```
/// use pspf_format::EntryPoint;
///
/// let entry: EntryPoint = "my_provider.core:setup".parse()?;
/// assert_eq!(entry.module(), "my_provider.core");
/// assert_eq!(entry.function(), "setup");
///
/// assert!("no-colon".parse::<EntryPoint>().is_err());
/// # Ok::<(), pspf_format::PspfError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryPoint {
    module: String,
    function: String,
}

impl EntryPoint {
    /// Module path part.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Function name part.
    #[must_use]
    pub fn function(&self) -> &str {
        &self.function
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for EntryPoint {
    type Err = PspfError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |why: &str| PspfError::input(format!("invalid entry point '{s}': {why}"));

        let (module, function) = s
            .rsplit_once(':')
            .ok_or_else(|| invalid("expected 'module:function'"))?;
        if module.is_empty() || !module.split('.').all(is_identifier) {
            return Err(invalid("module must be a dotted identifier path"));
        }
        if !is_identifier(function) {
            return Err(invalid("function must be an identifier"));
        }
        Ok(Self {
            module: module.to_string(),
            function: function.to_string(),
        })
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.function)
    }
}

impl Serialize for EntryPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntryPoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Capability that yields schema metadata for a plugin entry point.
///
/// Implementations may look the entry point up in a compiled-in table
/// ([`SchemaRegistry`]), call into a dynamically loaded library, or ask a
/// subprocess. Any `Fn(&EntryPoint) -> Result<Value>` closure also works.
pub trait SchemaProvider {
    /// Resolves the schema for `entry_point`.
    ///
    /// # Errors
    ///
    /// Implementation specific; [`SchemaRegistry`] returns
    /// [`PspfError::Input`] for unknown entry points.
    fn resolve(&self, entry_point: &EntryPoint) -> Result<Value>;
}

impl<F> SchemaProvider for F
where
    F: Fn(&EntryPoint) -> Result<Value>,
{
    fn resolve(&self, entry_point: &EntryPoint) -> Result<Value> {
        self(entry_point)
    }
}

type SchemaFn = Box<dyn Fn() -> Value + Send + Sync>;

/// Compiled-in table of schema functions keyed by entry point.
#[derive(Default)]
pub struct SchemaRegistry {
    entries: HashMap<EntryPoint, SchemaFn>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema function, replacing any previous one.
    pub fn register(
        &mut self,
        entry_point: EntryPoint,
        schema: impl Fn() -> Value + Send + Sync + 'static,
    ) -> &mut Self {
        self.entries.insert(entry_point, Box::new(schema));
        self
    }

    /// Number of registered entry points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SchemaProvider for SchemaRegistry {
    fn resolve(&self, entry_point: &EntryPoint) -> Result<Value> {
        self.entries
            .get(entry_point)
            .map(|schema| schema())
            .ok_or_else(|| {
                PspfError::input(format!("no schema registered for entry point '{entry_point}'"))
            })
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.entries.keys().map(ToString::to_string).collect();
        names.sort();
        f.debug_struct("SchemaRegistry")
            .field("entries", &names)
            .finish()
    }
}

/// Checksum record for an extra file shipped alongside the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path of the file inside the archive it belongs to
    pub path: String,
    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
}

/// JSON document stored in the metadata segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataManifest {
    /// Manifest format version
    pub format_version: String,
    /// Plugin entry point the launcher will invoke
    pub entry_point: EntryPoint,
    /// SHA-256 of the runtime segment, lowercase hex
    pub runtime_sha256: String,
    /// Schema resolved from the entry point, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    /// Checksums of extra files
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<ManifestEntry>,
}

impl MetadataManifest {
    /// Creates a manifest for `entry_point`, hashing the runtime source.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime source cannot be read.
    pub fn new(entry_point: EntryPoint, runtime: &SegmentSource) -> Result<Self> {
        Ok(Self {
            format_version: MANIFEST_FORMAT_VERSION.to_string(),
            entry_point,
            runtime_sha256: digest_source(runtime)?.to_hex(),
            schema: None,
            files: Vec::new(),
        })
    }

    /// Resolves and stores the schema for this manifest's entry point.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error.
    pub fn with_schema(mut self, provider: &dyn SchemaProvider) -> Result<Self> {
        self.schema = Some(provider.resolve(&self.entry_point)?);
        Ok(self)
    }

    /// Records the checksum of an extra file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, contents: &[u8]) -> Self {
        self.files.push(ManifestEntry {
            path: path.into(),
            sha256: ContentDigest::of(contents).to_hex(),
        });
        self
    }

    /// Serializes to the bytes stored in the metadata segment.
    ///
    /// # Errors
    ///
    /// Returns [`PspfError::Json`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parses a metadata segment.
    ///
    /// # Errors
    ///
    /// Returns [`PspfError::Format`] if the bytes are not a manifest this
    /// crate understands.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let manifest: Self = serde_json::from_slice(bytes).map_err(|e| {
            PspfError::format(format!("metadata segment is not a valid manifest: {e}"))
        })?;
        if manifest.format_version != MANIFEST_FORMAT_VERSION {
            return Err(PspfError::format(format!(
                "unsupported manifest format version '{}'",
                manifest.format_version
            )));
        }
        Ok(manifest)
    }

    /// Checks the recorded runtime checksum against the actual segment digest.
    ///
    /// # Errors
    ///
    /// Returns [`PspfError::Integrity`] on mismatch.
    pub fn check_runtime(&self, actual: &ContentDigest) -> Result<()> {
        if self.runtime_sha256.eq_ignore_ascii_case(&actual.to_hex()) {
            Ok(())
        } else {
            Err(PspfError::Integrity {
                reason: format!(
                    "runtime checksum mismatch: manifest records {}, segment hashes to {actual}",
                    self.runtime_sha256
                ),
            })
        }
    }
}

/// SHA-256 of a segment source, streamed.
pub(crate) fn digest_source(source: &SegmentSource) -> Result<ContentDigest> {
    let mut sink = DigestSink::default();
    io::copy(&mut source.open()?, &mut sink)?;
    Ok(sink.finish())
}
