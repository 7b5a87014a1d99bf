//! Canonical segment order and byte ranges.
//!
//! Every package holds the same six segments in the same order. The builder
//! and the verifier both go through [`SegmentKind::ALL`] so the order is
//! defined in exactly one place.

use crate::error::{PspfError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Number of segments in every package.
pub const SEGMENT_COUNT: usize = 6;

/// One of the six canonical package segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentKind {
    /// Native launcher stub, placed first so the package stays executable.
    Launcher,
    /// Interpreter runtime installation archive.
    Runtime,
    /// Metadata archive (see [`MetadataManifest`](crate::MetadataManifest)).
    Metadata,
    /// Application payload archive.
    Payload,
    /// Detached signature over the content digest.
    Signature,
    /// Public key the package claims to be signed with, PEM encoded.
    PublicKey,
}

impl SegmentKind {
    /// All segments in file order.
    pub const ALL: [Self; SEGMENT_COUNT] = [
        Self::Launcher,
        Self::Runtime,
        Self::Metadata,
        Self::Payload,
        Self::Signature,
        Self::PublicKey,
    ];

    /// Segments covered by the content digest, in file order.
    pub const CONTENT: [Self; 4] = [Self::Launcher, Self::Runtime, Self::Metadata, Self::Payload];

    /// Position of this segment in the file.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Returns true if the segment is part of the signed content.
    #[must_use]
    pub const fn is_content(self) -> bool {
        self.index() < Self::CONTENT.len()
    }

    /// Stable name used in reports, logs and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Launcher => "launcher",
            Self::Runtime => "runtime",
            Self::Metadata => "metadata",
            Self::Payload => "payload",
            Self::Signature => "signature",
            Self::PublicKey => "public-key",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentKind {
    type Err = PspfError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                PspfError::input(format!(
                    "unknown segment '{s}' (expected one of: launcher, runtime, metadata, payload, signature, public-key)"
                ))
            })
    }
}

/// Byte range of one segment within the package file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct SegmentDescriptor {
    /// Absolute offset from the start of the file
    pub offset: u64,
    /// Length in bytes
    pub size: u64,
}

impl SegmentDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub const fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// First offset past the segment, or `None` on overflow.
    #[must_use]
    pub const fn checked_end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

/// Positions of all six segments.
///
/// A layout is only constructed through [`from_sizes`](Self::from_sizes),
/// which lays segments out back to back, or through
/// [`from_descriptors`](Self::from_descriptors), which checks that they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentLayout {
    segments: [SegmentDescriptor; SEGMENT_COUNT],
}

impl SegmentLayout {
    /// Lays out segments of the given sizes contiguously from offset 0.
    ///
    /// # Errors
    ///
    /// Returns [`PspfError::Input`] if the total size overflows `u64`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pspf_format::{SegmentKind, SegmentLayout};
    ///
    /// let layout = SegmentLayout::from_sizes([10, 20, 30, 40, 256, 300])?;
    /// assert_eq!(layout.get(SegmentKind::Payload).offset, 60);
    /// assert_eq!(layout.end(), 656);
    /// # Ok::<(), pspf_format::PspfError>(())
    /// ```
    pub fn from_sizes(sizes: [u64; SEGMENT_COUNT]) -> Result<Self> {
        let mut segments = [SegmentDescriptor::default(); SEGMENT_COUNT];
        let mut cursor = 0u64;
        for (slot, size) in segments.iter_mut().zip(sizes) {
            *slot = SegmentDescriptor::new(cursor, size);
            cursor = cursor
                .checked_add(size)
                .ok_or_else(|| PspfError::input("total segment size overflows u64"))?;
        }
        Ok(Self { segments })
    }

    /// Accepts descriptors read back from a footer.
    ///
    /// # Errors
    ///
    /// Returns [`PspfError::Format`] unless the first segment starts at 0 and
    /// every following segment starts where its predecessor ends.
    pub fn from_descriptors(segments: [SegmentDescriptor; SEGMENT_COUNT]) -> Result<Self> {
        let mut expected = 0u64;
        for (kind, segment) in SegmentKind::ALL.iter().zip(&segments) {
            if segment.offset != expected {
                return Err(PspfError::format(format!(
                    "{kind} segment starts at {} but the previous segment ends at {expected}",
                    segment.offset
                )));
            }
            expected = segment.checked_end().ok_or_else(|| {
                PspfError::format(format!("{kind} segment range overflows u64"))
            })?;
        }
        Ok(Self { segments })
    }

    /// Descriptor for one segment.
    #[must_use]
    pub const fn get(&self, kind: SegmentKind) -> SegmentDescriptor {
        self.segments[kind.index()]
    }

    /// All descriptors in file order.
    #[must_use]
    pub const fn descriptors(&self) -> &[SegmentDescriptor; SEGMENT_COUNT] {
        &self.segments
    }

    /// Offset just past the last segment, where the footer begins.
    #[must_use]
    pub const fn end(&self) -> u64 {
        let last = self.segments[SEGMENT_COUNT - 1];
        last.offset + last.size
    }

    /// Iterates `(kind, descriptor)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (SegmentKind, SegmentDescriptor)> + '_ {
        SegmentKind::ALL.into_iter().zip(self.segments.iter().copied())
    }

    /// Range covered by the content digest: from 0 to the end of the payload.
    #[must_use]
    pub const fn content_len(&self) -> u64 {
        self.get(SegmentKind::Signature).offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_order() {
        let names: Vec<_> = SegmentKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec!["launcher", "runtime", "metadata", "payload", "signature", "public-key"]
        );
        for (i, kind) in SegmentKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_content_segments() {
        assert!(SegmentKind::Launcher.is_content());
        assert!(SegmentKind::Payload.is_content());
        assert!(!SegmentKind::Signature.is_content());
        assert!(!SegmentKind::PublicKey.is_content());
    }

    #[test]
    fn test_segment_kind_parse() {
        assert_eq!(
            "public-key".parse::<SegmentKind>().unwrap(),
            SegmentKind::PublicKey
        );
        assert_eq!("runtime".parse::<SegmentKind>().unwrap(), SegmentKind::Runtime);

        let err = "footer".parse::<SegmentKind>().unwrap_err();
        assert!(err.is_input());
    }

    #[test]
    fn test_from_sizes_running_offsets() {
        let sizes = [10, 20, 30, 40, 256, 300];
        let layout = SegmentLayout::from_sizes(sizes).unwrap();

        let mut running = 0;
        for ((_, descriptor), size) in layout.iter().zip(sizes) {
            assert_eq!(descriptor.offset, running);
            assert_eq!(descriptor.size, size);
            running += size;
        }
        assert_eq!(layout.end(), 656);
        assert_eq!(layout.content_len(), 100);
    }

    #[test]
    fn test_from_sizes_with_empty_segments() {
        let layout = SegmentLayout::from_sizes([5, 0, 0, 7, 0, 3]).unwrap();
        assert_eq!(layout.get(SegmentKind::Runtime).offset, 5);
        assert_eq!(layout.get(SegmentKind::Metadata).offset, 5);
        assert_eq!(layout.get(SegmentKind::Payload).offset, 5);
        assert_eq!(layout.end(), 15);
    }

    #[test]
    fn test_from_sizes_overflow() {
        let result = SegmentLayout::from_sizes([u64::MAX, 1, 0, 0, 0, 0]);
        assert!(result.unwrap_err().is_input());
    }

    #[test]
    fn test_from_descriptors_accepts_contiguous() {
        let layout = SegmentLayout::from_sizes([1, 2, 3, 4, 5, 6]).unwrap();
        let copy = SegmentLayout::from_descriptors(*layout.descriptors()).unwrap();
        assert_eq!(layout, copy);
    }

    #[test]
    fn test_from_descriptors_rejects_gap() {
        let mut descriptors = *SegmentLayout::from_sizes([1, 2, 3, 4, 5, 6])
            .unwrap()
            .descriptors();
        descriptors[3].offset += 1;

        let err = SegmentLayout::from_descriptors(descriptors).unwrap_err();
        assert!(matches!(err, PspfError::Format { .. }));
        assert!(err.to_string().contains("payload"));
    }

    #[test]
    fn test_from_descriptors_rejects_nonzero_start() {
        let mut descriptors = [SegmentDescriptor::default(); SEGMENT_COUNT];
        descriptors[0] = SegmentDescriptor::new(4, 0);
        assert!(SegmentLayout::from_descriptors(descriptors).is_err());
    }

    #[test]
    fn test_from_descriptors_rejects_overflow() {
        let mut descriptors = [SegmentDescriptor::default(); SEGMENT_COUNT];
        descriptors[0] = SegmentDescriptor::new(0, u64::MAX);
        descriptors[1] = SegmentDescriptor::new(u64::MAX, 1);
        let err = SegmentLayout::from_descriptors(descriptors).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }
}
