//! Human- and machine-readable package descriptions.

use crate::footer::{Footer, PACKAGE_OVERHEAD};
use crate::layout::SegmentKind;
use serde::Serialize;
use std::fmt;

/// One row of a package report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentEntry {
    /// Segment name
    pub segment: SegmentKind,
    /// Absolute offset in the file
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
}

/// Structural summary derived from a footer alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    /// Format version recorded in the footer
    pub version: u16,
    /// Total file size, footer and trailer included
    pub total_size: u64,
    /// Footer CRC32
    pub footer_checksum: u32,
    /// Segments in file order
    pub segments: Vec<SegmentEntry>,
}

impl PackageReport {
    /// Builds a report for a package whose footer is `footer`.
    #[must_use]
    pub fn from_footer(footer: &Footer) -> Self {
        let layout = footer.layout();
        Self {
            version: footer.version(),
            total_size: layout.end() + PACKAGE_OVERHEAD,
            footer_checksum: footer.checksum(),
            segments: layout
                .iter()
                .map(|(segment, descriptor)| SegmentEntry {
                    segment,
                    offset: descriptor.offset,
                    size: descriptor.size,
                })
                .collect(),
        }
    }

    /// Size of one segment.
    #[must_use]
    pub fn size_of(&self, kind: SegmentKind) -> u64 {
        self.segments[kind.index()].size
    }

    /// Sizes of all six segments in file order.
    #[must_use]
    pub fn sizes(&self) -> Vec<u64> {
        self.segments.iter().map(|entry| entry.size).collect()
    }
}

impl fmt::Display for PackageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PSPF Package Information:")?;
        writeln!(f, "  Format Version: {:#06x}", self.version)?;
        writeln!(f, "  Total Size: {} bytes", self.total_size)?;
        for entry in &self.segments {
            writeln!(
                f,
                "  {:<11} {:>12} bytes @ {}",
                format!("{}:", entry.segment),
                entry.size,
                entry.offset
            )?;
        }
        write!(f, "  Footer Checksum: {:#010x}", self.footer_checksum)
    }
}
