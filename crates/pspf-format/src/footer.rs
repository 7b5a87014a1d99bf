//! Fixed-size footer codec.
//!
//! The footer sits immediately before the trailer magic at the end of the
//! file, so a reader finds it with one seek from end-of-file no matter how
//! large the package is.
//!
//! # Layout
//!
//! All integers are little-endian:
//!
//! ```text
//! offset  size  field
//! 0       96    6 x (offset: u64, size: u64), canonical segment order
//! 96      2     version: u16
//! 98      2     reserved: u16 (zero)
//! 100     4     checksum: u32, CRC32 of the footer with this field zeroed
//! 104     4     magic: u32 (0x30505350)
//! ```

use crate::error::{PspfError, Result};
use crate::layout::{SEGMENT_COUNT, SegmentDescriptor, SegmentLayout};

/// Size of the encoded footer in bytes.
pub const FOOTER_SIZE: usize = 108;

/// Supported format version. Readers accept exactly this value.
pub const FORMAT_VERSION: u16 = 0x0003;

/// Magic constant stored inside the footer (`"PSP0"` read as little-endian).
pub const FOOTER_MAGIC: u32 = 0x3050_5350;

/// Marker at the absolute end of every package.
pub const TRAILER_MAGIC: [u8; 8] = *b"!PSPF\x00\x00\x00";

/// Size of the trailer magic in bytes.
pub const TRAILER_SIZE: usize = TRAILER_MAGIC.len();

/// Bytes appended after the last segment: footer plus trailer.
pub const PACKAGE_OVERHEAD: u64 = (FOOTER_SIZE + TRAILER_SIZE) as u64;

const VERSION_OFFSET: usize = SEGMENT_COUNT * 16;
const RESERVED_OFFSET: usize = VERSION_OFFSET + 2;
const CHECKSUM_OFFSET: usize = RESERVED_OFFSET + 2;
const MAGIC_OFFSET: usize = CHECKSUM_OFFSET + 4;

const _: () = assert!(MAGIC_OFFSET + 4 == FOOTER_SIZE);

/// Decoded package footer.
///
/// Values are immutable. [`Footer::new`] derives the checksum before
/// returning, and [`Footer::unpack`] only returns footers whose stored
/// checksum matched.
///
/// # Examples
///
/// ```
/// use pspf_format::{Footer, SegmentLayout, FOOTER_SIZE};
///
/// let layout = SegmentLayout::from_sizes([10, 20, 30, 40, 256, 300])?;
/// let footer = Footer::new(layout);
///
/// let bytes = footer.pack();
/// assert_eq!(bytes.len(), FOOTER_SIZE);
/// assert_eq!(Footer::unpack(&bytes)?, footer);
/// # Ok::<(), pspf_format::PspfError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Footer {
    layout: SegmentLayout,
    version: u16,
    checksum: u32,
}

impl Footer {
    /// Creates a footer for the given layout at the supported version.
    #[must_use]
    pub fn new(layout: SegmentLayout) -> Self {
        let unsigned = encode(layout.descriptors(), FORMAT_VERSION, 0, 0, FOOTER_MAGIC);
        Self {
            layout,
            version: FORMAT_VERSION,
            checksum: crc32(&unsigned),
        }
    }

    /// Serializes the footer to its 108-byte wire form.
    #[must_use]
    pub fn pack(&self) -> [u8; FOOTER_SIZE] {
        encode(
            self.layout.descriptors(),
            self.version,
            0,
            self.checksum,
            FOOTER_MAGIC,
        )
    }

    /// Parses and validates a footer.
    ///
    /// The checksum is checked before any other field so that corruption is
    /// reported as such rather than as a bogus version or magic.
    ///
    /// # Errors
    ///
    /// * [`PspfError::Format`] - wrong buffer length, magic, version,
    ///   non-zero reserved field, or non-contiguous segments
    /// * [`PspfError::Integrity`] - stored checksum does not match
    pub fn unpack(buffer: &[u8]) -> Result<Self> {
        let buffer: &[u8; FOOTER_SIZE] = buffer.try_into().map_err(|_| {
            PspfError::format(format!(
                "footer must be exactly {FOOTER_SIZE} bytes, got {}",
                buffer.len()
            ))
        })?;

        let stored = read_u32(buffer, CHECKSUM_OFFSET);
        let mut zeroed = *buffer;
        zeroed[CHECKSUM_OFFSET..MAGIC_OFFSET].fill(0);
        let computed = crc32(&zeroed);
        if stored != computed {
            return Err(PspfError::Integrity {
                reason: format!(
                    "footer checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
                ),
            });
        }

        let magic = read_u32(buffer, MAGIC_OFFSET);
        if magic != FOOTER_MAGIC {
            return Err(PspfError::format(format!(
                "invalid footer magic {magic:#010x}, expected {FOOTER_MAGIC:#010x}"
            )));
        }

        let version = read_u16(buffer, VERSION_OFFSET);
        if version != FORMAT_VERSION {
            return Err(PspfError::format(format!(
                "unsupported format version {version:#06x}, expected {FORMAT_VERSION:#06x}"
            )));
        }

        let reserved = read_u16(buffer, RESERVED_OFFSET);
        if reserved != 0 {
            return Err(PspfError::format(format!(
                "reserved footer field must be zero, got {reserved:#06x}"
            )));
        }

        let mut descriptors = [SegmentDescriptor::default(); SEGMENT_COUNT];
        for (i, descriptor) in descriptors.iter_mut().enumerate() {
            *descriptor = SegmentDescriptor::new(read_u64(buffer, i * 16), read_u64(buffer, i * 16 + 8));
        }
        let layout = SegmentLayout::from_descriptors(descriptors)?;

        Ok(Self {
            layout,
            version,
            checksum: stored,
        })
    }

    /// Segment positions recorded in the footer.
    #[must_use]
    pub const fn layout(&self) -> &SegmentLayout {
        &self.layout
    }

    /// Format version.
    #[must_use]
    pub const fn version(&self) -> u16 {
        self.version
    }

    /// Structural CRC32 checksum.
    #[must_use]
    pub const fn checksum(&self) -> u32 {
        self.checksum
    }
}

/// Writes all footer fields in wire order.
pub(crate) fn encode(
    descriptors: &[SegmentDescriptor; SEGMENT_COUNT],
    version: u16,
    reserved: u16,
    checksum: u32,
    magic: u32,
) -> [u8; FOOTER_SIZE] {
    let mut buf = [0u8; FOOTER_SIZE];
    for (i, descriptor) in descriptors.iter().enumerate() {
        buf[i * 16..i * 16 + 8].copy_from_slice(&descriptor.offset.to_le_bytes());
        buf[i * 16 + 8..i * 16 + 16].copy_from_slice(&descriptor.size.to_le_bytes());
    }
    buf[VERSION_OFFSET..RESERVED_OFFSET].copy_from_slice(&version.to_le_bytes());
    buf[RESERVED_OFFSET..CHECKSUM_OFFSET].copy_from_slice(&reserved.to_le_bytes());
    buf[CHECKSUM_OFFSET..MAGIC_OFFSET].copy_from_slice(&checksum.to_le_bytes());
    buf[MAGIC_OFFSET..].copy_from_slice(&magic.to_le_bytes());
    buf
}

/// CRC-32/IEEE, the same polynomial as zlib's `crc32`.
pub(crate) fn crc32(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

fn read_u16(buf: &[u8; FOOTER_SIZE], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8; FOOTER_SIZE], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(buf: &[u8; FOOTER_SIZE], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}
