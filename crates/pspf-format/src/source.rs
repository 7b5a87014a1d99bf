//! Byte sources consumed by the package builder.

use crate::error::{PspfError, Result};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Finished, immutable bytes for one segment.
///
/// The builder never interprets segment contents; it only needs to stream
/// them once. Files are opened lazily, at the moment their segment is
/// written.
#[derive(Clone, PartialEq, Eq)]
pub enum SegmentSource {
    /// In-memory buffer.
    Bytes(Vec<u8>),
    /// File on disk, streamed without loading it whole.
    File(PathBuf),
}

impl SegmentSource {
    /// Source backed by a file path.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Source backed by an in-memory buffer.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(data.into())
    }

    /// Length of the source in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PspfError::NotFound`] for a missing file, or an I/O error if
    /// its metadata cannot be read.
    pub fn len(&self) -> Result<u64> {
        match self {
            Self::Bytes(data) => Ok(data.len() as u64),
            Self::File(path) => Ok(std::fs::metadata(path)
                .map_err(|e| not_found_or_io(path, e))?
                .len()),
        }
    }

    /// Returns true if the source holds no bytes.
    ///
    /// # Errors
    ///
    /// Same as [`len`](Self::len).
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Opens the source for a single sequential read.
    ///
    /// # Errors
    ///
    /// Returns [`PspfError::NotFound`] for a missing file.
    pub fn open(&self) -> Result<Box<dyn Read + '_>> {
        match self {
            Self::Bytes(data) => Ok(Box::new(data.as_slice())),
            Self::File(path) => {
                let file = File::open(path).map_err(|e| not_found_or_io(path, e))?;
                Ok(Box::new(io::BufReader::new(file)))
            }
        }
    }

    /// Path for file sources.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Bytes(_) => None,
            Self::File(path) => Some(path),
        }
    }
}

impl fmt::Debug for SegmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl From<Vec<u8>> for SegmentSource {
    fn from(data: Vec<u8>) -> Self {
        Self::Bytes(data)
    }
}

impl From<&[u8]> for SegmentSource {
    fn from(data: &[u8]) -> Self {
        Self::Bytes(data.to_vec())
    }
}

impl From<PathBuf> for SegmentSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for SegmentSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

pub(crate) fn not_found_or_io(path: &Path, error: io::Error) -> PspfError {
    if error.kind() == io::ErrorKind::NotFound {
        PspfError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        PspfError::Io(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_bytes_source() {
        let source = SegmentSource::bytes(b"launcher".to_vec());
        assert_eq!(source.len().unwrap(), 8);
        assert!(!source.is_empty().unwrap());
        assert!(source.path().is_none());

        let mut out = Vec::new();
        source.open().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"launcher");
    }

    #[test]
    fn test_file_source() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("runtime.tgz");
        fs::write(&path, vec![7u8; 4096]).unwrap();

        let source = SegmentSource::from(path.clone());
        assert_eq!(source.len().unwrap(), 4096);
        assert_eq!(source.path(), Some(path.as_path()));

        let mut out = Vec::new();
        source.open().unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out.len(), 4096);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let source = SegmentSource::file("/nonexistent/pspf/payload.tgz");
        assert!(source.len().unwrap_err().is_not_found());
        assert!(source.open().err().unwrap().is_not_found());
    }

    #[test]
    fn test_debug_does_not_dump_bytes() {
        let source = SegmentSource::bytes(vec![0u8; 1000]);
        assert_eq!(format!("{source:?}"), "Bytes(1000 bytes)");
    }
}
