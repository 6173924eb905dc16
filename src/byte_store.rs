//! Immutable storage for a raw MMDB image.
//!
//! `ByteStore` owns the whole database file, either as an owned buffer or as
//! a read-only memory map, and is the only place that indexes into it. Every
//! read is checked against the buffer length first, so a corrupt offset
//! computed anywhere else turns into [`MmdbError::OutOfRange`] instead of a
//! panic.

use crate::error::{MmdbError, Result};
use crate::mmdb::types::METADATA_MARKER;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// Backing memory for a database image - either owned or memory-mapped
enum Storage {
    Owned(Vec<u8>),
    Mmap(Mmap),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Owned(v) => v.as_slice(),
            Storage::Mmap(m) => &m[..],
        }
    }
}

/// Bounds-checked, read-only view of a database image
pub struct ByteStore {
    storage: Storage,
}

impl ByteStore {
    /// Take ownership of an in-memory image
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self {
            storage: Storage::Owned(bytes),
        }
    }

    /// Memory-map a database file read-only
    pub fn map_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| MmdbError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

        // SAFETY: the map is read-only and never handed out mutably. Callers
        // must not truncate the file while the store is alive.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| MmdbError::Io(format!("Failed to mmap {}: {}", path.display(), e)))?;

        Ok(Self {
            storage: Storage::Mmap(mmap),
        })
    }

    /// Total image size in bytes
    pub fn len(&self) -> usize {
        self.storage.as_slice().len()
    }

    /// True for a zero-length image
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole image
    pub fn as_slice(&self) -> &[u8] {
        self.storage.as_slice()
    }

    /// Borrow `length` bytes starting at `offset`
    pub fn read(&self, offset: usize, length: usize) -> Result<&[u8]> {
        let data = self.as_slice();
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= data.len())
            .ok_or(MmdbError::OutOfRange {
                offset,
                length,
                size: data.len(),
            })?;
        Ok(&data[offset..end])
    }

    /// Read a fixed number of bytes into an array
    pub fn read_array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(offset, N)?);
        Ok(out)
    }

    /// Read a single byte
    pub fn byte_at(&self, offset: usize) -> Result<u8> {
        self.as_slice()
            .get(offset)
            .copied()
            .ok_or(MmdbError::OutOfRange {
                offset,
                length: 1,
                size: self.len(),
            })
    }

    /// Locate the metadata block.
    ///
    /// Returns the offset immediately after the LAST occurrence of the
    /// marker; earlier occurrences may be coincidental payload bytes.
    pub fn locate_metadata_marker(&self) -> Result<usize> {
        memchr::memmem::rfind(self.as_slice(), METADATA_MARKER)
            .map(|start| start + METADATA_MARKER.len())
            .ok_or(MmdbError::MetadataNotFound)
    }
}

impl From<Vec<u8>> for ByteStore {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

impl std::fmt::Debug for ByteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.storage {
            Storage::Owned(_) => "owned",
            Storage::Mmap(_) => "mmap",
        };
        f.debug_struct("ByteStore")
            .field("storage", &kind)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_bounds_checked_reads() {
        let store = ByteStore::from_vec(vec![1, 2, 3, 4]);
        assert_eq!(store.len(), 4);
        assert_eq!(store.read(1, 2).unwrap(), &[2, 3]);
        assert_eq!(store.read(4, 0).unwrap(), &[] as &[u8]);
        assert_eq!(store.byte_at(3).unwrap(), 4);
        assert_eq!(store.read_array::<2>(2).unwrap(), [3, 4]);

        assert_eq!(
            store.read(3, 2),
            Err(MmdbError::OutOfRange {
                offset: 3,
                length: 2,
                size: 4
            })
        );
        assert!(store.byte_at(4).is_err());
        assert!(store.read(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_marker_takes_last_occurrence() {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(METADATA_MARKER);
        data.extend_from_slice(&[0xE0, 0xE0]);
        data.extend_from_slice(METADATA_MARKER);
        data.push(0xE0);

        let store = ByteStore::from_vec(data.clone());
        let offset = store.locate_metadata_marker().unwrap();
        assert_eq!(offset, data.len() - 1);
    }

    #[test]
    fn test_metadata_not_found() {
        let store = ByteStore::from_vec(b"not a valid mmdb file".to_vec());
        assert_eq!(
            store.locate_metadata_marker(),
            Err(MmdbError::MetadataNotFound)
        );
        assert_eq!(
            ByteStore::from_vec(Vec::new()).locate_metadata_marker(),
            Err(MmdbError::MetadataNotFound)
        );
    }

    #[test]
    fn test_map_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[9, 8, 7]).unwrap();
        file.flush().unwrap();

        let store = ByteStore::map_file(file.path()).unwrap();
        assert_eq!(store.as_slice(), &[9, 8, 7]);

        let missing = ByteStore::map_file("/nonexistent/path/db.mmdb");
        assert!(matches!(missing, Err(MmdbError::Io(_))));
    }
}
