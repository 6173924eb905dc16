//! Error types for the mmdb-reader library
use thiserror::Error;

/// Result type alias for MMDB operations
pub type Result<T> = std::result::Result<T, MmdbError>;

/// Main error type for MMDB operations
///
/// Every variant is recoverable: a malformed value or a corrupt node surfaces
/// here instead of aborting the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MmdbError {
    /// A read would run past the end of the database image
    #[error("read of {length} bytes at offset {offset} exceeds buffer of {size} bytes")]
    OutOfRange {
        /// Requested start offset
        offset: usize,
        /// Requested length
        length: usize,
        /// Size of the buffer
        size: usize,
    },

    /// The `\xAB\xCD\xEFMaxMind.com` marker does not occur in the buffer
    #[error("MMDB metadata marker not found")]
    MetadataNotFound,

    /// Missing or mistyped metadata key, or unsupported format version
    #[error("invalid metadata: {0}")]
    Metadata(String),

    /// Record width other than 24, 28 or 32 bits
    #[error("unsupported record size: {0} bits")]
    UnsupportedRecordSize(u16),

    /// Control byte names a field type this reader does not know
    #[error("unknown field type: {0}")]
    UnknownFieldType(u8),

    /// Extended type escape resolved to a tag below 8
    #[error("invalid extended field type: {0}")]
    InvalidFieldType(u8),

    /// Geometry sanity check failed
    #[error("corrupt database: {0}")]
    CorruptDatabase(String),

    /// Malformed payload: bad UTF-8, wrong-size float, non-string map key, ...
    #[error("decoding error: {0}")]
    Decoding(String),

    /// Invalid starting node, invalid bit count, or a failed read mid-walk
    #[error("search failed: {0}")]
    SearchFailure(String),

    /// The database is not of the type the caller asked for
    #[error("invalid database type: expected {expected}, found {found}")]
    InvalidDatabaseType {
        /// Type the caller required
        expected: String,
        /// Type recorded in the metadata
        found: String,
    },

    /// Text that does not parse as an IPv4 or IPv6 address
    #[error("invalid IP address: {0}")]
    InvalidIpAddress(String),

    /// I/O errors while loading the image
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MmdbError {
    fn from(err: std::io::Error) -> Self {
        MmdbError::Io(err.to_string())
    }
}
