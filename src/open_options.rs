//! Options for opening a database.

use crate::byte_store::ByteStore;
use crate::data_section::DEFAULT_MAX_DECODE_DEPTH;
use crate::database::Database;
use crate::error::Result;
use std::path::Path;

/// Builder for opening a [`Database`] with non-default settings
///
/// # Example
///
/// ```no_run
/// use mmdb_reader::OpenOptions;
///
/// let db = OpenOptions::new()
///     .database_type("GeoLite2-Country")
///     .max_decode_depth(64)
///     .open("GeoLite2-Country.mmdb")?;
/// # Ok::<(), mmdb_reader::MmdbError>(())
/// ```
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub(crate) max_decode_depth: usize,
    pub(crate) database_type: Option<String>,
    pub(crate) node_visit_limit: Option<usize>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            max_decode_depth: DEFAULT_MAX_DECODE_DEPTH,
            database_type: None,
            node_visit_limit: None,
        }
    }
}

impl OpenOptions {
    /// Default options: decode depth 512, any database type, unbounded enumeration
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum nesting of maps, arrays and pointers while decoding a value
    pub fn max_decode_depth(mut self, depth: usize) -> Self {
        self.max_decode_depth = depth;
        self
    }

    /// Only accept databases whose `database_type` equals `database_type`
    pub fn database_type(mut self, database_type: impl Into<String>) -> Self {
        self.database_type = Some(database_type.into());
        self
    }

    /// Stop enumeration with an error once it has entered `limit` nodes
    ///
    /// Enumeration depth is capped at the address width, but a tree whose
    /// records loop back on themselves can still fan out to 2^32 (IPv4) or
    /// 2^128 (IPv6) visits below that cap. Set this when enumerating
    /// untrusted files.
    pub fn node_visit_limit(mut self, limit: usize) -> Self {
        self.node_visit_limit = Some(limit);
        self
    }

    /// Memory-map and open the database at `path`
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Database> {
        self.open_store(ByteStore::map_file(path)?)
    }

    /// Open a database image already in memory
    pub fn open_bytes(&self, bytes: Vec<u8>) -> Result<Database> {
        self.open_store(ByteStore::from_vec(bytes))
    }

    /// Open a database over an existing [`ByteStore`]
    pub fn open_store(&self, store: ByteStore) -> Result<Database> {
        Database::from_store(store, self)
    }
}
