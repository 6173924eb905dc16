//! Database handle
//!
//! Ties the pieces together: a [`ByteStore`] holding the image, the parsed
//! [`Metadata`], and the IPv4 search origin worked out once at open time.
//! Everything is immutable after construction, so a `Database` can be shared
//! between threads and queried concurrently without locking.

use crate::byte_store::ByteStore;
use crate::data_section::DataValue;
use crate::error::{MmdbError, Result};
use crate::mmdb::format::{decode_metadata_value, Metadata};
use crate::mmdb::tree::{AddressWord, SearchResult, SearchTree, Step};
use crate::mmdb::types::IpVersion;
use crate::open_options::OpenOptions;
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, trace, warn};

/// An open MaxMind DB
///
/// # Examples
///
/// ```no_run
/// use mmdb_reader::{Database, SearchResult};
///
/// let db = Database::open("GeoLite2-Country.mmdb")?;
///
/// match db.lookup_str("2.125.160.216") {
///     SearchResult::Found(record) => println!("{}", record),
///     SearchResult::NotFound => println!("no record"),
///     other => println!("lookup failed: {:?}", other),
/// }
/// # Ok::<(), mmdb_reader::MmdbError>(())
/// ```
pub struct Database {
    store: ByteStore,
    metadata: Metadata,
    /// Where IPv4 lookups begin (root, or the `::/96` subtree of an IPv6 tree)
    ipv4_start: Step,
    max_decode_depth: usize,
    node_visit_limit: Option<usize>,
}

impl Database {
    /// Open a database file using memory mapping
    ///
    /// The file must not be modified or truncated while the database is open.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_store(ByteStore::map_file(path)?, &OpenOptions::default())
    }

    /// Open a database image held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_store(ByteStore::from_vec(bytes), &OpenOptions::default())
    }

    /// Parse metadata, validate geometry and locate the IPv4 subtree
    pub(crate) fn from_store(store: ByteStore, options: &OpenOptions) -> Result<Self> {
        let max_decode_depth = options.max_decode_depth;
        let metadata = Metadata::parse_with_depth(&store, max_decode_depth)?;

        if let Some(expected) = options.database_type.as_deref() {
            if metadata.database_type != expected {
                return Err(MmdbError::InvalidDatabaseType {
                    expected: expected.to_string(),
                    found: metadata.database_type.clone(),
                });
            }
        }

        let ipv4_start = SearchTree::new(&store, &metadata)
            .ipv4_start()
            .map_err(|e| {
                MmdbError::CorruptDatabase(format!("cannot locate the IPv4 subtree: {}", e))
            })?;
        trace!(?ipv4_start, "IPv4 search origin");

        debug!(
            database_type = %metadata.database_type,
            ip_version = metadata.ip_version.number(),
            record_size = metadata.record_size.bits(),
            node_count = metadata.node_count,
            size = store.len(),
            "opened database"
        );

        Ok(Self {
            store,
            metadata,
            ipv4_start,
            max_decode_depth,
            node_visit_limit: options.node_visit_limit,
        })
    }

    fn tree(&self) -> SearchTree<'_> {
        let tree = SearchTree::new(&self.store, &self.metadata)
            .with_max_decode_depth(self.max_decode_depth);
        match self.node_visit_limit {
            Some(limit) => tree.with_node_visit_limit(limit),
            None => tree,
        }
    }

    /// Walk `bit_count` bits of `bits` (MSB first) from the root
    pub fn lookup(&self, bits: u64, bit_count: u32) -> SearchResult {
        self.tree().search(0, bits, bit_count)
    }

    /// Resume a walk from a node returned in [`SearchResult::Partial`]
    pub fn lookup_from(&self, node: u32, bits: u64, bit_count: u32) -> SearchResult {
        self.tree().search(node, bits, bit_count)
    }

    /// Walk an address given as fixed-width words from the root
    pub fn lookup_words<T: AddressWord>(&self, words: &[T], total_bits: u32) -> SearchResult {
        self.tree().search_words(0, words, total_bits)
    }

    /// Look up an IP address
    ///
    /// IPv4 addresses in an IPv6 database are found under `::/96`. A walk
    /// that uses up the whole address while still on a node is
    /// [`SearchResult::NotFound`]; use [`Database::lookup`] to see the node.
    /// `Failed` is reserved for unreadable trees and records, and for IPv6
    /// addresses against an IPv4 database.
    pub fn lookup_ip(&self, addr: IpAddr) -> SearchResult {
        let result = match addr {
            IpAddr::V4(v4) => match self.ipv4_start {
                Step::Node(node) => self.tree().search(node, u64::from(u32::from(v4)) << 32, 32),
                Step::Terminal(record) => self.tree().resolve_record(record),
            },
            IpAddr::V6(v6) => {
                if self.metadata.ip_version == IpVersion::V4 {
                    SearchResult::Failed(MmdbError::SearchFailure(format!(
                        "cannot look up IPv6 address {} in an IPv4 database",
                        v6
                    )))
                } else {
                    let bits = u128::from(v6);
                    let words = [
                        (bits >> 96) as u32,
                        (bits >> 64) as u32,
                        (bits >> 32) as u32,
                        bits as u32,
                    ];
                    self.lookup_words(&words, 128)
                }
            }
        };

        match result {
            SearchResult::Partial(node) => {
                debug!(%addr, node, "address exhausted before reaching a record");
                SearchResult::NotFound
            }
            SearchResult::Failed(error) => {
                warn!(%addr, %error, "lookup failed");
                SearchResult::Failed(error)
            }
            resolved => resolved,
        }
    }

    /// Parse and look up a textual IPv4 or IPv6 address
    pub fn lookup_str(&self, addr: &str) -> SearchResult {
        match addr.trim().parse::<IpAddr>() {
            Ok(ip) => self.lookup_ip(ip),
            Err(_) => SearchResult::Failed(MmdbError::InvalidIpAddress(addr.to_string())),
        }
    }

    /// Node where IPv4 lookups start, if the `::/96` walk ended on a node
    pub fn ipv4_start_node(&self) -> Option<u32> {
        match self.ipv4_start {
            Step::Node(node) => Some(node),
            Step::Terminal(_) => None,
        }
    }

    /// Parsed metadata and geometry
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Shortcut for `metadata().database_type`
    pub fn database_type(&self) -> &str {
        &self.metadata.database_type
    }

    /// Address family of the search tree
    pub fn ip_version(&self) -> IpVersion {
        self.metadata.ip_version
    }

    /// The complete metadata map as stored, including unknown keys
    pub fn metadata_value(&self) -> Result<DataValue> {
        decode_metadata_value(&self.store, self.metadata.metadata_start, self.max_decode_depth)
    }

    /// Image size in bytes
    pub fn size(&self) -> usize {
        self.store.len()
    }

    /// Visit every network with a record as `(prefix_words, prefix_len)`
    pub fn enumerate<F>(&self, visit: F) -> Result<()>
    where
        F: FnMut(&[u32], u32),
    {
        self.tree().enumerate(visit)
    }

    /// Visit every network with its raw record value
    pub fn enumerate_records<F>(&self, visit: F) -> Result<()>
    where
        F: FnMut(&[u32], u32, u32),
    {
        self.tree().enumerate_records(visit)
    }

    /// Visit every network with its decoded record
    pub fn enumerate_values<F>(&self, visit: F) -> Result<()>
    where
        F: FnMut(&[u32], u32, Result<DataValue>),
    {
        self.tree().enumerate_values(visit)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("database_type", &self.metadata.database_type)
            .field("ip_version", &self.metadata.ip_version)
            .field("node_count", &self.metadata.node_count)
            .field("size", &self.store.len())
            .finish()
    }
}
