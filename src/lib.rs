//! mmdb-reader - Read-only MaxMind DB (MMDB) engine
//!
//! Opens `.mmdb` files such as GeoLite2-Country, walks their binary search
//! tree for IPv4 and IPv6 addresses and decodes the typed records stored in
//! the data section.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mmdb_reader::{Database, SearchResult};
//!
//! let db = Database::open("GeoLite2-Country.mmdb")?;
//! println!("{} built at {}", db.database_type(), db.metadata().build_epoch);
//!
//! if let SearchResult::Found(record) = db.lookup_str("2.125.160.216") {
//!     let code = record.get_path(&["country", "iso_code"]);
//!     println!("country: {:?}", code);
//! }
//! # Ok::<(), mmdb_reader::MmdbError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  MMDB File                           │
//! ├──────────────────────────────────────┤
//! │  1. Search Tree (binary trie)        │
//! │  2. 16-byte separator                │
//! │  3. Data Section (typed values)      │
//! │  4. \xAB\xCD\xEFMaxMind.com          │
//! │  5. Metadata (one map value)         │
//! └──────────────────────────────────────┘
//! ```
//!
//! - [`ByteStore`] owns the bytes (heap or mmap) and bounds-checks every read
//! - [`Metadata`] is decoded once from the trailer and fixes the geometry
//! - [`SearchTree`] walks address bits and yields a [`SearchResult`]
//! - [`DataDecoder`] materializes [`DataValue`]s, following pointers
//!
//! A [`Database`] is immutable once open and is `Send + Sync`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Bounds-checked storage for the database image
pub mod byte_store;
/// Data section decoding
pub mod data_section;
/// Database handle
pub mod database;
/// Big-endian and bit packing helpers
pub mod endian;
/// Error types
pub mod error;
/// GeoLite2 convenience wrappers
pub mod geolite2;
/// MMDB format: metadata, search tree and enumeration
pub mod mmdb;
/// Open-time configuration
pub mod open_options;

pub use crate::byte_store::ByteStore;
pub use crate::data_section::{DataDecoder, DataValue, FieldType, DEFAULT_MAX_DECODE_DEPTH};
pub use crate::database::Database;
pub use crate::error::{MmdbError, Result};
pub use crate::geolite2::{CountryDatabase, COUNTRY_DATABASE_TYPE};
pub use crate::mmdb::{
    prefix_address, AddressWord, IpVersion, Metadata, RecordSize, SearchResult, SearchTree,
};
pub use crate::open_options::OpenOptions;

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
