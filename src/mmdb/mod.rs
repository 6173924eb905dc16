//! MaxMind DB (MMDB) Reader
//!
//! This module provides functionality for reading MaxMind DB files,
//! which are used for GeoIP lookups and other IP-based data lookups.
//!
//! The MMDB format uses a binary search tree for efficient IP address
//! lookups. Data is stored in the MMDB data section format, decoded by
//! `crate::data_section::DataDecoder`.
//!
//! ## Architecture
//!
//! - **types**: MMDB-specific types and constants
//! - **format**: Metadata extraction and tree geometry
//! - **tree**: Search tree traversal for IP lookups
//! - **walk**: Depth-bounded enumeration of every network

pub mod format;
pub mod tree;
pub mod types;
pub mod walk;

// Re-export key types
pub use format::Metadata;
pub use tree::{AddressWord, SearchResult, SearchTree};
pub use types::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER};
pub use walk::prefix_address;
