//! MMDB Binary Format Parsing
//!
//! Bootstraps the database geometry from the metadata block that trails the
//! file. Design:
//! - Find the metadata marker (reverse search, no allocation)
//! - Decode the metadata map with pointers relative to the metadata start
//! - Extract the required keys by exact name and exact type
//! - Derive the search tree size and data section origin, and refuse a
//!   geometry whose search tree would overlap the metadata

use super::types::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR_SIZE, METADATA_MARKER};
use crate::byte_store::ByteStore;
use crate::data_section::{DataDecoder, DataValue, DEFAULT_MAX_DECODE_DEPTH};
use crate::error::{MmdbError, Result};
use std::collections::HashMap;

/// Parsed database metadata and derived trie geometry
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    /// `binary_format_major_version` (always >= 2)
    pub binary_format_major_version: u16,
    /// `binary_format_minor_version`
    pub binary_format_minor_version: u16,
    /// Build time, seconds since the Unix epoch
    pub build_epoch: u64,
    /// Address family of the search tree
    pub ip_version: IpVersion,
    /// Width of each node record
    pub record_size: RecordSize,
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Free-form database type, e.g. `GeoLite2-Country`
    pub database_type: String,
    /// Locale codes the records may contain
    pub languages: Vec<String>,
    /// Descriptions keyed by language
    pub description: HashMap<String, String>,
    /// Size of the search tree in bytes
    pub search_tree_size: usize,
    /// Absolute offset of the data section
    pub data_section_start: usize,
    /// Bytes per node (6, 7 or 8)
    pub node_byte_size: usize,
    /// Absolute offset of the marker itself
    pub marker_offset: usize,
    /// Absolute offset of the metadata map (just past the marker)
    pub metadata_start: usize,
}

impl Metadata {
    /// Locate, decode and validate the metadata of a database image
    pub fn parse(store: &ByteStore) -> Result<Self> {
        Self::parse_with_depth(store, DEFAULT_MAX_DECODE_DEPTH)
    }

    /// [`Metadata::parse`] with an explicit decoder recursion budget
    pub fn parse_with_depth(store: &ByteStore, max_depth: usize) -> Result<Self> {
        let metadata_start = store.locate_metadata_marker()?;
        let value = decode_metadata_value(store, metadata_start, max_depth)?;
        Self::from_value(&value, metadata_start)
    }

    /// Build metadata from an already decoded metadata map.
    ///
    /// `metadata_start` is the offset just past the marker.
    pub fn from_value(value: &DataValue, metadata_start: usize) -> Result<Self> {
        let map = value
            .as_map()
            .ok_or_else(|| MmdbError::Metadata(format!("metadata is a {}, not a map", value.type_name())))?;

        let major = required_u16(map, "binary_format_major_version")?;
        let minor = required_u16(map, "binary_format_minor_version")?;
        if major < 2 {
            return Err(MmdbError::Metadata(format!(
                "unsupported binary format major version {}",
                major
            )));
        }

        let build_epoch = match map.get("build_epoch") {
            Some(DataValue::Uint64(n)) => *n,
            other => return Err(field_error("build_epoch", "uint64", other)),
        };
        let ip_version = IpVersion::from_number(required_u16(map, "ip_version")?)?;
        let record_size = RecordSize::from_bits(required_u16(map, "record_size")?)?;
        let node_count = match map.get("node_count") {
            Some(DataValue::Uint32(n)) => *n,
            other => return Err(field_error("node_count", "uint32", other)),
        };
        let database_type = match map.get("database_type") {
            Some(DataValue::String(s)) => s.clone(),
            other => return Err(field_error("database_type", "string", other)),
        };

        let languages = match map.get("languages") {
            None => Vec::new(),
            Some(DataValue::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| field_error("languages", "array of strings", Some(item)))
                })
                .collect::<Result<Vec<_>>>()?,
            other => return Err(field_error("languages", "array", other)),
        };

        let description = match map.get("description") {
            None => HashMap::new(),
            Some(DataValue::Map(entries)) => entries
                .iter()
                .map(|(lang, text)| {
                    text.as_str()
                        .map(|s| (lang.clone(), s.to_string()))
                        .ok_or_else(|| field_error("description", "map of strings", Some(text)))
                })
                .collect::<Result<HashMap<_, _>>>()?,
            other => return Err(field_error("description", "map", other)),
        };

        let node_byte_size = record_size.node_bytes();
        let search_tree_size = (node_count as usize)
            .checked_mul(node_byte_size)
            .ok_or_else(|| MmdbError::CorruptDatabase("search tree size overflows".to_string()))?;
        let data_section_start = search_tree_size + DATA_SECTION_SEPARATOR_SIZE;

        let marker_offset = metadata_start.saturating_sub(METADATA_MARKER.len());
        if search_tree_size > marker_offset {
            return Err(MmdbError::CorruptDatabase(format!(
                "search tree of {} nodes ({} bytes) extends past the metadata at offset {}",
                node_count, search_tree_size, marker_offset
            )));
        }

        Ok(Metadata {
            binary_format_major_version: major,
            binary_format_minor_version: minor,
            build_epoch,
            ip_version,
            record_size,
            node_count,
            database_type,
            languages,
            description,
            search_tree_size,
            data_section_start,
            node_byte_size,
            marker_offset,
            metadata_start,
        })
    }
}

/// Decode the raw metadata map at `metadata_start`
///
/// Metadata pointers are relative to the metadata start, not the data section.
pub(crate) fn decode_metadata_value(
    store: &ByteStore,
    metadata_start: usize,
    max_depth: usize,
) -> Result<DataValue> {
    DataDecoder::new(store, metadata_start)
        .with_max_depth(max_depth)
        .decode(metadata_start)
        .map_err(|e| MmdbError::Metadata(format!("failed to decode metadata: {}", e)))
}

fn required_u16(map: &HashMap<String, DataValue>, key: &str) -> Result<u16> {
    match map.get(key) {
        Some(DataValue::Uint16(n)) => Ok(*n),
        other => Err(field_error(key, "uint16", other)),
    }
}

fn field_error(key: &str, expected: &str, found: Option<&DataValue>) -> MmdbError {
    match found {
        Some(value) => MmdbError::Metadata(format!(
            "field '{}' is a {}, expected {}",
            key,
            value.type_name(),
            expected
        )),
        None => MmdbError::Metadata(format!("required field '{}' not found", key)),
    }
}
