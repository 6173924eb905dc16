//! Test-only MMDB writer: value encoder, search tree builder and file
//! assembler. Produces byte-exact MaxMind DB images so the reader can be
//! exercised end to end without shipping binary fixtures.
#![allow(dead_code)]

use mmdb_reader::DataValue;
use std::collections::HashMap;
use std::net::IpAddr;

pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

const TYPE_POINTER: u8 = 1;
const TYPE_STRING: u8 = 2;
const TYPE_DOUBLE: u8 = 3;
const TYPE_BYTES: u8 = 4;
const TYPE_UINT16: u8 = 5;
const TYPE_UINT32: u8 = 6;
const TYPE_MAP: u8 = 7;
const TYPE_INT32: u8 = 8;
const TYPE_UINT64: u8 = 9;
const TYPE_UINT128: u8 = 10;
const TYPE_ARRAY: u8 = 11;
const TYPE_BOOL: u8 = 14;
const TYPE_FLOAT: u8 = 15;

// ---------------------------------------------------------------------------
// Value encoding
// ---------------------------------------------------------------------------

/// Control byte, extended type byte and size bytes for a value
pub fn write_control(buf: &mut Vec<u8>, type_tag: u8, size: usize) {
    let (size_bits, extra): (u8, Vec<u8>) = if size < 29 {
        (size as u8, Vec::new())
    } else if size < 285 {
        (29, vec![(size - 29) as u8])
    } else if size < 65_821 {
        (30, ((size - 285) as u16).to_be_bytes().to_vec())
    } else {
        assert!(size < 65_821 + (1 << 24), "size {} too large", size);
        (31, ((size - 65_821) as u32).to_be_bytes()[1..].to_vec())
    };

    if type_tag <= 7 {
        buf.push((type_tag << 5) | size_bits);
    } else {
        buf.push(size_bits);
        buf.push(type_tag - 7);
    }
    buf.extend_from_slice(&extra);
}

fn minimal_be(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Append the encoding of `value`; map keys are written in sorted order
pub fn encode_value(buf: &mut Vec<u8>, value: &DataValue) {
    match value {
        DataValue::String(s) => {
            write_control(buf, TYPE_STRING, s.len());
            buf.extend_from_slice(s.as_bytes());
        }
        DataValue::Double(d) => {
            write_control(buf, TYPE_DOUBLE, 8);
            buf.extend_from_slice(&d.to_be_bytes());
        }
        DataValue::Bytes(b) => {
            write_control(buf, TYPE_BYTES, b.len());
            buf.extend_from_slice(b);
        }
        DataValue::Uint16(n) => write_uint(buf, TYPE_UINT16, &n.to_be_bytes()),
        DataValue::Uint32(n) => write_uint(buf, TYPE_UINT32, &n.to_be_bytes()),
        DataValue::Uint64(n) => write_uint(buf, TYPE_UINT64, &n.to_be_bytes()),
        DataValue::Uint128(n) => write_uint(buf, TYPE_UINT128, &n.to_be_bytes()),
        DataValue::Int32(n) => {
            if *n < 0 {
                write_control(buf, TYPE_INT32, 4);
                buf.extend_from_slice(&n.to_be_bytes());
            } else {
                write_uint(buf, TYPE_INT32, &n.to_be_bytes());
            }
        }
        DataValue::Map(map) => {
            write_control(buf, TYPE_MAP, map.len());
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(k, _)| *k);
            for (k, v) in entries {
                encode_value(buf, &DataValue::String(k.clone()));
                encode_value(buf, v);
            }
        }
        DataValue::Array(items) => {
            write_control(buf, TYPE_ARRAY, items.len());
            for item in items {
                encode_value(buf, item);
            }
        }
        DataValue::Bool(b) => write_control(buf, TYPE_BOOL, usize::from(*b)),
        DataValue::Float(f) => {
            write_control(buf, TYPE_FLOAT, 4);
            buf.extend_from_slice(&f.to_be_bytes());
        }
    }
}

fn write_uint(buf: &mut Vec<u8>, type_tag: u8, be_bytes: &[u8]) {
    let payload = minimal_be(be_bytes);
    write_control(buf, type_tag, payload.len());
    buf.extend_from_slice(payload);
}

/// Encode a single value into a fresh buffer
pub fn encode(value: &DataValue) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value(&mut buf, value);
    buf
}

/// Append a pointer to `target`, an offset relative to the pointer base.
///
/// Uses the smallest size class that can express `target`.
pub fn encode_pointer(buf: &mut Vec<u8>, target: usize) {
    let ctrl = TYPE_POINTER << 5;
    if target < 2048 {
        buf.push(ctrl | (target >> 8) as u8);
        buf.push(target as u8);
    } else if target < 526_336 {
        let v = target - 2048;
        buf.push(ctrl | (1 << 3) | (v >> 16) as u8);
        buf.extend_from_slice(&(v as u16).to_be_bytes());
    } else if target < 526_336 + (1 << 27) {
        let v = target - 526_336;
        buf.push(ctrl | (2 << 3) | (v >> 24) as u8);
        buf.extend_from_slice(&(v as u32).to_be_bytes()[1..]);
    } else {
        buf.push(ctrl | (3 << 3));
        buf.extend_from_slice(&(target as u32).to_be_bytes());
    }
}

/// A data section under construction; identical values are stored once
#[derive(Default)]
pub struct DataSection {
    bytes: Vec<u8>,
    dedup: HashMap<Vec<u8>, usize>,
}

impl DataSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` and return its offset within the section
    pub fn insert(&mut self, value: &DataValue) -> usize {
        let encoded = encode(value);
        if let Some(&offset) = self.dedup.get(&encoded) {
            return offset;
        }
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(&encoded);
        self.dedup.insert(encoded, offset);
        offset
    }

    /// Store a pointer to `target` and return the pointer's own offset
    pub fn insert_pointer(&mut self, target: usize) -> usize {
        let offset = self.bytes.len();
        encode_pointer(&mut self.bytes, target);
        offset
    }

    /// Store pre-encoded bytes verbatim
    pub fn insert_raw(&mut self, raw: &[u8]) -> usize {
        let offset = self.bytes.len();
        self.bytes.extend_from_slice(raw);
        offset
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

// ---------------------------------------------------------------------------
// Search tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Child {
    Empty,
    Node(u32),
    Data(usize),
}

/// Binary trie over address bits. Insert wider networks before the
/// narrower ones they contain.
pub struct TreeBuilder {
    ip_version: u16,
    nodes: Vec<[Child; 2]>,
}

impl TreeBuilder {
    pub fn new(ip_version: u16) -> Self {
        Self {
            ip_version,
            nodes: vec![[Child::Empty, Child::Empty]],
        }
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    fn new_node(&mut self, fill: Child) -> u32 {
        self.nodes.push([fill, fill]);
        (self.nodes.len() - 1) as u32
    }

    /// Bits of `addr` as laid out in this tree, MSB first
    fn address_bits(&self, addr: IpAddr, prefix_len: u32) -> (u128, u32) {
        match (addr, self.ip_version) {
            (IpAddr::V4(v4), 4) => (u128::from(u32::from(v4)) << 96, prefix_len),
            (IpAddr::V4(v4), _) => (u128::from(u32::from(v4)), prefix_len + 96),
            (IpAddr::V6(v6), 6) => (u128::from(v6), prefix_len),
            (IpAddr::V6(_), _) => panic!("IPv6 network in an IPv4 tree"),
        }
    }

    /// Walk to the parent of the final bit, creating nodes along the way
    fn descend(&mut self, bits: u128, len: u32) -> (u32, usize) {
        assert!(len >= 1, "prefix length must be at least 1");
        let mut node = 0u32;
        for i in 0..len - 1 {
            let side = ((bits >> (127 - i)) & 1) as usize;
            let child = self.nodes[node as usize][side];
            node = match child {
                Child::Node(next) => next,
                Child::Empty => {
                    let next = self.new_node(Child::Empty);
                    self.nodes[node as usize][side] = Child::Node(next);
                    next
                }
                data @ Child::Data(_) => {
                    let next = self.new_node(data);
                    self.nodes[node as usize][side] = Child::Node(next);
                    next
                }
            };
        }
        let side = ((bits >> (127 - (len - 1))) & 1) as usize;
        (node, side)
    }

    /// Map `network/prefix_len` to a data section offset
    pub fn insert(&mut self, network: &str, data_offset: usize) {
        let (addr, prefix_len) = parse_cidr(network);
        let (bits, len) = self.address_bits(addr, prefix_len);
        let (node, side) = self.descend(bits, len);
        self.nodes[node as usize][side] = Child::Data(data_offset);
    }

    /// Make `network` share the subtree that holds IPv4 (`::/96`)
    pub fn alias_ipv4(&mut self, network: &str) {
        assert_eq!(self.ip_version, 6);
        let (root_parent, root_side) = self.descend(0, 96);
        let ipv4_root = match self.nodes[root_parent as usize][root_side] {
            Child::Node(n) => n,
            other => panic!("no IPv4 subtree to alias: {:?}", other),
        };
        let (addr, prefix_len) = parse_cidr(network);
        let (bits, len) = self.address_bits(addr, prefix_len);
        let (node, side) = self.descend(bits, len);
        self.nodes[node as usize][side] = Child::Node(ipv4_root);
    }

    fn record_value(&self, child: Child) -> u32 {
        let node_count = self.node_count();
        match child {
            Child::Empty => node_count,
            Child::Node(n) => n,
            Child::Data(offset) => node_count + 16 + offset as u32,
        }
    }

    /// Serialize the tree with the given record width
    pub fn to_bytes(&self, record_size: u16) -> Vec<u8> {
        let nodes: Vec<(u32, u32)> = self
            .nodes
            .iter()
            .map(|[l, r]| (self.record_value(*l), self.record_value(*r)))
            .collect();
        write_nodes(&nodes, record_size)
    }
}

/// Serialize raw `(left, right)` record pairs
pub fn write_nodes(nodes: &[(u32, u32)], record_size: u16) -> Vec<u8> {
    let mut out = Vec::new();
    for &(left, right) in nodes {
        match record_size {
            24 => {
                assert!(left < 1 << 24 && right < 1 << 24);
                out.extend_from_slice(&left.to_be_bytes()[1..]);
                out.extend_from_slice(&right.to_be_bytes()[1..]);
            }
            28 => {
                assert!(left < 1 << 28 && right < 1 << 28);
                out.extend_from_slice(&left.to_be_bytes()[1..]);
                out.push((((left >> 24) as u8) << 4) | (right >> 24) as u8);
                out.extend_from_slice(&right.to_be_bytes()[1..]);
            }
            32 => {
                out.extend_from_slice(&left.to_be_bytes());
                out.extend_from_slice(&right.to_be_bytes());
            }
            other => panic!("unsupported record size {}", other),
        }
    }
    out
}

pub fn parse_cidr(network: &str) -> (IpAddr, u32) {
    let (addr, len) = network.split_once('/').expect("network in CIDR form");
    (
        addr.parse().expect("valid address"),
        len.parse().expect("valid prefix length"),
    )
}

// ---------------------------------------------------------------------------
// File assembly
// ---------------------------------------------------------------------------

/// Metadata fields written into the trailer
#[derive(Debug, Clone)]
pub struct MetadataFields {
    pub major_version: u16,
    pub minor_version: u16,
    pub build_epoch: u64,
    pub ip_version: u16,
    pub record_size: u16,
    pub node_count: u32,
    pub database_type: String,
    pub languages: Vec<String>,
    pub description: Vec<(String, String)>,
    /// Keys dropped from the map, for negative tests
    pub omit: Vec<String>,
}

impl MetadataFields {
    pub fn new(ip_version: u16, record_size: u16, node_count: u32, database_type: &str) -> Self {
        Self {
            major_version: 2,
            minor_version: 0,
            build_epoch: 1_650_000_000,
            ip_version,
            record_size,
            node_count,
            database_type: database_type.to_string(),
            languages: vec!["en".to_string()],
            description: vec![("en".to_string(), format!("{} test data", database_type))],
            omit: Vec::new(),
        }
    }

    pub fn to_value(&self) -> DataValue {
        let mut map = HashMap::new();
        map.insert(
            "binary_format_major_version".to_string(),
            DataValue::Uint16(self.major_version),
        );
        map.insert(
            "binary_format_minor_version".to_string(),
            DataValue::Uint16(self.minor_version),
        );
        map.insert("build_epoch".to_string(), DataValue::Uint64(self.build_epoch));
        map.insert("ip_version".to_string(), DataValue::Uint16(self.ip_version));
        map.insert("record_size".to_string(), DataValue::Uint16(self.record_size));
        map.insert("node_count".to_string(), DataValue::Uint32(self.node_count));
        map.insert(
            "database_type".to_string(),
            DataValue::String(self.database_type.clone()),
        );
        map.insert(
            "languages".to_string(),
            DataValue::Array(
                self.languages
                    .iter()
                    .map(|l| DataValue::String(l.clone()))
                    .collect(),
            ),
        );
        map.insert(
            "description".to_string(),
            DataValue::Map(
                self.description
                    .iter()
                    .map(|(k, v)| (k.clone(), DataValue::String(v.clone())))
                    .collect(),
            ),
        );
        for key in &self.omit {
            map.remove(key);
        }
        DataValue::Map(map)
    }
}

/// Tree, separator, data section, marker, metadata
pub fn assemble(tree: &[u8], data: &[u8], metadata: &DataValue) -> Vec<u8> {
    let mut out = Vec::with_capacity(tree.len() + 16 + data.len() + 256);
    out.extend_from_slice(tree);
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(data);
    out.extend_from_slice(METADATA_MARKER);
    encode_value(&mut out, metadata);
    out
}

/// Networks plus values, assembled into a database image
pub struct DatabaseWriter {
    pub tree: TreeBuilder,
    pub data: DataSection,
    pub metadata: MetadataFields,
}

impl DatabaseWriter {
    pub fn new(ip_version: u16, record_size: u16, database_type: &str) -> Self {
        Self {
            tree: TreeBuilder::new(ip_version),
            data: DataSection::new(),
            metadata: MetadataFields::new(ip_version, record_size, 0, database_type),
        }
    }

    pub fn insert(&mut self, network: &str, value: &DataValue) -> &mut Self {
        let offset = self.data.insert(value);
        self.tree.insert(network, offset);
        self
    }

    /// Image with `node_count` taken from the tree
    pub fn build(&mut self) -> Vec<u8> {
        self.metadata.node_count = self.tree.node_count();
        self.build_raw()
    }

    /// Image with the metadata exactly as currently set
    pub fn build_raw(&self) -> Vec<u8> {
        assemble(
            &self.tree.to_bytes(self.metadata.record_size),
            self.data.bytes(),
            &self.metadata.to_value(),
        )
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn string(s: &str) -> DataValue {
    DataValue::String(s.to_string())
}

pub fn map(entries: &[(&str, DataValue)]) -> DataValue {
    DataValue::Map(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

/// `{"country": {"iso_code": code, "geoname_id": id}}`
pub fn country(code: &str, geoname_id: u32) -> DataValue {
    map(&[(
        "country",
        map(&[
            ("iso_code", string(code)),
            ("geoname_id", DataValue::Uint32(geoname_id)),
        ]),
    )])
}

/// IPv4 networks in [`geolite2_country`]
pub const COUNTRY_V4_NETWORKS: &[(&str, &str, u32)] = &[
    ("2.125.160.216/29", "GB", 2_635_167),
    ("81.2.69.160/27", "GB", 2_635_167),
    ("89.160.20.112/28", "SE", 2_661_886),
    ("216.160.83.56/29", "US", 6_252_001),
];

/// IPv6 networks in [`geolite2_country`]
pub const COUNTRY_V6_NETWORKS: &[(&str, &str, u32)] = &[
    ("2001:218::/32", "JP", 1_861_060),
    ("2001:b28:f23f::/48", "AG", 3_576_396),
    ("2a02:d300::/29", "UA", 690_791),
];

/// A small IPv6 GeoLite2-Country lookalike; IPv4 also reachable via
/// `::ffff:0:0/96`
pub fn geolite2_country(record_size: u16) -> Vec<u8> {
    let mut writer = DatabaseWriter::new(6, record_size, "GeoLite2-Country");
    for &(network, code, id) in COUNTRY_V4_NETWORKS.iter().chain(COUNTRY_V6_NETWORKS) {
        writer.insert(network, &country(code, id));
    }
    writer.tree.alias_ipv4("::ffff:0:0/96");
    writer.build()
}

/// An IPv4-only database with the same IPv4 networks
pub fn ipv4_country(record_size: u16) -> Vec<u8> {
    let mut writer = DatabaseWriter::new(4, record_size, "GeoLite2-Country");
    for &(network, code, id) in COUNTRY_V4_NETWORKS {
        writer.insert(network, &country(code, id));
    }
    writer.build()
}
