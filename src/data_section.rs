//! Data section decoding for MaxMind DB files
//!
//! Implements the complete MaxMind DB data type specification on top of a
//! [`ByteStore`]. The same decoder reads the metadata block (pointers relative
//! to the start of the metadata) and the data section (pointers relative to
//! the data section origin).
//!
//! # Supported Types
//!
//! - **Pointer**: Reference to another data item (followed transparently)
//! - **String**: UTF-8 text data
//! - **Double**: 64-bit floating point (IEEE 754)
//! - **Bytes**: Raw byte arrays
//! - **Uint16** / **Uint32** / **Uint64** / **Uint128**: Unsigned integers
//! - **Map**: Key-value pairs (string keys)
//! - **Int32**: Signed 32-bit integers
//! - **Array**: Ordered lists of values
//! - **Bool**: Boolean values
//! - **Float**: 32-bit floating point (IEEE 754)
//!
//! # Format
//!
//! Control byte encodes type (3 bits) and size/payload (5 bits). Type 0 is an
//! escape: the real type is the next byte plus 7.
//!
//! See: https://maxmind.github.io/MaxMind-DB/

use crate::byte_store::ByteStore;
use crate::endian::{read_be_u128, read_be_u16, read_be_u32, read_be_u64, split_u128};
use crate::error::{MmdbError, Result};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Default recursion budget for nested maps, arrays and pointer chains
pub const DEFAULT_MAX_DECODE_DEPTH: usize = 512;

/// Pointer size classes 1 and 2 add a fixed bias on top of the encoded value
const POINTER_VALUE_OFFSETS: [usize; 4] = [0, 2048, 526_336, 0];

/// Upper bound on entries reserved up front for a map or array; larger
/// containers grow as entries actually decode
const MAX_PREALLOCATED_ENTRIES: usize = 4096;

/// A decoded MMDB value
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// UTF-8 string
    String(String),
    /// IEEE 754 double precision float
    Double(f64),
    /// Raw byte array
    Bytes(Vec<u8>),
    /// Unsigned 16-bit integer
    Uint16(u16),
    /// Unsigned 32-bit integer
    Uint32(u32),
    /// Key-value map (keys are always strings)
    Map(HashMap<String, DataValue>),
    /// Signed 32-bit integer
    Int32(i32),
    /// Unsigned 64-bit integer
    Uint64(u64),
    /// Unsigned 128-bit integer
    Uint128(u128),
    /// Array of values
    Array(Vec<DataValue>),
    /// Boolean value
    Bool(bool),
    /// IEEE 754 single precision float
    Float(f32),
}

impl DataValue {
    /// Look up a key in a map value
    pub fn get(&self, key: &str) -> Option<&DataValue> {
        match self {
            DataValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Follow a chain of map keys, e.g. `["country", "iso_code"]`
    pub fn get_path(&self, path: &[&str]) -> Option<&DataValue> {
        path.iter().try_fold(self, |value, key| value.get(key))
    }

    /// The string payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Any unsigned integer up to 64 bits
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataValue::Uint16(n) => Some(u64::from(*n)),
            DataValue::Uint32(n) => Some(u64::from(*n)),
            DataValue::Uint64(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean payload, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The entries of a map value
    pub fn as_map(&self) -> Option<&HashMap<String, DataValue>> {
        match self {
            DataValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The elements of an array value
    pub fn as_array(&self) -> Option<&[DataValue]> {
        match self {
            DataValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// `(high, low)` halves of a `Uint128`
    pub fn uint128_halves(&self) -> Option<(u64, u64)> {
        match self {
            DataValue::Uint128(n) => Some(split_u128(*n)),
            _ => None,
        }
    }

    /// Short name of the value's type
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::String(_) => "string",
            DataValue::Double(_) => "double",
            DataValue::Bytes(_) => "bytes",
            DataValue::Uint16(_) => "uint16",
            DataValue::Uint32(_) => "uint32",
            DataValue::Map(_) => "map",
            DataValue::Int32(_) => "int32",
            DataValue::Uint64(_) => "uint64",
            DataValue::Uint128(_) => "uint128",
            DataValue::Array(_) => "array",
            DataValue::Bool(_) => "boolean",
            DataValue::Float(_) => "float",
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, level: usize) -> fmt::Result {
        let indent = "  ".repeat(level);
        match self {
            DataValue::String(s) => write!(f, "{:?}", s),
            DataValue::Double(d) => write!(f, "{} double", d),
            DataValue::Bytes(b) => write!(f, "[{} bytes]", b.len()),
            DataValue::Uint16(n) => write!(f, "{} u16", n),
            DataValue::Uint32(n) => write!(f, "{} u32", n),
            DataValue::Int32(n) => write!(f, "{} i32", n),
            DataValue::Uint64(n) => write!(f, "{} u64", n),
            DataValue::Uint128(n) => write!(f, "0x{:032x} u128", n),
            DataValue::Bool(b) => write!(f, "{}", b),
            DataValue::Float(v) => write!(f, "{} float", v),
            DataValue::Map(map) if map.is_empty() => write!(f, "{{}}"),
            DataValue::Map(map) => {
                let mut keys: Vec<_> = map.keys().collect();
                keys.sort();
                writeln!(f, "{{")?;
                for key in keys {
                    write!(f, "{}  {}: ", indent, key)?;
                    map[key].fmt_indented(f, level + 1)?;
                    writeln!(f)?;
                }
                write!(f, "{}}}", indent)
            }
            DataValue::Array(items) if items.is_empty() => write!(f, "[]"),
            DataValue::Array(items) => {
                writeln!(f, "[")?;
                for item in items {
                    write!(f, "{}  ", indent)?;
                    item.fmt_indented(f, level + 1)?;
                    writeln!(f)?;
                }
                write!(f, "{}]", indent)
            }
        }
    }
}

/// Indented, human-readable dump with type suffixes on numbers
impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// JSON-friendly serialization: map keys are emitted sorted, `Uint128` as a
/// decimal string
impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DataValue::String(s) => serializer.serialize_str(s),
            DataValue::Double(d) => serializer.serialize_f64(*d),
            DataValue::Bytes(b) => serializer.serialize_bytes(b),
            DataValue::Uint16(n) => serializer.serialize_u16(*n),
            DataValue::Uint32(n) => serializer.serialize_u32(*n),
            DataValue::Int32(n) => serializer.serialize_i32(*n),
            DataValue::Uint64(n) => serializer.serialize_u64(*n),
            DataValue::Uint128(n) => serializer.serialize_str(&n.to_string()),
            DataValue::Bool(b) => serializer.serialize_bool(*b),
            DataValue::Float(v) => serializer.serialize_f32(*v),
            DataValue::Map(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by_key(|(k, _)| *k);
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
            DataValue::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(item)?;
                }
                out.end()
            }
        }
    }
}

/// Field type tags as they appear in control bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldType {
    /// Escape: the real type follows in the next byte
    Extended = 0,
    /// Pointer into the data section
    Pointer = 1,
    /// UTF-8 string
    String = 2,
    /// 64-bit float
    Double = 3,
    /// Raw bytes
    Bytes = 4,
    /// Unsigned 16-bit integer
    Uint16 = 5,
    /// Unsigned 32-bit integer
    Uint32 = 6,
    /// Map with string keys
    Map = 7,
    /// Signed 32-bit integer
    Int32 = 8,
    /// Unsigned 64-bit integer
    Uint64 = 9,
    /// Unsigned 128-bit integer
    Uint128 = 10,
    /// Array
    Array = 11,
    /// Data cache container (never valid in a value)
    Container = 12,
    /// End marker (never valid in a value)
    EndMarker = 13,
    /// Boolean
    Bool = 14,
    /// 32-bit float
    Float = 15,
}

impl FieldType {
    /// Map a numeric tag to its field type
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => FieldType::Extended,
            1 => FieldType::Pointer,
            2 => FieldType::String,
            3 => FieldType::Double,
            4 => FieldType::Bytes,
            5 => FieldType::Uint16,
            6 => FieldType::Uint32,
            7 => FieldType::Map,
            8 => FieldType::Int32,
            9 => FieldType::Uint64,
            10 => FieldType::Uint128,
            11 => FieldType::Array,
            12 => FieldType::Container,
            13 => FieldType::EndMarker,
            14 => FieldType::Bool,
            15 => FieldType::Float,
            _ => return None,
        })
    }
}

/// Data section decoder
///
/// Decodes values from a [`ByteStore`]. Pointers are resolved against
/// `pointer_base`, never against the pointer's own location.
#[derive(Debug, Clone, Copy)]
pub struct DataDecoder<'a> {
    store: &'a ByteStore,
    pointer_base: usize,
    max_depth: usize,
}

impl<'a> DataDecoder<'a> {
    /// Create a decoder
    ///
    /// # Arguments
    /// * `store` - The database image
    /// * `pointer_base` - Absolute offset pointers are relative to (the data
    ///   section start, or the metadata start when decoding metadata)
    pub fn new(store: &'a ByteStore, pointer_base: usize) -> Self {
        Self {
            store,
            pointer_base,
            max_depth: DEFAULT_MAX_DECODE_DEPTH,
        }
    }

    /// Limit how deeply maps, arrays and pointers may nest
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Offset pointers are resolved against
    pub fn pointer_base(&self) -> usize {
        self.pointer_base
    }

    /// Decode the value at an absolute offset
    pub fn decode(&self, offset: usize) -> Result<DataValue> {
        self.decode_at(offset).map(|(value, _)| value)
    }

    /// Decode the value at an absolute offset, returning it with the offset
    /// just past its encoding
    pub fn decode_at(&self, offset: usize) -> Result<(DataValue, usize)> {
        let mut cursor = offset;
        let value = self.decode_value(&mut cursor, 0)?;
        Ok((value, cursor))
    }

    fn decode_value(&self, cursor: &mut usize, depth: usize) -> Result<DataValue> {
        if depth > self.max_depth {
            return Err(MmdbError::Decoding(format!(
                "maximum decode depth {} exceeded at offset {}",
                self.max_depth, *cursor
            )));
        }

        let ctrl = self.store.byte_at(*cursor)?;
        *cursor += 1;

        let type_id = ctrl >> 5;
        if type_id == FieldType::Pointer as u8 {
            // The caller's cursor stays just past the pointer bytes
            let mut target = self.decode_pointer(cursor, ctrl)?;
            return self.decode_value(&mut target, depth + 1);
        }

        let field_type = if type_id == FieldType::Extended as u8 {
            self.decode_extended_type(cursor)?
        } else {
            FieldType::from_tag(type_id).ok_or(MmdbError::UnknownFieldType(type_id))?
        };

        let size = self.decode_size(cursor, ctrl & 0x1F)?;

        match field_type {
            FieldType::Map => self.decode_map(cursor, size, depth),
            FieldType::Array => self.decode_array(cursor, size, depth),
            FieldType::Bool => Ok(DataValue::Bool(size != 0)),
            FieldType::String
            | FieldType::Double
            | FieldType::Bytes
            | FieldType::Uint16
            | FieldType::Uint32
            | FieldType::Int32
            | FieldType::Uint64
            | FieldType::Uint128
            | FieldType::Float => {
                let payload = self.store.read(*cursor, size)?;
                *cursor += size;
                decode_scalar(field_type, payload)
            }
            FieldType::Extended
            | FieldType::Pointer
            | FieldType::Container
            | FieldType::EndMarker => Err(MmdbError::UnknownFieldType(field_type as u8)),
        }
    }

    fn decode_extended_type(&self, cursor: &mut usize) -> Result<FieldType> {
        let raw = self.store.byte_at(*cursor)?;
        *cursor += 1;

        let tag = u16::from(raw) + 7;
        if tag < 8 {
            return Err(MmdbError::InvalidFieldType(tag as u8));
        }
        let tag = u8::try_from(tag).unwrap_or(u8::MAX);
        FieldType::from_tag(tag).ok_or(MmdbError::UnknownFieldType(tag))
    }

    fn decode_size(&self, cursor: &mut usize, size_bits: u8) -> Result<usize> {
        let (extra, bias) = match size_bits {
            0..=28 => return Ok(usize::from(size_bits)),
            29 => (1, 29),
            30 => (2, 285),
            _ => (3, 65_821),
        };
        let bytes = self.store.read(*cursor, extra)?;
        *cursor += extra;
        Ok(bias + (read_be_u32(bytes) & 0x0FFF_FFFF) as usize)
    }

    /// Decode a pointer and return the absolute target offset
    fn decode_pointer(&self, cursor: &mut usize, ctrl: u8) -> Result<usize> {
        let size_class = usize::from((ctrl >> 3) & 0x3);
        let bytes = self.store.read(*cursor, size_class + 1)?;
        *cursor += size_class + 1;

        let value = if size_class == 3 {
            read_be_u32(bytes) as usize
        } else {
            (usize::from(ctrl & 0x7) << (8 * (size_class + 1))) | read_be_u64(bytes) as usize
        };

        self.pointer_base
            .checked_add(value)
            .and_then(|v| v.checked_add(POINTER_VALUE_OFFSETS[size_class]))
            .ok_or_else(|| MmdbError::Decoding(format!("pointer value {} overflows", value)))
    }

    fn decode_map(&self, cursor: &mut usize, count: usize, depth: usize) -> Result<DataValue> {
        // A key and a value take at least one byte each
        let remaining = self.store.len().saturating_sub(*cursor) / 2;
        let mut map = HashMap::with_capacity(count.min(remaining).min(MAX_PREALLOCATED_ENTRIES));

        for _ in 0..count {
            let key_offset = *cursor;
            let key = match self.decode_value(cursor, depth + 1)? {
                DataValue::String(s) => s,
                other => {
                    return Err(MmdbError::Decoding(format!(
                        "map key at offset {} is a {}, not a string",
                        key_offset,
                        other.type_name()
                    )))
                }
            };
            let value = self.decode_value(cursor, depth + 1)?;
            map.insert(key, value);
        }

        Ok(DataValue::Map(map))
    }

    fn decode_array(&self, cursor: &mut usize, count: usize, depth: usize) -> Result<DataValue> {
        let remaining = self.store.len().saturating_sub(*cursor);
        let mut array = Vec::with_capacity(count.min(remaining).min(MAX_PREALLOCATED_ENTRIES));

        for _ in 0..count {
            array.push(self.decode_value(cursor, depth + 1)?);
        }

        Ok(DataValue::Array(array))
    }
}

/// Decode a fixed-payload value from exactly its payload bytes
pub(crate) fn decode_scalar(field_type: FieldType, payload: &[u8]) -> Result<DataValue> {
    match field_type {
        FieldType::String => std::str::from_utf8(payload)
            .map(|s| DataValue::String(s.to_string()))
            .map_err(|e| MmdbError::Decoding(format!("invalid UTF-8 in string: {}", e))),
        FieldType::Double => {
            if payload.len() != 8 {
                return Err(MmdbError::Decoding(format!(
                    "double requires 8 bytes, found {}",
                    payload.len()
                )));
            }
            Ok(DataValue::Double(f64::from_bits(read_be_u64(payload))))
        }
        FieldType::Float => {
            if payload.len() != 4 {
                return Err(MmdbError::Decoding(format!(
                    "float requires 4 bytes, found {}",
                    payload.len()
                )));
            }
            Ok(DataValue::Float(f32::from_bits(read_be_u32(payload))))
        }
        FieldType::Bytes => Ok(DataValue::Bytes(payload.to_vec())),
        FieldType::Uint16 => Ok(DataValue::Uint16(read_be_u16(payload))),
        FieldType::Uint32 => Ok(DataValue::Uint32(read_be_u32(payload))),
        FieldType::Int32 => Ok(DataValue::Int32(read_be_u32(payload) as i32)),
        FieldType::Uint64 => Ok(DataValue::Uint64(read_be_u64(payload))),
        FieldType::Uint128 => Ok(DataValue::Uint128(read_be_u128(payload))),
        other => Err(MmdbError::UnknownFieldType(other as u8)),
    }
}
