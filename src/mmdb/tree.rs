//! MMDB Search Tree Traversal
//!
//! Implements binary search tree traversal for IP address lookups.
//! The tree uses a compact binary representation where each node contains
//! two records (left and right) that point to either:
//! - Another node (continue traversal)
//! - A data section offset (found)
//! - A "not found" marker (the record equals the node count)
//!
//! Walks consume the bits of a `u64` most-significant first and may stop
//! early with a [`SearchResult::Partial`] node index, so a 128-bit IPv6 walk
//! is four 32-bit walks chained together.

use super::format::Metadata;
use super::types::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR_SIZE};
use crate::byte_store::ByteStore;
use crate::data_section::{DataDecoder, DataValue, DEFAULT_MAX_DECODE_DEPTH};
use crate::endian::{extend_with_nibble, read_be_u24, split_nibbles};
use crate::error::{MmdbError, Result};

/// Result of a tree search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchResult {
    /// The address has no record
    NotFound,
    /// All requested bits were consumed without reaching a leaf; resume from this node
    Partial(u32),
    /// The address resolved to a record
    Found(DataValue),
    /// The walk or the record decode failed
    Failed(MmdbError),
}

impl SearchResult {
    /// True for [`SearchResult::Found`]
    pub fn is_found(&self) -> bool {
        matches!(self, SearchResult::Found(_))
    }

    /// Borrow the found value
    pub fn value(&self) -> Option<&DataValue> {
        match self {
            SearchResult::Found(value) => Some(value),
            _ => None,
        }
    }

    /// Take the found value
    pub fn into_value(self) -> Option<DataValue> {
        match self {
            SearchResult::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// A fixed-width chunk of an address fed to [`SearchTree::search_words`]
pub trait AddressWord: Copy {
    /// Bit width of the word
    const BITS: u32;

    /// The word shifted so its most significant bit is bit 63
    fn to_msb_aligned(self) -> u64;
}

macro_rules! impl_address_word {
    ($($t:ty),*) => {
        $(
            impl AddressWord for $t {
                const BITS: u32 = <$t>::BITS;

                #[inline]
                fn to_msb_aligned(self) -> u64 {
                    u64::from(self) << (64 - <$t>::BITS)
                }
            }
        )*
    };
}

impl_address_word!(u8, u16, u32, u64);

/// Where a walk stopped without decoding anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Bits ran out at this node
    Node(u32),
    /// A record that is either "not found" or a data pointer
    Terminal(u32),
}

/// Search tree for IP address lookups
#[derive(Debug, Clone, Copy)]
pub struct SearchTree<'a> {
    /// The raw file data containing the tree
    store: &'a ByteStore,
    /// Parsed header information
    metadata: &'a Metadata,
    max_decode_depth: usize,
    node_visit_limit: Option<usize>,
}

impl<'a> SearchTree<'a> {
    /// Create a new search tree
    pub fn new(store: &'a ByteStore, metadata: &'a Metadata) -> Self {
        Self {
            store,
            metadata,
            max_decode_depth: DEFAULT_MAX_DECODE_DEPTH,
            node_visit_limit: None,
        }
    }

    /// Recursion budget used when decoding found records
    pub fn with_max_decode_depth(mut self, max_decode_depth: usize) -> Self {
        self.max_decode_depth = max_decode_depth;
        self
    }

    /// Fail enumeration once it has entered `limit` nodes
    pub fn with_node_visit_limit(mut self, limit: usize) -> Self {
        self.node_visit_limit = Some(limit);
        self
    }

    pub(crate) fn node_visit_limit(&self) -> Option<usize> {
        self.node_visit_limit
    }

    pub(crate) fn metadata(&self) -> &'a Metadata {
        self.metadata
    }

    /// Read a record from a node
    ///
    /// Each node contains two records. `side` determines which:
    /// - 0 = left record (for IP bit 0)
    /// - anything else = right record (for IP bit 1)
    pub fn read_record(&self, node: u32, side: u8) -> Result<u32> {
        if node >= self.metadata.node_count {
            return Err(MmdbError::SearchFailure(format!(
                "Node index {} exceeds node count {}",
                node, self.metadata.node_count
            )));
        }

        let node_offset = node as usize * self.metadata.node_byte_size;
        let right = side != 0;

        match self.metadata.record_size {
            RecordSize::Bits24 => {
                let offset = node_offset + if right { 3 } else { 0 };
                Ok(read_be_u24(self.store.read_array::<3>(offset)?))
            }
            RecordSize::Bits28 => {
                // Layout: [Left 24 bits][Middle 8 bits][Right 24 bits]
                // Middle byte contains 4 high bits of left + 4 high bits of right
                let bytes = self.store.read_array::<7>(node_offset)?;
                let (left_high, right_high) = split_nibbles(bytes[3]);
                if right {
                    Ok(extend_with_nibble(
                        right_high,
                        read_be_u24([bytes[4], bytes[5], bytes[6]]),
                    ))
                } else {
                    Ok(extend_with_nibble(
                        left_high,
                        read_be_u24([bytes[0], bytes[1], bytes[2]]),
                    ))
                }
            }
            RecordSize::Bits32 => {
                let offset = node_offset + if right { 4 } else { 0 };
                Ok(u32::from_be_bytes(self.store.read_array::<4>(offset)?))
            }
        }
    }

    /// Read both records of a node as `(left, right)`
    pub fn read_node(&self, node: u32) -> Result<(u32, u32)> {
        Ok((self.read_record(node, 0)?, self.read_record(node, 1)?))
    }

    /// Walk `bit_count` bits of `value` (MSB first) starting at `starting_node`
    ///
    /// `bit_count == 0` returns `Partial(starting_node)` untouched.
    pub fn search(&self, starting_node: u32, value: u64, bit_count: u32) -> SearchResult {
        match self.walk(starting_node, value, bit_count) {
            Ok(Step::Node(node)) => SearchResult::Partial(node),
            Ok(Step::Terminal(record)) => self.resolve_record(record),
            Err(e) => SearchResult::Failed(e),
        }
    }

    /// Walk an address split into fixed-width words, chaining partial results
    ///
    /// At most `total_bits` bits are consumed; the last word may be used
    /// partially.
    pub fn search_words<T: AddressWord>(
        &self,
        starting_node: u32,
        words: &[T],
        total_bits: u32,
    ) -> SearchResult {
        if starting_node >= self.metadata.node_count {
            return SearchResult::Failed(invalid_start(starting_node, self.metadata.node_count));
        }

        let mut node = starting_node;
        let mut remaining = total_bits;
        for &word in words {
            if remaining == 0 {
                break;
            }
            let bits = remaining.min(T::BITS);
            match self.search(node, word.to_msb_aligned(), bits) {
                SearchResult::Partial(next) => node = next,
                resolved => return resolved,
            }
            remaining -= bits;
        }

        SearchResult::Partial(node)
    }

    /// Turn a record value into a search result without walking
    pub fn resolve_record(&self, record: u32) -> SearchResult {
        let node_count = self.metadata.node_count;
        if record < node_count {
            return SearchResult::Partial(record);
        }
        if record == node_count {
            return SearchResult::NotFound;
        }
        match self.decode_record(record) {
            Ok(value) => SearchResult::Found(value),
            Err(e) => SearchResult::Failed(e),
        }
    }

    /// Absolute file offset of the value a data record points at
    ///
    /// `data_section_start + (record - node_count - 16)`
    pub fn data_offset(&self, record: u32) -> Result<usize> {
        let node_count = self.metadata.node_count;
        if record <= node_count {
            return Err(MmdbError::SearchFailure(format!(
                "Record {} is not a data pointer (node_count = {})",
                record, node_count
            )));
        }

        let relative = ((record - node_count) as usize)
            .checked_sub(DATA_SECTION_SEPARATOR_SIZE)
            .ok_or_else(|| {
                MmdbError::CorruptDatabase(format!(
                    "Record {} points into the data section separator (node_count = {})",
                    record, node_count
                ))
            })?;

        Ok(self.metadata.data_section_start + relative)
    }

    /// Decode the value a data record points at
    pub fn decode_record(&self, record: u32) -> Result<DataValue> {
        let offset = self.data_offset(record)?;
        DataDecoder::new(self.store, self.metadata.data_section_start)
            .with_max_depth(self.max_decode_depth)
            .decode(offset)
    }

    /// Where IPv4 lookups begin.
    ///
    /// An IPv4 tree starts at the root. In an IPv6 tree IPv4 addresses live
    /// under `::/96`, so the walk over 96 zero bits is done here once.
    pub(crate) fn ipv4_start(&self) -> Result<Step> {
        if self.metadata.ip_version == IpVersion::V4 {
            return Ok(Step::Node(0));
        }
        match self.walk(0, 0, 64)? {
            Step::Node(zero64) => self.walk(zero64, 0, 32),
            terminal => Ok(terminal),
        }
    }

    pub(crate) fn walk(&self, starting_node: u32, value: u64, bit_count: u32) -> Result<Step> {
        let node_count = self.metadata.node_count;
        if starting_node >= node_count {
            return Err(invalid_start(starting_node, node_count));
        }
        if bit_count > 64 {
            return Err(MmdbError::SearchFailure(format!(
                "Invalid bit count {} (maximum 64)",
                bit_count
            )));
        }

        let mut node = starting_node;
        for bit_index in 0..bit_count {
            let side = ((value >> (63 - bit_index)) & 1) as u8;
            let record = self.read_record(node, side).map_err(|e| match e {
                MmdbError::SearchFailure(_) => e,
                other => MmdbError::SearchFailure(format!(
                    "failed to read node {} at bit {}: {}",
                    node, bit_index, other
                )),
            })?;

            if record >= node_count {
                return Ok(Step::Terminal(record));
            }
            node = record;
        }

        Ok(Step::Node(node))
    }
}

fn invalid_start(node: u32, node_count: u32) -> MmdbError {
    MmdbError::SearchFailure(format!(
        "Invalid starting node {} (node count {})",
        node, node_count
    ))
}
