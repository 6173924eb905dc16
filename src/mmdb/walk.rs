//! Depth-first enumeration of every network in a search tree.
//!
//! The walk follows both records of each node and reports a leaf whenever a
//! record points into the data section. Depth is capped at the address width
//! of the database (32 or 128 bits) no matter what the node records say, so a
//! tree containing a cycle still terminates. There is no visited set:
//! several prefixes may share one subtree (IPv4 under `::ffff:0:0/96`).
//!
//! Termination is not the same as being cheap. A node whose two records both
//! point back at an ancestor doubles the work at every level, up to 2^32 node
//! visits for IPv4 and 2^128 for IPv6. Untrusted trees should be walked with
//! [`SearchTree::with_node_visit_limit`].

use super::tree::SearchTree;
use super::types::IpVersion;
use crate::data_section::DataValue;
use crate::endian::pack_bits;
use crate::error::{MmdbError, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

impl SearchTree<'_> {
    /// Visit every data leaf as `(prefix_words, prefix_len)`
    ///
    /// `prefix_words` holds the path bits packed big-endian into 32-bit words,
    /// the last word left-aligned. Fails with [`MmdbError::SearchFailure`]
    /// if a node visit limit is set and exceeded.
    pub fn enumerate<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&[u32], u32),
    {
        self.enumerate_records(|words, len, _record| visit(words, len))
    }

    /// Like [`SearchTree::enumerate`] but also hands over the raw record value
    pub fn enumerate_records<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&[u32], u32, u32),
    {
        if self.metadata().node_count == 0 {
            return Ok(());
        }
        let max_depth = self.metadata().ip_version.bit_length();
        let mut path = Vec::with_capacity(max_depth);
        let mut visited = 0usize;
        self.visit_node(0, &mut path, max_depth, &mut visited, &mut visit)
    }

    /// Like [`SearchTree::enumerate`] but decodes each leaf's value
    ///
    /// A leaf whose value fails to decode is reported with its error; the
    /// walk itself continues.
    pub fn enumerate_values<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&[u32], u32, Result<DataValue>),
    {
        self.enumerate_records(|words, len, record| visit(words, len, self.decode_record(record)))
    }

    fn visit_node<F>(
        &self,
        node: u32,
        path: &mut Vec<u8>,
        max_depth: usize,
        visited: &mut usize,
        visit: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&[u32], u32, u32),
    {
        if path.len() >= max_depth {
            return Ok(());
        }

        *visited += 1;
        if let Some(limit) = self.node_visit_limit() {
            if *visited > limit {
                return Err(MmdbError::SearchFailure(format!(
                    "enumeration exceeded {} node visits",
                    limit
                )));
            }
        }

        let node_count = self.metadata().node_count;
        for side in 0..2u8 {
            let record = self.read_record(node, side)?;
            path.push(side);
            if record > node_count {
                visit(&pack_bits(path), path.len() as u32, record);
            } else if record < node_count {
                self.visit_node(record, path, max_depth, visited, visit)?;
            }
            path.pop();
        }

        Ok(())
    }
}

/// Turn packed prefix words into the network address they start
///
/// Missing trailing words are zero; extra words are ignored.
pub fn prefix_address(words: &[u32], ip_version: IpVersion) -> IpAddr {
    let word = |i: usize| words.get(i).copied().unwrap_or(0);
    match ip_version {
        IpVersion::V4 => IpAddr::V4(Ipv4Addr::from(word(0))),
        IpVersion::V6 => {
            let bits = (u128::from(word(0)) << 96)
                | (u128::from(word(1)) << 64)
                | (u128::from(word(2)) << 32)
                | u128::from(word(3));
            IpAddr::V6(Ipv6Addr::from(bits))
        }
    }
}
