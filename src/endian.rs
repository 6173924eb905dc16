//! Big-endian integer helpers for the MMDB wire format
//!
//! Everything in an MMDB file is big-endian and most integers are stored in
//! fewer bytes than their nominal width (a `uint32` may occupy 0..=4 bytes, a
//! 28-bit search tree record borrows a nibble from a shared middle byte).
//! These helpers pin that arithmetic in one place so the trie and the value
//! decoder never shift bytes by hand.

/// Accumulate bytes most-significant first into a `u64`.
///
/// Bytes beyond the eighth push the oldest bytes out of the top, so the
/// result is always the low-order 64 bits of the big-endian number.
#[inline]
pub fn read_be_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

/// Accumulate bytes most-significant first into a `u32` (low-order 32 bits).
#[inline]
pub fn read_be_u32(bytes: &[u8]) -> u32 {
    read_be_u64(bytes) as u32
}

/// Accumulate bytes most-significant first into a `u16` (low-order 16 bits).
#[inline]
pub fn read_be_u16(bytes: &[u8]) -> u16 {
    read_be_u64(bytes) as u16
}

/// Accumulate bytes most-significant first into a `u128`.
///
/// Short payloads behave as if zero-padded on the left to 16 bytes.
#[inline]
pub fn read_be_u128(bytes: &[u8]) -> u128 {
    bytes.iter().fold(0u128, |acc, &b| (acc << 8) | u128::from(b))
}

/// Split a `u128` into its `(high, low)` 64-bit halves.
#[inline]
pub fn split_u128(value: u128) -> (u64, u64) {
    ((value >> 64) as u64, value as u64)
}

/// Read a 24-bit big-endian value from exactly three bytes.
#[inline]
pub fn read_be_u24(bytes: [u8; 3]) -> u32 {
    (u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2])
}

/// Split the shared middle byte of a 28-bit node into `(left, right)` nibbles.
#[inline]
pub fn split_nibbles(middle: u8) -> (u8, u8) {
    (middle >> 4, middle & 0x0F)
}

/// Extend a 24-bit value to 28 bits with a high nibble.
#[inline]
pub fn extend_with_nibble(nibble: u8, low24: u32) -> u32 {
    (u32::from(nibble & 0x0F) << 24) | (low24 & 0x00FF_FFFF)
}

/// Pack a path of single bits (0/1, most significant first) into 32-bit words.
///
/// A trailing partial word is left-aligned, so `[1]` packs to `0x8000_0000`.
pub fn pack_bits(path: &[u8]) -> Vec<u32> {
    let mut words = Vec::with_capacity(path.len().div_ceil(32));
    for chunk in path.chunks(32) {
        let mut word = chunk
            .iter()
            .fold(0u32, |acc, &bit| (acc << 1) | u32::from(bit & 1));
        if chunk.len() < 32 {
            word <<= 32 - chunk.len();
        }
        words.push(word);
    }
    words
}
