//! 128-bit structural hashes.
//!
//! A node hash is a fold over its components:
//!
//! ```text
//! h0 = 1
//! h' = h * 31 + component      (mod 2^128)
//! ```
//!
//! Components are folded in a fixed order (identity delegate, struct
//! delegate, value payload), so the result is order-sensitive. Component
//! digests are the leading 16 bytes of a SHA-256 over the component's
//! canonical bytes.
//!
//! Hashes arriving from outside a node (revision reconstruction, wire
//! formats) may be wider than 128 bits; [`Hash128::normalize`] clamps them to
//! the low-order 128 bits of their big-endian form.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const HASH_SEED: u128 = 1;
pub const HASH_MULTIPLIER: u128 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Hash128(u128);

impl Hash128 {
    pub const SEED: Hash128 = Hash128(HASH_SEED);

    pub const fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u128 {
        self.0
    }

    pub fn to_be_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    /// `self * 31 + component`, wrapping at 128 bits.
    #[must_use]
    pub fn fold(self, component: Hash128) -> Self {
        Self(
            self.0
                .wrapping_mul(HASH_MULTIPLIER)
                .wrapping_add(component.0),
        )
    }

    /// Clamp a big-endian unsigned integer of any width to 128 bits.
    pub fn normalize(wide: &[u8]) -> Self {
        let start = wide.len().saturating_sub(16);
        let mut buf = [0u8; 16];
        let tail = &wide[start..];
        buf[16 - tail.len()..].copy_from_slice(tail);
        Self(u128::from_be_bytes(buf))
    }

    /// Digest of raw bytes.
    pub fn digest(bytes: &[u8]) -> Self {
        let mut hasher = ComponentHasher::new();
        hasher.write_bytes(bytes);
        hasher.finish()
    }
}

impl From<u128> for Hash128 {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for Hash128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid 128-bit hash literal `{0}`")]
pub struct InvalidHash(String);

impl FromStr for Hash128 {
    type Err = InvalidHash;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| InvalidHash(s.to_string()))
    }
}

impl From<Hash128> for String {
    fn from(value: Hash128) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for Hash128 {
    type Error = InvalidHash;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A hash value of arbitrary width, as handed to `set_hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideHash(Vec<u8>);

impl WideHash {
    pub fn from_be_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn normalize(&self) -> Hash128 {
        Hash128::normalize(&self.0)
    }
}

impl From<Hash128> for WideHash {
    fn from(value: Hash128) -> Self {
        Self(value.to_be_bytes().to_vec())
    }
}

impl From<u128> for WideHash {
    fn from(value: u128) -> Self {
        Self(value.to_be_bytes().to_vec())
    }
}

impl From<&[u8]> for WideHash {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

/// Fold `components` into the seed, in order.
pub fn fold_components(components: impl IntoIterator<Item = Hash128>) -> Hash128 {
    components
        .into_iter()
        .fold(Hash128::SEED, |acc, c| acc.fold(c))
}

/// Incremental digest for one hash component.
///
/// Integers are written big-endian and strings are length-prefixed so that
/// adjacent fields cannot run into each other.
pub struct ComponentHasher(Sha256);

impl ComponentHasher {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn write_u8(&mut self, v: u8) {
        self.0.update([v]);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.0.update(v.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_u64(bytes.len() as u64);
        self.0.update(bytes);
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    pub fn finish(self) -> Hash128 {
        let digest = self.0.finalize();
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&digest[..16]);
        Hash128(u128::from_be_bytes(buf))
    }
}

impl Default for ComponentHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_matches_the_multiplier_law() {
        let h = Hash128::SEED.fold(Hash128::new(5)).fold(Hash128::new(7));
        assert_eq!(h.raw(), (31 + 5) * 31 + 7);
    }

    #[test]
    fn fold_wraps_instead_of_overflowing() {
        let h = Hash128::new(u128::MAX).fold(Hash128::new(1));
        assert_eq!(h.raw(), u128::MAX.wrapping_mul(31).wrapping_add(1));
    }

    #[test]
    fn normalize_keeps_low_order_bits() {
        let mut wide = vec![0xAB, 0xCD];
        wide.extend_from_slice(&42u128.to_be_bytes());
        assert_eq!(Hash128::normalize(&wide), Hash128::new(42));
        assert_eq!(Hash128::normalize(&[1, 0]), Hash128::new(256));
        assert_eq!(Hash128::normalize(&[]), Hash128::new(0));
    }

    #[test]
    fn serde_uses_hex_strings() {
        let h = Hash128::new(0xff);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{:032x}\"", 0xff));
        let back: Hash128 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
