//! Core types for proof-of-work mining
//!
//! Fundamental value types shared by the encoder, the hash evaluator and the
//! search coordinator.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exclusive upper bound of the default nonce space
pub const MAX_NONCE: u64 = i64::MAX as u64;

/// Size of a digest and of a target in bytes
pub const HASH_SIZE: usize = 32;

/// Mining target: a digest is valid when it is strictly below this value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Target {
    /// 256-bit value, big-endian
    bytes: [u8; HASH_SIZE],
}

impl Target {
    /// Target for a difficulty of `bits` leading zero bits: `2^(256 - bits)`
    pub fn from_difficulty_bits(bits: u32) -> Result<Self> {
        if bits == 0 || bits > 256 {
            return Err(Error::invalid_difficulty(bits));
        }

        let shift = (256 - bits) as usize;
        let mut bytes = [0u8; HASH_SIZE];
        bytes[HASH_SIZE - 1 - shift / 8] = 1 << (shift % 8);
        Ok(Self { bytes })
    }

    /// Get the target as big-endian bytes
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.bytes
    }

    /// Check if a digest is strictly below this target
    pub fn is_met_by(&self, hash: &Hash256) -> bool {
        // Byte arrays order lexicographically, which is big-endian numeric order
        hash.as_bytes() < &self.bytes
    }

    /// Number of leading zero bits of the target value
    pub fn leading_zeros(&self) -> u32 {
        let mut zeros = 0;
        for byte in self.bytes {
            if byte != 0 {
                return zeros + byte.leading_zeros();
            }
            zeros += 8;
        }
        zeros
    }

    /// Convert to hexadecimal string (big-endian)
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::config(format!("Invalid hex in target: {}", e)))?;
        let bytes: [u8; HASH_SIZE] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            Error::config(format!(
                "Invalid target length: expected {} bytes, got {}",
                HASH_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// 256-bit header digest
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash256([u8; HASH_SIZE]);

impl Hash256 {
    /// Wrap raw digest bytes
    pub fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the digest bytes
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Create from hexadecimal string
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| Error::encoding(format!("Invalid hex in digest: {}", e)))?;
        let bytes: [u8; HASH_SIZE] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            Error::encoding(format!(
                "Invalid digest length: expected {} bytes, got {}",
                HASH_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash256 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash256::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Proof-of-work nonce
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Nonce(pub u64);

impl Nonce {
    /// Create a new nonce
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the nonce value
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Nonce {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Half-open interval `[start, end)` of candidate nonces owned by one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRange {
    pub start: u64,
    pub end: u64,
}

impl SearchRange {
    /// Create a new range; an inverted range is treated as empty
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Number of nonces in the range
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Check if the range holds no nonces
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if the range holds `nonce`
    pub fn contains(&self, nonce: Nonce) -> bool {
        (self.start..self.end).contains(&nonce.value())
    }

    /// Iterate over the nonces of the range in ascending order
    pub fn nonces(&self) -> impl Iterator<Item = Nonce> {
        (self.start..self.end).map(Nonce::new)
    }
}

impl fmt::Display for SearchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A winning nonce together with the digest it produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub nonce: Nonce,
    pub hash: Hash256,
}

impl Solution {
    /// Create a new solution
    pub fn new(nonce: Nonce, hash: Hash256) -> Self {
        Self { nonce, hash }
    }
}
