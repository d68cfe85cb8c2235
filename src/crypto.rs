//! Header hashing for mining
//!
//! Provides the 256-bit digest of an encoded header and the comparison against
//! a mining target. Evaluation holds no state between calls, so one evaluator
//! can be copied into every worker.

use crate::{Hash256, Target};
use blake2::Blake2s256;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hash functions a header can be mined with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256
    #[default]
    Sha256,
    /// Blake2s-256
    Blake2s,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::Blake2s => write!(f, "blake2s"),
        }
    }
}

/// Computes header digests and checks them against a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HashEvaluator {
    algorithm: HashAlgorithm,
}

impl HashEvaluator {
    /// Create an evaluator for the given hash function
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Hash data and return the digest
    pub fn digest(&self, data: &[u8]) -> Hash256 {
        let bytes: [u8; 32] = match self.algorithm {
            HashAlgorithm::Sha256 => Sha256::digest(data).into(),
            HashAlgorithm::Blake2s => Blake2s256::digest(data).into(),
        };
        Hash256::new(bytes)
    }

    /// Hash data and check it against the target
    ///
    /// Returns the digest together with whether it is strictly below `target`
    /// when read as a big-endian integer.
    pub fn digest_below_target(&self, data: &[u8], target: &Target) -> (Hash256, bool) {
        let hash = self.digest(data);
        let below = target.is_met_by(&hash);
        (hash, below)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let evaluator = HashEvaluator::new(HashAlgorithm::Sha256);
        assert_eq!(
            evaluator.digest(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_is_deterministic() {
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Blake2s] {
            let evaluator = HashEvaluator::new(algorithm);
            let data = b"test data";
            assert_eq!(evaluator.digest(data), evaluator.digest(data));
            assert_ne!(evaluator.digest(data), evaluator.digest(b"different data"));
        }
    }

    #[test]
    fn test_algorithms_differ() {
        let sha = HashEvaluator::new(HashAlgorithm::Sha256).digest(b"header");
        let blake = HashEvaluator::new(HashAlgorithm::Blake2s).digest(b"header");
        assert_ne!(sha, blake);
    }

    #[test]
    fn test_digest_below_target() {
        let evaluator = HashEvaluator::default();
        let data = b"test data";

        // 2^255 accepts every digest whose top bit is clear
        let easiest = Target::from_difficulty_bits(1).unwrap();
        let (hash, below) = evaluator.digest_below_target(data, &easiest);
        assert_eq!(below, hash.as_bytes()[0] < 0x80);

        // A target of 1 only accepts the all-zero digest
        let hardest = Target::from_difficulty_bits(256).unwrap();
        let (_, below) = evaluator.digest_below_target(data, &hardest);
        assert!(!below);
    }

    #[test]
    fn test_hash_algorithm_display() {
        assert_eq!(HashAlgorithm::Sha256.to_string(), "sha256");
        assert_eq!(HashAlgorithm::Blake2s.to_string(), "blake2s");
        assert_eq!(HashAlgorithm::default(), HashAlgorithm::Sha256);
    }
}
