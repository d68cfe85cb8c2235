//! Block headers and their canonical encoding
//!
//! A header is hashed as
//! `previous_hash ‖ payload ‖ hex(timestamp) ‖ hex(difficulty_bits) ‖ hex(nonce)`,
//! where `hex` is lowercase base-16 text without padding. Everything before the
//! nonce is fixed for one mining attempt, so it is encoded once into a
//! [`HeaderTemplate`] and shared by all workers.

use crate::crypto::{HashAlgorithm, HashEvaluator};
use crate::{Error, Hash256, Nonce, Result, Solution, Target};
use byteorder::{LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transfer record embedded in a block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub receiver: String,
    pub value: f64,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(sender: impl Into<String>, receiver: impl Into<String>, value: f64) -> Self {
        Self {
            sender: sender.into(),
            receiver: receiver.into(),
            value,
        }
    }

    /// Canonical byte form:
    /// `u32 LE len ‖ sender ‖ u32 LE len ‖ receiver ‖ f64 LE value`
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        if !self.value.is_finite() {
            return Err(Error::encoding(format!(
                "transaction value {} has no canonical form",
                self.value
            )));
        }

        let mut out = Vec::with_capacity(self.sender.len() + self.receiver.len() + 16);
        write_str(&mut out, "sender", &self.sender)?;
        write_str(&mut out, "receiver", &self.receiver)?;
        out.write_f64::<LittleEndian>(self.value)?;
        Ok(out)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {} ({:.6})", self.sender, self.receiver, self.value)
    }
}

fn write_str(out: &mut Vec<u8>, field: &str, value: &str) -> Result<()> {
    let len = u32::try_from(value.len())
        .map_err(|_| Error::encoding(format!("{} is longer than {} bytes", field, u32::MAX)))?;
    out.write_u32::<LittleEndian>(len)?;
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

/// Append the lowercase base-16 text of `value` without padding
fn push_hex(out: &mut Vec<u8>, value: u64) {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";

    let mut buf = [0u8; 16];
    let mut pos = buf.len();
    let mut rest = value;
    loop {
        pos -= 1;
        buf[pos] = DIGITS[(rest & 0xF) as usize];
        rest >>= 4;
        if rest == 0 {
            break;
        }
    }
    out.extend_from_slice(&buf[pos..]);
}

/// Signed variant of [`push_hex`]
fn push_hex_signed(out: &mut Vec<u8>, value: i64) {
    if value < 0 {
        out.push(b'-');
    }
    push_hex(out, value.unsigned_abs());
}

/// Encode a header candidate into the bytes that get hashed
pub fn encode(
    previous_hash: &[u8],
    payload: &Transaction,
    timestamp: i64,
    difficulty_bits: u32,
    nonce: Nonce,
) -> Result<Vec<u8>> {
    let template = HeaderTemplate::new(previous_hash, payload, timestamp, difficulty_bits)?;
    Ok(template.encode(nonce))
}

/// The nonce-independent prefix of an encoded header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTemplate {
    prefix: Vec<u8>,
}

impl HeaderTemplate {
    /// Longest text a nonce can append
    const MAX_NONCE_DIGITS: usize = 16;

    /// Encode everything but the nonce
    pub fn new(
        previous_hash: &[u8],
        payload: &Transaction,
        timestamp: i64,
        difficulty_bits: u32,
    ) -> Result<Self> {
        let payload = payload.to_canonical_bytes()?;

        let mut prefix = Vec::with_capacity(previous_hash.len() + payload.len() + 24);
        prefix.extend_from_slice(previous_hash);
        prefix.extend_from_slice(&payload);
        push_hex_signed(&mut prefix, timestamp);
        push_hex(&mut prefix, u64::from(difficulty_bits));
        Ok(Self { prefix })
    }

    /// Encoded bytes preceding the nonce
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Allocate a buffer sized for [`HeaderTemplate::encode_into`]
    pub fn buffer(&self) -> Vec<u8> {
        Vec::with_capacity(self.prefix.len() + Self::MAX_NONCE_DIGITS)
    }

    /// Encode the header with `nonce`, reusing `buf`
    pub fn encode_into(&self, nonce: Nonce, buf: &mut Vec<u8>) {
        buf.clear();
        buf.extend_from_slice(&self.prefix);
        push_hex(buf, nonce.value());
    }

    /// Encode the header with `nonce` into a fresh buffer
    pub fn encode(&self, nonce: Nonce) -> Vec<u8> {
        let mut buf = self.buffer();
        self.encode_into(nonce, &mut buf);
        buf
    }
}

/// A header awaiting its proof of work
///
/// Created with nonce 0 and no hash. Sealing consumes it, so a header can
/// receive its solution only once.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingHeader {
    timestamp: i64,
    payload: Transaction,
    previous_hash: Vec<u8>,
    difficulty_bits: u32,
}

impl PendingHeader {
    /// Create a header stamped with the current time
    pub fn new(payload: Transaction, previous_hash: Vec<u8>, difficulty_bits: u32) -> Self {
        Self::with_timestamp(
            payload,
            previous_hash,
            difficulty_bits,
            crate::utils::current_timestamp_secs(),
        )
    }

    /// Create a header with an explicit timestamp
    pub fn with_timestamp(
        payload: Transaction,
        previous_hash: Vec<u8>,
        difficulty_bits: u32,
        timestamp: i64,
    ) -> Self {
        Self {
            timestamp,
            payload,
            previous_hash,
            difficulty_bits,
        }
    }

    /// Seconds since the Unix epoch at creation
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Embedded payload
    pub fn payload(&self) -> &Transaction {
        &self.payload
    }

    /// Hash of the preceding block (empty for genesis)
    pub fn previous_hash(&self) -> &[u8] {
        &self.previous_hash
    }

    /// Required leading zero bits
    pub fn difficulty_bits(&self) -> u32 {
        self.difficulty_bits
    }

    /// Encode the nonce-independent part of this header
    pub fn template(&self) -> Result<HeaderTemplate> {
        HeaderTemplate::new(
            &self.previous_hash,
            &self.payload,
            self.timestamp,
            self.difficulty_bits,
        )
    }

    /// Attach the winning nonce and digest
    pub fn seal(self, solution: Solution) -> Header {
        Header {
            timestamp: self.timestamp,
            payload: self.payload,
            previous_hash: self.previous_hash,
            difficulty_bits: self.difficulty_bits,
            nonce: solution.nonce,
            hash: solution.hash,
        }
    }
}

/// A mined, immutable block header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    timestamp: i64,
    payload: Transaction,
    #[serde(with = "hex::serde")]
    previous_hash: Vec<u8>,
    difficulty_bits: u32,
    nonce: Nonce,
    hash: Hash256,
}

impl Header {
    /// Seconds since the Unix epoch at creation
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Embedded payload
    pub fn payload(&self) -> &Transaction {
        &self.payload
    }

    /// Hash of the preceding block (empty for genesis)
    pub fn previous_hash(&self) -> &[u8] {
        &self.previous_hash
    }

    /// Required leading zero bits
    pub fn difficulty_bits(&self) -> u32 {
        self.difficulty_bits
    }

    /// Winning nonce
    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    /// Digest of the header with the winning nonce
    pub fn hash(&self) -> &Hash256 {
        &self.hash
    }

    /// Recompute the digest and check it against the difficulty target
    pub fn verify(&self, algorithm: HashAlgorithm) -> Result<bool> {
        let target = Target::from_difficulty_bits(self.difficulty_bits)?;
        let bytes = encode(
            &self.previous_hash,
            &self.payload,
            self.timestamp,
            self.difficulty_bits,
            self.nonce,
        )?;
        let (hash, below) = HashEvaluator::new(algorithm).digest_below_target(&bytes, &target);
        Ok(below && hash == self.hash)
    }
}
