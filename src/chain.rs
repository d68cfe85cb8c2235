//! In-memory chain of mined headers
//!
//! Keeps mined headers in order, each one linked to its predecessor by hash.

use crate::header::{Header, Transaction};
use crate::miner::Miner;
use crate::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

/// Payload of the first block, with a value drawn from `seed`
pub fn genesis_payload(seed: u64) -> Transaction {
    let mut rng = StdRng::seed_from_u64(seed);
    Transaction::new("genesis", "genesis", rng.random::<f64>())
}

/// Ordered list of mined headers
#[derive(Debug)]
pub struct Blockchain {
    blocks: Vec<Header>,
    miner: Miner,
    difficulty_bits: u32,
}

impl Blockchain {
    /// Mine the genesis block and start a chain with it
    pub async fn new(miner: Miner, difficulty_bits: u32, genesis_seed: u64) -> Result<Self> {
        let payload = genesis_payload(genesis_seed);
        info!("Mining genesis block (seed {})", genesis_seed);

        let genesis = miner.mine(payload, Vec::new(), difficulty_bits).await?;
        Ok(Self {
            blocks: vec![genesis],
            miner,
            difficulty_bits,
        })
    }

    /// Mine a block carrying `payload` on top of the current tip
    pub async fn add_block(&mut self, payload: Transaction) -> Result<&Header> {
        let previous_hash = self.tip().hash().as_bytes().to_vec();
        let header = self
            .miner
            .mine(payload, previous_hash, self.difficulty_bits)
            .await?;

        self.blocks.push(header);
        info!("Chain height is now {}", self.blocks.len());
        Ok(self.tip())
    }

    /// All headers, genesis first
    pub fn blocks(&self) -> &[Header] {
        &self.blocks
    }

    /// Most recent header
    pub fn tip(&self) -> &Header {
        // A chain is never built without its genesis block
        &self.blocks[self.blocks.len() - 1]
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the chain holds no blocks
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Check every proof of work and every link between blocks
    pub fn verify(&self) -> Result<()> {
        verify_headers(&self.blocks, self.miner.params().hash_algorithm)
    }
}

/// Check a sequence of headers as a chain, genesis first
pub fn verify_headers(
    headers: &[Header],
    algorithm: crate::crypto::HashAlgorithm,
) -> Result<()> {
    let mut previous: Option<&Header> = None;
    for (height, header) in headers.iter().enumerate() {
        let expected_link: &[u8] = match previous {
            Some(parent) => parent.hash().as_bytes(),
            None => &[],
        };
        if header.previous_hash() != expected_link {
            return Err(Error::invalid_chain(
                height,
                "previous hash does not match the preceding block",
            ));
        }
        if !header.verify(algorithm)? {
            return Err(Error::invalid_chain(height, "proof of work does not hold"));
        }
        previous = Some(header);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::HashAlgorithm;
    use crate::pow::SearchParams;
    use assert_matches::assert_matches;

    fn miner() -> Miner {
        Miner::new(SearchParams {
            worker_count: 4,
            ..SearchParams::default()
        })
        .unwrap()
    }

    #[test]
    fn test_genesis_payload_is_seeded() {
        assert_eq!(genesis_payload(7), genesis_payload(7));
        assert_ne!(genesis_payload(7).value, genesis_payload(8).value);

        let payload = genesis_payload(42);
        assert_eq!(payload.sender, "genesis");
        assert!((0.0..1.0).contains(&payload.value));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_chain_links_blocks() {
        let mut chain = Blockchain::new(miner(), 8, 1).await.unwrap();
        assert_eq!(chain.len(), 1);
        assert!(chain.tip().previous_hash().is_empty());

        let genesis_hash = *chain.tip().hash();
        let tip = chain
            .add_block(Transaction::new("Alice", "Bob", 1.0))
            .await
            .unwrap();
        assert_eq!(tip.previous_hash(), genesis_hash.as_bytes());

        chain
            .add_block(Transaction::new("Bob", "Alice", 1.0))
            .await
            .unwrap();
        assert_eq!(chain.len(), 3);
        assert!(chain.verify().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_verify_detects_broken_links() {
        let mut chain = Blockchain::new(miner(), 4, 3).await.unwrap();
        chain
            .add_block(Transaction::new("Alice", "Bob", 1.0))
            .await
            .unwrap();

        let mut headers = chain.blocks().to_vec();
        headers.swap(0, 1);
        assert_matches!(
            verify_headers(&headers, HashAlgorithm::Sha256),
            Err(Error::InvalidChain { height: 0, .. })
        );

        // Same links, wrong hash function
        assert_matches!(
            verify_headers(chain.blocks(), HashAlgorithm::Blake2s),
            Err(Error::InvalidChain { height: 0, .. })
        );
    }
}
