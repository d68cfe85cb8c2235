//! Integration tests for the complete mining flow

use assert_matches::assert_matches;
use powchain_miner::{
    chain::verify_headers,
    header::encode,
    worker::partition,
    Blockchain, Error, HashAlgorithm, HashEvaluator, Miner, MiningState, Nonce, PendingHeader,
    ProofOfWork, SearchParams, Target, Transaction,
};
use proptest::prelude::*;
use std::time::Duration;

fn params(worker_count: usize) -> SearchParams {
    SearchParams {
        worker_count,
        ..SearchParams::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_alice_to_bob_block() {
    let miner = Miner::new(params(4)).unwrap();
    let payload = Transaction::new("Alice", "Bob", 1.0);

    let header = tokio::time::timeout(
        Duration::from_secs(30),
        miner.mine(payload.clone(), vec![0u8; 32], 8),
    )
    .await
    .expect("Mining timeout")
    .unwrap();

    assert_eq!(header.hash().as_bytes()[0], 0x00);
    assert_eq!(header.payload(), &payload);

    // Re-encoding the sealed header reproduces its hash
    let bytes = encode(
        header.previous_hash(),
        header.payload(),
        header.timestamp(),
        header.difficulty_bits(),
        header.nonce(),
    )
    .unwrap();
    assert_eq!(&HashEvaluator::default().digest(&bytes), header.hash());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_exhaustion_is_reported() {
    let pow = ProofOfWork::new(SearchParams {
        worker_count: 4,
        max_nonce: 64,
        ..SearchParams::default()
    })
    .unwrap();
    let state = pow.subscribe();

    let pending = PendingHeader::with_timestamp(
        Transaction::new("Alice", "Bob", 1.0),
        Vec::new(),
        256,
        1_700_000_000,
    );
    let result = pow.run(&pending).await;

    assert_matches!(result, Err(Error::SearchExhausted { searched: 64 }));
    assert_eq!(*state.borrow(), MiningState::Exhausted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_stops_search() {
    let pow = ProofOfWork::new(SearchParams {
        worker_count: 2,
        timeout: Some(Duration::from_millis(100)),
        ..SearchParams::default()
    })
    .unwrap();

    let pending = PendingHeader::new(Transaction::new("Alice", "Bob", 1.0), Vec::new(), 256);
    let result = pow.run(&pending).await;
    assert_matches!(result, Err(Error::Timeout { .. }));
}

#[test]
fn test_blocking_mine_block() {
    let miner = Miner::new(params(3)).unwrap();
    let header = miner
        .mine_block(Transaction::new("Bob", "Alice", 1.0), vec![0u8; 32], 6)
        .unwrap();

    let target = Target::from_difficulty_bits(6).unwrap();
    assert!(target.is_met_by(header.hash()));
    assert!(header.verify(HashAlgorithm::Sha256).unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_demo_chain_verifies() {
    let miner = Miner::new(params(4)).unwrap();
    let mut chain = Blockchain::new(miner, 8, 2024).await.unwrap();
    chain
        .add_block(Transaction::new("Alice", "Bob", 1.0))
        .await
        .unwrap();
    chain
        .add_block(Transaction::new("Bob", "Alice", 1.0))
        .await
        .unwrap();

    assert_eq!(chain.len(), 3);
    assert!(chain.verify().is_ok());

    let blocks = chain.blocks();
    assert!(blocks[0].previous_hash().is_empty());
    assert_eq!(blocks[1].previous_hash(), blocks[0].hash().as_bytes());
    assert_eq!(blocks[2].previous_hash(), blocks[1].hash().as_bytes());

    // Dropping a middle block breaks the link
    let broken = vec![blocks[0].clone(), blocks[2].clone()];
    assert_matches!(
        verify_headers(&broken, HashAlgorithm::Sha256),
        Err(Error::InvalidChain { height: 1, .. })
    );
}

#[test]
fn test_targets_strictly_decrease() {
    let mut previous = Target::from_difficulty_bits(1).unwrap();
    for bits in 2..=256 {
        let target = Target::from_difficulty_bits(bits).unwrap();
        assert!(target < previous, "target for {} bits not smaller", bits);
        previous = target;
    }
    assert_matches!(
        Target::from_difficulty_bits(0),
        Err(Error::InvalidDifficulty { bits: 0 })
    );
    assert_matches!(
        Target::from_difficulty_bits(257),
        Err(Error::InvalidDifficulty { bits: 257 })
    );
}

proptest! {
    #[test]
    fn prop_partition_covers_nonce_space(max_nonce in 1u64..1_000_000, workers in 1usize..64) {
        let ranges = partition(max_nonce, workers).unwrap();
        prop_assert_eq!(ranges.len(), workers);
        prop_assert_eq!(ranges[0].start, 0);
        prop_assert_eq!(ranges[workers - 1].end, max_nonce);
        for pair in ranges.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn prop_encoding_is_deterministic(
        sender in "[a-zA-Z]{0,16}",
        value in -1.0e9f64..1.0e9,
        timestamp in any::<i64>(),
        nonce in 0u64..u64::MAX,
    ) {
        let payload = Transaction::new(sender, "Bob", value);
        let first = encode(&[7u8; 32], &payload, timestamp, 24, Nonce::new(nonce)).unwrap();
        let second = encode(&[7u8; 32], &payload, timestamp, 24, Nonce::new(nonce)).unwrap();
        prop_assert_eq!(&first, &second);

        let other = encode(&[7u8; 32], &payload, timestamp, 24, Nonce::new(nonce ^ 1)).unwrap();
        prop_assert_ne!(first, other);
    }
}
