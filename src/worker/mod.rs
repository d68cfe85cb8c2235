//! Nonce search workers
//!
//! Splits the nonce space into per-worker ranges and provides the single-use
//! slot through which workers race to deliver a solution.

use crate::{Error, Result, SearchRange, Solution};
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use tracing::Span;

pub mod cpu;

pub use cpu::CpuWorker;

/// Largest supported worker count (tokio's default blocking pool size)
pub const MAX_WORKERS: usize = 512;

/// How a worker's search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Found a solution and won the race to deliver it
    Solved(Solution),
    /// Found a solution after another worker had already won
    Lost,
    /// Observed cancellation before finishing its range
    Cancelled,
    /// Tried every nonce in its range without success
    Exhausted,
}

impl WorkerOutcome {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            WorkerOutcome::Solved(_) => "solved",
            WorkerOutcome::Lost => "lost",
            WorkerOutcome::Cancelled => "cancelled",
            WorkerOutcome::Exhausted => "exhausted",
        }
    }
}

/// Holds the one accepted solution of a mining attempt
///
/// The first successful [`SolutionSlot::offer`] stores the solution and fires
/// the cancellation token; every later offer is dropped and returns `false`.
#[derive(Debug)]
pub struct SolutionSlot {
    winner: OnceLock<Solution>,
    cancellation: CancellationToken,
}

impl SolutionSlot {
    /// Create an empty slot that cancels `cancellation` once filled
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            winner: OnceLock::new(),
            cancellation,
        }
    }

    /// Try to deliver a solution; returns whether it was accepted
    pub fn offer(&self, solution: Solution) -> bool {
        if self.winner.set(solution).is_ok() {
            self.cancellation.cancel();
            true
        } else {
            false
        }
    }

    /// The accepted solution, if any
    pub fn winner(&self) -> Option<Solution> {
        self.winner.get().copied()
    }

    /// Token fired when the slot is filled
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Split `[0, max_nonce)` into `worker_count` contiguous ranges
///
/// Every range holds `max_nonce / worker_count` nonces except the last, which
/// also takes the remainder so the ranges cover the whole space.
pub fn partition(max_nonce: u64, worker_count: usize) -> Result<Vec<SearchRange>> {
    if worker_count == 0 || worker_count > MAX_WORKERS {
        return Err(Error::config(format!(
            "Worker count must be between 1 and {}, got {}",
            MAX_WORKERS, worker_count
        )));
    }

    let count = worker_count as u64;
    let share = max_nonce / count;
    let ranges = (0..count)
        .map(|index| {
            let start = index * share;
            let end = if index + 1 == count {
                max_nonce
            } else {
                start + share
            };
            SearchRange::new(start, end)
        })
        .collect();

    Ok(ranges)
}

/// Create a tracing span for a single worker
pub fn worker_span(worker_id: usize, range: SearchRange) -> Span {
    tracing::debug_span!(
        "worker",
        worker_id = worker_id,
        range = %range,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Hash256, Nonce};
    use proptest::prelude::*;

    fn solution(nonce: u64) -> Solution {
        Solution::new(Nonce::new(nonce), Hash256::default())
    }

    #[test]
    fn test_partition_absorbs_remainder() {
        let ranges = partition(10, 3).unwrap();
        assert_eq!(
            ranges,
            vec![
                SearchRange::new(0, 3),
                SearchRange::new(3, 6),
                SearchRange::new(6, 10),
            ]
        );
    }

    #[test]
    fn test_partition_more_workers_than_nonces() {
        let ranges = partition(2, 4).unwrap();
        assert_eq!(ranges.len(), 4);
        assert!(ranges[..3].iter().all(SearchRange::is_empty));
        assert_eq!(ranges[3], SearchRange::new(0, 2));
    }

    #[test]
    fn test_partition_rejects_bad_worker_count() {
        assert!(matches!(partition(100, 0), Err(Error::Config { .. })));
        assert!(matches!(
            partition(100, MAX_WORKERS + 1),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_partition_full_space() {
        let ranges = partition(crate::MAX_NONCE, 10).unwrap();
        assert_eq!(ranges.first().unwrap().start, 0);
        assert_eq!(ranges.last().unwrap().end, crate::MAX_NONCE);
    }

    proptest! {
        #[test]
        fn partition_covers_space_without_gaps(
            max_nonce in 0u64..=u64::MAX,
            worker_count in 1usize..=64,
        ) {
            let ranges = partition(max_nonce, worker_count).unwrap();
            prop_assert_eq!(ranges.len(), worker_count);
            prop_assert_eq!(ranges[0].start, 0);
            prop_assert_eq!(ranges[worker_count - 1].end, max_nonce);
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
            let total: u128 = ranges.iter().map(|r| r.len() as u128).sum();
            prop_assert_eq!(total, max_nonce as u128);
        }
    }

    #[test]
    fn test_slot_accepts_first_offer_only() {
        let token = CancellationToken::new();
        let slot = SolutionSlot::new(token.clone());
        assert!(slot.winner().is_none());
        assert!(!token.is_cancelled());

        assert!(slot.offer(solution(1)));
        assert!(token.is_cancelled());

        assert!(!slot.offer(solution(2)));
        assert_eq!(slot.winner(), Some(solution(1)));
    }

    #[test]
    fn test_slot_concurrent_offers() {
        let slot = SolutionSlot::new(CancellationToken::new());

        let accepted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let slot = &slot;
                    scope.spawn(move || slot.offer(solution(i)))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as usize)
                .sum()
        });

        assert_eq!(accepted, 1);
        assert!(slot.winner().is_some());
        assert!(slot.cancellation().is_cancelled());
    }

    #[test]
    fn test_worker_outcome_name() {
        assert_eq!(WorkerOutcome::Solved(solution(0)).name(), "solved");
        assert_eq!(WorkerOutcome::Exhausted.name(), "exhausted");
    }
}
