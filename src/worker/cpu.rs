//! CPU nonce search over a single range
//!
//! Each worker walks its range in ascending order on a blocking thread,
//! checking the cancellation token before every hash.

use super::{worker_span, SolutionSlot, WorkerOutcome};
use crate::crypto::HashEvaluator;
use crate::header::HeaderTemplate;
use crate::{Nonce, SearchRange, Solution, Target};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Hashes counted locally before being added to the shared counter
const HASH_FLUSH_INTERVAL: u64 = 4096;

/// Searches one nonce range for a digest below the target
pub struct CpuWorker {
    id: usize,
    range: SearchRange,
    template: Arc<HeaderTemplate>,
    target: Target,
    evaluator: HashEvaluator,
    slot: Arc<SolutionSlot>,
    cancellation: CancellationToken,
    hashes: Arc<AtomicU64>,
}

impl CpuWorker {
    /// Create a worker for `range`
    ///
    /// The template, slot and hash counter are shared by every worker of the
    /// same attempt.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        range: SearchRange,
        template: Arc<HeaderTemplate>,
        target: Target,
        evaluator: HashEvaluator,
        slot: Arc<SolutionSlot>,
        cancellation: CancellationToken,
        hashes: Arc<AtomicU64>,
    ) -> Self {
        Self {
            id,
            range,
            template,
            target,
            evaluator,
            slot,
            cancellation,
            hashes,
        }
    }

    /// Run the search to completion
    ///
    /// Blocks the calling thread; run it on a blocking pool.
    pub fn search(self) -> WorkerOutcome {
        let span = worker_span(self.id, self.range);
        let _enter = span.enter();
        debug!("Worker {} starting on {}", self.id, self.range);

        let mut buf = self.template.buffer();
        let mut pending_hashes = 0u64;

        let outcome = 'search: {
            for nonce in self.range.nonces() {
                if self.cancellation.is_cancelled() {
                    break 'search WorkerOutcome::Cancelled;
                }

                self.template.encode_into(nonce, &mut buf);
                let (hash, below) = self.evaluator.digest_below_target(&buf, &self.target);

                pending_hashes += 1;
                if pending_hashes == HASH_FLUSH_INTERVAL {
                    self.hashes.fetch_add(pending_hashes, Ordering::Relaxed);
                    pending_hashes = 0;
                }

                if below {
                    break 'search self.deliver(Solution::new(nonce, hash));
                }
            }
            WorkerOutcome::Exhausted
        };

        self.hashes.fetch_add(pending_hashes, Ordering::Relaxed);
        debug!("Worker {} finished: {}", self.id, outcome.name());
        outcome
    }

    fn deliver(&self, solution: Solution) -> WorkerOutcome {
        if self.slot.offer(solution) {
            info!(
                "Solution found by worker {} with nonce {}",
                self.id, solution.nonce
            );
            WorkerOutcome::Solved(solution)
        } else {
            debug!(
                "Worker {} found nonce {} after the race was decided",
                self.id, solution.nonce
            );
            WorkerOutcome::Lost
        }
    }
}

/// Convenience for tests and benchmarks: first nonce of `range` below `target`
pub fn scan_range(
    template: &HeaderTemplate,
    target: &Target,
    evaluator: HashEvaluator,
    range: SearchRange,
) -> Option<Solution> {
    let mut buf = template.buffer();
    range.nonces().find_map(|nonce: Nonce| {
        template.encode_into(nonce, &mut buf);
        let (hash, below) = evaluator.digest_below_target(&buf, target);
        below.then(|| Solution::new(nonce, hash))
    })
}
