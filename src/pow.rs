//! Proof-of-work search coordinator
//!
//! [`ProofOfWork`] splits the nonce space across workers, runs them on the
//! blocking pool and returns the first solution any of them delivers. The
//! attempt moves through [`MiningState`]: `Idle -> Searching -> Solved` or
//! `Exhausted`. Outside stops end in `Cancelled` or `TimedOut`, and a worker
//! that dies before any solution is found ends the attempt in `Failed`.

use crate::crypto::{HashAlgorithm, HashEvaluator};
use crate::header::PendingHeader;
use crate::utils::{compute_hash_rate, format_duration, format_hash_rate};
use crate::worker::{partition, CpuWorker, SolutionSlot, WorkerOutcome, MAX_WORKERS};
use crate::{Error, Result, Solution, Target, MAX_NONCE};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Parameters of a nonce search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Number of parallel workers
    pub worker_count: usize,
    /// Exclusive upper bound of the nonce space
    pub max_nonce: u64,
    /// Hash function applied to encoded headers
    pub hash_algorithm: HashAlgorithm,
    /// Give up after this long
    pub timeout: Option<Duration>,
    /// Interval between progress log lines
    pub progress_interval: Duration,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            worker_count: 10,
            max_nonce: MAX_NONCE,
            hash_algorithm: HashAlgorithm::Sha256,
            timeout: None,
            progress_interval: Duration::from_secs(5),
        }
    }
}

impl SearchParams {
    /// Validate parameters before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 || self.worker_count > MAX_WORKERS {
            return Err(Error::config(format!(
                "Worker count must be between 1 and {}, got {}",
                MAX_WORKERS, self.worker_count
            )));
        }
        if self.max_nonce == 0 {
            return Err(Error::config("Nonce space must not be empty"));
        }
        if self.progress_interval.is_zero() {
            return Err(Error::config("Progress interval must be greater than 0"));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::config("Timeout must be greater than 0"));
        }
        Ok(())
    }
}

/// Lifecycle of one mining attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiningState {
    Idle,
    Searching,
    Solved(Solution),
    Exhausted,
    Cancelled,
    TimedOut,
    Failed,
}

impl MiningState {
    /// Check if the attempt has finished
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MiningState::Idle | MiningState::Searching)
    }
}

impl fmt::Display for MiningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningState::Idle => write!(f, "idle"),
            MiningState::Searching => write!(f, "searching"),
            MiningState::Solved(_) => write!(f, "solved"),
            MiningState::Exhausted => write!(f, "exhausted"),
            MiningState::Cancelled => write!(f, "cancelled"),
            MiningState::TimedOut => write!(f, "timed-out"),
            MiningState::Failed => write!(f, "failed"),
        }
    }
}

/// Coordinates one proof-of-work attempt
///
/// `run` consumes the engine, so each attempt starts from a fresh state.
pub struct ProofOfWork {
    params: SearchParams,
    state: watch::Sender<MiningState>,
}

impl ProofOfWork {
    /// Create an idle engine after validating `params`
    pub fn new(params: SearchParams) -> Result<Self> {
        params.validate()?;
        let (state, _) = watch::channel(MiningState::Idle);
        Ok(Self { params, state })
    }

    /// Parameters of this engine
    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Observe state transitions of this attempt
    pub fn subscribe(&self) -> watch::Receiver<MiningState> {
        self.state.subscribe()
    }

    /// Search for a nonce that puts the header's digest below its target
    pub async fn run(self, header: &PendingHeader) -> Result<Solution> {
        self.run_until_cancelled(header, &CancellationToken::new())
            .await
    }

    /// Like [`ProofOfWork::run`], but also stops when `parent` is cancelled
    pub async fn run_until_cancelled(
        self,
        header: &PendingHeader,
        parent: &CancellationToken,
    ) -> Result<Solution> {
        let span = tracing::info_span!(
            "mining",
            difficulty_bits = header.difficulty_bits(),
            workers = self.params.worker_count,
        );
        self.search(header, parent).instrument(span).await
    }

    async fn search(self, header: &PendingHeader, parent: &CancellationToken) -> Result<Solution> {
        let target = Target::from_difficulty_bits(header.difficulty_bits())?;
        let template = Arc::new(header.template()?);
        let ranges = partition(self.params.max_nonce, self.params.worker_count)?;
        let evaluator = HashEvaluator::new(self.params.hash_algorithm);

        info!(
            "Starting search with {} workers over {} nonces (target {}, {})",
            ranges.len(),
            self.params.max_nonce,
            target,
            self.params.hash_algorithm
        );
        self.state.send_replace(MiningState::Searching);

        let cancellation = parent.child_token();
        let slot = Arc::new(SolutionSlot::new(cancellation.clone()));
        let hashes = Arc::new(AtomicU64::new(0));
        let started = Instant::now();

        let mut workers = JoinSet::new();
        for (id, range) in ranges.into_iter().enumerate() {
            let worker = CpuWorker::new(
                id,
                range,
                Arc::clone(&template),
                target,
                evaluator,
                Arc::clone(&slot),
                cancellation.clone(),
                Arc::clone(&hashes),
            );
            workers.spawn_blocking(move || (id, worker.search()));
        }

        let progress = tokio::spawn(
            report_progress(
                Arc::clone(&hashes),
                cancellation.clone(),
                self.params.progress_interval,
            )
            .in_current_span(),
        );

        let drained = drain_workers(workers);
        let failure = match self.params.timeout {
            Some(limit) => {
                tokio::select! {
                    _ = cancellation.cancelled() => None,
                    failure = drained => failure,
                    _ = tokio::time::sleep(limit) => {
                        Some(Error::timeout(format!("mining after {}", format_duration(limit))))
                    }
                }
            }
            None => {
                tokio::select! {
                    _ = cancellation.cancelled() => None,
                    failure = drained => failure,
                }
            }
        };

        // Stop stragglers and the progress ticker; they are not awaited
        cancellation.cancel();
        progress.abort();

        let searched = hashes.load(Ordering::Relaxed);
        let elapsed = started.elapsed();
        let outcome = self.finish(slot.winner(), failure, parent, searched);

        info!(
            "Search finished ({}) after {} hashes in {} ({})",
            *self.state.borrow(),
            searched,
            format_duration(elapsed),
            format_hash_rate(compute_hash_rate(searched, elapsed))
        );
        outcome
    }

    fn finish(
        &self,
        winner: Option<Solution>,
        failure: Option<Error>,
        parent: &CancellationToken,
        searched: u64,
    ) -> Result<Solution> {
        let (state, outcome) = match (winner, failure) {
            (Some(solution), _) => (MiningState::Solved(solution), Ok(solution)),
            (None, Some(err @ Error::Timeout { .. })) => (MiningState::TimedOut, Err(err)),
            (None, Some(err)) => (MiningState::Failed, Err(err)),
            (None, None) if parent.is_cancelled() => (
                MiningState::Cancelled,
                Err(Error::cancelled("proof-of-work search")),
            ),
            (None, None) => {
                warn!("All workers exhausted their ranges without a solution");
                (MiningState::Exhausted, Err(Error::search_exhausted(searched)))
            }
        };
        self.state.send_replace(state);
        outcome
    }
}

/// Wait for every worker; returns the first failure, if any
async fn drain_workers(mut workers: JoinSet<(usize, WorkerOutcome)>) -> Option<Error> {
    let mut failure = None;
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((id, outcome)) => debug!("Worker {} reported {}", id, outcome.name()),
            Err(e) => {
                warn!("Worker task failed: {}", e);
                failure.get_or_insert_with(|| Error::worker(e.to_string()));
            }
        }
    }
    failure
}

/// Log the hash rate at a fixed interval until cancelled
async fn report_progress(
    hashes: Arc<AtomicU64>,
    cancellation: CancellationToken,
    every: Duration,
) {
    let started = Instant::now();
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let total = hashes.load(Ordering::Relaxed);
                debug!(
                    "Searched {} nonces at {}",
                    total,
                    format_hash_rate(compute_hash_rate(total, started.elapsed()))
                );
            }
            _ = cancellation.cancelled() => break,
        }
    }
}
