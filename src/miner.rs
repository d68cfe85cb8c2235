//! Block mining facade
//!
//! Turns a payload and the previous block hash into a sealed [`Header`].

use crate::header::{Header, PendingHeader, Transaction};
use crate::pow::{ProofOfWork, SearchParams};
use crate::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Mines block headers with a fixed set of search parameters
#[derive(Debug, Clone, Default)]
pub struct Miner {
    params: SearchParams,
}

impl Miner {
    /// Create a miner after validating `params`
    pub fn new(params: SearchParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Search parameters used for every block
    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Mine a header carrying `payload` on top of `previous_hash`
    pub async fn mine(
        &self,
        payload: Transaction,
        previous_hash: Vec<u8>,
        difficulty_bits: u32,
    ) -> Result<Header> {
        let cancellation = CancellationToken::new();
        self.mine_until_cancelled(payload, previous_hash, difficulty_bits, &cancellation)
            .await
    }

    /// Like [`Miner::mine`], but gives up when `cancellation` fires
    pub async fn mine_until_cancelled(
        &self,
        payload: Transaction,
        previous_hash: Vec<u8>,
        difficulty_bits: u32,
        cancellation: &CancellationToken,
    ) -> Result<Header> {
        let pending = PendingHeader::new(payload, previous_hash, difficulty_bits);
        self.seal(pending, cancellation).await
    }

    /// Run the proof of work for an already stamped header
    pub async fn seal(
        &self,
        pending: PendingHeader,
        cancellation: &CancellationToken,
    ) -> Result<Header> {
        let pow = ProofOfWork::new(self.params.clone())?;
        let solution = pow.run_until_cancelled(&pending, cancellation).await?;

        let header = pending.seal(solution);
        info!(
            "Mined block {} with nonce {}",
            header.hash(),
            header.nonce()
        );
        Ok(header)
    }

    /// Blocking variant of [`Miner::mine`]
    ///
    /// Runs the search on a private runtime and shuts it down before
    /// returning, so no worker outlives the call. Fails with
    /// [`Error::InvalidState`] when called from within an async runtime.
    pub fn mine_block(
        &self,
        payload: Transaction,
        previous_hash: Vec<u8>,
        difficulty_bits: u32,
    ) -> Result<Header> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(Error::invalid_state(
                "mine_block cannot run inside an async runtime, use Miner::mine",
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .thread_name("powchain-miner")
            .max_blocking_threads(self.params.worker_count)
            .build()?;

        let result = runtime.block_on(self.mine(payload, previous_hash, difficulty_bits));
        // Waits for blocking workers, which stop once the token has fired
        drop(runtime);
        result
    }
}
