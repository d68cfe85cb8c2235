//! Powchain Miner
//!
//! A parallel proof-of-work miner for a small hash-linked chain:
//! - Difficulty targets expressed as required leading zero bits
//! - Nonce space split into disjoint ranges searched by blocking workers
//! - First solution wins and cancels every other worker
//! - Cancellation, timeouts and exhaustion reported as typed errors

pub mod chain;
pub mod config;
pub mod crypto;
pub mod error;
pub mod header;
pub mod miner;
pub mod pow;
pub mod types;
pub mod utils;
pub mod worker;

pub use chain::Blockchain;
pub use config::Config;
pub use crypto::{HashAlgorithm, HashEvaluator};
pub use error::{Error, Result};
pub use header::{Header, HeaderTemplate, PendingHeader, Transaction};
pub use miner::Miner;
pub use pow::{MiningState, ProofOfWork, SearchParams};
pub use types::*;

/// Application information
pub const APP_NAME: &str = "powchain-miner";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
