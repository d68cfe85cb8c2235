//! Error handling for the proof-of-work miner
//!
//! Every failure a mining attempt can report, plus the configuration and I/O
//! errors of the surrounding binary.

use thiserror::Error;

/// Result type alias for mining operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the miner
#[derive(Error, Debug)]
pub enum Error {
    /// Difficulty outside of `(0, 256]`
    #[error("Invalid difficulty: {bits} bits (expected 1..=256)")]
    InvalidDifficulty { bits: u32 },

    /// Every nonce in the search space was tried without success
    #[error("Search exhausted: {searched} nonces tried without a solution")]
    SearchExhausted { searched: u64 },

    /// The header payload has no canonical byte form
    #[error("Encoding failure: {message}")]
    Encoding { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A worker task died before reporting
    #[error("Worker failed: {message}")]
    Worker { message: String },

    /// The attempt was cancelled by the caller
    #[error("Operation was cancelled: {operation}")]
    Cancelled { operation: String },

    /// The attempt ran past its deadline
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// Called in a context that cannot serve the request
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// A chain failed verification
    #[error("Invalid chain at block {height}: {message}")]
    InvalidChain { height: usize, message: String },

    /// Command line parsing errors
    #[error("Command line error: {0}")]
    Cli(#[from] clap::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create an invalid difficulty error
    pub fn invalid_difficulty(bits: u32) -> Self {
        Self::InvalidDifficulty { bits }
    }

    /// Create a search exhausted error
    pub fn search_exhausted(searched: u64) -> Self {
        Self::SearchExhausted { searched }
    }

    /// Create an encoding error
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a worker error
    pub fn worker(message: impl Into<String>) -> Self {
        Self::Worker {
            message: message.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create an invalid chain error
    pub fn invalid_chain(height: usize, message: impl Into<String>) -> Self {
        Self::InvalidChain {
            height,
            message: message.into(),
        }
    }

    /// Check if another attempt with fresh header state may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SearchExhausted { .. } | Error::Timeout { .. } | Error::Cancelled { .. }
        )
    }

    /// Check if this is a `--help` or `--version` request rather than a failure
    pub fn is_display_request(&self) -> bool {
        matches!(self, Error::Cli(e) if is_display_kind(e.kind()))
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidDifficulty { .. } => "invalid_difficulty",
            Error::SearchExhausted { .. } => "search_exhausted",
            Error::Encoding { .. } => "encoding",
            Error::Config { .. } => "config",
            Error::Worker { .. } => "worker",
            Error::Cancelled { .. } => "cancelled",
            Error::Timeout { .. } => "timeout",
            Error::InvalidState { .. } => "invalid_state",
            Error::InvalidChain { .. } => "invalid_chain",
            Error::Cli(_) => "cli",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
        }
    }
}

/// Clap error kinds that carry help or version output
pub(crate) fn is_display_kind(kind: clap::error::ErrorKind) -> bool {
    use clap::error::ErrorKind;

    matches!(
        kind,
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    )
}
