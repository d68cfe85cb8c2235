//! Configuration management for the miner
//!
//! Supports configuration via command line arguments, environment variables
//! and configuration files (YAML/JSON). Values given explicitly on the command
//! line take precedence over the file.

use crate::crypto::HashAlgorithm;
use crate::error::is_display_kind;
use crate::pow::SearchParams;
use crate::worker::MAX_WORKERS;
use crate::{Error, Result, MAX_NONCE};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        write!(f, "{}", name)
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Plain,
    Pretty,
    Json,
}

/// Complete configuration for the miner
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "powchain-miner",
    version = env!("CARGO_PKG_VERSION"),
    about = "Parallel proof-of-work block miner",
    long_about = "Mines a small demo chain by racing parallel workers for a nonce \
                  whose header hash falls below the difficulty target"
)]
pub struct Config {
    /// Print the parsed configuration and exit
    #[arg(long)]
    #[serde(skip)]
    pub print_config: bool,

    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE", env = "POWCHAIN_CONFIG")]
    #[serde(skip)]
    pub config_file: Option<PathBuf>,

    /// Required leading zero bits of a block hash (1-256)
    #[arg(short = 'd', long, default_value_t = default_difficulty_bits())]
    #[serde(default = "default_difficulty_bits")]
    pub difficulty_bits: u32,

    /// Number of parallel search workers (0 = number of CPUs)
    #[arg(short = 'c', long, default_value_t = default_worker_count())]
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Exclusive upper bound of the nonce space
    #[arg(long, default_value_t = default_max_nonce())]
    #[serde(default = "default_max_nonce")]
    pub max_nonce: u64,

    /// Hash function applied to block headers
    #[arg(long, value_enum, default_value_t = HashAlgorithm::Sha256)]
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,

    /// Abort a block after this long (e.g. "30s", "5m")
    #[arg(long)]
    #[serde(default)]
    pub timeout: Option<String>,

    /// Interval between progress log lines
    #[arg(long, default_value = "5s")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: String,

    /// Seed for the genesis payload (random when omitted)
    #[arg(long, env = "POWCHAIN_GENESIS_SEED")]
    #[serde(default)]
    pub genesis_seed: Option<u64>,

    /// Log level
    #[arg(short = 'l', long, value_enum, default_value_t = LogLevel::Info)]
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            print_config: false,
            config_file: None,
            difficulty_bits: default_difficulty_bits(),
            worker_count: default_worker_count(),
            max_nonce: default_max_nonce(),
            hash_algorithm: HashAlgorithm::default(),
            timeout: None,
            progress_interval: default_progress_interval(),
            genesis_seed: None,
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from the process arguments and optional file
    ///
    /// `--help` and `--version` print their output and exit the process.
    pub async fn load() -> Result<Self> {
        match Self::load_from(std::env::args_os()).await {
            Err(Error::Cli(e)) if is_display_kind(e.kind()) => e.exit(),
            result => result,
        }
    }

    /// Load configuration from the given arguments and optional file
    pub async fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command().try_get_matches_from(args)?;
        let mut config = Self::from_arg_matches(&matches)?;

        if let Some(path) = config.config_file.clone() {
            let file_config = Self::load_from_file(&path).await?;
            config = file_config.overridden_by(config, &matches);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            // Default to YAML
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// Replace file values with those set explicitly on the command line
    fn overridden_by(mut self, cli: Self, matches: &ArgMatches) -> Self {
        let explicit = |id: &str| {
            matches!(
                matches.value_source(id),
                Some(ValueSource::CommandLine | ValueSource::EnvVariable)
            )
        };

        if explicit("difficulty_bits") {
            self.difficulty_bits = cli.difficulty_bits;
        }
        if explicit("worker_count") {
            self.worker_count = cli.worker_count;
        }
        if explicit("max_nonce") {
            self.max_nonce = cli.max_nonce;
        }
        if explicit("hash_algorithm") {
            self.hash_algorithm = cli.hash_algorithm;
        }
        if cli.timeout.is_some() {
            self.timeout = cli.timeout;
        }
        if explicit("progress_interval") {
            self.progress_interval = cli.progress_interval;
        }
        if cli.genesis_seed.is_some() {
            self.genesis_seed = cli.genesis_seed;
        }
        if explicit("log_level") {
            self.log_level = cli.log_level;
        }
        if explicit("log_format") {
            self.log_format = cli.log_format;
        }

        self.print_config = cli.print_config;
        self.config_file = cli.config_file;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.difficulty_bits == 0 || self.difficulty_bits > 256 {
            return Err(Error::config(format!(
                "Difficulty must be between 1 and 256 bits, got {}",
                self.difficulty_bits
            )));
        }

        if self.worker_count > MAX_WORKERS {
            return Err(Error::config(format!(
                "Worker count must be at most {}, got {}",
                MAX_WORKERS, self.worker_count
            )));
        }

        if self.max_nonce == 0 {
            return Err(Error::config("Max nonce must be greater than 0"));
        }

        self.timeout_duration()?;
        self.progress_interval_duration()?;
        Ok(())
    }

    /// Worker count with 0 resolved to the number of CPUs
    pub fn effective_worker_count(&self) -> usize {
        if self.worker_count == 0 {
            num_cpus::get().min(MAX_WORKERS)
        } else {
            self.worker_count
        }
    }

    /// Get parsed timeout
    pub fn timeout_duration(&self) -> Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|s| parse_duration("timeout", s))
            .transpose()
    }

    /// Get parsed progress interval
    pub fn progress_interval_duration(&self) -> Result<Duration> {
        parse_duration("progress interval", &self.progress_interval)
    }

    /// Search parameters derived from this configuration
    pub fn search_params(&self) -> Result<SearchParams> {
        let params = SearchParams {
            worker_count: self.effective_worker_count(),
            max_nonce: self.max_nonce,
            hash_algorithm: self.hash_algorithm,
            timeout: self.timeout_duration()?,
            progress_interval: self.progress_interval_duration()?,
        };
        params.validate()?;
        Ok(params)
    }

    /// Genesis seed, drawing a random one when none is configured
    pub fn genesis_seed_or_random(&self) -> u64 {
        self.genesis_seed.unwrap_or_else(rand::random)
    }
}

fn parse_duration(name: &str, value: &str) -> Result<Duration> {
    let duration = humantime::parse_duration(value)
        .map_err(|e| Error::config(format!("Invalid {} '{}': {}", name, value, e)))?;
    if duration.is_zero() {
        return Err(Error::config(format!("{} must be greater than 0", name)));
    }
    Ok(duration)
}

// Default value functions for serde and clap
fn default_difficulty_bits() -> u32 { 24 }
fn default_worker_count() -> usize { 10 }
fn default_max_nonce() -> u64 { MAX_NONCE }
fn default_progress_interval() -> String { "5s".to_string() }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_log_format() -> LogFormat { LogFormat::Plain }
