//! Powchain Miner - Main Application
//!
//! Mines a genesis block and two transfers, then prints the chain.

use powchain_miner::{
    utils::{format_duration, init_logging},
    Blockchain, Config, Header, Miner, Result, Transaction, APP_NAME, APP_VERSION,
};
use std::time::Instant;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(category = e.category(), "{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::load().await?;

    if config.print_config {
        print_configuration(&config)?;
        return Ok(());
    }

    init_logging(&config.log_level.to_string(), config.log_format);
    info!("Starting {} v{}", APP_NAME, APP_VERSION);

    let params = config.search_params()?;
    info!(
        "Configuration: difficulty={} bits, workers={}, hash={}",
        config.difficulty_bits, params.worker_count, params.hash_algorithm
    );

    let miner = Miner::new(params)?;
    let started = Instant::now();

    let mut chain = Blockchain::new(
        miner,
        config.difficulty_bits,
        config.genesis_seed_or_random(),
    )
    .await?;
    chain.add_block(Transaction::new("Alice", "Bob", 1.0)).await?;
    chain.add_block(Transaction::new("Bob", "Alice", 1.0)).await?;

    chain.verify()?;
    info!(
        "Mined and verified {} blocks in {}",
        chain.len(),
        format_duration(started.elapsed())
    );

    for header in chain.blocks() {
        print_block(header);
    }
    Ok(())
}

/// Print a mined block
fn print_block(header: &Header) {
    println!("Prev. hash: {}", hex::encode(header.previous_hash()));
    println!("Data: {}", header.payload());
    println!("Hash: {}", header.hash());
    println!("Nonce: {}", header.nonce());
    println!();
}

/// Print configuration as YAML
fn print_configuration(config: &Config) -> Result<()> {
    let yaml = serde_yaml::to_string(config)?;
    println!("{}", yaml);
    Ok(())
}
