//! # TVL Snapshot CLI
//!
//! One-shot command that computes the C.R.E.A.M. Swap balance sheet at a
//! target block and prints it as JSON.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin snapshot                   # at the latest block
//! cargo run --bin snapshot -- --block 11000000
//! RUST_LOG=info cargo run --bin snapshot
//! ```

use clap::Parser;
use cream_tvl_sdk::{Adapter, RpcPool, RpcSource, Settings};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "snapshot", about = "Point-in-time TVL snapshot for C.R.E.A.M. Swap")]
struct Args {
    /// Target block number; defaults to the latest block
    #[arg(long)]
    block: Option<u64>,

    /// Unix timestamp forwarded to the adapter (unused by the aggregation)
    #[arg(long, default_value_t = 0)]
    timestamp: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let settings = Settings::new()?;

    let pool = Arc::new(RpcPool::from_settings(&settings)?);
    let block = match args.block {
        Some(block) => block,
        None => pool.latest_block().await?,
    };

    let source = Arc::new(RpcSource::new(pool, &settings)?);
    let adapter = Adapter::new(source, settings.protocol_params()?);

    let sheet = adapter.tvl(args.timestamp, block).await?;

    let report = serde_json::json!({
        "manifest": adapter.manifest(),
        "block": block,
        "balances": sheet,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
