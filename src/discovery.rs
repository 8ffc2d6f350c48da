// Pool discovery - scans the factory's LOG_NEW_POOL events to enumerate
// every pool created up to the target block.

use crate::chain_source::ChainSource;
use crate::settings::ProtocolParams;
use crate::utils::block_chunks;
use anyhow::{Context, Result};
use ethers::types::{Address, Filter, H256};
use ethers::utils::keccak256;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, info, warn};
use once_cell::sync::Lazy;

// LOG_NEW_POOL(address indexed caller, address indexed pool)
static LOG_NEW_POOL_TOPIC: Lazy<H256> =
    Lazy::new(|| H256::from(keccak256("LOG_NEW_POOL(address,address)")));

/// Concurrent eth_getLogs requests during a chunked scan
const MAX_CONCURRENT_CHUNK_SCANS: usize = 4;

/// Discovers every pool the factory created in `[genesis_block, to_block]`.
///
/// The block range is split into chunks so no single eth_getLogs request
/// spans more blocks than the provider tolerates; chunks are queried
/// concurrently but results are stitched back in block order, so the
/// returned pool list is creation-ordered.
pub async fn discover_pools(
    source: &dyn ChainSource,
    params: &ProtocolParams,
    to_block: u64,
) -> Result<Vec<Address>> {
    let chunks = block_chunks(params.genesis_block, to_block, params.discovery_chunk_size);
    if chunks.is_empty() {
        debug!(
            "No block range to scan: genesis {} is past target {}",
            params.genesis_block, to_block
        );
        return Ok(Vec::new());
    }

    let factory = params.factory;
    let chunk_count = chunks.len();
    let log_batches: Vec<Vec<ethers::types::Log>> = stream::iter(chunks)
        .map(|(from, to)| async move {
            let filter = Filter::new()
                .address(factory)
                .topic0(*LOG_NEW_POOL_TOPIC)
                .from_block(from)
                .to_block(to);
            source
                .get_logs(&filter)
                .await
                .with_context(|| format!("LOG_NEW_POOL scan failed for blocks {from}-{to}"))
        })
        .buffered(MAX_CONCURRENT_CHUNK_SCANS)
        .try_collect()
        .await?;

    let mut pools = Vec::new();
    for log in log_batches.into_iter().flatten() {
        // topics: [signature, caller, pool]
        if log.topics.len() < 3 {
            warn!(
                "Skipping malformed LOG_NEW_POOL log from {:?} ({} topics)",
                log.address,
                log.topics.len()
            );
            continue;
        }
        pools.push(Address::from_slice(&log.topics[2].as_bytes()[12..]));
    }

    info!(
        "Discovered {} pool(s) from {} chunk scan(s) up to block {}",
        pools.len(),
        chunk_count,
        to_block
    );
    Ok(pools)
}
