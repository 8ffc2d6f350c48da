//! The blockchain query seam.
//!
//! Everything the snapshot pipeline needs from a chain fits in three reads:
//! historical logs, batched contract calls with per-call success flags, and
//! the occasional single `eth_call`. Putting that contract behind a trait
//! keeps the aggregation logic independent of any live endpoint, and tests
//! run the full pipeline against canned responses.

use crate::multicall::{Call, CallResult, Multicall};
use crate::rpc_pool::RpcPool;
use crate::settings::Settings;
use anyhow::Result;
use async_trait::async_trait;
use ethers::prelude::*;
use std::sync::Arc;

/// Read-only access to chain state at historical blocks.
///
/// # Implementation Requirements
///
/// - `multi_call` must preserve input order in its result vector and must
///   not fail the whole batch because one inner call reverted; revert shows
///   up as `CallResult { success: false, .. }`.
/// - `call` is for reads that have no batching peer (e.g. a single price
///   lookup); a revert here is an error, not a flagged result.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Queries historical logs matching the filter.
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>>;

    /// Executes a batch of independent reads, optionally pinned to a block.
    async fn multi_call(
        &self,
        calls: Vec<Call>,
        block: Option<BlockId>,
    ) -> Result<Vec<CallResult>>;

    /// Executes one read, optionally pinned to a block.
    async fn call(
        &self,
        target: Address,
        call_data: Bytes,
        block: Option<BlockId>,
    ) -> Result<Bytes>;
}

/// Production `ChainSource` backed by an `RpcPool` and Multicall3.
pub struct RpcSource {
    pool: Arc<RpcPool>,
    multicall_address: Address,
    batch_size: usize,
}

impl RpcSource {
    pub fn new(pool: Arc<RpcPool>, settings: &Settings) -> Result<Self> {
        Ok(Self {
            pool,
            multicall_address: settings.multicall_address()?,
            batch_size: settings.rpc.multicall_batch_size,
        })
    }
}

#[async_trait]
impl ChainSource for RpcSource {
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.pool.get_logs(filter).await
    }

    async fn multi_call(
        &self,
        calls: Vec<Call>,
        block: Option<BlockId>,
    ) -> Result<Vec<CallResult>> {
        let (provider, _permit) = self.pool.get_next_provider().await?;
        let multicall = Multicall::new(provider, self.multicall_address, self.batch_size);
        multicall.run(calls, block).await
    }

    async fn call(
        &self,
        target: Address,
        call_data: Bytes,
        block: Option<BlockId>,
    ) -> Result<Bytes> {
        let (provider, _permit) = self.pool.get_next_provider().await?;
        let tx: ethers::types::transaction::eip2718::TypedTransaction =
            TransactionRequest::new().to(target).data(call_data).into();
        crate::metrics::increment_rpc_call("call");
        let output = provider
            .call(&tx, block)
            .await
            .map_err(|e| anyhow::anyhow!("eth_call to {target:?} failed: {e}"))?;
        Ok(output)
    }
}
