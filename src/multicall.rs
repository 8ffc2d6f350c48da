use crate::metrics;
pub use anyhow::Result;
use ethers::abi::{self, Function, Param, ParamType, StateMutability, Token};
use ethers::prelude::*;
use log::{debug, warn};
use std::sync::Arc;

/// A single contract read to be batched in a multicall.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Call {
    /// Target contract address
    pub target: Address,
    /// Encoded function call data
    pub call_data: Bytes,
}

/// Outcome of one call inside a multicall batch.
///
/// Multicall3 executes every call with `allowFailure = true`, so a reverting
/// call surfaces here as `success == false` instead of failing the batch.
/// Callers decide what a failed call means; the aggregation pipeline excludes
/// them from the balance sheet.
#[derive(Clone, Debug)]
pub struct CallResult {
    pub success: bool,
    pub return_data: Bytes,
}

impl CallResult {
    /// The return data, if the call succeeded and produced output.
    pub fn output(&self) -> Option<&Bytes> {
        if self.success && !self.return_data.is_empty() {
            Some(&self.return_data)
        } else {
            None
        }
    }
}

const MIN_BATCH_SIZE: usize = 50;
const MAX_BATCH_SIZE: usize = 200;

/// Multicall3 batch executor.
///
/// Combines many independent `eth_call`s into a single `aggregate3` request,
/// preserving input order and per-call success flags. Batches larger than
/// the configured size are split into sequential chunks.
#[derive(Clone)]
pub struct Multicall<M: Middleware> {
    provider: Arc<M>,
    multicall_address: Address,
    batch_size: usize,
}

impl<M: Middleware + 'static> Multicall<M> {
    pub fn new(provider: Arc<M>, multicall_address: Address, batch_size: usize) -> Self {
        // RPC providers commonly reject oversized aggregate3 payloads
        let clamped = batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE);
        if clamped != batch_size {
            warn!(
                "Multicall batch size {} outside [{}, {}], clamping to {}",
                batch_size, MIN_BATCH_SIZE, MAX_BATCH_SIZE, clamped
            );
        }
        Self {
            provider,
            multicall_address,
            batch_size: clamped,
        }
    }

    /// Runs a batch of calls, optionally pinned to a specific block.
    ///
    /// The result vector matches the input order exactly. A transport-level
    /// failure (the aggregate3 request itself) is an error; a reverting
    /// inner call is a `CallResult` with `success == false`.
    pub async fn run(&self, calls: Vec<Call>, block: Option<BlockId>) -> Result<Vec<CallResult>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(calls.len());
        for chunk in calls.chunks(self.batch_size) {
            metrics::record_multicall_batch_size(chunk.len() as f64);
            let chunk_results = self.execute_aggregate3(chunk, block).await?;
            results.extend(chunk_results);
        }

        debug!(
            "Multicall executed {} calls in {} chunk(s)",
            calls.len(),
            (calls.len() + self.batch_size - 1) / self.batch_size
        );
        Ok(results)
    }

    // aggregate3((address,bool,bytes)[]) -> (bool,bytes)[]
    async fn execute_aggregate3(
        &self,
        calls: &[Call],
        block: Option<BlockId>,
    ) -> Result<Vec<CallResult>> {
        let call_tokens: Vec<Token> = calls
            .iter()
            .map(|call| {
                Token::Tuple(vec![
                    Token::Address(call.target),
                    Token::Bool(true), // allowFailure
                    Token::Bytes(call.call_data.to_vec()),
                ])
            })
            .collect();

        #[allow(deprecated)]
        let function = Function {
            name: "aggregate3".to_string(),
            inputs: vec![Param {
                name: "calls".to_string(),
                kind: ParamType::Array(Box::new(ParamType::Tuple(vec![
                    ParamType::Address,
                    ParamType::Bool,
                    ParamType::Bytes,
                ]))),
                internal_type: None,
            }],
            outputs: vec![Param {
                name: "returnData".to_string(),
                kind: ParamType::Array(Box::new(ParamType::Tuple(vec![
                    ParamType::Bool,
                    ParamType::Bytes,
                ]))),
                internal_type: None,
            }],
            constant: None,
            state_mutability: StateMutability::Payable,
        };

        let calldata = function.encode_input(&[Token::Array(call_tokens)])?;

        let tx_request = TransactionRequest::new()
            .to(self.multicall_address)
            .data(calldata);
        let typed_tx: ethers::types::transaction::eip2718::TypedTransaction = tx_request.into();

        metrics::increment_rpc_call("multicall");
        let response = self
            .provider
            .call(&typed_tx, block)
            .await
            .map_err(|e| anyhow::anyhow!("aggregate3 request failed: {e}"))?;

        let decoded = abi::decode(
            &[ParamType::Array(Box::new(ParamType::Tuple(vec![
                ParamType::Bool,
                ParamType::Bytes,
            ])))],
            &response,
        )?;

        let results_array = decoded
            .into_iter()
            .next()
            .and_then(|t| t.into_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid aggregate3 response format"))?;

        if results_array.len() != calls.len() {
            return Err(anyhow::anyhow!(
                "aggregate3 returned {} results for {} calls",
                results_array.len(),
                calls.len()
            ));
        }

        let mut chunk_results = Vec::with_capacity(calls.len());
        for result_token in results_array {
            let mut tuple = result_token
                .into_tuple()
                .ok_or_else(|| anyhow::anyhow!("Invalid aggregate3 result entry"))?;
            if tuple.len() != 2 {
                return Err(anyhow::anyhow!("Invalid aggregate3 result arity"));
            }
            let return_data = tuple
                .remove(1)
                .into_bytes()
                .ok_or_else(|| anyhow::anyhow!("Invalid aggregate3 return data"))?;
            let success = tuple
                .remove(0)
                .into_bool()
                .ok_or_else(|| anyhow::anyhow!("Invalid aggregate3 success flag"))?;
            chunk_results.push(CallResult {
                success,
                return_data: Bytes::from(return_data),
            });
        }

        Ok(chunk_results)
    }
}
