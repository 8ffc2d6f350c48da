//! The snapshot pipeline.
//!
//! A snapshot walks a fixed sequence of batched reads, every one pinned to
//! the target block so the result is point-in-time consistent:
//!
//! 1. Discover pools from factory events.
//! 2. `getCurrentTokens()` per pool, flattened into (pool, token) pairs.
//! 3. `balanceOf(pool)` per pair.
//! 4. `isCToken()` per distinct token; a revert means "not a wrapper".
//! 5. For wrapper entries, `balanceOfUnderlying(pool)` / `underlying()`,
//!    fetched concurrently with the yVault exchange rates.
//! 6. Merge into a `BalanceSheet`: wrapper substitutions first, then plain
//!    balances and the two bespoke vault conversions, in read order.
//!
//! Per-call failures inside a batch are data, not errors: the affected
//! entry drops out of the sheet. A failing transport (the batch request
//! itself, or the single virtual-price read) aborts the snapshot; there is
//! no partial result.

use crate::balance_sheet::BalanceSheet;
use crate::chain_source::ChainSource;
use crate::contracts::erc20::BalanceOfCall;
use crate::contracts::i_bpool::GetCurrentTokensCall;
use crate::contracts::i_ctoken::{BalanceOfUnderlyingCall, IsCTokenCall, UnderlyingCall};
use crate::contracts::i_curve_pool::GetVirtualPriceCall;
use crate::contracts::i_yearn_vault::GetPricePerFullShareCall;
use crate::discovery;
use crate::multicall::{Call, CallResult};
use crate::normalization;
use crate::settings::ProtocolParams;
use anyhow::{Context, Result};
use ethers::abi::{AbiDecode, AbiEncode};
use ethers::types::{Address, BlockId, U256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One (pool, token) balance read. Later stages correlate results through
/// this struct's identity fields, never through positional indexes across
/// independent batches.
#[derive(Debug, Clone)]
struct TokenBalance {
    pool: Address,
    token: Address,
    balance: U256,
}

/// A wrapper token resolved to its underlying asset.
#[derive(Debug, Clone)]
struct UnderlyingResolution {
    wrapper: Address,
    underlying: Address,
    balance: U256,
}

/// Computes protocol balance sheets at a target block.
pub struct SnapshotAggregator {
    source: Arc<dyn ChainSource>,
    params: ProtocolParams,
}

impl SnapshotAggregator {
    pub fn new(source: Arc<dyn ChainSource>, params: ProtocolParams) -> Self {
        Self { source, params }
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    /// Runs the full pipeline and returns the balance sheet at `block`.
    pub async fn snapshot(&self, block: u64) -> Result<BalanceSheet> {
        let at = Some(BlockId::Number(block.into()));

        let pools = discovery::discover_pools(self.source.as_ref(), &self.params, block)
            .await
            .context("pool discovery failed")?;

        let pairs = self.enumerate_tokens(&pools, at).await?;
        let reads = self.read_balances(&pairs, at).await?;
        let wrappers = self.classify_wrappers(&reads, at).await?;

        let wrapped: Vec<&TokenBalance> = reads
            .iter()
            .filter(|read| self.is_wrapped(read.token, &wrappers))
            .collect();

        // Underlying resolution and the vault exchange rates have no data
        // dependency on each other; issue them as one concurrent group.
        let underlying_balance_calls: Vec<Call> = wrapped
            .iter()
            .map(|read| Call {
                target: read.token,
                call_data: BalanceOfUnderlyingCall { owner: read.pool }.encode().into(),
            })
            .collect();
        let underlying_address_calls: Vec<Call> = wrapped
            .iter()
            .map(|read| Call {
                target: read.token,
                call_data: UnderlyingCall {}.encode().into(),
            })
            .collect();
        let rate_calls = vec![
            Call {
                target: self.params.yeth_vault,
                call_data: GetPricePerFullShareCall {}.encode().into(),
            },
            Call {
                target: self.params.ycrv_vault,
                call_data: GetPricePerFullShareCall {}.encode().into(),
            },
        ];

        let (underlying_balances, underlying_addresses, rates, virtual_price_raw) = tokio::try_join!(
            self.source.multi_call(underlying_balance_calls, at),
            self.source.multi_call(underlying_address_calls, at),
            self.source.multi_call(rate_calls, at),
            self.source.call(
                self.params.curve_y_pool,
                GetVirtualPriceCall {}.encode().into(),
                at
            ),
        )?;

        let resolutions =
            correlate_resolutions(&wrapped, &underlying_balances, &underlying_addresses);
        let yeth_rate = decode_rate(rates.first());
        let ycrv_rate = decode_rate(rates.get(1));
        let virtual_price = U256::decode(&virtual_price_raw)
            .context("get_virtual_price returned malformed data")?;

        let sheet = self.merge(
            &reads,
            &wrappers,
            &resolutions,
            yeth_rate,
            ycrv_rate,
            virtual_price,
        );
        info!(
            "Snapshot at block {}: {} pool(s), {} balance read(s), {} asset(s)",
            block,
            pools.len(),
            reads.len(),
            sheet.len()
        );
        Ok(sheet)
    }

    /// getCurrentTokens() per pool, flattened into (pool, token) pairs.
    async fn enumerate_tokens(
        &self,
        pools: &[Address],
        at: Option<BlockId>,
    ) -> Result<Vec<(Address, Address)>> {
        let calls: Vec<Call> = pools
            .iter()
            .map(|pool| Call {
                target: *pool,
                call_data: GetCurrentTokensCall {}.encode().into(),
            })
            .collect();
        let results = self
            .source
            .multi_call(calls, at)
            .await
            .context("getCurrentTokens batch failed")?;

        let mut pairs = Vec::new();
        for (pool, result) in pools.iter().zip(results) {
            let Some(raw) = result.output() else {
                warn!("getCurrentTokens failed for pool {pool:?}");
                continue;
            };
            match <Vec<Address>>::decode(raw) {
                Ok(tokens) => pairs.extend(tokens.into_iter().map(|token| (*pool, token))),
                Err(_) => warn!("getCurrentTokens returned malformed data for pool {pool:?}"),
            }
        }
        Ok(pairs)
    }

    /// balanceOf(pool) per (pool, token) pair. Failed reads are dropped.
    async fn read_balances(
        &self,
        pairs: &[(Address, Address)],
        at: Option<BlockId>,
    ) -> Result<Vec<TokenBalance>> {
        let calls: Vec<Call> = pairs
            .iter()
            .map(|(pool, token)| Call {
                target: *token,
                call_data: BalanceOfCall { owner: *pool }.encode().into(),
            })
            .collect();
        let results = self
            .source
            .multi_call(calls, at)
            .await
            .context("balanceOf batch failed")?;

        let mut reads = Vec::new();
        for ((pool, token), result) in pairs.iter().zip(results) {
            let Some(raw) = result.output() else {
                debug!("balanceOf failed for token {token:?} in pool {pool:?}");
                continue;
            };
            if let Ok(balance) = U256::decode(raw) {
                reads.push(TokenBalance {
                    pool: *pool,
                    token: *token,
                    balance,
                });
            }
        }
        Ok(reads)
    }

    /// isCToken() per distinct token; reverts classify as "not a wrapper".
    async fn classify_wrappers(
        &self,
        reads: &[TokenBalance],
        at: Option<BlockId>,
    ) -> Result<HashMap<Address, bool>> {
        let mut distinct = Vec::new();
        let mut seen = HashSet::new();
        for read in reads {
            if seen.insert(read.token) {
                distinct.push(read.token);
            }
        }

        let calls: Vec<Call> = distinct
            .iter()
            .map(|token| Call {
                target: *token,
                call_data: IsCTokenCall {}.encode().into(),
            })
            .collect();
        let results = self
            .source
            .multi_call(calls, at)
            .await
            .context("isCToken batch failed")?;

        let mut wrappers = HashMap::with_capacity(distinct.len());
        for (token, result) in distinct.iter().zip(results) {
            let flagged = result
                .output()
                .and_then(|raw| bool::decode(raw).ok())
                .unwrap_or(false);
            wrappers.insert(*token, flagged);
        }
        Ok(wrappers)
    }

    /// Wrapper treatment applies to flagged tokens except the yETH vault,
    /// which stays on the plain-balance path and gets its bespoke conversion.
    fn is_wrapped(&self, token: Address, wrappers: &HashMap<Address, bool>) -> bool {
        token != self.params.yeth_vault && wrappers.get(&token).copied().unwrap_or(false)
    }

    fn merge(
        &self,
        reads: &[TokenBalance],
        wrappers: &HashMap<Address, bool>,
        resolutions: &[UnderlyingResolution],
        yeth_rate: Option<U256>,
        ycrv_rate: Option<U256>,
        virtual_price: U256,
    ) -> BalanceSheet {
        let mut sheet = BalanceSheet::new();

        // Pass 1: wrapper substitutions. A later resolution of the same
        // underlying asset overwrites an earlier one; see DESIGN.md for why
        // this stays an overwrite.
        for resolution in resolutions {
            sheet.set(resolution.underlying, resolution.balance);
            sheet.remove(resolution.wrapper);
        }

        // Pass 2: plain balances and vault conversions, in read order.
        for read in reads {
            if read.balance.is_zero() {
                continue;
            }
            if self.is_wrapped(read.token, wrappers) {
                // already captured by its underlying resolution
                continue;
            }

            if read.token == self.params.yeth_vault {
                match yeth_rate {
                    Some(rate) => {
                        let cash = normalization::share_value(read.balance, rate);
                        sheet.add_to(self.params.weth, cash);
                    }
                    None => warn!("yETH price per share unavailable, dropping vault balance"),
                }
                sheet.remove(self.params.yeth_vault);
            } else if read.token == self.params.ycrv_vault {
                match ycrv_rate {
                    Some(rate) => {
                        let cash =
                            normalization::stable_share_value(read.balance, virtual_price, rate);
                        sheet.add_to(self.params.usdt, cash);
                    }
                    None => warn!("yyCrv price per share unavailable, dropping vault balance"),
                }
                sheet.remove(self.params.ycrv_vault);
            } else {
                sheet.add_to(read.token, read.balance);
            }
        }

        sheet
    }
}

/// Pairs each wrapper read with its two resolution results. The three
/// vectors share one order (built from `wrapped`), and the output carries
/// the identity of every entry so nothing downstream needs the index.
fn correlate_resolutions(
    wrapped: &[&TokenBalance],
    balances: &[CallResult],
    addresses: &[CallResult],
) -> Vec<UnderlyingResolution> {
    let mut resolutions = Vec::new();
    for ((read, balance_result), address_result) in
        wrapped.iter().zip(balances).zip(addresses)
    {
        let Some(raw_balance) = balance_result.output() else {
            // The entry silently drops out; its raw wrapper balance is
            // excluded by the merge pass regardless.
            debug!(
                "balanceOfUnderlying failed for wrapper {:?} in pool {:?}",
                read.token, read.pool
            );
            continue;
        };
        let Some(raw_address) = address_result.output() else {
            debug!("underlying() failed for wrapper {:?}", read.token);
            continue;
        };
        let (Ok(balance), Ok(underlying)) =
            (U256::decode(raw_balance), Address::decode(raw_address))
        else {
            continue;
        };
        resolutions.push(UnderlyingResolution {
            wrapper: read.token,
            underlying,
            balance,
        });
    }
    resolutions
}

fn decode_rate(result: Option<&CallResult>) -> Option<U256> {
    result
        .and_then(|r| r.output())
        .and_then(|raw| U256::decode(raw).ok())
}
