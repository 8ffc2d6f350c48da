//! # CREAM TVL SDK
//!
//! A Rust library for computing point-in-time Total Value Locked (TVL)
//! snapshots of C.R.E.A.M. Swap liquidity pools on Ethereum mainnet.
//!
//! ## Overview
//!
//! C.R.E.A.M. Swap is a Balancer-fork AMM whose pools are announced by the
//! factory's `LOG_NEW_POOL` event. The SDK reconstructs the protocol's full
//! balance sheet at a target block:
//!
//! - **Discovery**: Scans factory events to enumerate every pool created up
//!   to the target block.
//! - **Balance reads**: Batches `getCurrentTokens()` / `balanceOf()` reads
//!   through Multicall3, all pinned to the target block.
//! - **Wrapper resolution**: Detects interest-bearing wrapper tokens
//!   (`isCToken`) and substitutes them with their underlying asset and
//!   underlying-denominated balance.
//! - **Vault conversion**: Unwraps the yETH and yyCrv vault shares into WETH
//!   and USDT using on-chain exchange rates.
//! - **Aggregation**: Merges everything into a single address -> balance
//!   mapping, the `BalanceSheet`.
//!
//! ## Architecture
//!
//! The blockchain query layer sits behind the `ChainSource` trait, so the
//! aggregation pipeline runs unchanged against live RPC endpoints or canned
//! responses in tests. `RpcSource` is the production implementation, built
//! from a round-robin `RpcPool` and the `Multicall` batch executor.

// Core Types
/// The balance accumulator produced by a snapshot
pub mod balance_sheet;
/// Fixed-point vault share conversion math
pub mod normalization;

// Chain Access
/// The blockchain query seam and its RPC implementation
pub mod chain_source;
/// Multicall3 batch executor
pub mod multicall;
/// Round-robin HTTP provider pool
pub mod rpc_pool;
/// Contract ABI bindings
pub mod contracts;

// Aggregation
/// Pool discovery from factory events
pub mod discovery;
/// The snapshot pipeline
pub mod aggregator;
/// Adapter manifest and entry point
pub mod adapter;

// Infrastructure
/// Externalized protocol and RPC configuration
pub mod settings;
/// Metrics facade (no-op unless the `observability` feature is enabled)
pub mod metrics;
/// Block range helpers
pub mod utils;

pub use adapter::{Adapter, Manifest};
pub use aggregator::SnapshotAggregator;
pub use balance_sheet::BalanceSheet;
pub use chain_source::{ChainSource, RpcSource};
pub use multicall::{Call, CallResult, Multicall};
pub use rpc_pool::RpcPool;
pub use settings::{ProtocolParams, Settings, SettingsError};
