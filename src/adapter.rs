use crate::aggregator::SnapshotAggregator;
use crate::balance_sheet::BalanceSheet;
use crate::chain_source::ChainSource;
use crate::settings::ProtocolParams;
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;

/// Descriptor consumed by an external adapter registry.
///
/// # Fields
///
/// - `name`: Human-readable protocol name
/// - `website`: Protocol landing page
/// - `token`: Protocol token identifier, if one exists
/// - `category`: Registry category tag
/// - `start`: Unix timestamp of protocol activation
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub name: &'static str,
    pub website: &'static str,
    pub token: Option<&'static str>,
    pub category: &'static str,
    pub start: u64,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            name: "C.R.E.A.M. Swap",
            website: "https://cream.finance",
            token: None,
            category: "dexes",
            start: 1599552000, // 09/08/2020 @ 8:00am (UTC)
        }
    }
}

/// The exported adapter: a manifest plus the TVL entry point a registry or
/// scheduler invokes per block.
pub struct Adapter {
    manifest: Manifest,
    aggregator: SnapshotAggregator,
}

impl Adapter {
    pub fn new(source: Arc<dyn ChainSource>, params: ProtocolParams) -> Self {
        Self {
            manifest: Manifest::default(),
            aggregator: SnapshotAggregator::new(source, params),
        }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Computes the balance sheet at `block`. The timestamp accompanies the
    /// block in the registry's calling convention but plays no part in the
    /// aggregation.
    pub async fn tvl(&self, _timestamp: u64, block: u64) -> Result<BalanceSheet> {
        self.aggregator.snapshot(block).await
    }
}
