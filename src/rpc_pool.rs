// src/rpc_pool.rs

use crate::metrics;
use crate::settings::Settings;
use anyhow::{Context, Result};
use ethers::middleware::Middleware;
use ethers::prelude::{Http, Provider};
use ethers::types::{Filter, Log};
use log::{debug, info};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Round-robin pool of HTTP providers with a global in-flight request cap.
///
/// Each checkout hands back a provider together with a semaphore permit; the
/// permit is released when dropped, bounding concurrency across every caller
/// that shares the pool. There is no retry or health tracking here; a
/// failed request surfaces to the caller, and snapshot runs treat transport
/// failures as fatal.
pub struct RpcPool {
    providers: Vec<Arc<Provider<Http>>>,
    next: AtomicUsize,
    permits: Arc<Semaphore>,
}

impl RpcPool {
    pub fn new(urls: &[String], max_concurrency: usize) -> Result<Self> {
        let mut providers = Vec::with_capacity(urls.len());
        for url in urls {
            let provider = Provider::<Http>::try_from(url.as_str())
                .with_context(|| format!("Invalid RPC url '{url}'"))?;
            providers.push(Arc::new(provider));
        }
        if providers.is_empty() {
            return Err(anyhow::anyhow!("RpcPool requires at least one RPC url"));
        }
        info!("RpcPool initialized with {} provider(s)", providers.len());
        Ok(Self {
            providers,
            next: AtomicUsize::new(0),
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(&settings.rpc.http_urls, settings.rpc.max_concurrency)
    }

    /// Checks out the next provider in round-robin order.
    pub async fn get_next_provider(&self) -> Result<(Arc<Provider<Http>>, OwnedSemaphorePermit)> {
        let permit = Arc::clone(&self.permits).acquire_owned().await?;
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.providers.len();
        Ok((Arc::clone(&self.providers[idx]), permit))
    }

    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        let (provider, _permit) = self.get_next_provider().await?;
        metrics::increment_rpc_call("get_logs");
        let logs = provider.get_logs(filter).await?;
        debug!("eth_getLogs returned {} log(s)", logs.len());
        Ok(logs)
    }

    pub async fn latest_block(&self) -> Result<u64> {
        let (provider, _permit) = self.get_next_provider().await?;
        metrics::increment_rpc_call("block_number");
        Ok(provider.get_block_number().await?.as_u64())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
