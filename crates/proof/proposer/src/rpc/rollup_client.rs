//! Rollup RPC client implementation for OP Stack rollup nodes.

use std::time::Duration;

use alloy_provider::Provider;
use async_trait::async_trait;
use url::Url;

use super::{
    HttpProvider,
    error::{RpcError, RpcResult},
    http_provider,
    traits::RollupClient,
    types::{RollupConfig, SyncStatus},
    with_retry,
};
use crate::config::RetryConfig;

/// Configuration for the rollup client.
#[derive(Debug, Clone)]
pub struct RollupClientConfig {
    /// RPC endpoint URL.
    pub endpoint: Url,
    /// Request timeout.
    pub timeout: Duration,
    /// Retry configuration.
    pub retry_config: RetryConfig,
}

impl RollupClientConfig {
    /// Creates a new rollup client configuration with defaults.
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint, timeout: Duration::from_secs(30), retry_config: RetryConfig::default() }
    }

    /// Sets the request timeout.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub const fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }
}

/// Rollup node client. Nothing here is cached: sync status moves every block.
pub struct RollupClientImpl {
    provider: HttpProvider,
    retry_config: RetryConfig,
}

impl std::fmt::Debug for RollupClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollupClientImpl").finish_non_exhaustive()
    }
}

impl RollupClientImpl {
    /// Creates a new rollup client from the given configuration.
    pub fn new(config: RollupClientConfig) -> RpcResult<Self> {
        Ok(Self {
            provider: http_provider(config.endpoint, config.timeout)?,
            retry_config: config.retry_config,
        })
    }
}

#[async_trait]
impl RollupClient for RollupClientImpl {
    async fn rollup_config(&self) -> RpcResult<RollupConfig> {
        with_retry(&self.retry_config, "RollupClient::rollup_config", || async {
            self.provider
                .raw_request::<_, RollupConfig>("optimism_rollupConfig".into(), ())
                .await
                .map_err(RpcError::from)
        })
        .await
    }

    async fn sync_status(&self) -> RpcResult<SyncStatus> {
        with_retry(&self.retry_config, "RollupClient::sync_status", || async {
            self.provider
                .raw_request::<_, SyncStatus>("optimism_syncStatus".into(), ())
                .await
                .map_err(RpcError::from)
        })
        .await
    }
}
