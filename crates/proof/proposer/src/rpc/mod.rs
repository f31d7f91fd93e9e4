//! Chain and rollup readers with content-addressed caching.

use std::{future::Future, time::Duration};

use alloy_eips::BlockNumberOrTag;
use alloy_network::{Ethereum, Network};
use alloy_provider::RootProvider;
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::BlockId;
use alloy_transport_http::{Http, reqwest::Client};
use backon::Retryable;
use op_alloy_network::Optimism;
use url::Url;

use crate::config::RetryConfig;

/// Shared type alias for the L1 HTTP provider.
/// Uses `RootProvider` directly since these clients only perform read operations.
pub type HttpProvider = RootProvider<Ethereum>;

/// L2-specific provider type using the Optimism network.
/// Required for deserializing OP Stack deposit transactions (type 0x7E).
pub type L2HttpProvider = RootProvider<Optimism>;

mod cache;
mod error;
mod l1_client;
mod l2_client;
mod rollup_client;
mod traits;
mod types;

pub use cache::{CacheMetrics, MeteredCache};
pub use error::{RpcError, RpcResult};
pub use l1_client::{L1ClientConfig, L1ClientImpl};
pub use l2_client::{L2ClientConfig, L2ClientImpl, ProofCacheKey};
pub use rollup_client::{RollupClientConfig, RollupClientImpl};
pub use traits::{L1Client, L2Client, RollupClient};
pub use types::{
    L1BlockId, L1BlockRef, L2BlockRef, OpBlock, RollupConfig, RollupGenesis, SyncStatus,
};

/// Builds a read-only provider over HTTP with a per-request timeout.
fn http_provider<N: Network>(endpoint: Url, timeout: Duration) -> RpcResult<RootProvider<N>> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RpcError::Connection(format!("Failed to build HTTP client: {e}")))?;

    let http = Http::with_client(client, endpoint);
    Ok(RootProvider::new(RpcClient::new(http, false)))
}

/// Maps an optional block number to a block id, `None` meaning latest.
fn block_id_or_latest(number: Option<u64>) -> BlockId {
    number.map_or(BlockNumberOrTag::Latest, BlockNumberOrTag::Number).into()
}

/// Runs `call` with exponential backoff, retrying only transient failures.
async fn with_retry<T, F, Fut>(
    retry_config: &RetryConfig,
    method: &'static str,
    call: F,
) -> RpcResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RpcResult<T>>,
{
    call.retry(retry_config.to_backoff_builder())
        .when(RpcError::is_retryable)
        .notify(|err, dur| {
            tracing::debug!(error = %err, delay = ?dur, method, "Retrying RPC call");
        })
        .await
}
