//! L1 RPC client implementation.

use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{
    BlockId, Header, TransactionInput, TransactionReceipt, TransactionRequest,
};
use async_trait::async_trait;
use url::Url;

use super::{
    HttpProvider, block_id_or_latest,
    cache::MeteredCache,
    error::{RpcError, RpcResult},
    http_provider,
    traits::L1Client,
    with_retry,
};
use crate::{config::RetryConfig, constants::DEFAULT_CACHE_SIZE};

/// Configuration for the L1 client.
#[derive(Debug, Clone)]
pub struct L1ClientConfig {
    /// RPC endpoint URL.
    pub endpoint: Url,
    /// Request timeout.
    pub timeout: Duration,
    /// Cache size for headers and receipts.
    pub cache_size: usize,
    /// Retry configuration.
    pub retry_config: RetryConfig,
}

impl L1ClientConfig {
    /// Creates a new L1 client configuration with defaults.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_secs(30),
            cache_size: DEFAULT_CACHE_SIZE,
            retry_config: RetryConfig::default(),
        }
    }

    /// Sets the request timeout.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the cache size.
    pub const fn with_cache_size(mut self, cache_size: usize) -> Self {
        self.cache_size = cache_size;
        self
    }

    /// Sets the retry configuration.
    pub const fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }
}

/// L1 RPC client with hash-keyed header and receipt caches.
pub struct L1ClientImpl {
    provider: HttpProvider,
    headers_cache: MeteredCache<B256, Header>,
    receipts_cache: MeteredCache<B256, Vec<TransactionReceipt>>,
    retry_config: RetryConfig,
}

impl std::fmt::Debug for L1ClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L1ClientImpl")
            .field("headers_cache_entries", &self.headers_cache.entry_count())
            .field("receipts_cache_entries", &self.receipts_cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl L1ClientImpl {
    /// Creates a new L1 client from the given configuration.
    pub fn new(config: L1ClientConfig) -> RpcResult<Self> {
        Ok(Self {
            provider: http_provider(config.endpoint, config.timeout)?,
            headers_cache: MeteredCache::with_capacity("l1_headers", config.cache_size),
            receipts_cache: MeteredCache::with_capacity("l1_receipts", config.cache_size),
            retry_config: config.retry_config,
        })
    }

    /// Returns the headers cache.
    pub const fn headers_cache(&self) -> &MeteredCache<B256, Header> {
        &self.headers_cache
    }

    /// Returns the receipts cache.
    pub const fn receipts_cache(&self) -> &MeteredCache<B256, Vec<TransactionReceipt>> {
        &self.receipts_cache
    }

    async fn fetch_header(&self, block_id: BlockId, method: &'static str) -> RpcResult<Header> {
        let block = with_retry(&self.retry_config, method, || async {
            self.provider.get_block(block_id).await.map_err(RpcError::from)
        })
        .await?
        .ok_or_else(|| RpcError::HeaderNotFound(format!("Header not found for {block_id:?}")))?;

        let header = block.header;
        self.headers_cache.insert(header.hash, header.clone()).await;
        Ok(header)
    }
}

#[async_trait]
impl L1Client for L1ClientImpl {
    async fn block_number(&self) -> RpcResult<u64> {
        with_retry(&self.retry_config, "L1Client::block_number", || async {
            self.provider.get_block_number().await.map_err(RpcError::from)
        })
        .await
    }

    async fn header_by_number(&self, number: Option<u64>) -> RpcResult<Header> {
        // Numbers are not stable under reorg: always ask the node.
        self.fetch_header(block_id_or_latest(number), "L1Client::header_by_number").await
    }

    async fn header_by_hash(&self, hash: B256) -> RpcResult<Header> {
        if let Some(header) = self.headers_cache.get(&hash).await {
            return Ok(header);
        }
        self.fetch_header(BlockId::Hash(hash.into()), "L1Client::header_by_hash").await
    }

    async fn block_receipts(&self, hash: B256) -> RpcResult<Vec<TransactionReceipt>> {
        if let Some(receipts) = self.receipts_cache.get(&hash).await {
            return Ok(receipts);
        }

        let receipts = with_retry(&self.retry_config, "L1Client::block_receipts", || async {
            self.provider
                .get_block_receipts(BlockId::Hash(hash.into()))
                .await
                .map_err(RpcError::from)
        })
        .await?
        .ok_or_else(|| {
            RpcError::BlockNotFound(format!("Block receipts not found for hash {hash}"))
        })?;

        self.receipts_cache.insert(hash, receipts.clone()).await;
        Ok(receipts)
    }

    async fn code_at(&self, address: Address, block_number: Option<u64>) -> RpcResult<Bytes> {
        let block_id = block_id_or_latest(block_number);
        with_retry(&self.retry_config, "L1Client::code_at", || async {
            self.provider.get_code_at(address).block_id(block_id).await.map_err(RpcError::from)
        })
        .await
    }

    async fn call_contract(
        &self,
        to: Address,
        data: Bytes,
        block_number: Option<u64>,
    ) -> RpcResult<Bytes> {
        let block_id = block_id_or_latest(block_number);
        with_retry(&self.retry_config, "L1Client::call_contract", || async {
            let req =
                TransactionRequest::default().to(to).input(TransactionInput::new(data.clone()));
            self.provider.call(req).block(block_id).await.map_err(RpcError::from)
        })
        .await
    }
}
