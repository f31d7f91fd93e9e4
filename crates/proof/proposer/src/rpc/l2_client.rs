//! L2 RPC client implementation.

use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{BlockId, EIP1186AccountProofResponse, Header};
use async_trait::async_trait;
use url::Url;

use super::{
    L2HttpProvider, block_id_or_latest,
    cache::MeteredCache,
    error::{RpcError, RpcResult},
    http_provider,
    traits::L2Client,
    types::OpBlock,
    with_retry,
};
use crate::{config::RetryConfig, constants::DEFAULT_CACHE_SIZE};

/// Cache key for account proofs (address + block hash).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProofCacheKey {
    /// Account address.
    pub address: Address,
    /// Block hash.
    pub block_hash: B256,
}

impl ProofCacheKey {
    /// Creates a new proof cache key.
    pub const fn new(address: Address, block_hash: B256) -> Self {
        Self { address, block_hash }
    }
}

/// Configuration for the L2 client.
#[derive(Debug, Clone)]
pub struct L2ClientConfig {
    /// RPC endpoint URL.
    pub endpoint: Url,
    /// Request timeout.
    pub timeout: Duration,
    /// Cache size for blocks, headers, and proofs.
    pub cache_size: usize,
    /// Retry configuration.
    pub retry_config: RetryConfig,
}

impl L2ClientConfig {
    /// Creates a new L2 client configuration with defaults.
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

/// L2 RPC client with hash-keyed block, header and proof caches.
///
/// By-number reads always go to the node and populate the hash-keyed caches
/// on the way back; by-hash reads are served from the caches first.
pub struct L2ClientImpl {
    provider: L2HttpProvider,
    blocks_cache: MeteredCache<B256, OpBlock>,
    headers_cache: MeteredCache<B256, Header>,
    proofs_cache: MeteredCache<ProofCacheKey, EIP1186AccountProofResponse>,
    retry_config: RetryConfig,
}

impl std::fmt::Debug for L2ClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("L2ClientImpl")
            .field("blocks_cache_entries", &self.blocks_cache.entry_count())
            .field("headers_cache_entries", &self.headers_cache.entry_count())
            .field("proofs_cache_entries", &self.proofs_cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl L2ClientImpl {
    /// Creates a new L2 client from the given configuration.
    pub fn new(config: L2ClientConfig) -> RpcResult<Self> {
        Ok(Self {
            provider: http_provider(config.endpoint, config.timeout)?,
            blocks_cache: MeteredCache::with_capacity("l2_blocks", config.cache_size),
            headers_cache: MeteredCache::with_capacity("l2_headers", config.cache_size),
            proofs_cache: MeteredCache::with_capacity("l2_proofs", config.cache_size),
            retry_config: config.retry_config,
        })
    }

    /// Returns the blocks cache.
    pub const fn blocks_cache(&self) -> &MeteredCache<B256, OpBlock> {
        &self.blocks_cache
    }

    /// Returns the headers cache.
    pub const fn headers_cache(&self) -> &MeteredCache<B256, Header> {
        &self.headers_cache
    }

    /// Returns the proofs cache.
    pub const fn proofs_cache(&self) -> &MeteredCache<ProofCacheKey, EIP1186AccountProofResponse> {
        &self.proofs_cache
    }

    async fn fetch_full_block(
        &self,
        block_id: BlockId,
        method: &'static str,
    ) -> RpcResult<OpBlock> {
        let block = with_retry(&self.retry_config, method, || async {
            self.provider.get_block(block_id).full().await.map_err(RpcError::from)
        })
        .await?
        .ok_or_else(|| RpcError::BlockNotFound(format!("Block not found for {block_id:?}")))?;

        self.blocks_cache.insert(block.header.hash, block.clone()).await;
        self.headers_cache.insert(block.header.hash, block.header.clone()).await;
        Ok(block)
    }
}

#[async_trait]
impl L2Client for L2ClientImpl {
    async fn chain_config(&self) -> RpcResult<serde_json::Value> {
        with_retry(&self.retry_config, "L2Client::chain_config", || async {
            self.provider
                .raw_request::<_, serde_json::Value>("debug_chainConfig".into(), ())
                .await
                .map_err(RpcError::from)
        })
        .await
    }

    async fn get_proof(
        &self,
        address: Address,
        block_hash: B256,
    ) -> RpcResult<EIP1186AccountProofResponse> {
        let cache_key = ProofCacheKey::new(address, block_hash);
        if let Some(proof) = self.proofs_cache.get(&cache_key).await {
            return Ok(proof);
        }

        let empty_keys: Vec<B256> = vec![];
        let proof: EIP1186AccountProofResponse =
            with_retry(&self.retry_config, "L2Client::get_proof", || async {
                self.provider
                    .raw_request("eth_getProof".into(), (address, empty_keys.clone(), block_hash))
                    .await
                    .map_err(RpcError::from)
            })
            .await?;

        self.proofs_cache.insert(cache_key, proof.clone()).await;
        Ok(proof)
    }

    async fn header_by_number(&self, number: Option<u64>) -> RpcResult<Header> {
        let block_id = block_id_or_latest(number);
        let block = with_retry(&self.retry_config, "L2Client::header_by_number", || async {
            self.provider.get_block(block_id).await.map_err(RpcError::from)
        })
        .await?
        .ok_or_else(|| RpcError::HeaderNotFound(format!("Header not found for {block_id:?}")))?;

        let header = block.header;
        self.headers_cache.insert(header.hash, header.clone()).await;
        Ok(header)
    }

    async fn block_by_number(&self, number: Option<u64>) -> RpcResult<OpBlock> {
        self.fetch_full_block(block_id_or_latest(number), "L2Client::block_by_number").await
    }

    async fn block_by_hash(&self, hash: B256) -> RpcResult<OpBlock> {
        if let Some(block) = self.blocks_cache.get(&hash).await {
            return Ok(block);
        }
        self.fetch_full_block(BlockId::Hash(hash.into()), "L2Client::block_by_hash").await
    }

    async fn execution_witness(&self, block_hash: B256) -> RpcResult<Bytes> {
        with_retry(&self.retry_config, "L2Client::execution_witness", || async {
            self.provider
                .raw_request::<_, Bytes>("debug_executionWitness".into(), (block_hash,))
                .await
                .map_err(|e| match RpcError::from(e) {
                    RpcError::InvalidResponse(msg) => {
                        RpcError::WitnessNotFound(format!("Block {block_hash}: {msg}"))
                    }
                    other => other,
                })
        })
        .await
    }
}
