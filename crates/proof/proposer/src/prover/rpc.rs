//! JSON-RPC client for a remote proving service.

use std::{sync::Arc, time::Duration};

use alloy_primitives::{B256, Bytes};
use async_trait::async_trait;
use jsonrpsee::{
    core::client::ClientT,
    http_client::{HttpClient, HttpClientBuilder},
    rpc_params,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{Proposal, Prover, check_withdrawals};
use crate::{
    ProposerError, ProposerResult,
    constants::{PROVER_MAX_REQUEST_SIZE, PROVER_TIMEOUT},
    rpc::{L2BlockRef, L2Client},
};

/// Connection settings for [`RpcProver`].
#[derive(Debug, Clone)]
pub struct RpcProverConfig {
    /// Proving service endpoint.
    pub endpoint: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum request body size in bytes.
    pub max_request_size: u32,
}

impl RpcProverConfig {
    /// Creates a configuration with default limits.
    pub const fn new(endpoint: Url) -> Self {
        Self { endpoint, timeout: PROVER_TIMEOUT, max_request_size: PROVER_MAX_REQUEST_SIZE }
    }

    /// Sets the per-request timeout.
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    block_number: u64,
    block_hash: B256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    block_ref: L2BlockRef,
    output_root: B256,
    signature: Bytes,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregateRequest {
    prev_output_root: B256,
    proposals: Vec<Proposal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregateResponse {
    output_root: B256,
    signature: Bytes,
}

/// [`Prover`] backed by a remote proving service.
///
/// The L2 header of every proved block is read locally so the service's
/// answer can be checked against the chain the proposer sees.
pub struct RpcProver {
    client: HttpClient,
    l2_client: Arc<dyn L2Client>,
}

impl std::fmt::Debug for RpcProver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcProver").finish_non_exhaustive()
    }
}

impl RpcProver {
    /// Creates a prover client.
    pub fn new(config: RpcProverConfig, l2_client: Arc<dyn L2Client>) -> ProposerResult<Self> {
        let client = HttpClientBuilder::default()
            .max_request_size(config.max_request_size)
            .request_timeout(config.timeout)
            .build(config.endpoint.as_str())
            .map_err(|e| ProposerError::Config(format!("failed to build prover client: {e}")))?;
        Ok(Self { client, l2_client })
    }
}

#[async_trait]
impl Prover for RpcProver {
    async fn generate(&self, block_number: u64) -> ProposerResult<Proposal> {
        let header = self.l2_client.header_by_number(Some(block_number)).await?;
        let request = GenerateRequest { block_number, block_hash: header.hash };

        let response: GenerateResponse = self
            .client
            .request("prover_generate", rpc_params![request])
            .await
            .map_err(|e| ProposerError::Prover(format!("prover_generate({block_number}): {e}")))?;

        if response.block_ref.number != block_number || response.block_ref.hash != header.hash {
            return Err(ProposerError::Prover(format!(
                "prover answered for block {} ({}), expected {block_number} ({})",
                response.block_ref.number, response.block_ref.hash, header.hash
            )));
        }

        let has_withdrawals = check_withdrawals(&header.inner);
        debug!(
            block_number,
            has_withdrawals,
            output_root = %response.output_root,
            "Generated proposal"
        );

        Ok(Proposal {
            block_ref: response.block_ref,
            output_root: response.output_root,
            signature: response.signature,
            has_withdrawals,
        })
    }

    async fn aggregate(
        &self,
        prev_output_root: B256,
        mut proposals: Vec<Proposal>,
    ) -> ProposerResult<Option<Proposal>> {
        if proposals.len() <= 1 {
            return Ok(proposals.pop());
        }

        let Some(last) = proposals.last() else {
            return Ok(None);
        };
        let block_ref = last.block_ref.clone();
        let has_withdrawals = proposals.iter().any(|p| p.has_withdrawals);
        let count = proposals.len();

        let request = AggregateRequest { prev_output_root, proposals };
        let response: AggregateResponse = self
            .client
            .request("prover_aggregate", rpc_params![request])
            .await
            .map_err(|e| {
                ProposerError::Prover(format!("prover_aggregate({count} proposals): {e}"))
            })?;

        debug!(
            count,
            l2_block = block_ref.number,
            output_root = %response.output_root,
            "Aggregated proposals"
        );

        Ok(Some(Proposal {
            block_ref,
            output_root: response.output_root,
            signature: response.signature,
            has_withdrawals,
        }))
    }
}
