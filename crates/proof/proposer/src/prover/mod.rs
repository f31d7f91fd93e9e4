//! Prover capability: per-block proof generation and aggregation.
//!
//! The proving engine itself lives behind a remote service; this module
//! defines the seam the proposal builder drives and the JSON-RPC adapter
//! that talks to that service.

use alloy_primitives::{B256, BloomInput, Bytes};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ProposerResult, constants::L2_TO_L1_MESSAGE_PASSER, rpc::L2BlockRef};

mod rpc;
pub use rpc::{RpcProver, RpcProverConfig};

/// A signed output commitment.
///
/// Either a single-block fragment or, after aggregation, a merged commitment
/// for a contiguous range ending at `block_ref`. Values are superseded, never
/// mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// Last L2 block covered.
    pub block_ref: L2BlockRef,
    /// Output root at `block_ref`.
    pub output_root: B256,
    /// Prover signature over the commitment.
    pub signature: Bytes,
    /// Whether any covered block initiated a withdrawal.
    pub has_withdrawals: bool,
}

/// Generates and merges proposals.
#[async_trait]
pub trait Prover: Send + Sync {
    /// Proves a single L2 block.
    ///
    /// The returned fragment's `has_withdrawals` flag asks for prompt submission.
    async fn generate(&self, block_number: u64) -> ProposerResult<Proposal>;

    /// Merges `proposals` on top of `prev_output_root`.
    ///
    /// Returns `None` for an empty input. A single proposal is returned as-is.
    async fn aggregate(
        &self,
        prev_output_root: B256,
        proposals: Vec<Proposal>,
    ) -> ProposerResult<Option<Proposal>>;
}

/// Returns true if the block's logs bloom contains the `L2ToL1MessagePasser`.
///
/// Bloom filters give false positives, never false negatives, so a `true`
/// here can at worst trigger an early submission.
pub fn check_withdrawals(header: &alloy_consensus::Header) -> bool {
    header.logs_bloom.contains_input(BloomInput::Raw(L2_TO_L1_MESSAGE_PASSER.as_slice()))
}
