//! RPC response types for OP Stack rollup nodes.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// OP Stack block type with Optimism-specific transactions.
///
/// Uses `op_alloy_rpc_types::Transaction` which can deserialize deposit transactions (type 0x7E).
pub type OpBlock = alloy_rpc_types_eth::Block<op_alloy_rpc_types::Transaction>;

/// L1 block reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1BlockRef {
    /// Block hash.
    pub hash: B256,
    /// Block number.
    pub number: u64,
    /// Parent block hash.
    pub parent_hash: B256,
    /// Block timestamp.
    pub timestamp: u64,
}

/// Reference to an L2 block and the L1 block it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L2BlockRef {
    /// Block hash.
    pub hash: B256,
    /// Block number.
    pub number: u64,
    /// Parent block hash.
    pub parent_hash: B256,
    /// Block timestamp.
    pub timestamp: u64,
    /// L1 origin reference (only hash and number are provided by the RPC).
    pub l1origin: L1BlockId,
    /// Sequence number within the epoch.
    pub sequence_number: u64,
}

/// Minimal L1 block identifier containing only hash and number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct L1BlockId {
    /// Block hash.
    pub hash: B256,
    /// Block number.
    pub number: u64,
}

/// Sync status from `optimism_syncStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncStatus {
    /// Current L1 block reference.
    pub current_l1: L1BlockRef,
    /// Current L1 finalized block.
    #[serde(default)]
    pub current_l1_finalized: Option<L1BlockRef>,
    /// Head L1 block reference.
    pub head_l1: L1BlockRef,
    /// Safe L1 block reference.
    pub safe_l1: L1BlockRef,
    /// Finalized L1 block reference.
    pub finalized_l1: L1BlockRef,
    /// Unsafe L2 block reference.
    pub unsafe_l2: L2BlockRef,
    /// Safe L2 block reference.
    pub safe_l2: L2BlockRef,
    /// Finalized L2 block reference.
    pub finalized_l2: L2BlockRef,
    /// Pending safe L2 block reference.
    #[serde(default)]
    pub pending_safe_l2: Option<L2BlockRef>,
}

impl SyncStatus {
    /// Returns the highest L2 block eligible for submission.
    ///
    /// The finalized head by default; the safe head when non-finalized
    /// submissions are allowed.
    pub const fn frontier(&self, allow_non_finalized: bool) -> &L2BlockRef {
        if allow_non_finalized { &self.safe_l2 } else { &self.finalized_l2 }
    }
}

/// Genesis anchors of the rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupGenesis {
    /// L1 block the rollup starts from.
    pub l1: L1BlockId,
    /// First L2 block.
    pub l2: L1BlockId,
    /// Timestamp of the first L2 block.
    pub l2_time: u64,
}

/// The subset of `optimism_rollupConfig` the proposer reads.
///
/// Unknown fields are ignored so newer rollup nodes stay compatible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Genesis anchors.
    pub genesis: RollupGenesis,
    /// L2 block time in seconds.
    pub block_time: u64,
    /// L1 chain id.
    pub l1_chain_id: u64,
    /// L2 chain id.
    pub l2_chain_id: u64,
}
