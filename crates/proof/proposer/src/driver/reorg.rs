//! Reorg detection for the carried-forward proposal.

use alloy_primitives::B256;

use crate::rpc::{L2BlockRef, L2Client, RpcResult};

/// Whether a previously proposed block is still part of the canonical chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineCheck {
    /// The canonical block at that height has the expected hash.
    Canonical,
    /// The canonical block at that height changed.
    Reorged {
        /// Hash recorded in the carried-forward proposal.
        expected: B256,
        /// Hash of the canonical block now at that height.
        actual: B256,
    },
}

/// Re-fetches the canonical header at `block_ref.number` and compares hashes.
///
/// Always goes to the node: block numbers are not stable identities across a
/// reorg, so a cached answer could hide one.
pub async fn check_baseline(l2: &dyn L2Client, block_ref: &L2BlockRef) -> RpcResult<BaselineCheck> {
    let header = l2.header_by_number(Some(block_ref.number)).await?;
    if header.hash == block_ref.hash {
        Ok(BaselineCheck::Canonical)
    } else {
        Ok(BaselineCheck::Reorged { expected: block_ref.hash, actual: header.hash })
    }
}
