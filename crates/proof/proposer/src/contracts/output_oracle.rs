//! `L2OutputOracle` bindings: the read path used every round and the
//! calldata of the submission entry point.

use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::{SolCall, sol};
use async_trait::async_trait;

use crate::{ProposerError, ProposerResult, rpc::L1Client};

sol! {
    /// Output proposal as stored by the oracle.
    #[derive(Debug, Default, PartialEq, Eq)]
    struct OutputProposal {
        bytes32 outputRoot;
        uint128 timestamp;
        uint128 l2BlockNumber;
    }

    /// The subset of the `L2OutputOracle` ABI the proposer uses.
    interface IOutputOracle {
        function version() external view returns (string memory);
        function latestL2Output() external view returns (OutputProposal memory);
        function proposeL2Output(
            bytes32 outputRoot,
            uint256 l2BlockNumber,
            uint256 l1BlockNumber,
            bytes calldata signature
        ) external;
    }
}

/// The authoritative on-chain record of what has been proposed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleState {
    /// L2 block number of the latest committed output.
    pub l2_block_number: u64,
    /// Output root of the latest committed output.
    pub output_root: B256,
}

impl TryFrom<OutputProposal> for OracleState {
    type Error = ProposerError;

    fn try_from(proposal: OutputProposal) -> Result<Self, Self::Error> {
        let l2_block_number = u64::try_from(proposal.l2BlockNumber).map_err(|_| {
            ProposerError::Contract(format!(
                "latest L2 block number {} does not fit in u64",
                proposal.l2BlockNumber
            ))
        })?;
        Ok(Self { l2_block_number, output_root: proposal.outputRoot })
    }
}

/// Read access to the output oracle.
#[async_trait]
pub trait OutputOracleClient: Send + Sync {
    /// Returns the contract's semantic version string.
    async fn version(&self) -> ProposerResult<String>;

    /// Returns the latest committed output. Never cached.
    async fn latest_l2_output(&self) -> ProposerResult<OracleState>;
}

/// [`OutputOracleClient`] backed by `eth_call` through an [`L1Client`].
pub struct OutputOracleCaller {
    l1_client: Arc<dyn L1Client>,
    address: Address,
}

impl std::fmt::Debug for OutputOracleCaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputOracleCaller").field("address", &self.address).finish_non_exhaustive()
    }
}

impl OutputOracleCaller {
    /// Creates a caller for the oracle deployed at `address`.
    pub fn new(l1_client: Arc<dyn L1Client>, address: Address) -> Self {
        Self { l1_client, address }
    }

    /// Returns the oracle address.
    pub const fn address(&self) -> Address {
        self.address
    }

    async fn call<C: SolCall>(&self, call: C) -> ProposerResult<C::Return> {
        let data = Bytes::from(call.abi_encode());
        let output = self.l1_client.call_contract(self.address, data, None).await?;
        C::abi_decode_returns(&output).map_err(|e| {
            ProposerError::Contract(format!("failed to decode {} result: {e}", C::SIGNATURE))
        })
    }
}

#[async_trait]
impl OutputOracleClient for OutputOracleCaller {
    async fn version(&self) -> ProposerResult<String> {
        self.call(IOutputOracle::versionCall {}).await
    }

    async fn latest_l2_output(&self) -> ProposerResult<OracleState> {
        self.call(IOutputOracle::latestL2OutputCall {}).await?.try_into()
    }
}

/// Encodes `proposeL2Output(outputRoot, l2BlockNumber, l1BlockNumber, signature)`.
pub fn propose_l2_output_calldata(
    output_root: B256,
    l2_block_number: u64,
    l1_block_number: u64,
    signature: Bytes,
) -> Bytes {
    IOutputOracle::proposeL2OutputCall {
        outputRoot: output_root,
        l2BlockNumber: U256::from(l2_block_number),
        l1BlockNumber: U256::from(l1_block_number),
        signature,
    }
    .abi_encode()
    .into()
}
