//! Encodes proposals for the output oracle and hands them to the tx manager.

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use tracing::{error, info};

use crate::{
    ProposerResult,
    contracts::propose_l2_output_calldata,
    prover::Proposal,
    txmgr::{TxCandidate, TxManager},
};

/// What happened to a submitted proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Mined and executed successfully.
    Included {
        /// Transaction hash.
        tx_hash: B256,
    },
    /// Mined but reverted; the oracle did not advance.
    Reverted {
        /// Transaction hash.
        tx_hash: B256,
    },
}

/// Submits proposals to the output oracle's `proposeL2Output` entry point.
pub struct ProposalSubmitter {
    tx_manager: Arc<dyn TxManager>,
    oracle_address: Address,
}

impl std::fmt::Debug for ProposalSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProposalSubmitter")
            .field("oracle_address", &self.oracle_address)
            .finish_non_exhaustive()
    }
}

impl ProposalSubmitter {
    /// Creates a submitter targeting the oracle at `oracle_address`.
    pub fn new(tx_manager: Arc<dyn TxManager>, oracle_address: Address) -> Self {
        Self { tx_manager, oracle_address }
    }

    /// Sends `proposal` and waits for its receipt.
    ///
    /// A reverted receipt is an outcome, not an error. Errors mean no receipt
    /// was obtained. Nothing is retried here.
    pub async fn submit(&self, proposal: &Proposal) -> ProposerResult<SubmissionOutcome> {
        info!(
            output = %proposal.output_root,
            block = proposal.block_ref.number,
            l1_origin = proposal.block_ref.l1origin.number,
            "Proposing output root"
        );

        let candidate = TxCandidate {
            tx_data: propose_l2_output_calldata(
                proposal.output_root,
                proposal.block_ref.number,
                proposal.block_ref.l1origin.number,
                proposal.signature.clone(),
            ),
            to: self.oracle_address,
            gas_limit: 0,
        };

        let receipt = self.tx_manager.send(candidate).await?;

        if receipt.status {
            info!(
                tx_hash = %receipt.tx_hash,
                block = ?receipt.block_number,
                "Proposer tx successfully published"
            );
            Ok(SubmissionOutcome::Included { tx_hash: receipt.tx_hash })
        } else {
            error!(tx_hash = %receipt.tx_hash, "Proposer tx successfully published but reverted");
            Ok(SubmissionOutcome::Reverted { tx_hash: receipt.tx_hash })
        }
    }
}
