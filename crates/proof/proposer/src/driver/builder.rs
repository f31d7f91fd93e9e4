//! Per-round proposal construction.
//!
//! Each round reads the oracle, validates the carried-forward proposal
//! against the canonical chain, proves every block between the last proposed
//! block and the frontier in order, and merges the fragments into a single
//! proposal.

use std::{ops::RangeInclusive, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    DriverConfig, bounded,
    reorg::{BaselineCheck, check_baseline},
};
use crate::{
    ProposerResult,
    constants::PROVER_TIMEOUT,
    contracts::OutputOracleClient,
    prover::{Proposal, Prover},
    rpc::{L2Client, RollupClient},
};

/// The proposal carried between rounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Baseline {
    /// Nothing carried; the next round starts from the oracle.
    #[default]
    Empty,
    /// The merged proposal of the previous successful round.
    Proposal(Proposal),
}

impl Baseline {
    /// Returns the carried proposal, if any.
    pub const fn proposal(&self) -> Option<&Proposal> {
        match self {
            Self::Empty => None,
            Self::Proposal(proposal) => Some(proposal),
        }
    }

    /// Drops the carried proposal.
    pub fn reset(&mut self) {
        *self = Self::Empty;
    }

    /// Replaces the carried proposal with the result of a round.
    pub fn supersede(&mut self, next: Option<Proposal>) {
        *self = next.map_or(Self::Empty, Self::Proposal);
    }
}

/// Result of one successful round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Round {
    /// Merged proposal covering everything up to the frontier.
    pub proposal: Option<Proposal>,
    /// Whether the proposal should be submitted now.
    pub should_propose: bool,
    /// Blocks proved this round; empty when the frontier did not move.
    pub blocks: RangeInclusive<u64>,
    /// Frontier block number used this round.
    pub frontier: u64,
}

/// Builds the next proposal from on-chain state, the rollup node and the prover.
pub struct ProposalBuilder {
    l2_client: Arc<dyn L2Client>,
    rollup_client: Arc<dyn RollupClient>,
    oracle: Arc<dyn OutputOracleClient>,
    prover: Arc<dyn Prover>,
    config: DriverConfig,
}

impl std::fmt::Debug for ProposalBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProposalBuilder").field("config", &self.config).finish_non_exhaustive()
    }
}

impl ProposalBuilder {
    /// Creates a new builder.
    pub fn new(
        l2_client: Arc<dyn L2Client>,
        rollup_client: Arc<dyn RollupClient>,
        oracle: Arc<dyn OutputOracleClient>,
        prover: Arc<dyn Prover>,
        config: DriverConfig,
    ) -> Self {
        Self { l2_client, rollup_client, oracle, prover, config }
    }

    /// Runs one round on top of `baseline`.
    ///
    /// On success `baseline` holds the merged proposal. A detected reorg
    /// resets `baseline` immediately, even if a later step fails; any other
    /// failure leaves it untouched.
    pub async fn next_proposal(
        &self,
        cancel: &CancellationToken,
        baseline: &mut Baseline,
    ) -> ProposerResult<Round> {
        let timeout = self.config.network_timeout;

        let oracle_state =
            bounded(cancel, timeout, "latest L2 output", self.oracle.latest_l2_output()).await?;
        let mut proposed = oracle_state.l2_block_number;

        if let Some(block_ref) = baseline.proposal().map(|p| p.block_ref.clone()) {
            let check = bounded(
                cancel,
                timeout,
                "proposal header",
                check_baseline(self.l2_client.as_ref(), &block_ref),
            )
            .await?;

            match check {
                BaselineCheck::Canonical => proposed = block_ref.number,
                BaselineCheck::Reorged { expected, actual } => {
                    warn!(
                        block = block_ref.number,
                        last_proposal = %expected,
                        l2_block = %actual,
                        "Last proposal block hash does not match the L2 block hash, possible reorg"
                    );
                    baseline.reset();
                }
            }
        }

        let sync_status =
            bounded(cancel, timeout, "sync status", self.rollup_client.sync_status()).await?;
        let frontier = sync_status.frontier(self.config.allow_non_finalized).number;

        let min_interval = self.config.min_proposal_interval;
        let mut should_propose =
            min_interval > 0 && frontier.saturating_sub(proposed) > min_interval;

        let blocks = proposed.saturating_add(1)..=frontier;
        let mut fragments: Vec<Proposal> = baseline.proposal().cloned().into_iter().collect();

        for block_number in blocks.clone() {
            let fragment = bounded(
                cancel,
                PROVER_TIMEOUT,
                "proof generation",
                self.prover.generate(block_number),
            )
            .await?;
            debug!(block_number, has_withdrawals = fragment.has_withdrawals, "Proved block");
            should_propose |= fragment.has_withdrawals;
            fragments.push(fragment);
        }

        let merged = bounded(
            cancel,
            PROVER_TIMEOUT,
            "proof aggregation",
            self.prover.aggregate(oracle_state.output_root, fragments),
        )
        .await?;

        baseline.supersede(merged.clone());

        debug!(
            proposed,
            frontier,
            should_propose,
            l2_block = merged.as_ref().map(|p| p.block_ref.number),
            "Built proposal"
        );

        Ok(Round { proposal: merged, should_propose, blocks, frontier })
    }
}
