//! Driver loop for the proposer.
//!
//! Each poll tick builds the next proposal on top of the one carried from the
//! previous round and, when the round says so, submits it to the output
//! oracle. Rounds run strictly one at a time.

use std::{future::Future, sync::Arc, time::Duration};

use alloy_primitives::Address;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    ProposerError, ProposerResult,
    constants::{
        DEFAULT_MIN_PROPOSAL_INTERVAL, DEFAULT_NETWORK_TIMEOUT, DEFAULT_POLL_INTERVAL,
        PROPOSAL_TIMEOUT,
    },
    contracts::OutputOracleClient,
    metrics,
    prover::Prover,
    rpc::{L1Client, L2Client, RollupClient},
    txmgr::TxManager,
};

mod builder;
pub use builder::{Baseline, ProposalBuilder, Round};

mod handle;
pub use handle::{DriverHandle, DriverStatus, ProposerDriverControl};

mod reorg;
pub use reorg::{BaselineCheck, check_baseline};

mod submitter;
pub use submitter::{ProposalSubmitter, SubmissionOutcome};

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Polling interval for new blocks.
    pub poll_interval: Duration,
    /// Block count above which a proposal is submitted. `0` disables the
    /// count trigger, leaving only withdrawals to trigger submission.
    pub min_proposal_interval: u64,
    /// If true, use `safe_l2` (derived from L1 but L1 not yet finalized).
    /// If false (default), use `finalized_l2` (derived from finalized L1).
    pub allow_non_finalized: bool,
    /// Deadline for each chain or oracle read.
    pub network_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_proposal_interval: DEFAULT_MIN_PROPOSAL_INTERVAL,
            allow_non_finalized: false,
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }
}

/// Everything the driver is built from.
#[derive(Clone)]
pub struct DriverSetup {
    /// Driver configuration.
    pub config: DriverConfig,
    /// Output oracle address on L1.
    pub oracle_address: Address,
    /// L1 reader, used for the construction handshake.
    pub l1_client: Arc<dyn L1Client>,
    /// L2 reader.
    pub l2_client: Arc<dyn L2Client>,
    /// Rollup node reader.
    pub rollup_client: Arc<dyn RollupClient>,
    /// Output oracle read path.
    pub oracle: Arc<dyn OutputOracleClient>,
    /// Proof generation and aggregation.
    pub prover: Arc<dyn Prover>,
    /// L1 transaction submission.
    pub tx_manager: Arc<dyn TxManager>,
}

impl std::fmt::Debug for DriverSetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverSetup")
            .field("config", &self.config)
            .field("oracle_address", &self.oracle_address)
            .finish_non_exhaustive()
    }
}

/// How a single tick ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// The round failed or was cancelled before a decision.
    Abandoned,
    /// The round succeeded but nothing was due for submission.
    Skipped,
    /// A transaction was mined.
    Submitted(SubmissionOutcome),
    /// No receipt was obtained.
    SubmissionFailed,
}

/// The submission loop.
pub struct Driver {
    config: DriverConfig,
    builder: ProposalBuilder,
    submitter: ProposalSubmitter,
    baseline: Baseline,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("config", &self.config)
            .field("baseline", &self.baseline.proposal().map(|p| p.block_ref.number))
            .finish_non_exhaustive()
    }
}

impl Driver {
    /// Creates a driver without contacting any remote.
    pub fn new(setup: DriverSetup) -> Self {
        let builder = ProposalBuilder::new(
            setup.l2_client,
            setup.rollup_client,
            setup.oracle,
            setup.prover,
            setup.config.clone(),
        );
        let submitter = ProposalSubmitter::new(setup.tx_manager, setup.oracle_address);
        Self { config: setup.config, builder, submitter, baseline: Baseline::Empty }
    }

    /// Creates a driver after checking that the oracle is deployed and answers.
    pub async fn connect(setup: DriverSetup, cancel: &CancellationToken) -> ProposerResult<Self> {
        let timeout = setup.config.network_timeout;
        let address = setup.oracle_address;

        let code =
            bounded(cancel, timeout, "oracle code", setup.l1_client.code_at(address, None)).await?;
        if code.is_empty() {
            return Err(ProposerError::Contract(format!("no contract code at {address}")));
        }

        let version = bounded(cancel, timeout, "oracle version", setup.oracle.version()).await?;
        info!(%address, version, "Connected to L2OutputOracle");

        Ok(Self::new(setup))
    }

    /// Returns the carried-forward proposal.
    pub const fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// Runs the loop until `cancel` fires, then hands the driver back.
    pub async fn run(mut self, cancel: CancellationToken) -> Self {
        info!(poll_interval = ?self.config.poll_interval, "Starting driver loop");

        let period = self.config.poll_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    // Quit wins over a tick that became ready at the same time.
                    if cancel.is_cancelled() {
                        break;
                    }
                    self.tick(&cancel).await;
                }
            }
        }

        info!("Driver loop stopped");
        self
    }

    pub(crate) async fn tick(&mut self, cancel: &CancellationToken) -> TickOutcome {
        let round = match self.builder.next_proposal(cancel, &mut self.baseline).await {
            Ok(round) => round,
            Err(ProposerError::Cancelled) => {
                debug!("Round cancelled");
                return TickOutcome::Abandoned;
            }
            Err(e) => {
                warn!(error = %e, "Error getting output");
                metrics::record_round_failure();
                return TickOutcome::Abandoned;
            }
        };

        if !round.should_propose {
            debug!(frontier = round.frontier, proved = ?round.blocks, "Nothing to propose yet");
            return TickOutcome::Skipped;
        }
        let Some(proposal) = round.proposal else {
            return TickOutcome::Skipped;
        };

        let submission = self.submitter.submit(&proposal);
        match bounded(cancel, PROPOSAL_TIMEOUT, "proposal submission", submission).await {
            Ok(outcome) => {
                if matches!(outcome, SubmissionOutcome::Included { .. }) {
                    metrics::record_l2_blocks_proposed(&proposal.block_ref);
                }
                TickOutcome::Submitted(outcome)
            }
            Err(e) => {
                error!(
                    error = %e,
                    block = proposal.block_ref.number,
                    "Failed to send proposal transaction"
                );
                TickOutcome::SubmissionFailed
            }
        }
    }
}

/// Awaits `fut` unless `cancel` fires or `limit` elapses first.
pub(crate) async fn bounded<T, E, F>(
    cancel: &CancellationToken,
    limit: Duration,
    what: &'static str,
    fut: F,
) -> ProposerResult<T>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ProposerError>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ProposerError::Cancelled),
        result = tokio::time::timeout(limit, fut) => match result {
            Ok(inner) => inner.map_err(Into::into),
            Err(_) => Err(ProposerError::Timeout(what)),
        },
    }
}
