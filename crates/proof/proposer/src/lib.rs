#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod cli;
pub use cli::{Cli, LogArgs, MetricsArgs, ProposerArgs, RpcServerArgs};

mod config;
pub use config::{
    ConfigError, MetricsConfig, ProposerConfig, RetryConfig, RpcServerConfig, SigningConfig,
    build_signing_config, validate_url,
};

mod constants;
pub use constants::*;

mod contracts;
pub use contracts::{
    IOutputOracle, OracleState, OutputOracleCaller, OutputOracleClient, OutputProposal,
    propose_l2_output_calldata,
};

mod driver;
pub use driver::{
    Baseline, BaselineCheck, Driver, DriverConfig, DriverHandle, DriverSetup, DriverStatus,
    ProposalBuilder, ProposalSubmitter, ProposerDriverControl, Round, SubmissionOutcome,
    check_baseline,
};

mod error;
pub use error::*;

mod health;
pub use health::serve;

mod logging;
pub use logging::{LogConfig, LogFormat, StdoutLogConfig, verbosity_to_level_filter};

pub mod metrics;

mod prover;
pub use prover::{Proposal, Prover, RpcProver, RpcProverConfig, check_withdrawals};

mod rpc;
pub use rpc::{
    CacheMetrics, HttpProvider, L1BlockId, L1BlockRef, L1Client, L1ClientConfig, L1ClientImpl,
    L2BlockRef, L2Client, L2ClientConfig, L2ClientImpl, L2HttpProvider, MeteredCache, OpBlock,
    ProofCacheKey, RollupClient, RollupClientConfig, RollupClientImpl, RollupConfig,
    RollupGenesis, RpcError, RpcResult, SyncStatus,
};

mod service;
pub use service::run;

mod signal;
pub use signal::setup_signal_handler;

mod txmgr;
pub use txmgr::{SimpleTxManager, TxCandidate, TxManager, TxReceipt, create_tx_manager};

#[cfg(test)]
mod test_utils;
