//! Constants used throughout the proposer.

use std::time::Duration;

use alloy_primitives::{Address, address};

/// Maximum time to wait for a proposal transaction to be included on-chain.
///
/// Independent of the poll interval: a slow submission holds the loop, it
/// does not overlap with the next round.
pub const PROPOSAL_TIMEOUT: Duration = Duration::from_secs(600);

/// Delay between receipt lookups for a broadcast proposal transaction.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Maximum time a single prover call (generate or aggregate) may take.
pub const PROVER_TIMEOUT: Duration = Duration::from_secs(600);

/// Default poll interval for checking new blocks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(6);

/// Default timeout for a single remote read issued by the driver.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default minimum number of blocks between count-triggered proposals.
pub const DEFAULT_MIN_PROPOSAL_INTERVAL: u64 = 512;

/// Default LRU cache size for RPC responses.
pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// Maximum request size accepted by the prover JSON-RPC client (witness payloads are large).
pub const PROVER_MAX_REQUEST_SIZE: u32 = 200 * 1024 * 1024;

/// `L2ToL1MessagePasser` predeploy. A block whose logs bloom contains this
/// address initiated a withdrawal.
pub const L2_TO_L1_MESSAGE_PASSER: Address = address!("0x4200000000000000000000000000000000000016");

// ============================================================================
// Retry Configuration Constants
// ============================================================================

/// Default maximum number of retry attempts for RPC operations.
pub const DEFAULT_RPC_MAX_RETRIES: u32 = 5;

/// Default initial delay for exponential backoff.
pub const DEFAULT_RETRY_INITIAL_DELAY: Duration = Duration::from_millis(100);

/// Default maximum delay between retry attempts.
pub const DEFAULT_RETRY_MAX_DELAY: Duration = Duration::from_secs(10);

// ============================================================================
// Gas Estimation Constants
// ============================================================================

/// Gas limit multiplier numerator (120% = 6/5).
pub const GAS_LIMIT_MULTIPLIER_NUMERATOR: u64 = 6;

/// Gas limit multiplier denominator (120% = 6/5).
pub const GAS_LIMIT_MULTIPLIER_DENOMINATOR: u64 = 5;
