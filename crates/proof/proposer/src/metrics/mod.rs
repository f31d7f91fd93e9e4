//! Metric names and recording helpers.

use crate::rpc::L2BlockRef;

/// Gauge: proposer build info, labelled with `version`.
pub const INFO: &str = "proposer_info";

/// Gauge: proposer is running (set to 1 at startup).
pub const UP: &str = "proposer_up";

/// Counter: total number of L2 output proposals included on L1.
pub const L2_BLOCKS_PROPOSED_TOTAL: &str = "proposer_l2_blocks_proposed_total";

/// Gauge: L2 block number of the most recent included proposal.
pub const LATEST_PROPOSED_L2_BLOCK: &str = "proposer_latest_proposed_l2_block";

/// Counter: rounds abandoned because a remote call failed.
pub const ROUND_FAILURES_TOTAL: &str = "proposer_round_failures_total";

/// Counter: total cache hits, labelled with `cache_name`.
pub const CACHE_HITS_TOTAL: &str = "proposer_cache_hits_total";

/// Counter: total cache misses, labelled with `cache_name`.
pub const CACHE_MISSES_TOTAL: &str = "proposer_cache_misses_total";

/// Label key for cache name.
pub const LABEL_CACHE_NAME: &str = "cache_name";

/// Label key for version.
pub const LABEL_VERSION: &str = "version";

/// Records startup metrics (INFO gauge with version label, UP gauge set to 1).
pub fn record_startup_metrics(version: &str) {
    metrics::gauge!(INFO, LABEL_VERSION => version.to_string()).set(1.0);
    metrics::gauge!(UP).set(1.0);
}

/// Records an included proposal ending at `block_ref`.
pub fn record_l2_blocks_proposed(block_ref: &L2BlockRef) {
    metrics::counter!(L2_BLOCKS_PROPOSED_TOTAL).increment(1);
    metrics::gauge!(LATEST_PROPOSED_L2_BLOCK).set(block_ref.number as f64);
}

/// Records an abandoned round.
pub fn record_round_failure() {
    metrics::counter!(ROUND_FAILURES_TOTAL).increment(1);
}
