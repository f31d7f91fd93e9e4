//! CLI argument definitions for proposer.

use std::{net::IpAddr, time::Duration};

use alloy_primitives::Address;
use clap::{ArgAction, Parser};
use url::Url;

use crate::{
    constants::{DEFAULT_MIN_PROPOSAL_INTERVAL, DEFAULT_RPC_MAX_RETRIES},
    logging::LogFormat,
};

/// Proposer - submits proven L2 output roots to the L1 output oracle.
#[derive(Debug, Clone, Parser)]
#[command(name = "proposer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Proposer configuration arguments.
    #[command(flatten)]
    pub proposer: ProposerArgs,

    /// Logging configuration arguments.
    #[command(flatten)]
    pub logging: LogArgs,

    /// Metrics configuration arguments.
    #[command(flatten)]
    pub metrics: MetricsArgs,

    /// RPC server configuration arguments.
    #[command(flatten)]
    pub rpc: RpcServerArgs,
}

/// Core proposer configuration arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Proposer")]
pub struct ProposerArgs {
    /// URL of the L1 Ethereum RPC endpoint.
    #[arg(long = "l1-eth-rpc", env = "PROPOSER_L1_ETH_RPC", value_parser = parse_url)]
    pub l1_eth_rpc: Url,

    /// URL of the L2 Ethereum RPC endpoint.
    #[arg(long = "l2-eth-rpc", env = "PROPOSER_L2_ETH_RPC", value_parser = parse_url)]
    pub l2_eth_rpc: Url,

    /// URL of the rollup RPC endpoint.
    #[arg(long = "rollup-rpc", env = "PROPOSER_ROLLUP_RPC", value_parser = parse_url)]
    pub rollup_rpc: Url,

    /// URL of the proving service JSON-RPC endpoint.
    #[arg(long = "prover-rpc", env = "PROPOSER_PROVER_RPC", value_parser = parse_url)]
    pub prover_rpc: Url,

    /// Address of the `L2OutputOracle` contract on L1.
    #[arg(long = "l2oo-address", env = "PROPOSER_L2OO_ADDRESS", value_parser = parse_address)]
    pub l2oo_address: Address,

    /// Polling interval for new blocks (e.g., "6s", "1m").
    #[arg(
        long = "poll-interval",
        env = "PROPOSER_POLL_INTERVAL",
        default_value = "6s",
        value_parser = parse_duration
    )]
    pub poll_interval: Duration,

    /// Number of new blocks that triggers a proposal; 0 proposes only on withdrawals.
    #[arg(
        long = "min-proposal-interval",
        env = "PROPOSER_MIN_PROPOSAL_INTERVAL",
        default_value_t = DEFAULT_MIN_PROPOSAL_INTERVAL
    )]
    pub min_proposal_interval: u64,

    /// Propose from the safe head instead of the finalized head.
    #[arg(
        long = "allow-non-finalized",
        env = "PROPOSER_ALLOW_NON_FINALIZED",
        default_value = "false"
    )]
    pub allow_non_finalized: bool,

    /// Deadline for each L1, L2 or rollup read (e.g., "10s").
    #[arg(
        long = "network-timeout",
        env = "PROPOSER_NETWORK_TIMEOUT",
        default_value = "10s",
        value_parser = parse_duration
    )]
    pub network_timeout: Duration,

    /// Maximum number of retry attempts for RPC operations.
    #[arg(
        long = "rpc-max-retries",
        env = "PROPOSER_RPC_MAX_RETRIES",
        default_value_t = DEFAULT_RPC_MAX_RETRIES
    )]
    pub rpc_max_retries: u32,

    /// Initial delay for exponential backoff (e.g., "100ms", "1s").
    #[arg(
        long = "rpc-retry-initial-delay",
        env = "PROPOSER_RPC_RETRY_INITIAL_DELAY",
        default_value = "100ms",
        value_parser = parse_duration
    )]
    pub rpc_retry_initial_delay: Duration,

    /// Maximum delay between retry attempts (e.g., "10s", "1m").
    #[arg(
        long = "rpc-retry-max-delay",
        env = "PROPOSER_RPC_RETRY_MAX_DELAY",
        default_value = "10s",
        value_parser = parse_duration
    )]
    pub rpc_retry_max_delay: Duration,

    /// Private key for local transaction signing (hex-encoded, for development).
    /// Mutually exclusive with --signer-endpoint/--signer-address.
    #[arg(long = "private-key", env = "PROPOSER_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// URL of the signer sidecar JSON-RPC endpoint (for production).
    /// Must be used together with --signer-address.
    #[arg(long = "signer-endpoint", env = "PROPOSER_SIGNER_ENDPOINT", value_parser = parse_url)]
    pub signer_endpoint: Option<Url>,

    /// Address of the signer account on the signer sidecar.
    /// Must be used together with --signer-endpoint.
    #[arg(
        long = "signer-address",
        env = "PROPOSER_SIGNER_ADDRESS",
        value_parser = parse_address
    )]
    pub signer_address: Option<Address>,
}

/// Logging configuration arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Logging")]
pub struct LogArgs {
    /// Increase logging verbosity (1=ERROR, 2=WARN, 3=INFO, 4=DEBUG, 5=TRACE).
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        default_value = "3",
        env = "PROPOSER_LOG_LEVEL",
        global = true
    )]
    pub level: u8,

    /// Suppress stdout logging.
    #[arg(long = "quiet", short = 'q', global = true)]
    pub stdout_quiet: bool,

    /// Stdout log format.
    #[arg(long = "log-format", default_value = "full", env = "PROPOSER_LOG_FORMAT", global = true)]
    pub stdout_format: LogFormat,
}

/// Metrics server configuration arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "Metrics")]
pub struct MetricsArgs {
    /// Enable metrics server.
    #[arg(
        id = "metrics_enabled",
        long = "metrics.enabled",
        env = "PROPOSER_METRICS_ENABLED",
        default_value = "false"
    )]
    pub enabled: bool,

    /// Metrics server bind address.
    #[arg(
        id = "metrics_addr",
        long = "metrics.addr",
        env = "PROPOSER_METRICS_ADDR",
        default_value = "0.0.0.0"
    )]
    pub addr: IpAddr,

    /// Metrics server port.
    #[arg(
        id = "metrics_port",
        long = "metrics.port",
        env = "PROPOSER_METRICS_PORT",
        default_value = "7300"
    )]
    pub port: u16,
}

/// Health and admin server configuration arguments.
#[derive(Debug, Clone, Parser)]
#[command(next_help_heading = "RPC Server")]
pub struct RpcServerArgs {
    /// Enable admin RPC methods.
    #[arg(
        id = "rpc_enable_admin",
        long = "rpc.enable-admin",
        env = "PROPOSER_RPC_ENABLE_ADMIN",
        default_value = "false"
    )]
    pub enable_admin: bool,

    /// RPC server bind address.
    #[arg(
        id = "rpc_addr",
        long = "rpc.addr",
        env = "PROPOSER_RPC_ADDR",
        default_value = "127.0.0.1"
    )]
    pub addr: IpAddr,

    /// RPC server port.
    #[arg(id = "rpc_port", long = "rpc.port", env = "PROPOSER_RPC_PORT", default_value = "8545")]
    pub port: u16,
}

/// Parse a duration string like "6s", "5m", "1h".
fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

/// Parse a URL string.
fn parse_url(s: &str) -> Result<Url, url::ParseError> {
    Url::parse(s)
}

/// Parse an Ethereum address from hex string.
fn parse_address(s: &str) -> Result<Address, alloy_primitives::hex::FromHexError> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 11] = [
        "proposer",
        "--l1-eth-rpc",
        "http://localhost:8545",
        "--l2-eth-rpc",
        "http://localhost:9545",
        "--rollup-rpc",
        "http://localhost:7545",
        "--prover-rpc",
        "http://localhost:7000",
        "--l2oo-address",
        "0x1234567890123456789012345678901234567890",
    ];

    #[test]
    fn test_parse_duration_valid() {
        assert_eq!(parse_duration("6s").unwrap(), Duration::from_secs(6));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn test_parse_url_invalid() {
        assert!(parse_url("not-a-url").is_err());
    }

    #[test]
    fn test_parse_address_invalid() {
        assert!(parse_address("0xnotanaddress").is_err());
        assert!(parse_address("invalid").is_err());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(REQUIRED).unwrap();

        assert_eq!(cli.proposer.poll_interval, Duration::from_secs(6));
        assert_eq!(cli.proposer.min_proposal_interval, 512);
        assert!(!cli.proposer.allow_non_finalized);
        assert_eq!(cli.proposer.network_timeout, Duration::from_secs(10));
        assert_eq!(cli.proposer.rollup_rpc.as_str(), "http://localhost:7545/");
        assert_eq!(
            cli.proposer.l2oo_address,
            "0x1234567890123456789012345678901234567890".parse::<Address>().unwrap()
        );

        assert_eq!(cli.proposer.rpc_max_retries, 5);
        assert_eq!(cli.proposer.rpc_retry_initial_delay, Duration::from_millis(100));
        assert_eq!(cli.proposer.rpc_retry_max_delay, Duration::from_secs(10));

        assert!(cli.proposer.private_key.is_none());
        assert!(cli.proposer.signer_endpoint.is_none());
        assert!(cli.proposer.signer_address.is_none());

        assert_eq!(cli.logging.level, 3);
        assert_eq!(cli.logging.stdout_format, LogFormat::Full);
        assert!(!cli.logging.stdout_quiet);

        assert!(!cli.metrics.enabled);
        assert_eq!(cli.metrics.addr, "0.0.0.0".parse::<IpAddr>().unwrap());
        assert_eq!(cli.metrics.port, 7300);

        assert!(!cli.rpc.enable_admin);
        assert_eq!(cli.rpc.addr, "127.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(cli.rpc.port, 8545);
    }

    #[test]
    fn test_cli_overrides() {
        let mut args = REQUIRED.to_vec();
        args.extend([
            "--poll-interval",
            "12s",
            "--min-proposal-interval",
            "0",
            "--allow-non-finalized",
            "--network-timeout",
            "1m",
        ]);
        let cli = Cli::try_parse_from(args).unwrap();

        assert_eq!(cli.proposer.poll_interval, Duration::from_secs(12));
        assert_eq!(cli.proposer.min_proposal_interval, 0);
        assert!(cli.proposer.allow_non_finalized);
        assert_eq!(cli.proposer.network_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_cli_missing_required() {
        assert!(Cli::try_parse_from(["proposer"]).is_err());
        assert!(Cli::try_parse_from(&REQUIRED[..9]).is_err());
    }
}
