//! Configuration types and validation for the proposer.

use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

use alloy_primitives::Address;
use alloy_signer::k256::ecdsa::SigningKey;
use alloy_signer_local::PrivateKeySigner;
use backon::ExponentialBuilder;
use thiserror::Error;
use url::Url;

use crate::{
    cli::Cli,
    constants::{DEFAULT_RETRY_INITIAL_DELAY, DEFAULT_RETRY_MAX_DELAY, DEFAULT_RPC_MAX_RETRIES},
    driver::DriverConfig,
    logging::{LogConfig, StdoutLogConfig, verbosity_to_level_filter},
};

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid URL format.
    #[error("invalid {field} URL: {reason}")]
    InvalidUrl {
        /// The field name that contains the invalid URL.
        field: &'static str,
        /// The reason the URL is invalid.
        reason: String,
    },
    /// A field value is out of the allowed range.
    #[error("{field} must be {constraint}, got {value}")]
    OutOfRange {
        /// The field name that is out of range.
        field: &'static str,
        /// The constraint description.
        constraint: &'static str,
        /// The actual value.
        value: String,
    },
    /// Invalid metrics configuration.
    #[error("invalid metrics config: {0}")]
    Metrics(String),
    /// Invalid RPC configuration.
    #[error("invalid RPC config: {0}")]
    Rpc(String),
    /// Invalid signing configuration.
    #[error("invalid signing config: {0}")]
    Signing(String),
}

/// Signing configuration for L1 transaction submission.
#[derive(Clone)]
pub enum SigningConfig {
    /// Local signing with an in-process private key (development).
    Local {
        /// The private key signer.
        signer: PrivateKeySigner,
    },
    /// Remote signing via a signer sidecar JSON-RPC endpoint (production).
    Remote {
        /// URL of the signer sidecar.
        endpoint: Url,
        /// Address of the signer account.
        address: Address,
    },
}

impl std::fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { signer } => {
                f.debug_struct("Local").field("address", &signer.address()).finish()
            }
            Self::Remote { endpoint, address } => f
                .debug_struct("Remote")
                .field("endpoint", endpoint)
                .field("address", address)
                .finish(),
        }
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether the exporter is installed.
    pub enabled: bool,
    /// Listen address.
    pub addr: IpAddr,
    /// Listen port.
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: false, addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 7300 }
    }
}

/// Validated proposer configuration.
#[derive(Debug, Clone)]
pub struct ProposerConfig {
    /// URL of the L1 Ethereum RPC endpoint.
    pub l1_eth_rpc: Url,
    /// URL of the L2 Ethereum RPC endpoint.
    pub l2_eth_rpc: Url,
    /// URL of the rollup RPC endpoint.
    pub rollup_rpc: Url,
    /// URL of the proving service.
    pub prover_rpc: Url,
    /// Address of the `L2OutputOracle` contract on L1.
    pub l2oo_address: Address,
    /// Polling interval for new blocks.
    pub poll_interval: Duration,
    /// Block count above which a proposal is submitted; `0` disables it.
    pub min_proposal_interval: u64,
    /// Propose from the safe head instead of the finalized head.
    pub allow_non_finalized: bool,
    /// Deadline for each chain or oracle read.
    pub network_timeout: Duration,
    /// Logging configuration.
    pub log: LogConfig,
    /// Metrics server configuration.
    pub metrics: MetricsConfig,
    /// Health and admin server configuration.
    pub rpc: RpcServerConfig,
    /// RPC retry configuration.
    pub retry: RetryConfig,
    /// Signing configuration for L1 transaction submission.
    pub signing: SigningConfig,
}

impl ProposerConfig {
    /// Validates parsed CLI arguments.
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let args = cli.proposer;

        validate_url(&args.l1_eth_rpc, "l1-eth-rpc")?;
        validate_url(&args.l2_eth_rpc, "l2-eth-rpc")?;
        validate_url(&args.rollup_rpc, "rollup-rpc")?;
        validate_url(&args.prover_rpc, "prover-rpc")?;

        non_zero_duration(args.poll_interval, "poll-interval")?;
        non_zero_duration(args.network_timeout, "network-timeout")?;
        non_zero_duration(args.rpc_retry_initial_delay, "rpc-retry-initial-delay")?;
        if args.rpc_retry_max_delay < args.rpc_retry_initial_delay {
            return Err(ConfigError::OutOfRange {
                field: "rpc-retry-max-delay",
                constraint: "at least rpc-retry-initial-delay",
                value: humantime::format_duration(args.rpc_retry_max_delay).to_string(),
            });
        }

        if cli.metrics.enabled && cli.metrics.port == 0 {
            return Err(ConfigError::Metrics("port must be non-zero".to_string()));
        }
        if cli.rpc.port == 0 {
            return Err(ConfigError::Rpc("RPC port must be non-zero".to_string()));
        }

        let signing = build_signing_config(
            args.private_key.as_deref(),
            args.signer_endpoint.as_ref(),
            args.signer_address.as_ref(),
        )?;

        let log = LogConfig {
            global_level: verbosity_to_level_filter(cli.logging.level),
            stdout_logs: (!cli.logging.stdout_quiet)
                .then_some(StdoutLogConfig { format: cli.logging.stdout_format }),
        };

        Ok(Self {
            l1_eth_rpc: args.l1_eth_rpc,
            l2_eth_rpc: args.l2_eth_rpc,
            rollup_rpc: args.rollup_rpc,
            prover_rpc: args.prover_rpc,
            l2oo_address: args.l2oo_address,
            poll_interval: args.poll_interval,
            min_proposal_interval: args.min_proposal_interval,
            allow_non_finalized: args.allow_non_finalized,
            network_timeout: args.network_timeout,
            log,
            metrics: MetricsConfig {
                enabled: cli.metrics.enabled,
                addr: cli.metrics.addr,
                port: cli.metrics.port,
            },
            rpc: RpcServerConfig {
                enable_admin: cli.rpc.enable_admin,
                addr: cli.rpc.addr,
                port: cli.rpc.port,
            },
            retry: RetryConfig {
                max_attempts: args.rpc_max_retries,
                initial_delay: args.rpc_retry_initial_delay,
                max_delay: args.rpc_retry_max_delay,
            },
            signing,
        })
    }

    /// Driver settings carried by this configuration.
    pub const fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            poll_interval: self.poll_interval,
            min_proposal_interval: self.min_proposal_interval,
            allow_non_finalized: self.allow_non_finalized,
            network_timeout: self.network_timeout,
        }
    }
}

fn non_zero_duration(value: Duration, field: &'static str) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::OutOfRange {
            field,
            constraint: "greater than 0",
            value: humantime::format_duration(value).to_string(),
        });
    }
    Ok(())
}

/// Validate that a URL has a scheme and host.
pub fn validate_url(url: &Url, field: &'static str) -> Result<(), ConfigError> {
    if url.scheme().is_empty() {
        return Err(ConfigError::InvalidUrl { field, reason: "missing scheme".to_string() });
    }

    if url.host().is_none() {
        return Err(ConfigError::InvalidUrl { field, reason: "missing host".to_string() });
    }

    Ok(())
}

/// Validate and build [`SigningConfig`] from raw arguments.
///
/// Exactly one of `private_key` or (`signer_endpoint` + `signer_address`) must be provided.
pub fn build_signing_config(
    private_key: Option<&str>,
    signer_endpoint: Option<&Url>,
    signer_address: Option<&Address>,
) -> Result<SigningConfig, ConfigError> {
    match (private_key, signer_endpoint, signer_address) {
        (Some(pk), None, None) => {
            let key_bytes = hex::decode(pk.strip_prefix("0x").unwrap_or(pk))
                .map_err(|e| ConfigError::Signing(format!("invalid private key hex: {e}")))?;
            let signing_key = SigningKey::from_slice(&key_bytes)
                .map_err(|e| ConfigError::Signing(format!("invalid private key: {e}")))?;
            Ok(SigningConfig::Local { signer: PrivateKeySigner::from_signing_key(signing_key) })
        }
        (None, Some(endpoint), Some(address)) => {
            validate_url(endpoint, "signer-endpoint")?;
            Ok(SigningConfig::Remote { endpoint: endpoint.clone(), address: *address })
        }
        (None, None, None) => Err(ConfigError::Signing(
            "one of --private-key or (--signer-endpoint + --signer-address) must be provided"
                .to_string(),
        )),
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(ConfigError::Signing(
            "--private-key is mutually exclusive with --signer-endpoint/--signer-address"
                .to_string(),
        )),
        (None, Some(_), None) => {
            Err(ConfigError::Signing("--signer-endpoint requires --signer-address".to_string()))
        }
        (None, None, Some(_)) => {
            Err(ConfigError::Signing("--signer-address requires --signer-endpoint".to_string()))
        }
    }
}

/// Health and admin server configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcServerConfig {
    /// Whether admin RPC methods are enabled.
    pub enable_admin: bool,
    /// Bind address.
    pub addr: IpAddr,
    /// Bind port.
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self { enable_admin: false, addr: IpAddr::V4(Ipv4Addr::LOCALHOST), port: 8545 }
    }
}

/// Validated RPC retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_attempts: u32,
    /// Initial delay for exponential backoff.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RPC_MAX_RETRIES,
            initial_delay: DEFAULT_RETRY_INITIAL_DELAY,
            max_delay: DEFAULT_RETRY_MAX_DELAY,
        }
    }
}

impl RetryConfig {
    /// Creates a `backon` [`ExponentialBuilder`] from this configuration.
    pub fn to_backoff_builder(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts as usize)
            .with_jitter()
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use tracing::level_filters::LevelFilter;

    use super::*;
    use crate::logging::LogFormat;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn parse(extra: &[&str]) -> Result<ProposerConfig, ConfigError> {
        let mut args = vec![
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
        args.extend_from_slice(extra);
        ProposerConfig::from_cli(Cli::try_parse_from(args).unwrap())
    }

    #[test]
    fn test_from_cli_defaults() {
        let config = parse(&["--private-key", DEV_KEY]).unwrap();

        let driver = config.driver_config();
        assert_eq!(driver.poll_interval, Duration::from_secs(6));
        assert_eq!(driver.min_proposal_interval, 512);
        assert!(!driver.allow_non_finalized);
        assert_eq!(driver.network_timeout, Duration::from_secs(10));

        assert_eq!(config.log.global_level, LevelFilter::INFO);
        assert_eq!(config.log.stdout_logs, Some(StdoutLogConfig { format: LogFormat::Full }));
        assert_eq!(config.metrics, MetricsConfig::default());
        assert_eq!(config.rpc, RpcServerConfig::default());
        assert!(matches!(config.signing, SigningConfig::Local { .. }));
    }

    #[test]
    fn test_from_cli_quiet_json() {
        let config =
            parse(&["--private-key", DEV_KEY, "-q", "--log-format", "json", "-vvvv"]).unwrap();
        assert_eq!(config.log.stdout_logs, None);
    }

    #[test]
    fn test_from_cli_rejects_zero_poll_interval() {
        let result = parse(&["--private-key", DEV_KEY, "--poll-interval", "0s"]);
        assert!(matches!(result, Err(ConfigError::OutOfRange { field: "poll-interval", .. })));
    }

    #[test]
    fn test_from_cli_rejects_zero_network_timeout() {
        let result = parse(&["--private-key", DEV_KEY, "--network-timeout", "0s"]);
        assert!(matches!(result, Err(ConfigError::OutOfRange { field: "network-timeout", .. })));
    }

    #[test]
    fn test_from_cli_rejects_inverted_retry_delays() {
        let result = parse(&[
            "--private-key",
            DEV_KEY,
            "--rpc-retry-initial-delay",
            "5s",
            "--rpc-retry-max-delay",
            "1s",
        ]);
        assert!(matches!(result, Err(ConfigError::OutOfRange { .. })));
    }

    #[test]
    fn test_from_cli_rejects_zero_metrics_port_when_enabled() {
        let result =
            parse(&["--private-key", DEV_KEY, "--metrics.enabled", "--metrics.port", "0"]);
        assert!(matches!(result, Err(ConfigError::Metrics(_))));

        assert!(parse(&["--private-key", DEV_KEY, "--metrics.port", "0"]).is_ok());
    }

    #[test]
    fn test_from_cli_requires_signing() {
        assert!(matches!(parse(&[]), Err(ConfigError::Signing(_))));
    }

    #[test]
    fn test_from_cli_zero_interval_is_allowed() {
        let config =
            parse(&["--private-key", DEV_KEY, "--min-proposal-interval", "0"]).unwrap();
        assert_eq!(config.min_proposal_interval, 0);
    }

    #[test]
    fn test_url_without_host() {
        let url = Url::parse("file:///some/path").unwrap();
        let result = validate_url(&url, "test-field");
        assert!(matches!(result, Err(ConfigError::InvalidUrl { field: "test-field", .. })));
    }

    #[test]
    fn test_config_error_display() {
        let error =
            ConfigError::InvalidUrl { field: "prover-rpc", reason: "missing host".to_string() };
        assert_eq!(error.to_string(), "invalid prover-rpc URL: missing host");

        let error = ConfigError::OutOfRange {
            field: "poll-interval",
            constraint: "greater than 0",
            value: "0s".to_string(),
        };
        assert_eq!(error.to_string(), "poll-interval must be greater than 0, got 0s");
    }

    #[test]
    fn test_signing_config_remote() {
        let endpoint = Url::parse("http://localhost:8546").unwrap();
        let address: Address = "0x1234567890123456789012345678901234567890".parse().unwrap();
        let result = build_signing_config(None, Some(&endpoint), Some(&address));
        assert!(matches!(result, Ok(SigningConfig::Remote { .. })));
    }

    #[test]
    fn test_signing_config_both_provided() {
        let endpoint = Url::parse("http://localhost:8546").unwrap();
        let result = build_signing_config(Some(DEV_KEY), Some(&endpoint), None);
        assert!(matches!(result, Err(ConfigError::Signing(_))));
    }

    #[test]
    fn test_signing_config_endpoint_without_address() {
        let endpoint = Url::parse("http://localhost:8546").unwrap();
        let result = build_signing_config(None, Some(&endpoint), None);
        assert!(matches!(result, Err(ConfigError::Signing(_))));
    }

    #[test]
    fn test_signing_config_bad_key() {
        let result = build_signing_config(Some("0xzz"), None, None);
        assert!(matches!(result, Err(ConfigError::Signing(_))));
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_secs(10));
    }
}
