//! Full proposer service lifecycle.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use eyre::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    DriverHandle, DriverSetup, L1ClientConfig, L1ClientImpl, L2ClientConfig, L2ClientImpl,
    OutputOracleCaller, ProposerConfig, ProposerDriverControl, RollupClient, RollupClientConfig,
    RollupClientImpl, RpcProver, RpcProverConfig, create_tx_manager, metrics, serve,
    setup_signal_handler,
};

/// Runs the proposer until SIGINT or SIGTERM.
///
/// Steps:
/// 1. Initialise logging and metrics
/// 2. Create L1, L2 and rollup clients and load the rollup config
/// 3. Create the oracle reader, prover and transaction manager
/// 4. Connect the driver (oracle code and version check)
/// 5. Start the health / admin HTTP server
/// 6. Start the driver loop and mark the service ready
/// 7. Wait for a shutdown signal, then stop in reverse order
///
/// Only construction failures are returned; everything after startup is
/// logged.
pub async fn run(config: ProposerConfig) -> Result<()> {
    config.log.init_tracing_subscriber()?;
    info!(version = env!("CARGO_PKG_VERSION"), "Proposer starting");

    let cancel = CancellationToken::new();
    setup_signal_handler(cancel.clone());

    if config.metrics.enabled {
        let addr = SocketAddr::new(config.metrics.addr, config.metrics.port);
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| eyre::eyre!("failed to install Prometheus recorder: {e}"))?;
        info!(%addr, "Metrics server started");
    }
    metrics::record_startup_metrics(env!("CARGO_PKG_VERSION"));

    let l1_client = Arc::new(L1ClientImpl::new(
        L1ClientConfig::new(config.l1_eth_rpc.clone())
            .with_timeout(config.network_timeout)
            .with_retry_config(config.retry.clone()),
    )?);
    info!(endpoint = %config.l1_eth_rpc, "L1 client initialized");

    let l2_client = Arc::new(L2ClientImpl::new(
        L2ClientConfig::new(config.l2_eth_rpc.clone())
            .with_timeout(config.network_timeout)
            .with_retry_config(config.retry.clone()),
    )?);
    info!(endpoint = %config.l2_eth_rpc, "L2 client initialized");

    let rollup_client = Arc::new(RollupClientImpl::new(
        RollupClientConfig::new(config.rollup_rpc.clone())
            .with_timeout(config.network_timeout)
            .with_retry_config(config.retry.clone()),
    )?);
    let rollup_config = rollup_client.rollup_config().await?;
    info!(
        endpoint = %config.rollup_rpc,
        l1_chain_id = rollup_config.l1_chain_id,
        l2_chain_id = rollup_config.l2_chain_id,
        block_time = rollup_config.block_time,
        "Rollup client initialized"
    );

    let oracle = Arc::new(OutputOracleCaller::new(l1_client.clone(), config.l2oo_address));

    let prover_config = RpcProverConfig::new(config.prover_rpc.clone());
    let prover = Arc::new(RpcProver::new(prover_config, l2_client.clone())?);
    info!(endpoint = %config.prover_rpc, "Prover client initialized");

    let tx_manager = create_tx_manager(
        config.l1_eth_rpc.clone(),
        config.signing.clone(),
        config.retry.clone(),
    )?;
    info!(proposer = %tx_manager.from_address(), "Transaction manager initialized");

    let setup = DriverSetup {
        config: config.driver_config(),
        oracle_address: config.l2oo_address,
        l1_client,
        l2_client,
        rollup_client,
        oracle,
        prover,
        tx_manager,
    };
    let driver_handle: Arc<dyn ProposerDriverControl> =
        Arc::new(DriverHandle::connect(setup, &cancel).await?);

    // The health server outlives the driver so probes answer during drain.
    let health_cancel = CancellationToken::new();
    let ready = Arc::new(AtomicBool::new(false));
    let admin_driver = config.rpc.enable_admin.then(|| {
        info!("Admin RPC enabled");
        Arc::clone(&driver_handle)
    });
    let health_handle: JoinHandle<Result<()>> = tokio::spawn(serve(
        SocketAddr::new(config.rpc.addr, config.rpc.port),
        Arc::clone(&ready),
        admin_driver,
        health_cancel.clone(),
    ));

    driver_handle.start_proposer().await?;
    ready.store(true, Ordering::SeqCst);
    info!(
        poll_interval = ?config.poll_interval,
        min_proposal_interval = config.min_proposal_interval,
        allow_non_finalized = config.allow_non_finalized,
        "Service is ready"
    );

    cancel.cancelled().await;
    info!("Shutdown signal received, stopping service...");
    ready.store(false, Ordering::SeqCst);

    if let Err(e) = driver_handle.stop_proposer_if_running().await {
        warn!(error = %e, "Error stopping proposer driver");
    }

    health_cancel.cancel();
    match health_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Health server error during shutdown"),
        Err(e) => warn!(error = %e, "Health server task panicked"),
    }

    info!("Service stopped");
    Ok(())
}
