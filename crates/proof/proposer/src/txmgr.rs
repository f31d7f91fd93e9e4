//! Transaction management for L1 submissions.
//!
//! Supports two signing modes:
//! - **Local**: Signs with an in-process private key via [`EthereumWallet`].
//! - **Remote**: Calls a signer sidecar's `eth_signTransaction` JSON-RPC method.

use std::{sync::Arc, time::Duration};

use alloy_eips::Encodable2718;
use alloy_network::{Ethereum, EthereumWallet, NetworkWallet, TransactionBuilder};
use alloy_primitives::{Address, B256, Bytes, keccak256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::{TransactionInput, TransactionRequest};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use backon::{ConstantBuilder, Retryable};
use jsonrpsee::{
    core::{client::ClientT, params::ArrayParams},
    http_client::{HttpClient, HttpClientBuilder},
};
use tokio::sync::OnceCell;
use tracing::{debug, info};
use url::Url;

use crate::{
    ProposerError, ProposerResult,
    config::{RetryConfig, SigningConfig},
    constants::{
        DEFAULT_RECEIPT_POLL_INTERVAL, GAS_LIMIT_MULTIPLIER_DENOMINATOR,
        GAS_LIMIT_MULTIPLIER_NUMERATOR,
    },
};

/// A transaction to be built, signed and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCandidate {
    /// Calldata.
    pub tx_data: Bytes,
    /// Destination contract.
    pub to: Address,
    /// Gas limit; `0` means estimate.
    pub gas_limit: u64,
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash.
    pub tx_hash: B256,
    /// `true` if execution succeeded, `false` if it reverted.
    pub status: bool,
    /// Block the transaction was included in.
    pub block_number: Option<u64>,
}

/// Sends transactions and waits for them to be mined.
#[async_trait]
pub trait TxManager: Send + Sync {
    /// Builds, signs and broadcasts `candidate`, then waits for its receipt.
    ///
    /// The returned future does not time out on its own while waiting for
    /// inclusion; callers bound it.
    ///
    /// A mined transaction that reverted is returned as a receipt with
    /// `status == false`, not as an error.
    async fn send(&self, candidate: TxCandidate) -> ProposerResult<TxReceipt>;

    /// Returns the sending account.
    fn from_address(&self) -> Address;
}

/// Applies a 120% safety margin to a gas estimate using integer arithmetic.
const fn apply_gas_margin(estimated: u64) -> u64 {
    estimated.saturating_mul(GAS_LIMIT_MULTIPLIER_NUMERATOR) / GAS_LIMIT_MULTIPLIER_DENOMINATOR
}

/// Returns true if a failed send attempt may succeed when repeated.
///
/// Reverts surface during gas estimation and are permanent.
fn is_retryable(e: &ProposerError) -> bool {
    match e {
        ProposerError::Transaction(msg) => !msg.contains("reverted"),
        ProposerError::Rpc(err) => err.is_retryable(),
        _ => false,
    }
}

/// How transactions are signed.
enum TxSigner {
    /// In-process key.
    Local(EthereumWallet),
    /// Signer sidecar reached over JSON-RPC.
    Remote {
        /// Sidecar client.
        client: HttpClient,
        /// Account the sidecar signs for.
        address: Address,
    },
}

/// Signed transaction ready for broadcast.
#[derive(Debug)]
struct SignedTx {
    /// EIP-2718 encoding.
    raw: Bytes,
    /// `keccak256(raw)`.
    tx_hash: B256,
    nonce: u64,
    gas_limit: u64,
}

/// Returns true if the node rejected a broadcast because it already holds the same transaction.
fn is_known_transaction(err: &impl std::fmt::Display) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("already known") || msg.contains("known transaction")
}

/// [`TxManager`] that builds EIP-1559 transactions with fresh nonces and fees.
///
/// Only building and signing are retried from scratch. Once a transaction
/// has been broadcast, retries re-send the same signed bytes and the receipt
/// is looked up by its hash, so a flaky node never causes a second nonce to
/// be consumed.
pub struct SimpleTxManager {
    /// L1 endpoint used for nonces, fees, broadcast and receipts.
    provider: RootProvider,
    signer: TxSigner,
    /// Backoff for building, signing and broadcasting.
    retry_config: RetryConfig,
    /// Delay between receipt lookups.
    receipt_poll_interval: Duration,
    /// Fetched once and reused.
    chain_id: OnceCell<u64>,
}

impl std::fmt::Debug for SimpleTxManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.signer {
            TxSigner::Local(_) => "local",
            TxSigner::Remote { .. } => "remote",
        };
        f.debug_struct("SimpleTxManager")
            .field("from", &self.from_address())
            .field("signer", &mode)
            .field("receipt_poll_interval", &self.receipt_poll_interval)
            .finish_non_exhaustive()
    }
}

impl SimpleTxManager {
    /// Creates a manager signing with an in-process key.
    pub fn local(l1_rpc_url: Url, signer: PrivateKeySigner, retry_config: RetryConfig) -> Self {
        Self::with_signer(l1_rpc_url, TxSigner::Local(EthereumWallet::from(signer)), retry_config)
    }

    /// Creates a manager signing through a remote signer sidecar.
    pub fn remote(
        l1_rpc_url: Url,
        signer_endpoint: Url,
        signer_address: Address,
        retry_config: RetryConfig,
    ) -> ProposerResult<Self> {
        let client = HttpClientBuilder::default()
            .build(signer_endpoint.as_str())
            .map_err(|e| ProposerError::Config(format!("failed to build signer client: {e}")))?;

        Ok(Self::with_signer(
            l1_rpc_url,
            TxSigner::Remote { client, address: signer_address },
            retry_config,
        ))
    }

    fn with_signer(l1_rpc_url: Url, signer: TxSigner, retry_config: RetryConfig) -> Self {
        Self {
            provider: RootProvider::new_http(l1_rpc_url),
            signer,
            retry_config,
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
            chain_id: OnceCell::new(),
        }
    }

    /// Sets the delay between receipt lookups.
    pub const fn with_receipt_poll_interval(mut self, interval: Duration) -> Self {
        self.receipt_poll_interval = interval;
        self
    }

    async fn sign(&self, tx: TransactionRequest) -> ProposerResult<Bytes> {
        match &self.signer {
            TxSigner::Local(wallet) => {
                let envelope =
                    <TransactionRequest as TransactionBuilder<Ethereum>>::build(tx, wallet)
                        .await
                        .map_err(|e| {
                            ProposerError::Transaction(format!("sign_transaction failed: {e}"))
                        })?;
                Ok(Bytes::from(envelope.encoded_2718()))
            }
            TxSigner::Remote { client, .. } => {
                let mut params = ArrayParams::new();
                params.insert(&tx).map_err(|e| {
                    ProposerError::Transaction(format!("failed to serialize tx: {e}"))
                })?;
                client.request("eth_signTransaction", params).await.map_err(|e| {
                    ProposerError::Transaction(format!("eth_signTransaction failed: {e}"))
                })
            }
        }
    }

    /// Fetches nonce and fees, estimates gas when needed, and signs.
    async fn build_and_sign(&self, candidate: &TxCandidate) -> ProposerResult<SignedTx> {
        let from = self.from_address();

        let nonce = self
            .provider
            .get_transaction_count(from)
            .pending()
            .await
            .map_err(|e| ProposerError::Transaction(format!("get_transaction_count failed: {e}")))?;

        let chain_id = *self
            .chain_id
            .get_or_try_init(|| async {
                self.provider
                    .get_chain_id()
                    .await
                    .map_err(|e| ProposerError::Transaction(format!("get_chain_id failed: {e}")))
            })
            .await?;

        let fees = self
            .provider
            .estimate_eip1559_fees()
            .await
            .map_err(|e| ProposerError::Transaction(format!("estimate_eip1559_fees failed: {e}")))?;

        let mut tx = TransactionRequest::default()
            .from(from)
            .to(candidate.to)
            .input(TransactionInput::new(candidate.tx_data.clone()))
            .nonce(nonce)
            .max_fee_per_gas(fees.max_fee_per_gas)
            .max_priority_fee_per_gas(fees.max_priority_fee_per_gas);
        tx.set_chain_id(chain_id);

        let gas_limit = if candidate.gas_limit == 0 {
            let estimate = self
                .provider
                .estimate_gas(tx.clone())
                .await
                .map_err(|e| ProposerError::Transaction(format!("estimate_gas failed: {e}")))?;
            apply_gas_margin(estimate)
        } else {
            candidate.gas_limit
        };
        tx.set_gas_limit(gas_limit);

        let raw = self.sign(tx).await?;
        Ok(SignedTx { tx_hash: keccak256(&raw), raw, nonce, gas_limit })
    }

    /// Broadcasts signed bytes. A node that already holds them counts as accepted.
    async fn broadcast(&self, raw: &Bytes) -> ProposerResult<()> {
        match self.provider.send_raw_transaction(raw).await {
            Ok(_) => Ok(()),
            Err(e) if is_known_transaction(&e) => {
                debug!(error = %e, "Transaction already known to node");
                Ok(())
            }
            Err(e) => Err(ProposerError::Transaction(format!("send_raw_transaction failed: {e}"))),
        }
    }

    /// Looks up the receipt once; a pending transaction is a retryable error.
    async fn fetch_receipt(&self, tx_hash: B256) -> ProposerResult<TxReceipt> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(|e| {
                ProposerError::Transaction(format!("get_transaction_receipt failed: {e}"))
            })?
            .ok_or_else(|| {
                ProposerError::Transaction(format!("receipt for {tx_hash} not yet available"))
            })?;

        Ok(TxReceipt { tx_hash, status: receipt.status(), block_number: receipt.block_number })
    }
}

#[async_trait]
impl TxManager for SimpleTxManager {
    async fn send(&self, candidate: TxCandidate) -> ProposerResult<TxReceipt> {
        let signed = (|| self.build_and_sign(&candidate))
            .retry(self.retry_config.to_backoff_builder())
            .when(is_retryable)
            .notify(|err, dur| {
                debug!(error = %err, delay = ?dur, to = %candidate.to, "Retrying tx build");
            })
            .await?;
        let tx_hash = signed.tx_hash;

        (|| self.broadcast(&signed.raw))
            .retry(self.retry_config.to_backoff_builder())
            .when(is_retryable)
            .notify(|err, dur| {
                debug!(error = %err, delay = ?dur, %tx_hash, "Retrying broadcast");
            })
            .await?;
        info!(
            %tx_hash,
            nonce = signed.nonce,
            gas_limit = signed.gas_limit,
            "Transaction sent, waiting for receipt"
        );

        // Unbounded here; the caller's deadline and cancellation end the wait.
        (|| self.fetch_receipt(tx_hash))
            .retry(
                ConstantBuilder::default()
                    .with_delay(self.receipt_poll_interval)
                    .without_max_times(),
            )
            .when(is_retryable)
            .notify(|err, _| {
                debug!(error = %err, %tx_hash, "Waiting for receipt");
            })
            .await
    }

    fn from_address(&self) -> Address {
        match &self.signer {
            TxSigner::Local(wallet) => {
                NetworkWallet::<Ethereum>::default_signer_address(wallet)
            }
            TxSigner::Remote { address, .. } => *address,
        }
    }
}

/// Creates a [`TxManager`] based on the signing configuration.
pub fn create_tx_manager(
    l1_rpc_url: Url,
    signing_config: SigningConfig,
    retry_config: RetryConfig,
) -> ProposerResult<Arc<dyn TxManager>> {
    match signing_config {
        SigningConfig::Local { signer } => {
            Ok(Arc::new(SimpleTxManager::local(l1_rpc_url, signer, retry_config)))
        }
        SigningConfig::Remote { endpoint, address } => {
            Ok(Arc::new(SimpleTxManager::remote(l1_rpc_url, endpoint, address, retry_config)?))
        }
    }
}
