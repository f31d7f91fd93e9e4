//! Shared test utilities: hand-written mocks of every seam plus a harness that
//! wires them into a driver.

use std::{
    collections::{BTreeMap, HashSet},
    ops::RangeInclusive,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy_primitives::{Address, B256, Bloom, BloomInput, Bytes};
use alloy_rpc_types_eth::{EIP1186AccountProofResponse, Header, TransactionReceipt};
use async_trait::async_trait;
use axum::{Json, Router, extract::State, routing::post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;

use crate::{
    ProposerError, ProposerResult,
    constants::L2_TO_L1_MESSAGE_PASSER,
    contracts::{OracleState, OutputOracleClient},
    driver::{Driver, DriverConfig, DriverSetup, ProposalBuilder},
    prover::{Proposal, Prover, check_withdrawals},
    rpc::{
        L1BlockId, L1BlockRef, L1Client, L2BlockRef, L2Client, OpBlock, RollupClient,
        RollupConfig, RpcError, RpcResult, SyncStatus,
    },
    txmgr::{TxCandidate, TxManager, TxReceipt},
};

/// Mock L1 client answering `eth_call` and `eth_getCode` with fixed bytes.
#[derive(Default)]
pub(crate) struct MockL1 {
    call_result: Option<Bytes>,
    code: Mutex<Bytes>,
    calls: Mutex<Vec<(Address, Bytes)>>,
}

impl MockL1 {
    pub(crate) fn with_call_result(mut self, result: Bytes) -> Self {
        self.call_result = Some(result);
        self
    }

    pub(crate) fn with_code(self, code: Bytes) -> Self {
        self.set_code(code);
        self
    }

    pub(crate) fn set_code(&self, code: Bytes) {
        *self.code.lock().unwrap() = code;
    }

    pub(crate) fn calls(&self) -> Vec<(Address, Bytes)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl L1Client for MockL1 {
    async fn block_number(&self) -> RpcResult<u64> {
        Ok(0)
    }
    async fn header_by_number(&self, _: Option<u64>) -> RpcResult<Header> {
        unimplemented!()
    }
    async fn header_by_hash(&self, _: B256) -> RpcResult<Header> {
        unimplemented!()
    }
    async fn block_receipts(&self, _: B256) -> RpcResult<Vec<TransactionReceipt>> {
        unimplemented!()
    }
    async fn code_at(&self, _: Address, _: Option<u64>) -> RpcResult<Bytes> {
        Ok(self.code.lock().unwrap().clone())
    }
    async fn call_contract(&self, to: Address, data: Bytes, _: Option<u64>) -> RpcResult<Bytes> {
        self.calls.lock().unwrap().push((to, data));
        self.call_result
            .clone()
            .ok_or_else(|| RpcError::InvalidResponse("mock: no call result".into()))
    }
}

/// Mock L2 chain: one header per number, hashes from [`test_block_hash`]
/// until reorged.
#[derive(Default)]
pub(crate) struct MockL2 {
    hashes: Mutex<BTreeMap<u64, B256>>,
    withdrawals: Mutex<HashSet<u64>>,
    requests: Mutex<Vec<u64>>,
}

impl MockL2 {
    pub(crate) fn with_chain(self, blocks: RangeInclusive<u64>) -> Self {
        self.hashes.lock().unwrap().extend(blocks.map(|n| (n, test_block_hash(n))));
        self
    }

    pub(crate) fn with_withdrawal_at(self, number: u64) -> Self {
        self.set_withdrawal_at(number);
        self
    }

    pub(crate) fn set_withdrawal_at(&self, number: u64) {
        self.withdrawals.lock().unwrap().insert(number);
    }

    /// Appends canonical blocks up to and including `number`.
    pub(crate) fn extend_to(&self, number: u64) {
        let mut hashes = self.hashes.lock().unwrap();
        let start = hashes.keys().next_back().map_or(0, |last| last + 1);
        hashes.extend((start..=number).map(|n| (n, test_block_hash(n))));
    }

    /// Replaces the block at `number` and returns its new hash.
    pub(crate) fn reorg(&self, number: u64) -> B256 {
        let mut hash = B256::repeat_byte(0xee);
        hash[24..].copy_from_slice(&number.to_be_bytes());
        self.hashes.lock().unwrap().insert(number, hash);
        hash
    }

    /// Header at `number`, without recording a request.
    pub(crate) fn header(&self, number: u64) -> Option<Header> {
        let hash = *self.hashes.lock().unwrap().get(&number)?;
        let withdrawals = self.withdrawals.lock().unwrap().contains(&number);
        Some(test_header(number, hash, withdrawals))
    }

    pub(crate) fn header_requests(&self) -> Vec<u64> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl L2Client for MockL2 {
    async fn chain_config(&self) -> RpcResult<serde_json::Value> {
        unimplemented!()
    }
    async fn get_proof(&self, _: Address, _: B256) -> RpcResult<EIP1186AccountProofResponse> {
        unimplemented!()
    }
    async fn header_by_number(&self, number: Option<u64>) -> RpcResult<Header> {
        let number = match number {
            Some(n) => n,
            None => *self
                .hashes
                .lock()
                .unwrap()
                .keys()
                .next_back()
                .ok_or_else(|| RpcError::HeaderNotFound("mock: empty chain".into()))?,
        };
        self.requests.lock().unwrap().push(number);
        self.header(number).ok_or_else(|| RpcError::HeaderNotFound(format!("block {number}")))
    }
    async fn block_by_number(&self, _: Option<u64>) -> RpcResult<OpBlock> {
        unimplemented!()
    }
    async fn block_by_hash(&self, _: B256) -> RpcResult<OpBlock> {
        unimplemented!()
    }
    async fn execution_witness(&self, _: B256) -> RpcResult<Bytes> {
        unimplemented!()
    }
}

/// Mock rollup node reporting configurable safe and finalized heads.
#[derive(Default)]
pub(crate) struct MockRollupClient {
    heads: Mutex<(u64, u64)>,
    failing: AtomicBool,
}

impl MockRollupClient {
    pub(crate) fn set_heads(&self, safe: u64, finalized: u64) {
        *self.heads.lock().unwrap() = (safe, finalized);
    }

    pub(crate) fn fail_sync_status(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl RollupClient for MockRollupClient {
    async fn rollup_config(&self) -> RpcResult<RollupConfig> {
        unimplemented!()
    }
    async fn sync_status(&self) -> RpcResult<SyncStatus> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RpcError::Connection("mock: rollup node down".into()));
        }
        let (safe, finalized) = *self.heads.lock().unwrap();
        Ok(test_sync_status(safe, finalized))
    }
}

/// Mock output oracle holding a fixed latest output.
pub(crate) struct MockOracle {
    state: OracleState,
    delay: Mutex<Option<Duration>>,
    failing: AtomicBool,
    version_calls: AtomicUsize,
}

impl MockOracle {
    pub(crate) fn new(l2_block_number: u64) -> Self {
        Self {
            state: OracleState { l2_block_number, output_root: B256::repeat_byte(0xab) },
            delay: Mutex::new(None),
            failing: AtomicBool::new(false),
            version_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) const fn output_root(&self) -> B256 {
        self.state.output_root
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutputOracleClient for MockOracle {
    async fn version(&self) -> ProposerResult<String> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        Ok("1.8.0".to_string())
    }

    async fn latest_l2_output(&self) -> ProposerResult<OracleState> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(RpcError::Connection("mock: l1 down".into()).into());
        }
        Ok(self.state)
    }
}

/// Mock prover signing whatever the mock L2 chain currently holds.
pub(crate) struct MockProver {
    l2: Arc<MockL2>,
    generated: Mutex<Vec<u64>>,
    aggregations: Mutex<Vec<(B256, Vec<u64>)>>,
    fail_at: Mutex<Option<u64>>,
    panic_at: Mutex<Option<u64>>,
}

impl MockProver {
    pub(crate) fn new(l2: Arc<MockL2>) -> Self {
        Self {
            l2,
            generated: Mutex::default(),
            aggregations: Mutex::default(),
            fail_at: Mutex::default(),
            panic_at: Mutex::default(),
        }
    }

    /// Block numbers passed to `generate`, including failed ones.
    pub(crate) fn generated(&self) -> Vec<u64> {
        self.generated.lock().unwrap().clone()
    }

    /// Block numbers of the fragments passed to each `aggregate` call.
    pub(crate) fn aggregations(&self) -> Vec<Vec<u64>> {
        self.aggregations.lock().unwrap().iter().map(|(_, blocks)| blocks.clone()).collect()
    }

    pub(crate) fn aggregated_roots(&self) -> Vec<B256> {
        self.aggregations.lock().unwrap().iter().map(|(root, _)| *root).collect()
    }

    pub(crate) fn fail_at(&self, number: u64) {
        *self.fail_at.lock().unwrap() = Some(number);
    }

    pub(crate) fn panic_at(&self, number: u64) {
        *self.panic_at.lock().unwrap() = Some(number);
    }
}

#[async_trait]
impl Prover for MockProver {
    async fn generate(&self, block_number: u64) -> ProposerResult<Proposal> {
        self.generated.lock().unwrap().push(block_number);
        if *self.panic_at.lock().unwrap() == Some(block_number) {
            panic!("mock prover panicked at block {block_number}");
        }
        if *self.fail_at.lock().unwrap() == Some(block_number) {
            return Err(ProposerError::Prover(format!("mock: cannot prove {block_number}")));
        }

        let header = self
            .l2
            .header(block_number)
            .ok_or_else(|| ProposerError::Prover(format!("mock: unknown block {block_number}")))?;

        Ok(Proposal {
            has_withdrawals: check_withdrawals(&header.inner),
            ..test_proposal_with_hash(block_number, header.hash)
        })
    }

    async fn aggregate(
        &self,
        prev_output_root: B256,
        mut proposals: Vec<Proposal>,
    ) -> ProposerResult<Option<Proposal>> {
        let blocks = proposals.iter().map(|p| p.block_ref.number).collect();
        self.aggregations.lock().unwrap().push((prev_output_root, blocks));

        if proposals.len() <= 1 {
            return Ok(proposals.pop());
        }
        let has_withdrawals = proposals.iter().any(|p| p.has_withdrawals);
        Ok(proposals.pop().map(|last| Proposal {
            output_root: B256::repeat_byte(0xcc),
            has_withdrawals,
            ..last
        }))
    }
}

/// Mock transaction manager recording every candidate.
#[derive(Default)]
pub(crate) struct MockTxManager {
    sent: Mutex<Vec<TxCandidate>>,
    reverted: AtomicBool,
    failing: AtomicBool,
}

impl MockTxManager {
    pub(crate) fn sent(&self) -> Vec<TxCandidate> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn set_reverted(&self, reverted: bool) {
        self.reverted.store(reverted, Ordering::SeqCst);
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TxManager for MockTxManager {
    async fn send(&self, candidate: TxCandidate) -> ProposerResult<TxReceipt> {
        self.sent.lock().unwrap().push(candidate);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProposerError::Transaction("mock: send failed".into()));
        }
        Ok(TxReceipt {
            tx_hash: B256::repeat_byte(0x77),
            status: !self.reverted.load(Ordering::SeqCst),
            block_number: Some(1),
        })
    }

    fn from_address(&self) -> Address {
        Address::repeat_byte(0x01)
    }
}

/// All mocks wired together around one L2 chain.
pub(crate) struct TestHarness {
    pub(crate) l1: Arc<MockL1>,
    pub(crate) l2: Arc<MockL2>,
    pub(crate) rollup: Arc<MockRollupClient>,
    pub(crate) oracle: Arc<MockOracle>,
    pub(crate) prover: Arc<MockProver>,
    pub(crate) tx_manager: Arc<MockTxManager>,
}

impl TestHarness {
    /// Oracle at `oracle_number`, L2 chain `chain`, both heads at its end.
    pub(crate) fn new(oracle_number: u64, chain: RangeInclusive<u64>) -> Self {
        let head = *chain.end();
        let l2 = Arc::new(MockL2::default().with_chain(chain));
        let rollup = Arc::new(MockRollupClient::default());
        rollup.set_heads(head, head);

        Self {
            l1: Arc::new(MockL1::default().with_code(Bytes::from_static(&[0x60, 0x80]))),
            prover: Arc::new(MockProver::new(Arc::clone(&l2))),
            l2,
            rollup,
            oracle: Arc::new(MockOracle::new(oracle_number)),
            tx_manager: Arc::new(MockTxManager::default()),
        }
    }

    /// Extends the chain to `number` and moves both heads there.
    pub(crate) fn advance_frontier(&self, number: u64) {
        self.l2.extend_to(number);
        self.rollup.set_heads(number, number);
    }

    pub(crate) fn setup(&self, config: DriverConfig) -> DriverSetup {
        DriverSetup {
            config,
            oracle_address: Address::repeat_byte(0x0f),
            l1_client: self.l1.clone(),
            l2_client: self.l2.clone(),
            rollup_client: self.rollup.clone(),
            oracle: self.oracle.clone(),
            prover: self.prover.clone(),
            tx_manager: self.tx_manager.clone(),
        }
    }

    pub(crate) fn builder(&self, config: DriverConfig) -> ProposalBuilder {
        ProposalBuilder::new(
            self.l2.clone(),
            self.rollup.clone(),
            self.oracle.clone(),
            self.prover.clone(),
            config,
        )
    }

    pub(crate) fn driver(&self, config: DriverConfig) -> Driver {
        Driver::new(self.setup(config))
    }

    /// Polls `done` until it holds, failing the test after five seconds.
    pub(crate) async fn wait_for(&self, done: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }
}

pub(crate) fn test_block_hash(number: u64) -> B256 {
    B256::left_padding_from(&number.to_be_bytes())
}

pub(crate) fn test_header(number: u64, hash: B256, withdrawals: bool) -> Header {
    let mut logs_bloom = Bloom::default();
    if withdrawals {
        logs_bloom.accrue(BloomInput::Raw(L2_TO_L1_MESSAGE_PASSER.as_slice()));
    }
    Header {
        hash,
        inner: alloy_consensus::Header { number, logs_bloom, ..Default::default() },
        total_difficulty: None,
        size: None,
    }
}

pub(crate) fn test_l1_block_ref(number: u64) -> L1BlockRef {
    L1BlockRef {
        hash: test_block_hash(number),
        number,
        parent_hash: B256::ZERO,
        timestamp: 1_000_000 + number,
    }
}

pub(crate) fn test_l2_block_ref(number: u64, hash: B256) -> L2BlockRef {
    L2BlockRef {
        hash,
        number,
        parent_hash: B256::ZERO,
        timestamp: 1_000_000 + number,
        l1origin: L1BlockId { hash: B256::ZERO, number: 100 + number },
        sequence_number: 0,
    }
}

pub(crate) fn test_sync_status(safe: u64, finalized: u64) -> SyncStatus {
    let l1 = test_l1_block_ref(100);
    SyncStatus {
        current_l1: l1.clone(),
        current_l1_finalized: None,
        head_l1: l1.clone(),
        safe_l1: l1.clone(),
        finalized_l1: l1,
        unsafe_l2: test_l2_block_ref(safe, test_block_hash(safe)),
        safe_l2: test_l2_block_ref(safe, test_block_hash(safe)),
        finalized_l2: test_l2_block_ref(finalized, test_block_hash(finalized)),
        pending_safe_l2: None,
    }
}

fn test_proposal_with_hash(number: u64, hash: B256) -> Proposal {
    Proposal {
        block_ref: test_l2_block_ref(number, hash),
        output_root: B256::with_last_byte(number as u8),
        signature: Bytes::from(vec![0x11; 65]),
        has_withdrawals: false,
    }
}

pub(crate) fn test_proposal(number: u64, has_withdrawals: bool) -> Proposal {
    Proposal { has_withdrawals, ..test_proposal_with_hash(number, test_block_hash(number)) }
}

// ---------------------------------------------------------------------------
// JSON-RPC node
// ---------------------------------------------------------------------------

/// Answers one JSON-RPC call: `(method, params, prior calls of that method)`.
///
/// `Err(message)` becomes a `-32000` error response.
type Responder = Arc<dyn Fn(&str, &Value, usize) -> Result<Value, String> + Send + Sync>;

/// Scripted JSON-RPC endpoint on an ephemeral port that records every request.
#[derive(Clone)]
pub(crate) struct MockNode {
    /// `(method, params)` in arrival order.
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    /// Produces the result for each request.
    responder: Responder,
}

impl MockNode {
    /// Serves `responder` on `127.0.0.1:0` and returns the endpoint URL.
    pub(crate) async fn spawn(
        responder: impl Fn(&str, &Value, usize) -> Result<Value, String> + Send + Sync + 'static,
    ) -> (Url, Self) {
        let node = Self { requests: Arc::default(), responder: Arc::new(responder) };
        let app = Router::new().route("/", post(answer)).with_state(node.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (url, node)
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|(method, _)| method.clone()).collect()
    }

    pub(crate) fn count(&self, method: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|(m, _)| m == method).count()
    }

    pub(crate) fn params(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

async fn answer(State(node): State<MockNode>, Json(request): Json<Value>) -> Json<Value> {
    let method = request["method"].as_str().unwrap_or_default().to_owned();
    let params = request["params"].clone();
    let seen = {
        let mut requests = node.requests.lock().unwrap();
        let seen = requests.iter().filter(|(m, _)| *m == method).count();
        requests.push((method.clone(), params.clone()));
        seen
    };

    let body = match (node.responder)(&method, &params, seen) {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }),
        Err(message) => json!({
            "jsonrpc": "2.0",
            "id": request["id"],
            "error": { "code": -32000, "message": message },
        }),
    };
    Json(body)
}

/// Serves a chain whose block `n` has hash [`test_block_hash`]`(n)`; `latest` is 100.
pub(crate) fn chain_responder(method: &str, params: &Value, _seen: usize) -> Result<Value, String> {
    let number_of_hash = |value: &Value| {
        let hash: B256 = serde_json::from_value(value.clone()).unwrap();
        u64::from_be_bytes(hash.0[24..].try_into().unwrap())
    };

    match method {
        "eth_getBlockByNumber" => {
            let number = match params[0].as_str() {
                Some("latest") | None => 100,
                Some(hex) => u64::from_str_radix(hex.trim_start_matches("0x"), 16).unwrap(),
            };
            Ok(block_json(number))
        }
        "eth_getBlockByHash" => Ok(block_json(number_of_hash(&params[0]))),
        "eth_getBlockReceipts" => Ok(json!([])),
        "eth_getProof" => {
            let proof = EIP1186AccountProofResponse {
                address: serde_json::from_value(params[0].clone()).unwrap(),
                ..Default::default()
            };
            Ok(serde_json::to_value(proof).unwrap())
        }
        other => Err(format!("unexpected method {other}")),
    }
}

pub(crate) fn block_json(number: u64) -> Value {
    let block: alloy_rpc_types_eth::Block =
        alloy_rpc_types_eth::Block::empty(test_header(number, test_block_hash(number), false));
    serde_json::to_value(block).unwrap()
}
