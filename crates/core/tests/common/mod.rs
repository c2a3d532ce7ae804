//! In-memory fakes for `Store`, `ChainClient`, `NonceAllocatorClient`
//! and `FailureQueueClient`, used to exercise the scanner and event
//! handler end to end without any real RPC or database.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::{Address, B256, I256, U256};
use async_trait::async_trait;
use liquidator_chain::{ChainClient, PositionSummary, ReceiptStatus, SendError};
use liquidator_core::{FailureQueueClient, NonceAllocatorClient, Store, TradeRow};
use uuid::Uuid;

#[derive(Default)]
pub struct FakeStore {
    markets_by_hex: Mutex<HashMap<String, Uuid>>,
    markets_by_address: Mutex<HashMap<String, (Uuid, String)>>,
    trades: Mutex<Vec<(Uuid, TradeRow)>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_market(self, hex: &str, address: &str, market: Uuid) -> Self {
        self.markets_by_hex.lock().unwrap().insert(hex.to_string(), market);
        self.markets_by_address
            .lock()
            .unwrap()
            .insert(address.to_string(), (market, hex.to_string()));
        self
    }

    pub fn seed_trade(&self, market: Uuid, wallet: &str, amount: I256, liquidation_price: Option<I256>) {
        self.trades
            .lock()
            .unwrap()
            .push((market, TradeRow { user_wallet: wallet.to_string(), liquidation_price, amount }));
    }

    pub fn recorded_trades(&self, market: Uuid, wallet: &str) -> Vec<I256> {
        self.trades
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, row)| *m == market && row.user_wallet == wallet)
            .map(|(_, row)| row.amount)
            .collect()
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn lookup_market_by_hex(&self, market_hex: &str) -> anyhow::Result<Option<Uuid>> {
        Ok(self.markets_by_hex.lock().unwrap().get(market_hex).copied())
    }

    async fn lookup_market_by_address(&self, address: &str) -> anyhow::Result<Option<(Uuid, String)>> {
        Ok(self.markets_by_address.lock().unwrap().get(address).cloned())
    }

    async fn fetch_user_trades(
        &self,
        market: Uuid,
        wallet: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> anyhow::Result<Vec<TradeRow>> {
        let trades = self.trades.lock().unwrap();
        Ok(trades
            .iter()
            .filter(|(m, row)| *m == market && wallet.map(|w| row.user_wallet == w).unwrap_or(true))
            .skip(offset as usize)
            .take(limit as usize)
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn net_user_trade(
        &self,
        market: Uuid,
        wallet: &str,
        delta: I256,
        _price: I256,
        liquidation_price: Option<I256>,
        _trade_ts: i64,
        _order_book: &str,
    ) -> anyhow::Result<()> {
        self.trades
            .lock()
            .unwrap()
            .push((market, TradeRow { user_wallet: wallet.to_string(), liquidation_price, amount: delta }));
        Ok(())
    }
}

/// Chain fake with per-wallet canned responses for reads and a queue
/// of canned receipt statuses for sequential send attempts.
pub struct FakeChain {
    pub liq_prices: Mutex<HashMap<Address, (U256, bool)>>,
    pub positions: Mutex<HashMap<Address, PositionSummary>>,
    pub mark_price: Mutex<U256>,
    pub estimate_gas: Mutex<Option<u64>>,
    pub simulate_ok: Mutex<bool>,
    pub pending_count: Mutex<u64>,
    pub receipt_queue: Mutex<VecDeque<ReceiptStatus>>,
    pub write_calls: AtomicUsize,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self {
            liq_prices: Mutex::new(HashMap::new()),
            positions: Mutex::new(HashMap::new()),
            mark_price: Mutex::new(U256::ZERO),
            estimate_gas: Mutex::new(Some(100_000)),
            simulate_ok: Mutex::new(true),
            pending_count: Mutex::new(0),
            receipt_queue: Mutex::new(VecDeque::new()),
            write_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeChain {
    pub fn set_liquidation_price(&self, wallet: Address, price: U256, has_position: bool) {
        self.liq_prices.lock().unwrap().insert(wallet, (price, has_position));
    }

    pub fn set_position(&self, wallet: Address, size: I256) {
        self.positions.lock().unwrap().insert(
            wallet,
            PositionSummary { size, entry_price: U256::ZERO, margin_locked: U256::ZERO },
        );
    }

    pub fn write_call_count(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn get_liquidation_price(&self, _core_vault: Address, user: Address, _market_id: B256) -> anyhow::Result<(U256, bool)> {
        Ok(self.liq_prices.lock().unwrap().get(&user).copied().unwrap_or((U256::ZERO, false)))
    }

    async fn get_position_summary(&self, _core_vault: Address, user: Address, _market_id: B256) -> anyhow::Result<PositionSummary> {
        Ok(self
            .positions
            .lock()
            .unwrap()
            .get(&user)
            .copied()
            .unwrap_or(PositionSummary { size: I256::ZERO, entry_price: U256::ZERO, margin_locked: U256::ZERO }))
    }

    async fn calculate_mark_price(&self, _order_book: Address) -> anyhow::Result<U256> {
        Ok(*self.mark_price.lock().unwrap())
    }

    async fn estimate_gas(&self, _core_vault: Address, _from: Address, _market_id: B256, _trader: Address) -> anyhow::Result<u64> {
        self.estimate_gas.lock().unwrap().ok_or_else(|| anyhow::anyhow!("estimate_gas failed"))
    }

    async fn simulate_contract(&self, _core_vault: Address, _from: Address, _market_id: B256, _trader: Address) -> Result<(), SendError> {
        if *self.simulate_ok.lock().unwrap() {
            Ok(())
        } else {
            Err(SendError::Other("simulation reverted".to_string()))
        }
    }

    async fn get_transaction_count(&self, _address: Address) -> anyhow::Result<u64> {
        Ok(*self.pending_count.lock().unwrap())
    }

    async fn write_contract(
        &self,
        _core_vault: Address,
        _signing_key: &str,
        _chain_id: u64,
        _market_id: B256,
        _trader: Address,
        _nonce: u64,
        _gas_limit: Option<u64>,
    ) -> Result<(B256, Address), SendError> {
        let n = self.write_calls.fetch_add(1, Ordering::SeqCst);
        let mut hash = [0u8; 32];
        hash[31] = (n + 1) as u8;
        Ok((B256::from(hash), Address::ZERO))
    }

    async fn wait_for_receipt(&self, _tx_hash: B256, _timeout: Duration) -> Result<ReceiptStatus, SendError> {
        let mut queue = self.receipt_queue.lock().unwrap();
        Ok(queue.pop_front().unwrap_or(ReceiptStatus::Success))
    }
}

/// Nonce allocator fake returning a fixed nonce and recording broadcasts.
#[derive(Default)]
pub struct FixedNonceAllocator {
    pub nonce: u64,
}

#[async_trait]
impl NonceAllocatorClient for FixedNonceAllocator {
    async fn allocate(&self, _relayer: Address, _chain_id: u64, _trace: &str, _label: &str) -> anyhow::Result<u64> {
        Ok(self.nonce)
    }

    async fn mark_broadcast(&self, _relayer: Address, _chain_id: u64, _nonce: u64, _tx_hash: B256) {}
}

/// Nonce allocator fake that always fails, for exercising the
/// allocation-failure path.
#[derive(Default)]
pub struct FailingNonceAllocator;

#[async_trait]
impl NonceAllocatorClient for FailingNonceAllocator {
    async fn allocate(&self, _relayer: Address, _chain_id: u64, _trace: &str, _label: &str) -> anyhow::Result<u64> {
        Err(anyhow::anyhow!("nonce service unreachable"))
    }

    async fn mark_broadcast(&self, _relayer: Address, _chain_id: u64, _nonce: u64, _tx_hash: B256) {}
}

#[derive(Default)]
pub struct RecordingFailureQueue {
    pub calls: Mutex<Vec<(String, String, String, u32)>>,
}

impl RecordingFailureQueue {
    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_priority(&self) -> Option<u32> {
        self.calls.lock().unwrap().last().map(|(_, _, _, p)| *p)
    }
}

#[async_trait]
impl FailureQueueClient for RecordingFailureQueue {
    async fn enqueue(&self, wallet: &str, market_hex: &str, error: &str, priority: u32) {
        self.calls
            .lock()
            .unwrap()
            .push((wallet.to_string(), market_hex.to_string(), error.to_string(), priority));
    }
}

/// Deterministic non-zero test signing key: 32 distinct bytes with `n`
/// in the low byte, matching `liquidator_core::relayer`'s own test key
/// convention.
pub fn test_key(n: u8) -> String {
    let mut bytes = [0x22u8; 32];
    bytes[31] = n;
    format!("0x{}", hex::encode(bytes))
}

pub fn test_config(small_keys: Vec<String>, big_keys: Vec<String>) -> liquidator_core::Config {
    liquidator_core::Config {
        hub_rpc_url: String::new(),
        core_vault_address: Address::ZERO,
        hmac_secret: String::new(),
        relayer_keys: liquidator_core::config::RawRelayerKeys { small: small_keys, big: big_keys },
        small_block_gas_limit: 2_000_000,
        big_block_gas_limit: 30_000_000,
        gas_estimate_buffer_bps: 13_000,
        nonce_allocator_mode: "enabled".to_string(),
        nonce_allocator_url: None,
        log_level: "info".to_string(),
        max_retry_attempts: 5,
        failure_queue_url: None,
        store_url: None,
    }
}
