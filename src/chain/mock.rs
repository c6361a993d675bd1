//! In-memory [`ChainRpc`] for tests and dry runs.
//!
//! Contract behaviour is scripted per function selector:
//! - `on_call::<C>` answers read-only calls with a typed value
//! - `on_transaction::<C>` runs when a transaction for `C` is mined and
//!   returns the logs it emits (or a revert reason)
//! - `revert_estimate::<C>` makes the dry-run gas estimate revert
//!
//! Broadcasts are accepted unless an error was queued with
//! [`MockChain::push_send_error`]. Receipts follow queued [`ReceiptPlan`]s,
//! defaulting to "mined on first lookup, success".

use alloy::primitives::{Address, Bytes, Log, LogData, TxHash, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::chain::rpc::ChainRpc;
use crate::chain::types::{ChainError, ChainResult, SignedTransaction, TxReceipt};

type CallHandler = Arc<dyn Fn(&[u8]) -> ChainResult<Bytes> + Send + Sync>;
type TxHandler = Arc<dyn Fn(&[u8]) -> Result<Vec<LogData>, String> + Send + Sync>;

/// How a broadcast transaction resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptPlan {
    /// Mined successfully once the receipt was looked up `after_lookups` times.
    Success { after_lookups: u32 },
    /// Mined with failure status.
    Revert { after_lookups: u32 },
    /// Stays in the pool forever.
    StuckInPool,
    /// Vanishes: no receipt, not in the pool.
    Dropped,
}

impl Default for ReceiptPlan {
    fn default() -> Self {
        ReceiptPlan::Success { after_lookups: 0 }
    }
}

struct PendingTx {
    tx: SignedTransaction,
    plan: ReceiptPlan,
    lookups: u32,
}

struct MockState {
    block_number: u64,
    gas_price: Option<u128>,
    estimate: Result<u64, String>,
    nonces: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    send_errors: VecDeque<String>,
    receipt_plans: VecDeque<ReceiptPlan>,
    failing_receipt_lookups: u32,
    pending: HashMap<TxHash, PendingTx>,
    mined: HashMap<TxHash, TxReceipt>,
    broadcasts: Vec<SignedTransaction>,
    estimate_reverts: HashMap<[u8; 4], String>,
}

/// Scriptable in-memory chain.
pub struct MockChain {
    chain_id: u64,
    state: Mutex<MockState>,
    calls: Mutex<HashMap<[u8; 4], CallHandler>>,
    transactions: Mutex<HashMap<[u8; 4], TxHandler>>,
    rpc_calls: AtomicUsize,
}

fn selector_of(data: &[u8]) -> Option<[u8; 4]> {
    data.get(..4).and_then(|s| s.try_into().ok())
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(MockState {
                block_number: 100,
                gas_price: Some(20_000_000_000),
                estimate: Ok(100_000),
                nonces: HashMap::new(),
                balances: HashMap::new(),
                send_errors: VecDeque::new(),
                receipt_plans: VecDeque::new(),
                failing_receipt_lookups: 0,
                pending: HashMap::new(),
                mined: HashMap::new(),
                broadcasts: Vec::new(),
                estimate_reverts: HashMap::new(),
            }),
            calls: Mutex::new(HashMap::new()),
            transactions: Mutex::new(HashMap::new()),
            rpc_calls: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn touch(&self) {
        self.rpc_calls.fetch_add(1, Ordering::SeqCst);
    }

    /// Answer read-only calls to `C` with `f(call)`.
    pub fn on_call<C: SolCall + 'static>(&self, f: impl Fn(C) -> C::Return + Send + Sync + 'static) {
        let handler: CallHandler = Arc::new(move |data| {
            let call = C::abi_decode(data).map_err(|e| ChainError::Abi(e.to_string()))?;
            Ok(Bytes::from(C::abi_encode_returns(&f(call))))
        });
        self.lock_calls().insert(C::SELECTOR, handler);
    }

    /// Make read-only calls to `C` revert with `reason`.
    pub fn on_call_revert<C: SolCall + 'static>(&self, reason: &str) {
        let message = format!("execution reverted: {}", reason);
        let handler: CallHandler = Arc::new(move |_| Err(ChainError::from_node_message(&message)));
        self.lock_calls().insert(C::SELECTOR, handler);
    }

    /// Run `f` when a transaction calling `C` is mined; its logs go into the receipt.
    pub fn on_transaction<C: SolCall + 'static>(
        &self,
        f: impl Fn(C) -> Result<Vec<LogData>, String> + Send + Sync + 'static,
    ) {
        let handler: TxHandler = Arc::new(move |data| {
            let call = C::abi_decode(data).map_err(|e| e.to_string())?;
            f(call)
        });
        self.transactions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(C::SELECTOR, handler);
    }

    /// Make gas estimation for `C` revert with `reason`.
    pub fn revert_estimate<C: SolCall>(&self, reason: &str) {
        self.state()
            .estimate_reverts
            .insert(C::SELECTOR, format!("execution reverted: {}", reason));
    }

    fn lock_calls(&self) -> MutexGuard<'_, HashMap<[u8; 4], CallHandler>> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// `None` makes the gas price lookup fail.
    pub fn set_gas_price(&self, price: Option<u128>) {
        self.state().gas_price = price;
    }

    /// `Err(message)` makes estimation fail with a node error.
    pub fn set_estimate(&self, estimate: Result<u64, String>) {
        self.state().estimate = estimate;
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state().balances.insert(address, balance);
    }

    pub fn set_block_number(&self, block: u64) {
        self.state().block_number = block;
    }

    /// Reject the next broadcast with `message`.
    pub fn push_send_error(&self, message: &str) {
        self.state().send_errors.push_back(message.to_string());
    }

    /// Resolve the next accepted broadcast according to `plan`.
    pub fn push_receipt_plan(&self, plan: ReceiptPlan) {
        self.state().receipt_plans.push_back(plan);
    }

    /// Fail the next `n` receipt lookups with a transport error.
    pub fn fail_receipt_lookups(&self, n: u32) {
        self.state().failing_receipt_lookups = n;
    }

    /// Every accepted broadcast, in order.
    pub fn broadcasts(&self) -> Vec<SignedTransaction> {
        self.state().broadcasts.clone()
    }

    /// Total number of RPC methods invoked.
    pub fn rpc_call_count(&self) -> usize {
        self.rpc_calls.load(Ordering::SeqCst)
    }

    /// Mine a pending transaction now, running its scripted effect.
    fn mine(&self, state: &mut MockState, hash: TxHash, success: bool) -> TxReceipt {
        let pending = state.pending.remove(&hash);
        state.block_number += 1;
        let mut receipt = TxReceipt {
            tx_hash: hash,
            block_number: state.block_number,
            success,
            gas_used: 0,
            logs: Vec::new(),
        };

        if let Some(pending) = pending {
            receipt.gas_used = pending.tx.gas_limit.min(100_000);
            if success {
                let handler = selector_of(&pending.tx.input).and_then(|sel| {
                    self.transactions
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .get(&sel)
                        .cloned()
                });
                if let Some(handler) = handler {
                    match handler(&pending.tx.input) {
                        Ok(logs) => {
                            receipt.logs = logs
                                .into_iter()
                                .map(|data| Log { address: pending.tx.to, data })
                                .collect();
                        }
                        Err(_) => receipt.success = false,
                    }
                }
            }
        }

        state.mined.insert(hash, receipt.clone());
        receipt
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn chain_id(&self) -> ChainResult<u64> {
        self.touch();
        Ok(self.chain_id)
    }

    async fn block_number(&self) -> ChainResult<u64> {
        self.touch();
        Ok(self.state().block_number)
    }

    async fn pending_nonce(&self, address: Address) -> ChainResult<u64> {
        self.touch();
        Ok(self.state().nonces.get(&address).copied().unwrap_or(0))
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        self.touch();
        self.state()
            .gas_price
            .ok_or_else(|| ChainError::Rpc("All providers failed to get gas price".to_string()))
    }

    async fn estimate_gas(&self, _from: Address, _to: Address, input: Bytes) -> ChainResult<u64> {
        self.touch();
        let state = self.state();
        if let Some(reason) = selector_of(&input).and_then(|sel| state.estimate_reverts.get(&sel)) {
            return Err(ChainError::from_node_message(reason));
        }
        state
            .estimate
            .clone()
            .map_err(|msg| ChainError::from_node_message(&msg))
    }

    async fn call(&self, _to: Address, input: Bytes) -> ChainResult<Bytes> {
        self.touch();
        let handler = selector_of(&input).and_then(|sel| self.lock_calls().get(&sel).cloned());
        match handler {
            Some(handler) => handler(&input),
            None => Err(ChainError::Rpc(format!(
                "no mock handler for selector 0x{}",
                alloy::primitives::hex::encode(input.get(..4).unwrap_or_default())
            ))),
        }
    }

    async fn send_raw_transaction(&self, tx: &SignedTransaction) -> ChainResult<TxHash> {
        self.touch();
        let mut state = self.state();
        if let Some(message) = state.send_errors.pop_front() {
            return Err(ChainError::from_node_message(&message));
        }

        let next = state.nonces.entry(tx.from).or_insert(0);
        if tx.nonce < *next {
            return Err(ChainError::Rejected("nonce too low".to_string()));
        }
        *next = tx.nonce + 1;

        let plan = state.receipt_plans.pop_front().unwrap_or_default();
        state.broadcasts.push(tx.clone());
        if plan != ReceiptPlan::Dropped {
            state.pending.insert(
                tx.hash,
                PendingTx {
                    tx: tx.clone(),
                    plan,
                    lookups: 0,
                },
            );
        }
        Ok(tx.hash)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> ChainResult<Option<TxReceipt>> {
        self.touch();
        let mut state = self.state();
        if state.failing_receipt_lookups > 0 {
            state.failing_receipt_lookups -= 1;
            return Err(ChainError::Rpc("All providers failed to get receipt".to_string()));
        }
        if let Some(receipt) = state.mined.get(&hash) {
            return Ok(Some(receipt.clone()));
        }

        let Some(pending) = state.pending.get_mut(&hash) else {
            return Ok(None);
        };
        let lookups = pending.lookups;
        let plan = pending.plan;
        pending.lookups += 1;
        match plan {
            ReceiptPlan::Success { after_lookups } if lookups >= after_lookups => {
                Ok(Some(self.mine(&mut state, hash, true)))
            }
            ReceiptPlan::Revert { after_lookups } if lookups >= after_lookups => {
                Ok(Some(self.mine(&mut state, hash, false)))
            }
            _ => Ok(None),
        }
    }

    async fn transaction_in_pool(&self, hash: TxHash) -> ChainResult<bool> {
        self.touch();
        Ok(self.state().pending.contains_key(&hash))
    }

    async fn balance(&self, address: Address) -> ChainResult<U256> {
        self.touch();
        Ok(self.state().balances.get(&address).copied().unwrap_or_default())
    }
}
