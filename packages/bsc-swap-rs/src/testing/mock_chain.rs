//! In-memory chain for pipeline tests
//!
//! [`MockChain`] implements [`ChainRpc`] without a node. Broadcasts are
//! decoded and checked against per-sender nonces, so tests can assert on
//! exactly what was signed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use alloy::{
    consensus::{Transaction, TxEnvelope},
    eips::eip2718::Decodable2718,
    primitives::{keccak256, Address, Bytes, TxHash, U256},
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::error::{Error, Result};
use crate::evm::client::{ChainRpc, LogStream};
use crate::types::RawLogEntry;

/// A transaction the mock accepted, as decoded from its raw bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    pub hash: TxHash,
    pub from: Address,
    pub to: Option<Address>,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub value: U256,
    pub input: Bytes,
    pub chain_id: Option<u64>,
    pub raw: Bytes,
}

#[derive(Debug, Clone)]
enum CallOutcome {
    Return(Bytes),
    Revert { message: String, data: Option<Bytes> },
}

#[derive(Debug, Default)]
struct MockState {
    nonces: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    code: HashMap<Address, Bytes>,
    calls: Vec<(Address, Option<[u8; 4]>, CallOutcome)>,
    estimate: Option<u64>,
    broadcast_error: Option<String>,
    sent: Vec<SentTransaction>,
    estimate_requests: Vec<TransactionRequest>,
    call_requests: Vec<TransactionRequest>,
    logs: HashMap<Address, Vec<RawLogEntry>>,
    closing_subscriptions: Vec<Address>,
    failing_subscriptions: Vec<Address>,
}

/// Scriptable [`ChainRpc`] fake
#[derive(Debug)]
pub struct MockChain {
    chain_id: u64,
    block_number: u64,
    gas_price: Mutex<u128>,
    has_ws: bool,
    nonce_latency: Option<Duration>,
    state: Mutex<MockState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new(97)
    }
}

impl MockChain {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            block_number: 1,
            gas_price: Mutex::new(5_000_000_000),
            has_ws: true,
            nonce_latency: None,
            state: Mutex::new(MockState {
                estimate: Some(21_000),
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Behave like an HTTP-only client
    pub fn without_ws(mut self) -> Self {
        self.has_ws = false;
        self
    }

    /// Delay every nonce lookup, widening any race between submissions
    pub fn with_nonce_latency(mut self, latency: Duration) -> Self {
        self.nonce_latency = Some(latency);
        self
    }

    pub fn set_gas_price(&self, wei: u128) {
        *self.gas_price.lock().unwrap_or_else(|e| e.into_inner()) = wei;
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state().nonces.insert(address, nonce);
    }

    pub fn set_balance(&self, address: Address, wei: U256) {
        self.state().balances.insert(address, wei);
    }

    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state().code.insert(address, code);
    }

    /// `Some(gas)` answers estimates, `None` makes them fail
    pub fn set_estimate(&self, estimate: Option<u64>) {
        self.state().estimate = estimate;
    }

    pub fn set_broadcast_error(&self, message: Option<&str>) {
        self.state().broadcast_error = message.map(str::to_string);
    }

    /// Answer calls to `to` (optionally only for one selector) with `data`
    pub fn set_call_return(&self, to: Address, selector: Option<[u8; 4]>, data: Bytes) {
        self.state()
            .calls
            .push((to, selector, CallOutcome::Return(data)));
    }

    /// Make calls to `to` (optionally only for one selector) revert
    pub fn set_call_revert(
        &self,
        to: Address,
        selector: Option<[u8; 4]>,
        message: &str,
        data: Option<Bytes>,
    ) {
        self.state().calls.push((
            to,
            selector,
            CallOutcome::Revert {
                message: message.to_string(),
                data,
            },
        ));
    }

    pub fn push_log(&self, entry: RawLogEntry) {
        self.state()
            .logs
            .entry(entry.address)
            .or_default()
            .push(entry);
    }

    /// The subscription for `address` ends with an error after its queued logs
    pub fn close_subscription_after_logs(&self, address: Address) {
        self.state().closing_subscriptions.push(address);
    }

    /// Opening a subscription for `address` fails
    pub fn fail_subscription(&self, address: Address) {
        self.state().failing_subscriptions.push(address);
    }

    pub fn sent(&self) -> Vec<SentTransaction> {
        self.state().sent.clone()
    }

    pub fn estimate_requests(&self) -> Vec<TransactionRequest> {
        self.state().estimate_requests.clone()
    }

    pub fn call_requests(&self) -> Vec<TransactionRequest> {
        self.state().call_requests.clone()
    }

    fn decode(raw: &[u8]) -> Result<SentTransaction> {
        let envelope = TxEnvelope::decode_2718(&mut &raw[..])
            .map_err(|e| Error::Broadcast {
                message: format!("rlp: {}", e),
            })?;
        let legacy = envelope.as_legacy().ok_or_else(|| Error::Broadcast {
            message: "only legacy transactions are accepted".to_string(),
        })?;
        let from = legacy.recover_signer().map_err(|e| Error::Broadcast {
            message: format!("invalid sender: {}", e),
        })?;

        Ok(SentTransaction {
            hash: keccak256(raw),
            from,
            to: envelope.to(),
            nonce: envelope.nonce(),
            gas_price: envelope.gas_price().unwrap_or_default(),
            gas_limit: envelope.gas_limit(),
            value: envelope.value(),
            input: envelope.input().clone(),
            chain_id: envelope.chain_id(),
            raw: Bytes::copy_from_slice(raw),
        })
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.block_number)
    }

    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self.state().balances.get(&address).copied().unwrap_or_default())
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        Ok(self.state().code.get(&address).cloned().unwrap_or_default())
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(*self.gas_price.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        let nonce = self.state().nonces.get(&address).copied().unwrap_or_default();
        if let Some(latency) = self.nonce_latency {
            tokio::time::sleep(latency).await;
        }
        Ok(nonce)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        let mut state = self.state();
        state.estimate_requests.push(tx.clone());
        state
            .estimate
            .ok_or_else(|| Error::Estimation("execution reverted".to_string()))
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes> {
        let mut state = self.state();
        state.call_requests.push(tx.clone());

        let to = tx.to.and_then(|kind| kind.to().copied());
        let input = tx.input.input().cloned().unwrap_or_default();
        let selector: Option<[u8; 4]> = input.get(..4).and_then(|s| s.try_into().ok());

        let outcome = state.calls.iter().rev().find(|(addr, sel, _)| {
            Some(*addr) == to && (sel.is_none() || *sel == selector)
        });

        match outcome {
            Some((_, _, CallOutcome::Return(data))) => Ok(data.clone()),
            Some((_, _, CallOutcome::Revert { message, data })) => Err(Error::Reverted {
                message: message.clone(),
                data: data.clone(),
            }),
            None => Ok(Bytes::new()),
        }
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash> {
        let sent = Self::decode(raw)?;
        let mut state = self.state();

        if let Some(message) = state.broadcast_error.clone() {
            return Err(Error::Broadcast { message });
        }

        let current = state.nonces.get(&sent.from).copied().unwrap_or_default();
        if sent.nonce > current {
            return Err(Error::Broadcast {
                message: format!("nonce too high: {} > {}", sent.nonce, current),
            });
        }
        if sent.nonce == current {
            state.nonces.insert(sent.from, current + 1);
        }

        let hash = sent.hash;
        state.sent.push(sent);
        Ok(hash)
    }

    async fn subscribe_logs(&self, address: Address) -> Result<LogStream> {
        if !self.has_ws {
            return Err(Error::SubscriptionUnavailable);
        }

        let state = self.state();
        if state.failing_subscriptions.contains(&address) {
            return Err(Error::Subscription(format!(
                "eth_subscribe rejected for {}",
                address
            )));
        }

        let queued: Vec<Result<RawLogEntry>> = state
            .logs
            .get(&address)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(Ok)
            .collect();

        let tail: LogStream = if state.closing_subscriptions.contains(&address) {
            Box::pin(stream::once(async move {
                Err(Error::Subscription(format!(
                    "subscription for {} closed by the node",
                    address
                )))
            }))
        } else {
            Box::pin(stream::pending())
        };

        Ok(Box::pin(stream::iter(queued).chain(tail)))
    }
}
