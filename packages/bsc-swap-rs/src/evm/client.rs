//! EVM RPC Client Wrapper
//!
//! [`ChainRpc`] is the node surface the transaction pipeline needs.
//! [`AlloyChainClient`] implements it over an HTTP provider, a WebSocket
//! provider, or both. Queries go over WebSocket when it is configured and
//! over HTTP otherwise; log subscriptions always need WebSocket.

use std::pin::Pin;

use alloy::{
    primitives::{Address, Bytes, TxHash, U256},
    providers::{Provider, ProviderBuilder, RootProvider, WsConnect},
    pubsub::PubSubFrontend,
    rpc::types::{Filter, Log, TransactionRequest},
    sol_types::{decode_revert_reason, Revert, SolError},
    transports::{
        http::{Client, Http},
        TransportError,
    },
};
use async_trait::async_trait;
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::RawLogEntry;

/// Stream of logs for one contract; an `Err` item is terminal.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<RawLogEntry>> + Send>>;

/// Node operations used by the gas estimator, signer, submitter and subscriber
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn block_number(&self) -> Result<u64>;

    async fn chain_id(&self) -> Result<u64>;

    /// Native balance in wei. A failed query is an error, never zero.
    async fn balance(&self, address: Address) -> Result<U256>;

    async fn code_at(&self, address: Address) -> Result<Bytes>;

    /// Node-suggested legacy gas price in wei
    async fn gas_price(&self) -> Result<u128>;

    /// Transaction count including the pending pool
    async fn pending_nonce(&self, address: Address) -> Result<u64>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64>;

    /// `eth_call` against the latest block
    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes>;

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash>;

    async fn subscribe_logs(&self, address: Address) -> Result<LogStream>;
}

// ============================================================================
// Error mapping
// ============================================================================

fn connectivity(e: TransportError) -> Error {
    Error::Connectivity(e.to_string())
}

fn estimation_error(e: TransportError) -> Error {
    match e.as_error_resp() {
        Some(payload) => Error::Estimation(payload.message.to_string()),
        None => connectivity(e),
    }
}

fn broadcast_error(e: TransportError) -> Error {
    match e.as_error_resp() {
        Some(payload) => Error::Broadcast {
            message: payload.message.to_string(),
        },
        None => connectivity(e),
    }
}

fn call_error(e: TransportError) -> Error {
    match e.as_error_resp() {
        Some(payload) => Error::Reverted {
            message: payload.message.to_string(),
            data: payload.as_revert_data(),
        },
        None => connectivity(e),
    }
}

/// Human-readable revert reason from revert data, else from the node message.
///
/// `Error(string)` payloads yield the bare string; panics and other payloads
/// use alloy's generic description.
pub fn revert_reason(message: &str, data: Option<&Bytes>) -> Option<String> {
    if let Some(data) = data {
        if let Ok(revert) = Revert::abi_decode(data, true) {
            return Some(revert.reason);
        }
        if let Some(reason) = decode_revert_reason(data) {
            return Some(reason);
        }
    }
    message
        .strip_prefix("execution reverted:")
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

fn to_raw_entry(log: Log) -> RawLogEntry {
    RawLogEntry {
        address: log.address(),
        topics: log.topics().to_vec(),
        data: log.data().data.clone(),
        block_number: log.block_number,
        transaction_hash: log.transaction_hash,
    }
}

// ============================================================================
// Alloy implementation
// ============================================================================

/// HTTP and/or WebSocket connection to one node
pub struct AlloyChainClient {
    http: Option<RootProvider<Http<Client>>>,
    ws: Option<RootProvider<PubSubFrontend>>,
}

/// Run `$body` against the preferred provider: WebSocket, else HTTP.
macro_rules! with_provider {
    ($self:ident, $p:ident => $body:expr) => {
        match (&$self.ws, &$self.http) {
            (Some($p), _) => $body,
            (None, Some($p)) => $body,
            (None, None) => Err(Error::Connectivity("no RPC connection configured".to_string())),
        }
    };
}

impl AlloyChainClient {
    /// Dial the configured endpoints and verify each with a block-number call.
    pub async fn connect(http_url: Option<&str>, ws_url: Option<&str>) -> Result<Self> {
        if http_url.is_none() && ws_url.is_none() {
            return Err(Error::Connectivity(
                "at least one of the HTTP or WebSocket RPC URLs is required".to_string(),
            ));
        }

        let http = match http_url {
            Some(url) => {
                let provider = ProviderBuilder::new().on_http(
                    url.parse()
                        .map_err(|e| Error::Connectivity(format!("invalid HTTP RPC URL: {}", e)))?,
                );
                let block = provider.get_block_number().await.map_err(connectivity)?;
                info!(block = block, "Connected to HTTP RPC");
                Some(provider)
            }
            None => None,
        };

        let ws = match ws_url {
            Some(url) => {
                let provider = ProviderBuilder::new()
                    .on_ws(WsConnect::new(url))
                    .await
                    .map_err(connectivity)?;
                let block = provider.get_block_number().await.map_err(connectivity)?;
                info!(block = block, "Connected to WebSocket RPC");
                Some(provider)
            }
            None => None,
        };

        Ok(Self { http, ws })
    }

    pub fn has_ws(&self) -> bool {
        self.ws.is_some()
    }
}

#[async_trait]
impl ChainRpc for AlloyChainClient {
    async fn block_number(&self) -> Result<u64> {
        with_provider!(self, p => p.get_block_number().await.map_err(connectivity))
    }

    async fn chain_id(&self) -> Result<u64> {
        with_provider!(self, p => p.get_chain_id().await.map_err(connectivity))
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        with_provider!(self, p => p.get_balance(address).await.map_err(connectivity))
    }

    async fn code_at(&self, address: Address) -> Result<Bytes> {
        with_provider!(self, p => p.get_code_at(address).await.map_err(connectivity))
    }

    async fn gas_price(&self) -> Result<u128> {
        with_provider!(self, p => p.get_gas_price().await.map_err(connectivity))
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64> {
        with_provider!(self, p => p
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(connectivity))
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        with_provider!(self, p => p.estimate_gas(tx).await.map_err(estimation_error))
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes> {
        with_provider!(self, p => p.call(tx).await.map_err(call_error))
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash> {
        with_provider!(self, p => p
            .send_raw_transaction(raw)
            .await
            .map(|pending| *pending.tx_hash())
            .map_err(broadcast_error))
    }

    async fn subscribe_logs(&self, address: Address) -> Result<LogStream> {
        let ws = self.ws.as_ref().ok_or(Error::SubscriptionUnavailable)?;
        let filter = Filter::new().address(address);
        let sub = ws
            .subscribe_logs(&filter)
            .await
            .map_err(|e| Error::Subscription(e.to_string()))?;

        debug!(contract = %address, "Opened log subscription");

        let stream = futures::stream::unfold(Some(sub), move |state| async move {
            let mut sub = state?;
            loop {
                match sub.recv().await {
                    Ok(log) => return Some((Ok(to_raw_entry(log)), Some(sub))),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(contract = %address, skipped = skipped, "Log subscription lagged");
                    }
                    Err(RecvError::Closed) => {
                        let err = Error::Subscription(format!(
                            "subscription for {} closed by the node",
                            address
                        ));
                        return Some((Err(err), None));
                    }
                }
            }
        });

        Ok(Box::pin(stream))
    }
}
