//! Submission Pipeline Integration Test
//!
//! Runs the submit and cancel/replace flow against a live development node.
//!
//! ## Setup
//!
//! Start Anvil without automining, so the first transaction stays pending
//! and can be replaced (its first default account is used as the sender):
//!
//! ```bash
//! anvil --chain-id 97 --no-mining
//! ```
//!
//! - `BSC_RPC_URL` - HTTP RPC (default http://localhost:8545)
//! - `BSC_WS_URL` - WebSocket RPC (optional)
//!
//! ## Running
//!
//! ```bash
//! cd packages/bsc-swap-rs
//! cargo test --test node_integration -- --ignored --nocapture
//! ```

use std::sync::Arc;

use alloy::primitives::{address, Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use bsc_swap_rs::evm::{AlloyChainClient, ChainRpc, SubmitterConfig, TransactionSubmitter};
use bsc_swap_rs::{Account, GasOverrides, Network};

const ANVIL_KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const RECIPIENT: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

async fn connect() -> Arc<AlloyChainClient> {
    let http = std::env::var("BSC_RPC_URL").unwrap_or_else(|_| "http://localhost:8545".into());
    let ws = std::env::var("BSC_WS_URL").ok();
    Arc::new(
        AlloyChainClient::connect(Some(&http), ws.as_deref())
            .await
            .expect("node must be running for integration tests"),
    )
}

/// Mine one block on the dev node
async fn mine() {
    let http = std::env::var("BSC_RPC_URL").unwrap_or_else(|_| "http://localhost:8545".into());
    let provider = ProviderBuilder::new().on_http(http.parse().unwrap());
    provider
        .raw_request::<_, serde_json::Value>("evm_mine".into(), ())
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires a running Anvil node started with --no-mining"]
async fn pending_transfer_is_replaced_by_cancel() {
    let client = connect().await;
    let account = Account::from_private_key(ANVIL_KEY_0).unwrap();
    let sender = account.address();
    let submitter = TransactionSubmitter::new(
        client.clone(),
        account,
        SubmitterConfig::for_network(Network::Testnet),
    );

    let before = client.balance(RECIPIENT).await.unwrap();
    let sent = submitter
        .send_value(RECIPIENT, U256::from(1_000u64), GasOverrides::none().gas_limit(21_000))
        .await
        .unwrap();
    println!("sent {} with nonce {}", sent.hash, sent.nonce);

    // still pending: the next pending nonce is past it
    assert_eq!(client.pending_nonce(sender).await.unwrap(), sent.nonce + 1);

    let replaced = submitter
        .cancel_or_replace(sender, sent.nonce, 2, Some(21_000))
        .await
        .unwrap();
    assert_eq!(replaced.nonce, sent.nonce);
    assert_ne!(replaced.hash, sent.hash);

    mine().await;

    // only the zero-value self transfer was mined
    assert_eq!(client.balance(RECIPIENT).await.unwrap(), before);
    assert_eq!(client.pending_nonce(sender).await.unwrap(), sent.nonce + 1);
}
