//! Subcommands driven against the in-memory chain.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{address, Address, Bytes, U256};
use bsc_swap_rs::calldata::{function_selector, SWAP_EXACT_ETH_SIGNATURE, TRANSFER_SIGNATURE};
use bsc_swap_rs::testing::MockChain;
use bsc_swap_rs::units::parse_decimal;
use bsc_swap_rs::{Error, GasOverrides, Network, RawLogEntry};
use buyer::commands::{self, App, Output, Replacement};
use buyer::config::{AccountConfig, Config, RpcConfig, SwapSettings};

const ANVIL_KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const ANVIL_ADDR_0: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
const RECIPIENT: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
const TOKEN: Address = address!("0E09FaBB73Bd3Ade0a17ECC321fD13a19e81cE82");

fn test_config() -> Config {
    let network = Network::Testnet;
    Config {
        network,
        rpc: RpcConfig {
            http_url: "http://localhost:8545".to_string(),
            extra_http_urls: Vec::new(),
            ws_url: Some("ws://localhost:8546".to_string()),
            timeout_secs: 30,
        },
        account: Some(AccountConfig {
            private_key: ANVIL_KEY_0.to_string(),
        }),
        swap: SwapSettings {
            router: network.router(),
            wrapped_native: network.wrapped_native(),
            factory: network.factory(),
            deadline_window_secs: 10_000,
            min_amount_out: U256::from(1u64),
        },
        default_gas_limit: 7_000_000,
        subscription_buffer: 16,
        wallets_dir: PathBuf::from("./wallets"),
    }
}

fn app(chain: &Arc<MockChain>) -> App<MockChain> {
    App::with_client(test_config(), chain.clone()).unwrap()
}

#[tokio::test]
async fn send_uses_pending_nonce_and_overrides() {
    let chain = Arc::new(MockChain::default());
    chain.set_nonce(ANVIL_ADDR_0, 3);
    let app = app(&chain);

    let overrides = commands::gas_overrides(Some(&parse_decimal("3").unwrap()), Some(21_000)).unwrap();
    let out = commands::send(&app, RECIPIENT, &parse_decimal("0.5").unwrap(), overrides)
        .await
        .unwrap();

    match out {
        Output::Submitted { action, nonce, .. } => {
            assert_eq!(action, "send");
            assert_eq!(nonce, 3);
        }
        other => panic!("unexpected output {:?}", other),
    }

    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, Some(RECIPIENT));
    assert_eq!(sent[0].value, U256::from(500_000_000_000_000_000u128));
    assert_eq!(sent[0].gas_price, 3_000_000_000);
    assert_eq!(sent[0].gas_limit, 21_000);
    assert_eq!(sent[0].chain_id, Some(97));
}

#[tokio::test]
async fn wallet_account_signs_without_private_key() {
    let chain = Arc::new(MockChain::default());
    let mut config = test_config();
    config.account = None;

    assert!(App::with_client(config.clone(), chain.clone()).is_err());

    let wallet = bsc_swap_rs::WalletFile {
        public_key: RECIPIENT.to_string(),
        private_key: "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d".to_string(),
    };
    let account = wallet.into_account(std::path::Path::new("wallet.json")).unwrap();
    let app = App::with_account(config, chain.clone(), account);

    commands::send(&app, TOKEN, &parse_decimal("0.01").unwrap(), GasOverrides::none())
        .await
        .unwrap();
    assert_eq!(chain.sent()[0].from, RECIPIENT);
}

#[tokio::test]
async fn send_token_targets_the_token_contract() {
    let chain = Arc::new(MockChain::default());
    let app = app(&chain);

    commands::send_token(
        &app,
        TOKEN,
        RECIPIENT,
        &parse_decimal("2.5").unwrap(),
        Some(6),
        GasOverrides::none(),
    )
    .await
    .unwrap();

    let sent = chain.sent();
    assert_eq!(sent[0].to, Some(TOKEN));
    assert_eq!(sent[0].value, U256::ZERO);
    assert_eq!(&sent[0].input[..4], &function_selector(TRANSFER_SIGNATURE));
    assert_eq!(
        U256::from_be_slice(&sent[0].input[36..68]),
        U256::from(2_500_000u64)
    );
}

#[tokio::test]
async fn balance_reports_ether_and_account_kind() {
    let chain = Arc::new(MockChain::default());
    chain.set_balance(RECIPIENT, U256::from(1_500_000_000_000_000_000u128));
    let app = app(&chain);

    let out = commands::balance(&app, Some(RECIPIENT), None).await.unwrap();
    assert_eq!(
        out,
        Output::Balance {
            address: RECIPIENT,
            wei: U256::from(1_500_000_000_000_000_000u128),
            ether: "1.5".to_string(),
            is_contract: false,
        }
    );
}

#[tokio::test]
async fn buy_sends_swap_to_router() {
    let chain = Arc::new(MockChain::default());
    let app = app(&chain);
    let router = Network::Testnet.router();

    commands::buy(
        &app,
        TOKEN,
        &parse_decimal("0.1").unwrap(),
        Some(U256::from(1_000u64)),
        None,
        GasOverrides::none(),
    )
    .await
    .unwrap();

    let sent = chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, Some(router));
    assert_eq!(sent[0].value, U256::from(100_000_000_000_000_000u128));
    assert_eq!(&sent[0].input[..4], &function_selector(SWAP_EXACT_ETH_SIGNATURE));
    assert_eq!(sent[0].gas_limit, 21_000);
}

#[tokio::test]
async fn buy_rejected_in_simulation_is_not_broadcast() {
    let chain = Arc::new(MockChain::default());
    chain.set_call_revert(
        Network::Testnet.router(),
        Some(function_selector(SWAP_EXACT_ETH_SIGNATURE)),
        "execution reverted: PancakeRouter: INSUFFICIENT_OUTPUT_AMOUNT",
        None,
    );
    let app = app(&chain);

    let err = commands::buy(
        &app,
        TOKEN,
        &parse_decimal("0.1").unwrap(),
        None,
        None,
        GasOverrides::none(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::SwapRejected { .. })
    ));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn cancel_with_bump_reuses_nonce() {
    let chain = Arc::new(MockChain::default());
    chain.set_nonce(ANVIL_ADDR_0, 1);
    let app = app(&chain);

    let out = commands::cancel(&app, 0, None, Replacement::BumpPercent(10), None)
        .await
        .unwrap();
    assert!(matches!(out, Output::Submitted { nonce: 0, .. }));

    let sent = chain.sent();
    assert_eq!(sent[0].to, Some(ANVIL_ADDR_0));
    assert_eq!(sent[0].value, U256::ZERO);
    assert!(sent[0].input.is_empty());
    assert_eq!(sent[0].gas_price, 5_500_000_000);
    assert_eq!(sent[0].gas_limit, 7_000_000);
}

#[tokio::test]
async fn cancel_rejects_zero_multiplier() {
    let chain = Arc::new(MockChain::default());
    let app = app(&chain);

    let err = commands::cancel(&app, 0, None, Replacement::Multiplier(0), None)
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Validation(_))));
    assert!(chain.sent().is_empty());
}

#[tokio::test]
async fn reserves_without_pair() {
    let chain = Arc::new(MockChain::default());
    chain.set_call_return(Network::Testnet.factory(), None, Bytes::from(vec![0u8; 32]));
    let app = app(&chain);

    let out = commands::reserves(&app, TOKEN, None).await.unwrap();
    assert!(matches!(out, Output::Reserves { pair: None, .. }));
    assert_eq!(out.to_string(), "no pair exists for this token");
}

#[tokio::test]
async fn watch_delivers_logs() {
    let chain = Arc::new(MockChain::default());
    chain.push_log(RawLogEntry {
        address: TOKEN,
        topics: Vec::new(),
        data: Bytes::from(vec![0xab, 0xcd]),
        block_number: Some(42),
        transaction_hash: None,
    });
    let app = app(&chain);

    let mut handle = commands::start_watch(&app, &[TOKEN]).await.unwrap();
    let event = handle.recv().await.unwrap();
    let line = commands::format_event(&event);
    assert!(line.starts_with("log contract="));
    assert!(line.contains("block=42"));
    assert!(line.contains("data=0xabcd"));

    handle.shutdown().await;
}

#[tokio::test]
async fn watch_prints_every_buffered_log_and_the_termination() {
    let chain = Arc::new(MockChain::default());
    for block in 1..=5u64 {
        chain.push_log(RawLogEntry {
            address: TOKEN,
            topics: Vec::new(),
            data: Bytes::new(),
            block_number: Some(block),
            transaction_hash: None,
        });
    }
    chain.close_subscription_after_logs(TOKEN);
    let app = app(&chain);

    let mut handle = commands::start_watch(&app, &[TOKEN]).await.unwrap();
    let mut lines = Vec::new();
    let delivered = tokio::time::timeout(
        Duration::from_secs(5),
        commands::drain_events(&mut handle, std::future::pending::<()>(), |event| {
            lines.push(commands::format_event(event))
        }),
    )
    .await
    .unwrap();

    assert_eq!(delivered, 6);
    assert_eq!(lines.len(), 6);
    assert!(lines[..5].iter().all(|l| l.starts_with("log contract=")));
    assert!(lines[4].contains("block=5"));
    assert!(lines[5].starts_with("terminated"));
    assert_eq!(handle.active(), 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn watch_stops_on_shutdown_signal() {
    let chain = Arc::new(MockChain::default());
    let app = app(&chain);

    let mut handle = commands::start_watch(&app, &[TOKEN]).await.unwrap();
    let delivered = tokio::time::timeout(
        Duration::from_secs(5),
        commands::drain_events(&mut handle, async {}, |_| {}),
    )
    .await
    .unwrap();
    assert_eq!(delivered, 0);

    handle.shutdown().await;
}

#[tokio::test]
async fn watch_without_websocket_fails_fast() {
    let chain = Arc::new(MockChain::default().without_ws());
    let app = app(&chain);

    let err = commands::start_watch(&app, &[TOKEN]).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::SubscriptionUnavailable)
    ));
}

#[test]
fn wallets_lists_directory() {
    let dir = std::env::temp_dir().join(format!("bsc-buyer-wallets-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("main.json"),
        format!(r#"{{"PublicKey":"","PrivateKey":"{}"}}"#, ANVIL_KEY_0),
    )
    .unwrap();

    match commands::wallets(&dir).unwrap() {
        Output::Wallets { wallets } => {
            assert_eq!(wallets.len(), 1);
            assert_eq!(wallets[0].address, ANVIL_ADDR_0);
            assert!(wallets[0].file.ends_with("main.json"));
        }
        other => panic!("unexpected output {:?}", other),
    }

    fs::remove_dir_all(&dir).unwrap();
}
