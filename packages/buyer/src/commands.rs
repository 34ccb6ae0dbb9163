//! Subcommand implementations
//!
//! Each command takes the connected [`App`] (or nothing, for offline
//! commands) and returns an [`Output`] that the binary prints as text or JSON.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use bigdecimal::BigDecimal;
use bsc_swap_rs::evm::{
    AlloyChainClient, ChainRpc, EventSubscriber, QueryClient, SubscriptionHandle, SwapOptions,
    TransactionSubmitter,
};
use bsc_swap_rs::units::{
    ether_to_wei, gwei_to_ether, gwei_to_wei, to_base_units, to_decimal,
    wei_to_ether, wei_to_gwei,
};
use bsc_swap_rs::{load_wallets, Account, GasOverrides, SubmittedTransaction, SubscriptionEvent};
use clap::ValueEnum;
use eyre::{eyre, Result, WrapErr};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;

/// Everything a connected command needs
pub struct App<C: ChainRpc + ?Sized = AlloyChainClient> {
    pub config: Config,
    pub client: Arc<C>,
    pub submitter: TransactionSubmitter<C>,
}

impl App<AlloyChainClient> {
    /// Dial the configured node(s) and build the submitter.
    ///
    /// `account` overrides the `PRIVATE_KEY` account (e.g. from `--wallet`).
    pub async fn connect(config: Config, account: Option<Account>) -> Result<Self> {
        let account = match account {
            Some(account) => account,
            None => config.signing_account()?,
        };

        let client = AlloyChainClient::connect(
            Some(config.rpc.http_url.as_str()),
            config.rpc.ws_url.as_deref(),
        )
        .await
        .wrap_err("Failed to connect to RPC")?;

        Ok(Self::with_account(config, Arc::new(client), account))
    }
}

impl<C: ChainRpc + ?Sized> App<C> {
    /// Build around an existing client, signing with the `PRIVATE_KEY` account.
    pub fn with_client(config: Config, client: Arc<C>) -> Result<Self> {
        let account = config.signing_account()?;
        Ok(Self::with_account(config, client, account))
    }

    pub fn with_account(config: Config, client: Arc<C>, account: Account) -> Self {
        let submitter =
            TransactionSubmitter::new(client.clone(), account, config.submitter_config());

        Self {
            config,
            client,
            submitter,
        }
    }

    pub fn queries(&self) -> &QueryClient<C> {
        self.submitter.queries()
    }
}

// ============================================================================
// Output
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Output {
    Info {
        network: String,
        chain_id: u64,
        block_number: u64,
        gas_price_gwei: String,
        account: Address,
        balance_ether: String,
        router: Address,
    },
    Balance {
        address: Address,
        wei: U256,
        ether: String,
        is_contract: bool,
    },
    TokenBalance {
        token: Address,
        owner: Address,
        amount: String,
        base_units: U256,
    },
    Submitted {
        action: String,
        hash: String,
        nonce: u64,
    },
    Reserves {
        pair: Option<Address>,
        reserve0: Option<U256>,
        reserve1: Option<U256>,
        last_update_timestamp: Option<u32>,
        quote: Option<U256>,
    },
    Wallets {
        wallets: Vec<WalletSummary>,
    },
    Converted {
        wei: U256,
        gwei: String,
        ether: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletSummary {
    pub file: String,
    pub address: Address,
}

/// Plain decimal notation, trailing zeros removed
pub fn display_amount(value: BigDecimal) -> String {
    value.normalized().to_plain_string()
}

fn submitted(action: &str, tx: SubmittedTransaction) -> Output {
    Output::Submitted {
        action: action.to_string(),
        hash: tx.hash.to_string(),
        nonce: tx.nonce,
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Info {
                network,
                chain_id,
                block_number,
                gas_price_gwei,
                account,
                balance_ether,
                router,
            } => {
                writeln!(f, "network:    {} (chain id {})", network, chain_id)?;
                writeln!(f, "block:      {}", block_number)?;
                writeln!(f, "gas price:  {} gwei", gas_price_gwei)?;
                writeln!(f, "account:    {}", account)?;
                writeln!(f, "balance:    {} BNB", balance_ether)?;
                write!(f, "router:     {}", router)
            }
            Output::Balance {
                address,
                wei,
                ether,
                is_contract,
            } => {
                let kind = if *is_contract { "contract" } else { "account" };
                write!(f, "{} ({}): {} BNB ({} wei)", address, kind, ether, wei)
            }
            Output::TokenBalance {
                token,
                owner,
                amount,
                base_units,
            } => write!(f, "{} holds {} of {} ({} base units)", owner, amount, token, base_units),
            Output::Submitted {
                action,
                hash,
                nonce,
            } => write!(f, "{}: {} (nonce {})", action, hash, nonce),
            Output::Reserves {
                pair: None, ..
            } => write!(f, "no pair exists for this token"),
            Output::Reserves {
                pair: Some(pair),
                reserve0,
                reserve1,
                last_update_timestamp,
                quote,
            } => {
                writeln!(f, "pair:       {}", pair)?;
                writeln!(f, "reserve0:   {}", reserve0.unwrap_or_default())?;
                writeln!(f, "reserve1:   {}", reserve1.unwrap_or_default())?;
                write!(f, "updated at: {}", last_update_timestamp.unwrap_or_default())?;
                if let Some(quote) = quote {
                    write!(f, "\nquote:      {}", quote)?;
                }
                Ok(())
            }
            Output::Wallets { wallets } => {
                if wallets.is_empty() {
                    return write!(f, "no wallet files found");
                }
                let lines: Vec<String> = wallets
                    .iter()
                    .map(|w| format!("{}  {}", w.address, w.file))
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            Output::Converted { wei, gwei, ether } => {
                writeln!(f, "wei:   {}", wei)?;
                writeln!(f, "gwei:  {}", gwei)?;
                write!(f, "ether: {}", ether)
            }
        }
    }
}

// ============================================================================
// Chain info and balances
// ============================================================================

pub async fn info<C: ChainRpc + ?Sized>(app: &App<C>) -> Result<Output> {
    let chain_id = app.client.chain_id().await?;
    let block_number = app.client.block_number().await?;
    let gas_price = app.client.gas_price().await?;
    let account = app.submitter.address().await;
    let balance = app.client.balance(account).await?;

    if chain_id != app.config.network.chain_id() {
        warn!(
            node_chain_id = chain_id,
            configured = %app.config.network,
            "Node chain id differs from the configured network"
        );
    }

    Ok(Output::Info {
        network: app.config.network.to_string(),
        chain_id,
        block_number,
        gas_price_gwei: display_amount(wei_to_gwei(U256::from(gas_price))),
        account,
        balance_ether: display_amount(wei_to_ether(balance)),
        router: app.config.swap.router,
    })
}

pub async fn balance<C: ChainRpc + ?Sized>(
    app: &App<C>,
    address: Option<Address>,
    token: Option<Address>,
) -> Result<Output> {
    let address = match address {
        Some(a) => a,
        None => app.submitter.address().await,
    };

    if let Some(token) = token {
        let decimals = app.queries().token_decimals(token).await?;
        let base_units = app.queries().token_balance(token, address).await?;
        return Ok(Output::TokenBalance {
            token,
            owner: address,
            amount: display_amount(to_decimal(base_units, u32::from(decimals))),
            base_units,
        });
    }

    let wei = app.queries().native_balance(address).await?;
    let is_contract = app.queries().is_contract(&address.to_string()).await?;
    Ok(Output::Balance {
        address,
        wei,
        ether: display_amount(wei_to_ether(wei)),
        is_contract,
    })
}

// ============================================================================
// Transactions
// ============================================================================

pub async fn send<C: ChainRpc + ?Sized>(
    app: &App<C>,
    to: Address,
    amount: &BigDecimal,
    overrides: GasOverrides,
) -> Result<Output> {
    let tx = app.submitter.send_ether(to, amount, overrides).await?;
    Ok(submitted("send", tx))
}

pub async fn send_token<C: ChainRpc + ?Sized>(
    app: &App<C>,
    token: Address,
    to: Address,
    amount: &BigDecimal,
    decimals: Option<u8>,
    overrides: GasOverrides,
) -> Result<Output> {
    let decimals = match decimals {
        Some(d) => d,
        None => app
            .queries()
            .token_decimals(token)
            .await
            .wrap_err("Failed to read token decimals; pass --decimals")?,
    };
    let base_units = to_base_units(amount, u32::from(decimals))?;
    let tx = app
        .submitter
        .send_tokens(token, to, base_units, overrides)
        .await?;
    Ok(submitted("send-token", tx))
}

pub async fn buy<C: ChainRpc + ?Sized>(
    app: &App<C>,
    token: Address,
    amount: &BigDecimal,
    min_out: Option<U256>,
    slippage_bps: Option<u32>,
    overrides: GasOverrides,
) -> Result<Output> {
    let amount_in = ether_to_wei(amount)?;
    let options = SwapOptions {
        min_amount_out: min_out,
        slippage_bps,
        overrides,
    };
    let tx = app.submitter.buy_swap(token, amount_in, options).await?;
    Ok(submitted("buy", tx))
}

/// How the replacement gas price is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    Multiplier(u64),
    BumpPercent(u32),
}

pub async fn cancel<C: ChainRpc + ?Sized>(
    app: &App<C>,
    nonce: u64,
    to: Option<Address>,
    replacement: Replacement,
    gas_limit: Option<u64>,
) -> Result<Output> {
    let to = match to {
        Some(a) => a,
        None => app.submitter.address().await,
    };
    let tx = match replacement {
        Replacement::Multiplier(k) => {
            app.submitter
                .cancel_or_replace(to, nonce, k, gas_limit)
                .await?
        }
        Replacement::BumpPercent(p) => {
            app.submitter
                .cancel_with_bump(to, nonce, p, gas_limit)
                .await?
        }
    };
    Ok(submitted("cancel", tx))
}

// ============================================================================
// Pairs
// ============================================================================

pub async fn reserves<C: ChainRpc + ?Sized>(
    app: &App<C>,
    token: Address,
    quote_amount: Option<&BigDecimal>,
) -> Result<Output> {
    let swap = &app.config.swap;
    let found = app
        .queries()
        .pair_reserves(swap.factory, swap.wrapped_native, token)
        .await?;

    let Some((pair, reserve)) = found else {
        return Ok(Output::Reserves {
            pair: None,
            reserve0: None,
            reserve1: None,
            last_update_timestamp: None,
            quote: None,
        });
    };

    let quote = match quote_amount {
        Some(amount) => Some(
            app.queries()
                .quote_amount_out(swap.router, ether_to_wei(amount)?, &[swap.wrapped_native, token])
                .await?,
        ),
        None => None,
    };

    Ok(Output::Reserves {
        pair: Some(pair),
        reserve0: Some(reserve.reserve0),
        reserve1: Some(reserve.reserve1),
        last_update_timestamp: Some(reserve.last_update_timestamp),
        quote,
    })
}

// ============================================================================
// Subscriptions
// ============================================================================

pub async fn start_watch<C: ChainRpc + ?Sized>(
    app: &App<C>,
    contracts: &[Address],
) -> Result<SubscriptionHandle> {
    let subscriber = EventSubscriber::new(app.client.clone(), app.config.subscription_buffer);
    let handle = subscriber.subscribe(contracts).await?;
    info!(contracts = contracts.len(), "Watching contract logs");
    Ok(handle)
}

/// Deliver events to `emit` until every subscription has ended or `shutdown`
/// resolves. Returns the number of events delivered.
///
/// Events still buffered when a subscription terminates are delivered
/// before the loop ends.
pub async fn drain_events<F, W>(handle: &mut SubscriptionHandle, shutdown: F, mut emit: W) -> usize
where
    F: Future<Output = ()>,
    W: FnMut(&SubscriptionEvent),
{
    tokio::pin!(shutdown);
    let mut delivered = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = handle.recv() => match event {
                Some(event) => {
                    emit(&event);
                    delivered += 1;
                }
                None => {
                    warn!("All subscriptions ended");
                    break;
                }
            },
        }
    }

    delivered
}

/// One line per delivered event
pub fn format_event(event: &SubscriptionEvent) -> String {
    match event {
        SubscriptionEvent::Log { contract, entry } => format!(
            "log contract={} block={} tx={} topics={} data=0x{}",
            contract,
            entry
                .block_number
                .map(|b| b.to_string())
                .unwrap_or_else(|| "pending".to_string()),
            entry
                .transaction_hash
                .map(|h| h.to_string())
                .unwrap_or_else(|| "-".to_string()),
            entry.topics.len(),
            hex::encode(&entry.data),
        ),
        SubscriptionEvent::Terminated { contract, reason } => {
            format!("terminated contract={} reason={}", contract, reason)
        }
    }
}

// ============================================================================
// Offline commands
// ============================================================================

pub fn wallets(dir: &Path) -> Result<Output> {
    let loaded = load_wallets(dir)?;
    Ok(Output::Wallets {
        wallets: loaded
            .into_iter()
            .map(|w| WalletSummary {
                file: w.path.display().to_string(),
                address: w.account.address(),
            })
            .collect(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Unit {
    Wei,
    Gwei,
    Ether,
}

pub fn convert(value: &BigDecimal, from: Unit) -> Result<Output> {
    let wei = match from {
        Unit::Wei => to_base_units(value, 0)?,
        Unit::Gwei => gwei_to_wei(value)?,
        Unit::Ether => ether_to_wei(value)?,
    };

    let ether = match from {
        Unit::Gwei => gwei_to_ether(value),
        _ => wei_to_ether(wei),
    };

    Ok(Output::Converted {
        wei,
        gwei: display_amount(wei_to_gwei(wei)),
        ether: display_amount(ether),
    })
}

/// `--gas-price-gwei` / `--gas-limit` into pipeline overrides
pub fn gas_overrides(gas_price_gwei: Option<&BigDecimal>, gas_limit: Option<u64>) -> Result<GasOverrides> {
    let gas_price = match gas_price_gwei {
        Some(gwei) => {
            let wei = gwei_to_wei(gwei)?;
            Some(u128::try_from(wei).map_err(|_| eyre!("gas price {} gwei is too large", gwei))?)
        }
        None => None,
    };
    Ok(GasOverrides {
        gas_price,
        gas_limit,
    })
}
