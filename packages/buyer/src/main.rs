//! BSC Buyer CLI
//!
//! Buys tokens on PancakeSwap V2 by swapping BNB through the router, plus
//! the transfer, cancel/replace and inspection commands around it.
//!
//! Configuration comes from an env file (default `.env`) and the process
//! environment; see `buyer::config` for the variables.

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use bigdecimal::BigDecimal;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use tracing::{info, warn};

use buyer::commands::{self, App, Output, Replacement, Unit};
use buyer::config::{endpoint_host, Config, KeyPolicy, DEFAULT_ENV_FILE};
use bsc_swap_rs::evm::{AlloyChainClient, ChainRpc};
use bsc_swap_rs::units::parse_decimal;
use bsc_swap_rs::{load_wallet, parse_address, Error as SwapError};

#[derive(Parser)]
#[command(name = "bsc-buyer")]
#[command(about = "Buy tokens on BNB Smart Chain through PancakeSwap V2", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Env file to load before reading the environment
    #[arg(long, global = true, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Gas price override in gwei
    #[arg(long, global = true, value_parser = decimal_arg)]
    gas_price_gwei: Option<BigDecimal>,

    /// Gas limit override
    #[arg(long, global = true)]
    gas_limit: Option<u64>,

    /// Sign with the account from this wallet file instead of PRIVATE_KEY
    #[arg(long, global = true)]
    wallet: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show chain id, block, gas price and the active account
    Info,

    /// Native (or token) balance of an address
    Balance {
        /// Defaults to the active account
        #[arg(long, value_parser = address_arg)]
        address: Option<Address>,

        /// Report an ERC-20 balance instead of BNB
        #[arg(long, value_parser = address_arg)]
        token: Option<Address>,
    },

    /// Send BNB
    Send {
        #[arg(long, value_parser = address_arg)]
        to: Address,

        /// Amount in BNB, e.g. 0.05
        #[arg(long, value_parser = decimal_arg)]
        amount: BigDecimal,
    },

    /// Send ERC-20 tokens
    SendToken {
        #[arg(long, value_parser = address_arg)]
        token: Address,

        #[arg(long, value_parser = address_arg)]
        to: Address,

        /// Amount in whole tokens
        #[arg(long, value_parser = decimal_arg)]
        amount: BigDecimal,

        /// Token decimals; read from the contract when omitted
        #[arg(long)]
        decimals: Option<u8>,
    },

    /// Swap BNB for a token through the router
    Buy {
        #[arg(long, value_parser = address_arg)]
        token: Address,

        /// Amount of BNB to spend
        #[arg(long, value_parser = decimal_arg)]
        amount: BigDecimal,

        /// Minimum tokens out, in base units
        #[arg(long, value_parser = u256_arg, conflicts_with = "slippage_bps")]
        min_out: Option<U256>,

        /// Derive the minimum from a router quote minus this many basis points
        #[arg(long)]
        slippage_bps: Option<u32>,
    },

    /// Replace a pending transaction with a zero-value one at a higher gas price
    Cancel {
        #[arg(long)]
        nonce: u64,

        /// Defaults to the active account
        #[arg(long, value_parser = address_arg)]
        to: Option<Address>,

        /// Suggested gas price multiplier
        #[arg(long, default_value_t = 2, conflicts_with = "bump_percent")]
        multiplier: u64,

        /// Percentage bump over the suggested gas price
        #[arg(long)]
        bump_percent: Option<u32>,
    },

    /// Stream logs emitted by contracts until interrupted
    Watch {
        #[arg(long = "contract", required = true, value_parser = address_arg)]
        contracts: Vec<Address>,
    },

    /// Pair reserves for a token against wrapped BNB
    Reserves {
        #[arg(long, value_parser = address_arg)]
        token: Address,

        /// Also quote the router output for this much BNB
        #[arg(long, value_parser = decimal_arg)]
        quote: Option<BigDecimal>,
    },

    /// List the accounts in a wallet directory
    Wallets {
        /// Defaults to WALLETS_DIR
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Convert an amount between wei, gwei and ether
    Convert {
        #[arg(long, value_parser = decimal_arg)]
        value: BigDecimal,

        #[arg(long, value_enum)]
        from: Unit,
    },
}

fn address_arg(raw: &str) -> std::result::Result<Address, String> {
    parse_address(raw).map_err(|e| e.to_string())
}

fn decimal_arg(raw: &str) -> std::result::Result<BigDecimal, String> {
    parse_decimal(raw).map_err(|e| e.to_string())
}

fn u256_arg(raw: &str) -> std::result::Result<U256, String> {
    raw.parse::<U256>().map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Offline commands that need no RPC (and, for convert, no config)
    if let Commands::Convert { value, from } = &cli.command {
        return print(&commands::convert(value, *from)?, cli.json);
    }

    // a wallet file replaces PRIVATE_KEY, and listing wallets signs nothing
    let keys = if cli.wallet.is_some() || matches!(cli.command, Commands::Wallets { .. }) {
        KeyPolicy::Optional
    } else {
        KeyPolicy::Required
    };
    let config = Config::load_from_file(&cli.env_file, keys)?;
    info!(
        network = %config.network,
        rpc_host = endpoint_host(&config.rpc.http_url),
        ws = config.rpc.ws_url.is_some(),
        "Configuration loaded"
    );

    if let Commands::Wallets { dir } = &cli.command {
        let dir = dir.clone().unwrap_or_else(|| config.wallets_dir.clone());
        return print(&commands::wallets(&dir)?, cli.json);
    }

    let account = match &cli.wallet {
        Some(path) => {
            let account = load_wallet(path)?.into_account(path)?;
            info!(address = %account.address(), wallet = %path.display(), "Using wallet file account");
            Some(account)
        }
        None => None,
    };

    let timeout = Duration::from_secs(config.rpc.timeout_secs);
    let app = tokio::time::timeout(timeout, App::<AlloyChainClient>::connect(config, account))
        .await
        .map_err(|_| eyre!("Timed out connecting to RPC after {:?}", timeout))??;

    if let Commands::Watch { contracts } = &cli.command {
        return watch(&app, contracts).await;
    }

    let overrides = commands::gas_overrides(cli.gas_price_gwei.as_ref(), cli.gas_limit)?;

    let run = async {
        match &cli.command {
            Commands::Info => commands::info(&app).await,
            Commands::Balance { address, token } => {
                commands::balance(&app, *address, *token).await
            }
            Commands::Send { to, amount } => commands::send(&app, *to, amount, overrides).await,
            Commands::SendToken {
                token,
                to,
                amount,
                decimals,
            } => commands::send_token(&app, *token, *to, amount, *decimals, overrides).await,
            Commands::Buy {
                token,
                amount,
                min_out,
                slippage_bps,
            } => commands::buy(&app, *token, amount, *min_out, *slippage_bps, overrides).await,
            Commands::Cancel {
                nonce,
                to,
                multiplier,
                bump_percent,
            } => {
                let replacement = match bump_percent {
                    Some(p) => Replacement::BumpPercent(*p),
                    None => Replacement::Multiplier(*multiplier),
                };
                commands::cancel(&app, *nonce, *to, replacement, overrides.gas_limit).await
            }
            Commands::Reserves { token, quote } => {
                commands::reserves(&app, *token, quote.as_ref()).await
            }
            Commands::Watch { .. } | Commands::Wallets { .. } | Commands::Convert { .. } => {
                Err(eyre!("command already handled"))
            }
        }
    };

    let output = tokio::time::timeout(timeout, run)
        .await
        .map_err(|_| eyre!("Command timed out after {:?}", timeout))?;

    match output {
        Ok(output) => print(&output, cli.json),
        Err(err) => {
            report_revert(&err);
            Err(err)
        }
    }
}

async fn watch<C>(app: &App<C>, contracts: &[Address]) -> Result<()>
where
    C: ChainRpc + ?Sized,
{
    let mut handle = commands::start_watch(app, contracts).await?;

    let delivered = commands::drain_events(&mut handle, wait_for_shutdown_signal(), |event| {
        println!("{}", commands::format_event(event))
    })
    .await;

    handle.shutdown().await;
    info!(events = delivered, "Watch stopped");
    Ok(())
}

fn print(output: &Output, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(output).wrap_err("Failed to serialize output")?
        );
    } else {
        println!("{}", output);
    }
    Ok(())
}

/// Raw revert payloads are printed so they can be decoded offline.
fn report_revert(err: &color_eyre::eyre::Report) {
    match err.downcast_ref::<SwapError>() {
        Some(SwapError::SwapRejected { payload, .. }) if !payload.is_empty() => {
            eprintln!("revert payload: 0x{}", hex::encode(payload));
        }
        Some(SwapError::Reverted {
            data: Some(data), ..
        }) if !data.is_empty() => {
            eprintln!("revert data: 0x{}", hex::encode(data));
        }
        _ => {}
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,bsc_buyer=debug,bsc_swap_rs=debug"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping");
        }
    }
}
