//! Transaction submission pipeline
//!
//! Every submission runs `nonce -> gas -> sign -> broadcast` while holding the
//! account lock, so concurrent callers on one account receive consecutive
//! nonces, each exactly once. Nothing here retries; a rejected broadcast is
//! returned to the caller with the node's message.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use bigdecimal::BigDecimal;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::calldata::{encode_swap_exact_eth, encode_transfer};
use crate::error::{Error, Result};
use crate::evm::client::{revert_reason, ChainRpc};
use crate::evm::gas::{bump_gas_price, multiply_gas_price, GasEstimator, GasRequest, DEFAULT_GAS_LIMIT};
use crate::evm::queries::QueryClient;
use crate::evm::signer::TransactionSigner;
use crate::keys::Account;
use crate::types::{
    GasOverrides, Network, PendingTransaction, SubmittedTransaction, SwapPath, TxRequest,
};
use crate::units::ether_to_wei;

/// Seconds added to the current time to form a swap deadline
pub const DEFAULT_DEADLINE_WINDOW_SECS: u64 = 10_000;

const BPS_DENOMINATOR: u32 = 10_000;

/// Router addresses and swap policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapConfig {
    pub router: Address,
    pub wrapped_native: Address,
    pub factory: Address,
    pub deadline_window_secs: u64,
    /// Floor used when the caller gives neither a minimum nor a slippage.
    /// The default of one base unit offers no sandwich protection.
    pub min_amount_out: U256,
}

impl SwapConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            router: network.router(),
            wrapped_native: network.wrapped_native(),
            factory: network.factory(),
            deadline_window_secs: DEFAULT_DEADLINE_WINDOW_SECS,
            min_amount_out: U256::from(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitterConfig {
    pub default_gas_limit: u64,
    /// Known chain id; `None` asks the node once
    pub chain_id: Option<u64>,
    pub swap: SwapConfig,
}

impl SubmitterConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            default_gas_limit: DEFAULT_GAS_LIMIT,
            chain_id: None,
            swap: SwapConfig::for_network(network),
        }
    }
}

/// Per-call swap parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapOptions {
    /// Explicit minimum output in token base units
    pub min_amount_out: Option<U256>,
    /// Derive the minimum from a router quote minus this many basis points
    pub slippage_bps: Option<u32>,
    pub overrides: GasOverrides,
}

pub struct TransactionSubmitter<C: ChainRpc + ?Sized> {
    client: Arc<C>,
    account: Mutex<Account>,
    gas: GasEstimator<C>,
    signer: TransactionSigner<C>,
    queries: QueryClient<C>,
    config: SubmitterConfig,
}

impl<C: ChainRpc + ?Sized> TransactionSubmitter<C> {
    pub fn new(client: Arc<C>, account: Account, config: SubmitterConfig) -> Self {
        let signer = match config.chain_id {
            Some(id) => TransactionSigner::with_chain_id(client.clone(), id),
            None => TransactionSigner::new(client.clone()),
        };

        info!(
            address = %account.address(),
            router = %config.swap.router,
            default_gas_limit = config.default_gas_limit,
            "Transaction submitter initialized"
        );

        Self {
            gas: GasEstimator::new(client.clone(), config.default_gas_limit),
            queries: QueryClient::new(client.clone()),
            account: Mutex::new(account),
            signer,
            client,
            config,
        }
    }

    pub fn config(&self) -> &SubmitterConfig {
        &self.config
    }

    pub fn queries(&self) -> &QueryClient<C> {
        &self.queries
    }

    pub fn gas(&self) -> &GasEstimator<C> {
        &self.gas
    }

    /// Address of the active account
    pub async fn address(&self) -> Address {
        self.account.lock().await.address()
    }

    /// Replace the active account. Waits for any in-flight submission.
    pub async fn switch_account(&self, private_key: &str) -> Result<Address> {
        let next = Account::from_private_key(private_key)?;
        let mut account = self.account.lock().await;
        let previous = account.address();
        *account = next;
        info!(from = %previous, to = %account.address(), "Switched active account");
        Ok(account.address())
    }

    // =========================================================================
    // Core Pipeline
    // =========================================================================

    /// Resolve nonce and gas, sign and broadcast.
    pub async fn submit(&self, request: TxRequest) -> Result<SubmittedTransaction> {
        let account = self.account.lock().await;
        self.submit_locked(&account, request).await
    }

    async fn submit_locked(
        &self,
        account: &Account,
        request: TxRequest,
    ) -> Result<SubmittedTransaction> {
        let from = account.address();

        let nonce = match request.nonce {
            Some(nonce) => nonce,
            None => self.client.pending_nonce(from).await?,
        };

        let gas_price = self
            .gas
            .resolve_gas_price(request.overrides.gas_price)
            .await?;

        let gas_request = GasRequest {
            from,
            to: request.to,
            value: request.value,
            data: request.data.clone(),
        };
        let gas_limit = self
            .gas
            .resolve_gas_limit(&gas_request, request.overrides.gas_limit)
            .await;

        let pending = PendingTransaction {
            from,
            to: request.to,
            value: request.value,
            data: request.data,
            nonce,
            gas_price,
            gas_limit,
        };

        let signed = self.signer.sign(account, &pending).await?;
        let node_hash = self.client.send_raw_transaction(&signed.raw).await?;

        if node_hash != signed.hash {
            warn!(
                local = %signed.hash,
                node = %node_hash,
                "Node reported a different transaction hash"
            );
        }

        info!(
            hash = %signed.hash,
            from = %from,
            to = %pending.to,
            nonce = nonce,
            "Transaction broadcast"
        );

        Ok(SubmittedTransaction {
            hash: signed.hash,
            nonce,
        })
    }

    // =========================================================================
    // Transfers
    // =========================================================================

    /// Plain native transfer of `value` wei
    pub async fn send_value(
        &self,
        to: Address,
        value: U256,
        overrides: GasOverrides,
    ) -> Result<SubmittedTransaction> {
        self.submit(TxRequest::new(to).value(value).overrides(overrides))
            .await
    }

    /// Native transfer of a decimal ether amount
    pub async fn send_ether(
        &self,
        to: Address,
        amount: &BigDecimal,
        overrides: GasOverrides,
    ) -> Result<SubmittedTransaction> {
        let value = ether_to_wei(amount)?;
        self.send_value(to, value, overrides).await
    }

    /// ERC-20 `transfer`, sent to the token contract with zero native value
    pub async fn send_tokens(
        &self,
        token: Address,
        to: Address,
        amount: U256,
        overrides: GasOverrides,
    ) -> Result<SubmittedTransaction> {
        let data = encode_transfer(to, amount);
        debug!(token = %token, to = %to, amount = %amount, "Sending tokens");
        self.submit(TxRequest::new(token).data(data).overrides(overrides))
            .await
    }

    // =========================================================================
    // Swaps
    // =========================================================================

    /// Swap `amount_in` wei of native currency for `token` through the router.
    pub async fn buy_swap(
        &self,
        token: Address,
        amount_in: U256,
        options: SwapOptions,
    ) -> Result<SubmittedTransaction> {
        if amount_in.is_zero() {
            return Err(Error::Validation("swap amount must be greater than zero".to_string()));
        }
        if let Some(bps) = options.slippage_bps {
            if bps >= BPS_DENOMINATOR {
                return Err(Error::Validation(format!(
                    "slippage of {} bps leaves no minimum output",
                    bps
                )));
            }
        }

        let swap = &self.config.swap;
        let path = SwapPath::new(swap.wrapped_native, token);
        let min_amount_out = self.min_amount_out(amount_in, &path, &options).await?;

        let deadline = U256::from(swap_deadline(swap.deadline_window_secs));

        let account = self.account.lock().await;
        let recipient = account.address();
        let data = encode_swap_exact_eth(min_amount_out, &path.to_vec(), recipient, deadline);

        self.preflight(recipient, swap.router, amount_in, &data).await?;

        info!(
            token = %token,
            amount_in = %amount_in,
            min_amount_out = %min_amount_out,
            deadline = %deadline,
            "Submitting swap"
        );

        let request = TxRequest::new(swap.router)
            .value(amount_in)
            .data(data)
            .overrides(options.overrides);
        self.submit_locked(&account, request).await
    }

    async fn min_amount_out(
        &self,
        amount_in: U256,
        path: &SwapPath,
        options: &SwapOptions,
    ) -> Result<U256> {
        let min_out = match (options.min_amount_out, options.slippage_bps) {
            (Some(explicit), _) => explicit,
            (None, Some(bps)) => {
                let quote = self
                    .queries
                    .quote_amount_out(self.config.swap.router, amount_in, &path.to_vec())
                    .await?;
                let min_out = apply_slippage(quote, bps);
                debug!(quote = %quote, slippage_bps = bps, min_amount_out = %min_out, "Derived minimum output");
                min_out
            }
            (None, None) => self.config.swap.min_amount_out,
        };

        if min_out.is_zero() {
            return Err(Error::Validation(
                "minimum output of zero accepts any price".to_string(),
            ));
        }
        Ok(min_out)
    }

    /// Simulate the swap with `eth_call`; a revert becomes `SwapRejected`.
    async fn preflight(&self, from: Address, router: Address, value: U256, data: &Bytes) -> Result<()> {
        let tx = TransactionRequest::default()
            .from(from)
            .to(router)
            .value(value)
            .input(data.clone().into());

        match self.client.call(&tx).await {
            Ok(_) => Ok(()),
            Err(Error::Reverted { message, data }) => {
                let reason = revert_reason(&message, data.as_ref());
                warn!(reason = ?reason, "Router rejected swap in simulation");
                Err(Error::SwapRejected {
                    reason,
                    payload: data.unwrap_or_default(),
                })
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Cancel / Replace
    // =========================================================================

    /// Zero-value, empty-data transaction reusing `nonce` at
    /// `suggested gas price * multiplier`.
    pub async fn cancel_or_replace(
        &self,
        to: Address,
        nonce: u64,
        multiplier: u64,
        gas_limit: Option<u64>,
    ) -> Result<SubmittedTransaction> {
        if multiplier == 0 {
            return Err(Error::Validation(
                "gas price multiplier must be at least 1".to_string(),
            ));
        }
        if multiplier == 1 {
            warn!(
                nonce = nonce,
                "Replacing at the suggested gas price; the node will likely reject it as underpriced"
            );
        }

        let suggested = self.gas.resolve_gas_price(None).await?;
        let gas_price = multiply_gas_price(suggested, multiplier)?;
        self.replace(to, nonce, gas_price, gas_limit).await
    }

    /// Same as [`cancel_or_replace`](Self::cancel_or_replace) with a
    /// percentage bump over the suggested price.
    pub async fn cancel_with_bump(
        &self,
        to: Address,
        nonce: u64,
        bump_percent: u32,
        gas_limit: Option<u64>,
    ) -> Result<SubmittedTransaction> {
        let suggested = self.gas.resolve_gas_price(None).await?;
        let gas_price = bump_gas_price(suggested, bump_percent)?;
        self.replace(to, nonce, gas_price, gas_limit).await
    }

    async fn replace(
        &self,
        to: Address,
        nonce: u64,
        gas_price: u128,
        gas_limit: Option<u64>,
    ) -> Result<SubmittedTransaction> {
        info!(nonce = nonce, gas_price = gas_price, to = %to, "Replacing pending transaction");

        let overrides = GasOverrides {
            gas_price: Some(gas_price),
            gas_limit,
        };
        self.submit(TxRequest::new(to).nonce(nonce).overrides(overrides))
            .await
    }
}

/// Unix time `window_secs` from now
pub fn swap_deadline(window_secs: u64) -> u64 {
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    now.saturating_add(window_secs)
}

/// `quote * (10000 - bps) / 10000`
pub fn apply_slippage(quote: U256, slippage_bps: u32) -> U256 {
    let keep = U256::from(BPS_DENOMINATOR.saturating_sub(slippage_bps));
    quote.saturating_mul(keep) / U256::from(BPS_DENOMINATOR)
}
