//! Gas price and gas limit resolution
//!
//! Overrides are used verbatim. Without an override the price comes from the
//! node's suggestion and the limit from `eth_estimateGas`, falling back to a
//! fixed default when the call has no calldata or the estimate fails.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::rpc::types::TransactionRequest;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::evm::client::ChainRpc;

/// Gas limit used when nothing better is known
pub const DEFAULT_GAS_LIMIT: u64 = 7_000_000;

/// Inputs to a gas estimate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasRequest {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl GasRequest {
    pub fn to_transaction_request(&self) -> TransactionRequest {
        TransactionRequest::default()
            .from(self.from)
            .to(self.to)
            .value(self.value)
            .input(self.data.clone().into())
    }
}

pub struct GasEstimator<C: ChainRpc + ?Sized> {
    client: Arc<C>,
    default_gas_limit: u64,
}

impl<C: ChainRpc + ?Sized> GasEstimator<C> {
    pub fn new(client: Arc<C>, default_gas_limit: u64) -> Self {
        Self {
            client,
            default_gas_limit,
        }
    }

    pub fn default_gas_limit(&self) -> u64 {
        self.default_gas_limit
    }

    /// Override if given, else the node's suggested price.
    pub async fn resolve_gas_price(&self, override_price: Option<u128>) -> Result<u128> {
        match override_price {
            Some(price) => {
                debug!(gas_price = price, "Using gas price override");
                Ok(price)
            }
            None => {
                let price = self.client.gas_price().await?;
                debug!(gas_price = price, "Using suggested gas price");
                Ok(price)
            }
        }
    }

    /// Override if given; else estimate for calls with calldata; else the default.
    pub async fn resolve_gas_limit(&self, request: &GasRequest, override_limit: Option<u64>) -> u64 {
        if let Some(limit) = override_limit {
            debug!(gas_limit = limit, "Using gas limit override");
            return limit;
        }

        if request.data.is_empty() {
            debug!(
                gas_limit = self.default_gas_limit,
                "No calldata, using default gas limit"
            );
            return self.default_gas_limit;
        }

        match self
            .client
            .estimate_gas(&request.to_transaction_request())
            .await
        {
            Ok(limit) => {
                debug!(gas_limit = limit, to = %request.to, "Estimated gas limit");
                limit
            }
            Err(e) => {
                warn!(
                    error = %e,
                    to = %request.to,
                    fallback = self.default_gas_limit,
                    "Gas estimation failed, using default gas limit"
                );
                self.default_gas_limit
            }
        }
    }
}

/// Exact `limit * price` in wei.
pub fn calc_gas_cost(gas_limit: u64, gas_price: u128) -> U256 {
    U256::from(gas_limit) * U256::from(gas_price)
}

/// `price * (100 + percent) / 100`, rounded down.
pub fn bump_gas_price(gas_price: u128, bump_percent: u32) -> Result<u128> {
    let multiplier = 100u128 + u128::from(bump_percent);
    gas_price
        .checked_mul(multiplier)
        .map(|p| p / 100)
        .ok_or_else(|| Error::Validation(format!("gas price {} overflows when bumped", gas_price)))
}

/// `price * multiplier` with an integer multiplier.
pub fn multiply_gas_price(gas_price: u128, multiplier: u64) -> Result<u128> {
    gas_price.checked_mul(u128::from(multiplier)).ok_or_else(|| {
        Error::Validation(format!(
            "gas price {} overflows when multiplied by {}",
            gas_price, multiplier
        ))
    })
}
