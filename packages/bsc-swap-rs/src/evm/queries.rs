//! EVM Query Helpers
//!
//! Typed read-only queries: balances, contract detection, ERC-20 state and
//! PancakeSwap pair/router lookups. Calls are ABI-encoded with the `sol!`
//! bindings and executed through [`ChainRpc::call`]; errors propagate.

use std::sync::Arc;

use alloy::{
    primitives::{Address, U256},
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};

use crate::address::parse_address;
use crate::error::{Error, Result};
use crate::evm::client::ChainRpc;
use crate::evm::contracts::{IPancakeFactory, IPancakePair, IPancakeRouter02, IERC20};
use crate::types::Reserve;

/// Read-only query client over any [`ChainRpc`]
pub struct QueryClient<C: ChainRpc + ?Sized> {
    client: Arc<C>,
}

impl<C: ChainRpc + ?Sized> Clone for QueryClient<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

impl<C: ChainRpc + ?Sized> QueryClient<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    async fn call<T: SolCall>(&self, to: Address, call: T) -> Result<T::Return> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(call.abi_encode().into());
        let output = self.client.call(&tx).await?;
        T::abi_decode_returns(&output, true).map_err(|e| {
            Error::Parse(format!(
                "failed to decode {} result from {}: {}",
                T::SIGNATURE,
                to,
                e
            ))
        })
    }

    // =========================================================================
    // Account Queries
    // =========================================================================

    /// Native balance in wei
    pub async fn native_balance(&self, address: Address) -> Result<U256> {
        self.client.balance(address).await
    }

    /// `true` if the address has deployed code. Invalid input is `false`
    /// without an RPC round-trip.
    pub async fn is_contract(&self, address: &str) -> Result<bool> {
        let address = match parse_address(address) {
            Ok(a) => a,
            Err(_) => return Ok(false),
        };
        let code = self.client.code_at(address).await?;
        Ok(!code.is_empty())
    }

    // =========================================================================
    // ERC-20 Queries
    // =========================================================================

    pub async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        let result = self
            .call(token, IERC20::balanceOfCall { account: owner })
            .await?;
        Ok(result._0)
    }

    pub async fn token_decimals(&self, token: Address) -> Result<u8> {
        let result = self.call(token, IERC20::decimalsCall {}).await?;
        Ok(result._0)
    }

    // =========================================================================
    // PancakeSwap Queries
    // =========================================================================

    /// Pair address for two tokens; zero when no pair exists
    pub async fn get_pair(&self, factory: Address, token_a: Address, token_b: Address) -> Result<Address> {
        let result = self
            .call(
                factory,
                IPancakeFactory::getPairCall {
                    tokenA: token_a,
                    tokenB: token_b,
                },
            )
            .await?;
        Ok(result.pair)
    }

    pub async fn get_reserves(&self, pair: Address) -> Result<Reserve> {
        let result = self.call(pair, IPancakePair::getReservesCall {}).await?;
        Ok(Reserve {
            reserve0: U256::from(result.reserve0),
            reserve1: U256::from(result.reserve1),
            last_update_timestamp: result.blockTimestampLast,
        })
    }

    /// Pair lookup followed by `getReserves`; `None` when the pair does not exist.
    pub async fn pair_reserves(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Option<(Address, Reserve)>> {
        let pair = self.get_pair(factory, token_a, token_b).await?;
        if pair == Address::ZERO {
            return Ok(None);
        }
        let reserve = self.get_reserves(pair).await?;
        Ok(Some((pair, reserve)))
    }

    /// Router quote for the last hop of `path`
    pub async fn quote_amount_out(
        &self,
        router: Address,
        amount_in: U256,
        path: &[Address],
    ) -> Result<U256> {
        let result = self
            .call(
                router,
                IPancakeRouter02::getAmountsOutCall {
                    amountIn: amount_in,
                    path: path.to_vec(),
                },
            )
            .await?;
        result
            .amounts
            .last()
            .copied()
            .ok_or_else(|| Error::Parse("router returned an empty amounts array".to_string()))
    }
}
