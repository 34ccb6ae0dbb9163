//! Common types for the transaction pipeline
//!
//! A transaction moves through `TxRequest -> PendingTransaction ->
//! SignedTransaction -> SubmittedTransaction`. Each stage is a separate value;
//! nothing is mutated once signed.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{address, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Pipeline stages
// ============================================================================

/// Caller's description of a transaction before nonce and gas are known
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    /// Explicit nonce; `None` uses the account's pending nonce
    pub nonce: Option<u64>,
    pub overrides: GasOverrides,
}

impl TxRequest {
    pub fn new(to: Address) -> Self {
        Self {
            to,
            ..Default::default()
        }
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn data(mut self, data: Bytes) -> Self {
        self.data = data;
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn overrides(mut self, overrides: GasOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Gas parameters that skip node-side resolution when set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasOverrides {
    /// Gas price in wei
    pub gas_price: Option<u128>,
    pub gas_limit: Option<u64>,
}

impl GasOverrides {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn gas_price(mut self, wei: u128) -> Self {
        self.gas_price = Some(wei);
        self
    }

    pub fn gas_limit(mut self, limit: u64) -> Self {
        self.gas_limit = Some(limit);
        self
    }
}

/// Fully-resolved legacy transaction, ready to sign
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
}

/// EIP-155 signed legacy transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: B256,
    /// EIP-2718 encoding (for legacy transactions, plain RLP)
    pub raw: Bytes,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub chain_id: u64,
}

/// Result of every successful submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmittedTransaction {
    pub hash: B256,
    pub nonce: u64,
}

// ============================================================================
// Swap types
// ============================================================================

/// Two-hop router path `[input, output]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPath {
    pub input: Address,
    pub output: Address,
}

impl SwapPath {
    pub fn new(input: Address, output: Address) -> Self {
        Self { input, output }
    }

    pub fn to_vec(&self) -> Vec<Address> {
        vec![self.input, self.output]
    }
}

/// Pair reserves as reported by `getReserves()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reserve {
    pub reserve0: U256,
    pub reserve1: U256,
    pub last_update_timestamp: u32,
}

// ============================================================================
// Subscription types
// ============================================================================

/// Raw log metadata delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Log { contract: Address, entry: RawLogEntry },
    /// The subscription for `contract` ended and will not be reopened
    Terminated { contract: Address, reason: String },
}

// ============================================================================
// Network presets
// ============================================================================

/// BNB Smart Chain deployments with known PancakeSwap V2 addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 56,
            Network::Testnet => 97,
        }
    }

    pub fn router(&self) -> Address {
        match self {
            Network::Mainnet => address!("10ED43C718714eb63d5aA57B78B54704E256024E"),
            Network::Testnet => address!("9Ac64Cc6e4415144C455BD8E4837Fea55603e5c3"),
        }
    }

    /// WBNB
    pub fn wrapped_native(&self) -> Address {
        match self {
            Network::Mainnet => address!("bb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c"),
            Network::Testnet => address!("ae13d989daC2f0dEbFf460aC112a837C89BAa7cd"),
        }
    }

    pub fn factory(&self) -> Address {
        match self {
            Network::Mainnet => address!("cA143Ce32Fe78f1f7019d7d551a6402fC5350c73"),
            Network::Testnet => address!("B7926C0430Afb07AA7DEfDE6DA862aE0Bde767bc"),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "bsc" => Ok(Network::Mainnet),
            "testnet" | "bsc-testnet" => Ok(Network::Testnet),
            other => Err(Error::Validation(format!(
                "unknown network '{}': expected mainnet or testnet",
                other
            ))),
        }
    }
}
