//! BSC-Swap-RS: Transaction pipeline and router swaps for BNB Smart Chain
//!
//! This crate provides the pieces the `bsc-buyer` CLI is built from:
//!
//! - **Units** - Exact wei/gwei/ether conversion on `BigDecimal`
//! - **Addresses** - Textual address validation and parsing
//! - **Calldata** - Function selectors and head/tail ABI encoding
//! - **Keys / Wallets** - Private key accounts and JSON wallet files
//! - **EVM Module** - RPC client, gas resolution, signing, submission, subscriptions, queries
//! - **Testing Module** - In-memory `ChainRpc` for tests
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! bsc-swap-rs = { path = "../bsc-swap-rs" }
//! ```
//!
//! ## Feature Flags
//!
//! - `testing` - Expose `testing::MockChain` to downstream crates

pub mod address;
pub mod calldata;
pub mod error;
pub mod evm;
pub mod keys;
pub mod redact;
pub mod types;
pub mod units;
pub mod wallet;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used items at the crate root
pub use address::{is_valid_address, is_zero_address, parse_address};
pub use calldata::{build_tx_data, function_selector, keccak256, left_pad_32, CallData};
pub use error::{Error, Result};
pub use keys::{derive_address, Account};
pub use redact::Redacted;
pub use types::{
    GasOverrides, Network, PendingTransaction, RawLogEntry, Reserve, SignedTransaction,
    SubmittedTransaction, SubscriptionEvent, SwapPath, TxRequest,
};
pub use wallet::{load_wallet, load_wallets, LoadedWallet, WalletFile};
