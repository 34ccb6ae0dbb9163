//! EVM Chain Support Module
//!
//! Everything that talks to a node: the RPC seam, gas resolution, signing,
//! the submission pipeline, log subscriptions and read-only queries.
//!
//! ## Submodules
//!
//! - `client` - `ChainRpc` trait and the alloy HTTP/WebSocket implementation
//! - `contracts` - PancakeSwap and ERC-20 bindings using alloy sol! macro
//! - `gas` - Gas price / gas limit resolution and gas arithmetic
//! - `signer` - EIP-155 legacy transaction signing
//! - `submitter` - Nonce-serialized submit, swap and cancel/replace
//! - `subscriber` - Per-contract log subscriptions over a bounded channel
//! - `queries` - Balances, pair reserves and router quotes

pub mod client;
pub mod contracts;
pub mod gas;
pub mod queries;
pub mod signer;
pub mod submitter;
pub mod subscriber;

// Re-export commonly used items
pub use client::{AlloyChainClient, ChainRpc, LogStream};
pub use gas::{GasEstimator, GasRequest, DEFAULT_GAS_LIMIT};
pub use queries::QueryClient;
pub use signer::TransactionSigner;
pub use submitter::{SubmitterConfig, SwapConfig, SwapOptions, TransactionSubmitter};
pub use subscriber::{EventSubscriber, SubscriptionHandle, DEFAULT_SUBSCRIPTION_BUFFER};
