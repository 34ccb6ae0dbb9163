//! Error taxonomy for the transaction pipeline
//!
//! Validation, key and signing failures are raised before anything touches
//! the network. Node-side failures keep the node's own message so the caller
//! can decide what to do next; nothing in this crate retries.

use std::path::PathBuf;

use alloy::primitives::Bytes;
use thiserror::Error;

/// Errors produced by `bsc-swap-rs`
#[derive(Debug, Error)]
pub enum Error {
    /// RPC dial or query failure
    #[error("RPC connectivity error: {0}")]
    Connectivity(String),

    /// Malformed input rejected before any network call
    #[error("validation error: {0}")]
    Validation(String),

    /// Private key could not be decoded into a secp256k1 scalar
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// Numeric string or amount could not be converted
    #[error("parse error: {0}")]
    Parse(String),

    /// The node refused to simulate a call for gas estimation
    #[error("gas estimation failed: {0}")]
    Estimation(String),

    /// Transaction could not be signed
    #[error("signing failed: {0}")]
    Signing(String),

    /// The node rejected the signed transaction
    #[error("broadcast rejected by node: {message}")]
    Broadcast { message: String },

    /// An `eth_call` reverted
    #[error("call reverted: {message}")]
    Reverted {
        message: String,
        data: Option<Bytes>,
    },

    /// The router reverted the swap during preflight simulation
    #[error("swap rejected by router: {}", .reason.as_deref().unwrap_or("no revert reason"))]
    SwapRejected {
        reason: Option<String>,
        payload: Bytes,
    },

    /// Log subscriptions need a WebSocket connection
    #[error("no WebSocket connection configured for log subscriptions")]
    SubscriptionUnavailable,

    /// A log subscription failed or was closed by the node
    #[error("subscription error: {0}")]
    Subscription(String),

    /// A wallet file could not be turned into an account
    #[error("wallet file {}: {reason}", .path.display())]
    Wallet { path: PathBuf, reason: String },
}

impl Error {
    /// Returns `true` for errors raised locally, before any RPC round-trip.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InvalidKey(_)
                | Self::Parse(_)
                | Self::Signing(_)
                | Self::Wallet { .. }
        )
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_errors() {
        assert!(Error::Validation("bad".into()).is_local());
        assert!(Error::Signing("bad".into()).is_local());
        assert!(!Error::Connectivity("down".into()).is_local());
        assert!(!Error::Broadcast {
            message: "nonce too low".into()
        }
        .is_local());
    }

    #[test]
    fn test_swap_rejected_display() {
        let err = Error::SwapRejected {
            reason: Some("PancakeRouter: EXPIRED".into()),
            payload: Bytes::new(),
        };
        assert_eq!(err.to_string(), "swap rejected by router: PancakeRouter: EXPIRED");

        let err = Error::SwapRejected {
            reason: None,
            payload: Bytes::new(),
        };
        assert_eq!(err.to_string(), "swap rejected by router: no revert reason");
    }
}
