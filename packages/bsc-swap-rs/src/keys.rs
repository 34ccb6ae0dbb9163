//! Private key handling
//!
//! An [`Account`] owns the plaintext key for the process lifetime. The key is
//! never formatted; `Debug` prints only the derived address.

use std::fmt;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::error::{Error, Result};
use crate::redact::Redacted;

/// A signing key and the address derived from it
#[derive(Clone)]
pub struct Account {
    signer: PrivateKeySigner,
    address: Address,
}

impl Account {
    /// Decode a hex private key, with or without `0x`.
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let trimmed = private_key.trim();
        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        if hex_str.is_empty() {
            return Err(Error::InvalidKey("private key is empty".to_string()));
        }

        let bytes = hex::decode(hex_str)
            .map_err(|e| Error::InvalidKey(format!("not valid hex: {}", e)))?;

        if bytes.len() != 32 {
            return Err(Error::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }

        let signer = PrivateKeySigner::from_slice(&bytes)
            .map_err(|e| Error::InvalidKey(format!("not a valid secp256k1 scalar: {}", e)))?;
        let address = signer.address();

        Ok(Self { signer, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("signer", &Redacted(&self.signer))
            .finish()
    }
}

/// Derive the public address of a hex private key.
pub fn derive_address(private_key: &str) -> Result<Address> {
    Account::from_private_key(private_key).map(|a| a.address())
}
