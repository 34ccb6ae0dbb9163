//! Address validation
//!
//! Textual addresses must be `0x` followed by exactly 40 hex characters.
//! Mixed case is accepted without enforcing the EIP-55 checksum.

use alloy::primitives::Address;

use crate::error::{Error, Result};

/// Check the textual form of an address.
pub fn is_valid_address(addr: &str) -> bool {
    match addr.strip_prefix("0x") {
        Some(hex_str) => hex_str.len() == 40 && hex_str.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Returns `true` for the all-zero address.
pub fn is_zero_address(addr: &Address) -> bool {
    *addr == Address::ZERO
}

/// Parse a textual address, rejecting anything [`is_valid_address`] rejects.
pub fn parse_address(addr: &str) -> Result<Address> {
    let trimmed = addr.trim();
    if !is_valid_address(trimmed) {
        return Err(Error::Validation(format!(
            "invalid address '{}': expected 0x followed by 40 hex characters",
            trimmed
        )));
    }
    trimmed
        .parse::<Address>()
        .map_err(|e| Error::Validation(format!("invalid address '{}': {}", trimmed, e)))
}

/// Values that can be checked as addresses: textual or already normalized.
pub trait AddressLike {
    fn to_address(&self) -> Option<Address>;
}

impl AddressLike for str {
    fn to_address(&self) -> Option<Address> {
        parse_address(self).ok()
    }
}

impl AddressLike for String {
    fn to_address(&self) -> Option<Address> {
        self.as_str().to_address()
    }
}

impl AddressLike for Address {
    fn to_address(&self) -> Option<Address> {
        Some(*self)
    }
}

pub fn is_valid<T: AddressLike + ?Sized>(value: &T) -> bool {
    value.to_address().is_some()
}

/// Zero check that treats an unparseable string as "not zero".
pub fn is_zero<T: AddressLike + ?Sized>(value: &T) -> bool {
    value.to_address().map(|a| is_zero_address(&a)).unwrap_or(false)
}
