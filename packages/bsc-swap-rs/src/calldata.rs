//! Raw ABI calldata construction
//!
//! Calldata is `selector ++ head ++ tail`. Static arguments occupy one
//! 32-byte head word each; dynamic arguments (here only `address[]`) put a
//! byte offset in the head and their length-prefixed elements in the tail.
//!
//! ## Signatures
//!
//! ```text
//! transfer(address,uint256)
//! swapExactETHForTokensSupportingFeeOnTransferTokens(uint256,address[],address,uint256)
//! ```

use alloy::primitives::{Address, Bytes, U256};
use tiny_keccak::{Hasher, Keccak};

use crate::error::{Error, Result};

pub const TRANSFER_SIGNATURE: &str = "transfer(address,uint256)";

pub const SWAP_EXACT_ETH_SIGNATURE: &str =
    "swapExactETHForTokensSupportingFeeOnTransferTokens(uint256,address[],address,uint256)";

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// First four bytes of keccak256 over the canonical signature.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Left-pad `value` with zeros to a 32-byte word.
pub fn left_pad_32(value: &[u8]) -> Result<[u8; 32]> {
    if value.len() > 32 {
        return Err(Error::Validation(format!(
            "argument of {} bytes does not fit in a 32-byte word",
            value.len()
        )));
    }
    let mut word = [0u8; 32];
    word[32 - value.len()..].copy_from_slice(value);
    Ok(word)
}

/// Selector followed by each argument left-padded to 32 bytes, in order.
///
/// Only suitable for static argument lists; the result is always
/// `4 + 32 * args.len()` bytes.
pub fn build_tx_data(selector: [u8; 4], args: &[&[u8]]) -> Result<Bytes> {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector);
    for arg in args {
        data.extend_from_slice(&left_pad_32(arg)?);
    }
    Ok(Bytes::from(data))
}

// ============================================================================
// Head/tail builder
// ============================================================================

#[derive(Debug, Clone)]
enum Param {
    Static([u8; 32]),
    Dynamic(Vec<[u8; 32]>),
}

/// Incremental calldata builder with head/tail encoding for dynamic arrays.
#[derive(Debug, Clone)]
pub struct CallData {
    selector: [u8; 4],
    params: Vec<Param>,
}

impl CallData {
    pub fn new(signature: &str) -> Self {
        Self::with_selector(function_selector(signature))
    }

    pub fn with_selector(selector: [u8; 4]) -> Self {
        Self {
            selector,
            params: Vec::new(),
        }
    }

    pub fn word(mut self, word: [u8; 32]) -> Self {
        self.params.push(Param::Static(word));
        self
    }

    pub fn address(self, addr: Address) -> Self {
        self.word(addr.into_word().0)
    }

    pub fn uint(self, value: U256) -> Self {
        self.word(value.to_be_bytes::<32>())
    }

    pub fn bool(self, value: bool) -> Self {
        self.uint(U256::from(value as u8))
    }

    /// Dynamic `address[]`: length word then one word per element.
    pub fn address_array(mut self, addrs: &[Address]) -> Self {
        let mut tail = Vec::with_capacity(addrs.len() + 1);
        tail.push(U256::from(addrs.len()).to_be_bytes::<32>());
        tail.extend(addrs.iter().map(|a| a.into_word().0));
        self.params.push(Param::Dynamic(tail));
        self
    }

    pub fn finish(self) -> Bytes {
        let head_len = 32 * self.params.len();
        let mut head: Vec<u8> = Vec::with_capacity(head_len);
        let mut tail: Vec<u8> = Vec::new();

        for param in &self.params {
            match param {
                Param::Static(word) => head.extend_from_slice(word),
                Param::Dynamic(words) => {
                    let offset = U256::from(head_len + tail.len());
                    head.extend_from_slice(&offset.to_be_bytes::<32>());
                    for word in words {
                        tail.extend_from_slice(word);
                    }
                }
            }
        }

        let mut data = Vec::with_capacity(4 + head.len() + tail.len());
        data.extend_from_slice(&self.selector);
        data.extend_from_slice(&head);
        data.extend_from_slice(&tail);
        Bytes::from(data)
    }
}

/// `transfer(to, amount)` calldata for an ERC-20 token.
pub fn encode_transfer(to: Address, amount: U256) -> Bytes {
    CallData::new(TRANSFER_SIGNATURE).address(to).uint(amount).finish()
}

/// Calldata for `swapExactETHForTokensSupportingFeeOnTransferTokens`.
pub fn encode_swap_exact_eth(
    amount_out_min: U256,
    path: &[Address],
    to: Address,
    deadline: U256,
) -> Bytes {
    CallData::new(SWAP_EXACT_ETH_SIGNATURE)
        .uint(amount_out_min)
        .address_array(path)
        .address(to)
        .uint(deadline)
        .finish()
}
