//! EVM Transaction Signing Module
//!
//! Signs legacy transactions with EIP-155 replay protection. The chain id is
//! read from the node once per session and cached; signing itself is local
//! and deterministic (RFC 6979 nonces), so the same inputs always produce the
//! same raw bytes and hash.

use std::sync::Arc;

use alloy::{
    consensus::{SignableTransaction, TxEnvelope, TxLegacy},
    eips::eip2718::Encodable2718,
    primitives::{Bytes, TxKind, B256},
    signers::SignerSync,
};
use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::evm::client::ChainRpc;
use crate::keys::Account;
use crate::types::{PendingTransaction, SignedTransaction};

/// Legacy transaction signer with a write-once chain id cache
pub struct TransactionSigner<C: ChainRpc + ?Sized> {
    client: Arc<C>,
    chain_id: OnceCell<u64>,
}

impl<C: ChainRpc + ?Sized> TransactionSigner<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            chain_id: OnceCell::new(),
        }
    }

    /// Skip the node lookup when the chain id is already known
    pub fn with_chain_id(client: Arc<C>, chain_id: u64) -> Self {
        Self {
            client,
            chain_id: OnceCell::new_with(Some(chain_id)),
        }
    }

    /// Chain id, fetched on first use.
    pub async fn chain_id(&self) -> Result<u64> {
        self.chain_id
            .get_or_try_init(|| async {
                let id = self.client.chain_id().await?;
                debug!(chain_id = id, "Cached chain id");
                Ok::<u64, Error>(id)
            })
            .await
            .copied()
    }

    pub async fn sign(
        &self,
        account: &Account,
        tx: &PendingTransaction,
    ) -> Result<SignedTransaction> {
        let chain_id = self.chain_id().await?;
        let signed = sign_legacy(account, tx, chain_id)?;

        info!(
            hash = %signed.hash,
            nonce = signed.nonce,
            gas_price = signed.gas_price,
            gas_limit = signed.gas_limit,
            chain_id = chain_id,
            signed_at = %Utc::now().to_rfc3339(),
            "Signed transaction"
        );

        Ok(signed)
    }
}

/// Sign `tx` for `chain_id` without touching the network.
pub fn sign_legacy(
    account: &Account,
    tx: &PendingTransaction,
    chain_id: u64,
) -> Result<SignedTransaction> {
    if tx.from != account.address() {
        return Err(Error::Signing(format!(
            "transaction is from {} but the active account is {}",
            tx.from,
            account.address()
        )));
    }

    let legacy = TxLegacy {
        chain_id: Some(chain_id),
        nonce: tx.nonce,
        gas_price: tx.gas_price,
        gas_limit: tx.gas_limit,
        to: TxKind::Call(tx.to),
        value: tx.value,
        input: tx.data.clone(),
    };

    let signature = account
        .signer()
        .sign_hash_sync(&legacy.signature_hash())
        .map_err(|e| Error::Signing(e.to_string()))?;

    let signed = legacy.into_signed(signature);
    let hash = *signed.hash();
    let raw = Bytes::from(TxEnvelope::Legacy(signed).encoded_2718());

    Ok(SignedTransaction {
        hash,
        raw,
        nonce: tx.nonce,
        gas_price: tx.gas_price,
        gas_limit: tx.gas_limit,
        chain_id,
    })
}

/// Split a 65-byte `r || s || v` signature, normalizing `v` to 27/28.
pub fn split_signature(signature: &[u8]) -> Result<(B256, B256, u8)> {
    if signature.len() != 65 {
        return Err(Error::Signing(format!(
            "signature must be 65 bytes, got {}",
            signature.len()
        )));
    }
    let r = B256::from_slice(&signature[..32]);
    let s = B256::from_slice(&signature[32..64]);
    let v = match signature[64] {
        v @ (0 | 1) => v + 27,
        v => v,
    };
    Ok((r, s, v))
}
