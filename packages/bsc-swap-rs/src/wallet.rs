//! Wallet files
//!
//! A wallet file is a JSON object `{"PublicKey": "0x…", "PrivateKey": "…"}`.
//! Every failure to turn one into an [`Account`] is reported as
//! [`Error::Wallet`] with the offending path; a bad file never produces an
//! empty account.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::address::parse_address;
use crate::error::{Error, Result};
use crate::keys::Account;
use crate::redact::Redacted;

#[derive(Clone, Deserialize)]
pub struct WalletFile {
    #[serde(rename = "PublicKey", default)]
    pub public_key: String,
    #[serde(rename = "PrivateKey", default)]
    pub private_key: String,
}

impl fmt::Debug for WalletFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletFile")
            .field("public_key", &self.public_key)
            .field("private_key", &Redacted(&self.private_key))
            .finish()
    }
}

/// A wallet file that decoded into a usable account
#[derive(Debug, Clone)]
pub struct LoadedWallet {
    pub path: PathBuf,
    pub account: Account,
}

fn wallet_error(path: &Path, reason: impl Into<String>) -> Error {
    Error::Wallet {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Read and parse one wallet file without deriving the account.
pub fn load_wallet(path: impl AsRef<Path>) -> Result<WalletFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| wallet_error(path, e.to_string()))?;
    serde_json::from_str(&contents)
        .map_err(|e| wallet_error(path, format!("malformed JSON: {}", e)))
}

impl WalletFile {
    /// Derive the account, checking it against `PublicKey` when one is given.
    pub fn into_account(self, path: &Path) -> Result<Account> {
        if self.private_key.trim().is_empty() {
            return Err(wallet_error(path, "PrivateKey is empty"));
        }

        let account = Account::from_private_key(&self.private_key)
            .map_err(|e| wallet_error(path, e.to_string()))?;

        if !self.public_key.trim().is_empty() {
            let declared = parse_address(&self.public_key)
                .map_err(|e| wallet_error(path, format!("PublicKey: {}", e)))?;
            if declared != account.address() {
                return Err(wallet_error(
                    path,
                    format!(
                        "PublicKey {} does not match derived address {}",
                        declared,
                        account.address()
                    ),
                ));
            }
        }

        Ok(account)
    }
}

/// Load every `*.json` wallet in `dir`, ordered by file name.
pub fn load_wallets(dir: impl AsRef<Path>) -> Result<Vec<LoadedWallet>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|e| wallet_error(dir, e.to_string()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| wallet_error(dir, e.to_string()))?;
        let path = entry.path();
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if path.is_file() && is_json {
            paths.push(path);
        }
    }
    paths.sort();

    let mut wallets = Vec::with_capacity(paths.len());
    for path in paths {
        let account = load_wallet(&path)?.into_account(&path)?;
        debug!(path = %path.display(), address = %account.address(), "Loaded wallet");
        wallets.push(LoadedWallet { path, account });
    }

    Ok(wallets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_file_debug_redacts() {
        let wallet: WalletFile = serde_json::from_str(
            r#"{"PublicKey":"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266","PrivateKey":"ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80"}"#,
        )
        .unwrap();
        let debug = format!("{:?}", wallet);
        assert!(debug.contains("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"));
        assert!(!debug.contains("ac0974bec"));
        assert!(debug.contains("private_key: <redacted>"));
    }

    #[test]
    fn test_into_account_checks_public_key() {
        let path = Path::new("w.json");
        let wallet = WalletFile {
            public_key: "0x70997970C51812dc3A010C7d01b50e0d17dc79C8".into(),
            private_key: "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".into(),
        };
        let err = wallet.into_account(path).unwrap_err();
        assert!(matches!(err, Error::Wallet { .. }));
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_empty_private_key_rejected() {
        let wallet = WalletFile {
            public_key: String::new(),
            private_key: "  ".into(),
        };
        assert!(matches!(
            wallet.into_account(Path::new("empty.json")),
            Err(Error::Wallet { .. })
        ));
    }
}
