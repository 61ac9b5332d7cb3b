use alloy::{network::EthereumWallet, primitives::Address, signers::local::PrivateKeySigner};
use anyhow::{Context, Result, bail};
use std::fmt;

/// A funded account the bot signs with.
///
/// The private key never leaves the signer; `Debug` prints the address only.
#[derive(Clone)]
pub struct Account {
    signer: PrivateKeySigner,
}

impl Account {
    /// Load an account from a private key string (with or without 0x prefix)
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let key = private_key.trim().trim_start_matches("0x");
        let signer = key
            .parse::<PrivateKeySigner>()
            .context("Failed to parse private key")?;
        Ok(Self { signer })
    }

    /// Load an account and check the key belongs to the configured address.
    pub fn with_expected_address(private_key: &str, expected: Address) -> Result<Self> {
        let account = Self::from_private_key(private_key)?;
        if account.address() != expected {
            bail!(
                "Private key belongs to {} but the configured address is {expected}",
                account.address()
            );
        }
        Ok(account)
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Generate a fresh address nobody holds funds on. The key is discarded.
pub fn random_address() -> Address {
    PrivateKeySigner::random().address()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const ADDRESS: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    #[test]
    fn test_load_account() {
        let account = Account::from_private_key(KEY).unwrap();
        assert_eq!(account.address(), ADDRESS.parse::<Address>().unwrap());
    }

    #[test]
    fn test_load_account_without_prefix() {
        let account = Account::from_private_key(KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(account.address(), ADDRESS.parse::<Address>().unwrap());
    }

    #[test]
    fn test_expected_address_mismatch() {
        let other = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC"
            .parse::<Address>()
            .unwrap();
        assert!(Account::with_expected_address(KEY, other).is_err());
        assert!(Account::with_expected_address(KEY, ADDRESS.parse().unwrap()).is_ok());
    }

    #[test]
    fn test_invalid_key() {
        assert!(Account::from_private_key("0xnot-a-key").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let account = Account::from_private_key(KEY).unwrap();
        let printed = format!("{account:?}");
        assert!(!printed.contains(KEY.trim_start_matches("0x")));
        assert!(printed.contains("address"));
    }

    #[test]
    fn test_random_addresses_differ() {
        assert_ne!(random_address(), random_address());
    }
}
