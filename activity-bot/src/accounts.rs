use activity_clients::Account;
use alloy::primitives::Address;
use anyhow::{Context, Result, bail};
use env_file::EnvFile;
use tracing::info;

/// Load `ACCOUNT_ADDRESS_<n>` / `PRIVATE_KEY_<n>` pairs, n = 1, 2, ... up to the
/// first missing pair. Process env wins over the env file.
pub fn load_accounts(env_file: &EnvFile) -> Result<Vec<Account>> {
    load_accounts_with(|key| env_file.lookup(key))
}

pub fn load_accounts_with<F>(lookup: F) -> Result<Vec<Account>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut accounts = Vec::new();

    for n in 1.. {
        let (address, key) = match (
            lookup(&format!("ACCOUNT_ADDRESS_{n}")),
            lookup(&format!("PRIVATE_KEY_{n}")),
        ) {
            (Some(address), Some(key)) => (address, key),
            (None, None) => break,
            (Some(_), None) => bail!("ACCOUNT_ADDRESS_{n} is set but PRIVATE_KEY_{n} is missing"),
            (None, Some(_)) => bail!("PRIVATE_KEY_{n} is set but ACCOUNT_ADDRESS_{n} is missing"),
        };

        let expected = address
            .trim()
            .parse::<Address>()
            .with_context(|| format!("Invalid ACCOUNT_ADDRESS_{n}: {address}"))?;
        let account = Account::with_expected_address(&key, expected)
            .with_context(|| format!("Invalid account #{n}"))?;
        accounts.push(account);
    }

    if accounts.is_empty() {
        bail!("No accounts configured (set ACCOUNT_ADDRESS_1 and PRIVATE_KEY_1)");
    }

    info!(count = accounts.len(), "Accounts loaded");
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const KEY_1: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
    const ADDRESS_1: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
    const KEY_2: &str = "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";
    const ADDRESS_2: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_loads_until_first_gap() {
        let accounts = load_accounts_with(lookup(&[
            ("ACCOUNT_ADDRESS_1", ADDRESS_1),
            ("PRIVATE_KEY_1", KEY_1),
            ("ACCOUNT_ADDRESS_2", ADDRESS_2),
            ("PRIVATE_KEY_2", KEY_2),
            ("ACCOUNT_ADDRESS_4", ADDRESS_1),
            ("PRIVATE_KEY_4", KEY_1),
        ]))
        .unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].address(), ADDRESS_1.parse::<Address>().unwrap());
        assert_eq!(accounts[1].address(), ADDRESS_2.parse::<Address>().unwrap());
    }

    #[test]
    fn test_no_accounts_is_error() {
        let err = load_accounts_with(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("No accounts configured"));
    }

    #[test]
    fn test_address_mismatch_is_error() {
        let result = load_accounts_with(lookup(&[
            ("ACCOUNT_ADDRESS_1", ADDRESS_2),
            ("PRIVATE_KEY_1", KEY_1),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_half_configured_pair_is_error() {
        let result = load_accounts_with(lookup(&[("ACCOUNT_ADDRESS_1", ADDRESS_1)]));
        assert!(result.unwrap_err().to_string().contains("PRIVATE_KEY_1"));
    }

    #[test]
    fn test_reads_env_file() {
        let path = std::env::temp_dir().join(format!("activity_accounts_{}.env", std::process::id()));
        std::fs::write(
            &path,
            format!("ACCOUNT_ADDRESS_1={ADDRESS_1}\nPRIVATE_KEY_1=\"{KEY_1}\"\n"),
        )
        .unwrap();

        let accounts = load_accounts(&EnvFile::load(&path).unwrap()).unwrap();
        assert_eq!(accounts.len(), 1);

        std::fs::remove_file(path).unwrap();
    }
}
