use crate::{
    Account, ChainClient, ContractArtifact, ContractDeployer, DeployedContract,
    TransactionSubmitter, TxError, TxPayload,
};
use alloy::{
    primitives::{Address, B256, U256},
    providers::DynProvider,
    sol,
    sol_types::{SolCall, SolValue},
};
use tracing::info;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract DezToken {
        event Transfer(address indexed from, address indexed to, uint256 value);
        event Mint(address indexed to, uint256 value);
        event Burn(address indexed from, uint256 value);

        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);

        function transfer(address recipient, uint256 amount) external returns (bool);
        function burn(uint256 amount) external returns (bool);
        function mint(address to, uint256 amount) external returns (bool);
    }
}

use DezToken::DezTokenInstance;

/// Functions the token artifact must expose.
pub const TOKEN_FUNCTIONS: &[&str] = &["decimals", "balanceOf", "transfer", "burn", "mint"];

/// Fungible token operations against the single deployed token contract.
///
/// Amounts are whole tokens; they are scaled by the contract's decimals.
/// Transfers and burns check the sender's balance first and never broadcast
/// a call the contract would reject for lack of funds.
#[derive(Clone)]
pub struct TokenManager {
    contract: DeployedContract,
    instance: DezTokenInstance<DynProvider>,
    submitter: TransactionSubmitter,
    gas_limit: u64,
    decimals: u8,
}

impl TokenManager {
    /// Deploy a new token minting `initial_supply` whole tokens to `account`.
    pub async fn deploy(
        deployer: &ContractDeployer,
        account: &Account,
        artifact: &ContractArtifact,
        initial_supply: u64,
    ) -> Result<Self, TxError> {
        let args = U256::from(initial_supply).abi_encode();
        let contract = deployer.deploy(account, artifact, &args).await?;
        Self::attach(deployer.client().clone(), contract).await
    }

    /// Wrap an already deployed token.
    pub async fn attach(client: ChainClient, contract: DeployedContract) -> Result<Self, TxError> {
        let instance = DezTokenInstance::new(contract.address, client.provider().clone());
        let decimals = instance
            .decimals()
            .call()
            .await
            .map_err(|e| TxError::from_contract("decimals", e))?;
        let gas_limit = client.config().gas.call;

        Ok(Self {
            contract,
            instance,
            submitter: TransactionSubmitter::new(client),
            gas_limit,
            decimals,
        })
    }

    pub fn address(&self) -> Address {
        self.contract.address
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn to_base_units(&self, amount: u64) -> U256 {
        scale_units(amount, self.decimals)
    }

    // ------------------------------------------------------------------------
    // View Functions
    // ------------------------------------------------------------------------

    pub async fn balance_of(&self, account: Address) -> Result<U256, TxError> {
        self.instance
            .balanceOf(account)
            .call()
            .await
            .map_err(|e| TxError::from_contract("balanceOf", e))
    }

    pub async fn total_supply(&self) -> Result<U256, TxError> {
        self.instance
            .totalSupply()
            .call()
            .await
            .map_err(|e| TxError::from_contract("totalSupply", e))
    }

    // ------------------------------------------------------------------------
    // Transaction Functions
    // ------------------------------------------------------------------------

    /// Send `amount` whole tokens from `from` to `to`.
    pub async fn transfer(&self, from: &Account, to: Address, amount: u64) -> Result<B256, TxError> {
        let value = self.to_base_units(amount);
        self.ensure_balance("transfer", from.address(), value).await?;

        let input = DezToken::transferCall {
            recipient: to,
            amount: value,
        }
        .abi_encode();
        let tx_hash = self.submit(from, "transfer", input).await?;

        info!(from = %from.address(), to = %to, amount, tx_hash = ?tx_hash, "✨ DEZ sent");
        Ok(tx_hash)
    }

    /// Burn `amount` whole tokens held by `from`.
    pub async fn burn(&self, from: &Account, amount: u64) -> Result<B256, TxError> {
        let value = self.to_base_units(amount);
        self.ensure_balance("burn", from.address(), value).await?;

        let input = DezToken::burnCall { amount: value }.abi_encode();
        let tx_hash = self.submit(from, "burn", input).await?;

        info!(from = %from.address(), amount, tx_hash = ?tx_hash, "🔥 DEZ burned");
        Ok(tx_hash)
    }

    /// Mint `amount` whole tokens to `to`, signed by `from`.
    pub async fn mint(&self, from: &Account, to: Address, amount: u64) -> Result<B256, TxError> {
        let value = self.to_base_units(amount);
        let input = DezToken::mintCall { to, amount: value }.abi_encode();
        let tx_hash = self.submit(from, "mint", input).await?;

        info!(to = %to, amount, tx_hash = ?tx_hash, "✨ DEZ minted");
        Ok(tx_hash)
    }

    async fn ensure_balance(&self, method: &str, owner: Address, required: U256) -> Result<(), TxError> {
        let balance = self.balance_of(owner).await?;
        check_sufficient(method, balance, required)
    }

    async fn submit(&self, from: &Account, method: &str, input: Vec<u8>) -> Result<B256, TxError> {
        let payload = TxPayload::call(self.address(), input.into());
        let receipt = self
            .submitter
            .invoke(from, method, payload, self.gas_limit)
            .await?;
        Ok(receipt.transaction_hash)
    }
}

/// `amount * 10^decimals`, saturating at `U256::MAX`.
pub fn scale_units(amount: u64, decimals: u8) -> U256 {
    U256::from(amount).saturating_mul(U256::from(10u64).pow(U256::from(decimals)))
}

/// Reject a spend of `required` base units from a `balance`.
pub fn check_sufficient(method: &str, balance: U256, required: U256) -> Result<(), TxError> {
    if balance < required {
        return Err(TxError::InsufficientFunds(format!(
            "{method}: token balance {balance} is below {required}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_units() {
        assert_eq!(scale_units(1, 0), U256::from(1));
        assert_eq!(scale_units(100, 2), U256::from(10_000));
        assert_eq!(
            scale_units(1, 18),
            U256::from(1_000_000_000_000_000_000u128)
        );
        assert_eq!(scale_units(0, 18), U256::ZERO);
    }

    #[test]
    fn test_supply_scenario() {
        // deploy 1000, mint 500 to self, burn 10
        let balance = scale_units(1000, 18) + scale_units(500, 18) - scale_units(10, 18);
        assert_eq!(balance, scale_units(1490, 18));
    }

    #[test]
    fn test_check_sufficient() {
        assert!(check_sufficient("transfer", U256::from(100), U256::from(100)).is_ok());
        assert!(check_sufficient("transfer", U256::from(101), U256::from(100)).is_ok());

        let err = check_sufficient("burn", U256::from(99), U256::from(100)).unwrap_err();
        assert!(matches!(err, TxError::InsufficientFunds(_)));
        assert!(err.to_string().contains("burn"));
    }

    #[test]
    fn test_transfer_calldata() {
        let call = DezToken::transferCall {
            recipient: Address::repeat_byte(0x11),
            amount: scale_units(100, 18),
        };
        let encoded = call.abi_encode();

        assert_eq!(&encoded[..4], DezToken::transferCall::SELECTOR.as_slice());
        assert_eq!(encoded.len(), 4 + 32 * 2);
        let decoded = DezToken::transferCall::abi_decode(&encoded).unwrap();
        assert_eq!(decoded.recipient, Address::repeat_byte(0x11));
        assert_eq!(decoded.amount, scale_units(100, 18));
    }

    #[test]
    fn test_constructor_args_are_one_word() {
        let args = U256::from(1_000_000u64).abi_encode();
        assert_eq!(args.len(), 32);
        assert_eq!(U256::from_be_slice(&args), U256::from(1_000_000u64));
    }
}
