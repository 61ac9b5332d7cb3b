use crate::{Account, ContractArtifact, ContractDeployer, DeployedContract, TxError};
use alloy::{
    primitives::{Address, U256},
    sol,
};

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract SimpleStorage {
        function set(uint256 x) public;
        function get() public view returns (uint256);
    }
}

use SimpleStorage::SimpleStorageInstance;

/// Functions the storage artifact must expose.
pub const STORAGE_FUNCTIONS: &[&str] = &["set", "get"];

/// Value the storage contract's constructor writes.
pub const INITIAL_STORED_VALUE: u64 = 100;

/// Deploys throwaway `SimpleStorage` instances.
#[derive(Clone)]
pub struct StorageManager {
    deployer: ContractDeployer,
    artifact: ContractArtifact,
}

impl StorageManager {
    pub fn new(deployer: ContractDeployer, artifact: ContractArtifact) -> Self {
        Self { deployer, artifact }
    }

    pub async fn deploy(&self, account: &Account) -> Result<DeployedContract, TxError> {
        self.deployer.deploy(account, &self.artifact, &[]).await
    }

    /// Read the value held by a deployed instance.
    pub async fn stored_value(&self, address: Address) -> Result<U256, TxError> {
        let instance = SimpleStorageInstance::new(address, self.deployer.client().provider().clone());
        instance
            .get()
            .call()
            .await
            .map_err(|e| TxError::from_contract("get", e))
    }
}
