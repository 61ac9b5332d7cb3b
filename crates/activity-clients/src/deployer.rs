use crate::{Account, ChainClient, ContractArtifact, TransactionSubmitter, TxError, TxPayload};
use alloy::{json_abi::JsonAbi, primitives::Address};
use tracing::info;

/// A contract instance on chain together with its interface.
#[derive(Debug, Clone)]
pub struct DeployedContract {
    pub name: String,
    pub address: Address,
    pub abi: JsonAbi,
}

/// Deploys artifacts with the fixed deployment gas limit.
#[derive(Clone)]
pub struct ContractDeployer {
    submitter: TransactionSubmitter,
    gas_limit: u64,
}

impl ContractDeployer {
    pub fn new(client: ChainClient) -> Self {
        let gas_limit = client.config().gas.deploy;
        Self {
            submitter: TransactionSubmitter::new(client),
            gas_limit,
        }
    }

    pub fn client(&self) -> &ChainClient {
        self.submitter.client()
    }

    /// Deploy `artifact` from `account`, blocking until the receipt arrives.
    ///
    /// `constructor_args` must already be ABI-encoded (empty when the
    /// constructor takes none).
    pub async fn deploy(
        &self,
        account: &Account,
        artifact: &ContractArtifact,
        constructor_args: &[u8],
    ) -> Result<DeployedContract, TxError> {
        let method = format!("deploy {}", artifact.name);
        info!(contract = %artifact.name, deployer = %account.address(), "📝 Deploying contract");

        let code = artifact.creation_code(constructor_args);
        let receipt = self
            .submitter
            .invoke(account, &method, TxPayload::create(code), self.gas_limit)
            .await?;

        let address = receipt.contract_address.ok_or_else(|| {
            TxError::InvalidResponse(format!(
                "{method}: receipt {:?} has no contract address",
                receipt.transaction_hash
            ))
        })?;

        info!(
            contract = %artifact.name,
            address = %address,
            tx_hash = ?receipt.transaction_hash,
            "✨ Contract deployed"
        );

        Ok(DeployedContract {
            name: artifact.name.clone(),
            address,
            abi: artifact.abi.clone(),
        })
    }
}
