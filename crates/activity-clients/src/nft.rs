use crate::{
    Account, ChainClient, ContractArtifact, ContractDeployer, DeployedContract, OwnershipIndex,
    TransactionSubmitter, TxError, TxPayload,
};
use alloy::{
    primitives::{Address, U256},
    providers::DynProvider,
    rpc::types::Log,
    sol,
    sol_types::SolCall,
};
use rand::Rng;
use tracing::{info, warn};

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    contract DezNFT {
        event Transfer(address indexed from, address indexed to, uint256 tokenId);
        event Mint(address indexed to, uint256 tokenId);
        event Burn(uint256 tokenId);

        function name() external view returns (string);
        function symbol() external view returns (string);
        function ownerOf(uint256 tokenId) external view returns (address);

        function mint(address to, string memory uri) external returns (uint256);
        function burn(uint256 tokenId) external;
        function transfer(address to, uint256 tokenId) external;
    }
}

use DezNFT::DezNFTInstance;

/// Functions the NFT artifact must expose.
pub const NFT_FUNCTIONS: &[&str] = &["mint", "burn", "transfer", "ownerOf"];

/// Result of submitting a batch of per-token transactions one by one.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<U256>,
    pub failed: Vec<(U256, TxError)>,
}

impl BatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }
}

/// NFT operations plus the client-side ownership index.
///
/// The index is only updated after a receipt confirms the change.
pub struct NftManager {
    contract: DeployedContract,
    instance: DezNFTInstance<DynProvider>,
    submitter: TransactionSubmitter,
    gas_limit: u64,
    index: OwnershipIndex,
}

impl NftManager {
    /// Deploy a new collection. Only `tracked` owners are kept in the index.
    pub async fn deploy(
        deployer: &ContractDeployer,
        account: &Account,
        artifact: &ContractArtifact,
        tracked: impl IntoIterator<Item = Address>,
    ) -> Result<Self, TxError> {
        let contract = deployer.deploy(account, artifact, &[]).await?;
        Ok(Self::attach(deployer.client().clone(), contract, tracked))
    }

    /// Wrap an already deployed collection with an empty index.
    pub fn attach(
        client: ChainClient,
        contract: DeployedContract,
        tracked: impl IntoIterator<Item = Address>,
    ) -> Self {
        let instance = DezNFTInstance::new(contract.address, client.provider().clone());
        let gas_limit = client.config().gas.call;
        Self {
            contract,
            instance,
            submitter: TransactionSubmitter::new(client),
            gas_limit,
            index: OwnershipIndex::new(tracked),
        }
    }

    pub fn address(&self) -> Address {
        self.contract.address
    }

    pub fn index(&self) -> &OwnershipIndex {
        &self.index
    }

    pub async fn owner_of(&self, token_id: U256) -> Result<Address, TxError> {
        self.instance
            .ownerOf(token_id)
            .call()
            .await
            .map_err(|e| TxError::from_contract("ownerOf", e))
    }

    /// Mint to `account` and record the id emitted in the `Mint` event.
    pub async fn mint(&mut self, account: &Account, uri: &str) -> Result<U256, TxError> {
        let owner = account.address();
        let input = DezNFT::mintCall {
            to: owner,
            uri: uri.to_string(),
        }
        .abi_encode();
        let receipt = self.submit(account, "mint", input).await?;

        let token_id = minted_token_id(receipt.inner.logs(), self.address(), owner).ok_or_else(
            || {
                TxError::InvalidResponse(format!(
                    "mint: no Mint event in receipt {:?}",
                    receipt.transaction_hash
                ))
            },
        )?;
        self.index.record_mint(owner, token_id);

        info!(owner = %owner, token_id = %token_id, uri = %uri, "🎨 NFT minted");
        Ok(token_id)
    }

    /// Transfer a random sample of at most `max` tokens owned by `account`.
    /// Nothing is submitted when the account holds no tracked tokens.
    pub async fn transfer_owned<R: Rng + ?Sized>(
        &mut self,
        account: &Account,
        to: Address,
        max: usize,
        rng: &mut R,
    ) -> BatchOutcome {
        let token_ids = self.index.sample(account.address(), max, rng);
        self.transfer_tokens(account, to, token_ids).await
    }

    /// Burn a random sample of at most `max` tokens owned by `account`.
    pub async fn burn_owned<R: Rng + ?Sized>(
        &mut self,
        account: &Account,
        max: usize,
        rng: &mut R,
    ) -> BatchOutcome {
        let token_ids = self.index.sample(account.address(), max, rng);
        self.burn_tokens(account, token_ids).await
    }

    /// Transfer each of `token_ids` from `account` to `to`, one transaction each.
    pub async fn transfer_tokens(
        &mut self,
        account: &Account,
        to: Address,
        token_ids: Vec<U256>,
    ) -> BatchOutcome {
        let from = account.address();
        let mut outcome = BatchOutcome::default();

        for token_id in token_ids {
            let input = DezNFT::transferCall {
                to,
                tokenId: token_id,
            }
            .abi_encode();
            match self.submit(account, "transfer", input).await {
                Ok(_) => {
                    self.index.record_transfer(from, to, token_id);
                    info!(from = %from, to = %to, token_id = %token_id, "🎨 NFT sent");
                    outcome.succeeded.push(token_id);
                }
                Err(e) => {
                    warn!(from = %from, token_id = %token_id, error = %e, "NFT transfer failed");
                    outcome.failed.push((token_id, e));
                }
            }
        }

        outcome
    }

    /// Burn each of `token_ids` held by `account`, one transaction each.
    pub async fn burn_tokens(&mut self, account: &Account, token_ids: Vec<U256>) -> BatchOutcome {
        let owner = account.address();
        let mut outcome = BatchOutcome::default();

        for token_id in token_ids {
            let input = DezNFT::burnCall { tokenId: token_id }.abi_encode();
            match self.submit(account, "burn", input).await {
                Ok(_) => {
                    self.index.record_burn(owner, token_id);
                    info!(owner = %owner, token_id = %token_id, "🔥 NFT burned");
                    outcome.succeeded.push(token_id);
                }
                Err(e) => {
                    warn!(owner = %owner, token_id = %token_id, error = %e, "NFT burn failed");
                    outcome.failed.push((token_id, e));
                }
            }
        }

        outcome
    }

    /// Re-read `ownerOf` for every token recorded under `owner` and drop the
    /// ones it no longer holds. Burned tokens report the zero address.
    ///
    /// Returns how many entries were corrected.
    pub async fn reconcile(&mut self, owner: Address) -> Result<usize, TxError> {
        let mut corrected = 0;
        for token_id in self.index.owned_by(owner) {
            let on_chain = self.owner_of(token_id).await?;
            if on_chain == owner {
                continue;
            }
            warn!(
                token_id = %token_id,
                recorded = %owner,
                on_chain = %on_chain,
                "NFT ownership drifted from chain, correcting"
            );
            self.index.forget(token_id);
            if on_chain != Address::ZERO {
                self.index.record_mint(on_chain, token_id);
            }
            corrected += 1;
        }
        Ok(corrected)
    }

    async fn submit(
        &self,
        account: &Account,
        method: &str,
        input: Vec<u8>,
    ) -> Result<alloy::rpc::types::TransactionReceipt, TxError> {
        let payload = TxPayload::call(self.address(), input.into());
        self.submitter
            .invoke(account, method, payload, self.gas_limit)
            .await
    }
}

/// Find the token id minted to `to` by `contract` among receipt logs.
pub fn minted_token_id(logs: &[Log], contract: Address, to: Address) -> Option<U256> {
    logs.iter()
        .filter(|log| log.address() == contract)
        .filter_map(|log| log.log_decode::<DezNFT::Mint>().ok())
        .find(|mint| mint.inner.data.to == to)
        .map(|mint| mint.inner.data.tokenId)
}
