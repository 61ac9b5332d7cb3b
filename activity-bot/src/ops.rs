use crate::runner::ActivityOps;
use crate::tasks::{Task, TaskContext, TaskOutcome};
use activity_clients::{
    Account, BatchOutcome, ChainClient, ContractArtifact, ContractDeployer, NftManager,
    StorageManager, TokenManager, TransactionSubmitter, TxError, nft::NFT_FUNCTIONS,
    random_address, storage::{INITIAL_STORED_VALUE, STORAGE_FUNCTIONS}, token::TOKEN_FUNCTIONS,
};
use alloy::primitives::{Address, U256};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use rand::{SeedableRng, rngs::StdRng};
use std::path::Path;
use tracing::{info, warn};

pub const STORAGE_CONTRACT: &str = "SimpleStorage";
pub const TOKEN_CONTRACT: &str = "DezToken";
pub const NFT_CONTRACT: &str = "DezNFT";

/// Compiled contracts the bot deploys.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub storage: ContractArtifact,
    pub token: ContractArtifact,
    pub nft: ContractArtifact,
}

impl Artifacts {
    pub fn load<P: AsRef<Path>>(out_dir: P) -> Result<Self> {
        let out_dir = out_dir.as_ref();
        let load = |name: &str, functions: &[&str]| -> Result<ContractArtifact> {
            let artifact = ContractArtifact::from_out_dir(out_dir, name)?;
            artifact.require_functions(functions)?;
            Ok(artifact)
        };

        Ok(Self {
            storage: load(STORAGE_CONTRACT, STORAGE_FUNCTIONS)?,
            token: load(TOKEN_CONTRACT, TOKEN_FUNCTIONS)?,
            nft: load(NFT_CONTRACT, NFT_FUNCTIONS)?,
        })
    }
}

/// Metadata URIs handed to mints in turn. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriCycle {
    uris: Vec<String>,
}

impl UriCycle {
    pub fn new(uris: Vec<String>) -> Result<Self> {
        if uris.is_empty() {
            bail!("At least one NFT URI is required");
        }
        Ok(Self { uris })
    }

    /// URI for the n-th mint of a pass.
    pub fn pick(&self, occurrence: usize) -> &str {
        &self.uris[occurrence % self.uris.len()]
    }
}

/// Amounts and inputs for the scripted tasks.
#[derive(Debug, Clone)]
pub struct ActivitySettings {
    /// Wei sent by `send-native`.
    pub native_amount: U256,
    pub native_symbol: String,
    pub initial_supply: u64,
    pub token_transfer: u64,
    pub token_burn: u64,
    pub token_mint: u64,
    pub nft_uris: UriCycle,
    pub nft_batch: usize,
}

/// Runs tasks against the live chain.
pub struct ChainActivity {
    client: ChainClient,
    submitter: TransactionSubmitter,
    storage: StorageManager,
    token: TokenManager,
    nft: NftManager,
    settings: ActivitySettings,
    rng: StdRng,
}

impl ChainActivity {
    /// Deploy the token and the NFT collection from `owner`.
    pub async fn setup(
        client: ChainClient,
        artifacts: Artifacts,
        owner: &Account,
        tracked: Vec<Address>,
        settings: ActivitySettings,
    ) -> Result<Self> {
        let deployer = ContractDeployer::new(client.clone());

        let token = TokenManager::deploy(&deployer, owner, &artifacts.token, settings.initial_supply)
            .await
            .context("Failed to deploy token contract")?;
        info!(
            address = %token.address(),
            decimals = token.decimals(),
            initial_supply = settings.initial_supply,
            "✅ Token ready"
        );

        let nft = NftManager::deploy(&deployer, owner, &artifacts.nft, tracked)
            .await
            .context("Failed to deploy NFT contract")?;
        info!(address = %nft.address(), "✅ NFT collection ready");

        Ok(Self {
            submitter: TransactionSubmitter::new(client.clone()),
            storage: StorageManager::new(deployer, artifacts.storage),
            client,
            token,
            nft,
            settings,
            rng: StdRng::from_os_rng(),
        })
    }

    async fn send_native(&self, account: &Account) -> Result<TaskOutcome, TxError> {
        let from = account.address();
        let to = random_address();
        let symbol = &self.settings.native_symbol;

        let before = self.client.balance(from).await?;
        info!(address = %from, balance = %format_native(before), symbol = %symbol, "Balance before send");

        let receipt = self
            .submitter
            .send_native(account, to, self.settings.native_amount)
            .await?;
        info!(
            from = %from,
            to = %to,
            amount = %format_native(self.settings.native_amount),
            symbol = %symbol,
            tx_hash = ?receipt.transaction_hash,
            "💸 Native currency sent"
        );

        match self.client.balance(from).await {
            Ok(after) => {
                info!(address = %from, balance = %format_native(after), symbol = %symbol, "Balance after send")
            }
            Err(e) => warn!(address = %from, error = %e, "Could not read balance after send"),
        }

        Ok(TaskOutcome::Sent {
            tx_hash: receipt.transaction_hash,
        })
    }

    async fn deploy_storage(&self, account: &Account) -> Result<TaskOutcome, TxError> {
        let contract = self.storage.deploy(account).await?;

        match self.storage.stored_value(contract.address).await {
            Ok(value) if value == U256::from(INITIAL_STORED_VALUE) => {}
            Ok(value) => warn!(
                address = %contract.address,
                value = %value,
                expected = INITIAL_STORED_VALUE,
                "Storage contract holds an unexpected value"
            ),
            Err(e) => warn!(address = %contract.address, error = %e, "Could not read storage contract"),
        }

        Ok(TaskOutcome::Deployed {
            address: contract.address,
        })
    }
}

#[async_trait]
impl ActivityOps for ChainActivity {
    async fn native_balance(&self, account: &Account) -> Result<U256, TxError> {
        self.client.balance(account.address()).await
    }

    async fn execute(
        &mut self,
        account: &Account,
        task: Task,
        ctx: &TaskContext,
    ) -> Result<TaskOutcome, TxError> {
        match task {
            Task::SendNative => self.send_native(account).await,
            Task::DeployStorage => self.deploy_storage(account).await,
            Task::TransferToken => {
                let tx_hash = self
                    .token
                    .transfer(account, ctx.receiver, self.settings.token_transfer)
                    .await?;
                Ok(TaskOutcome::Sent { tx_hash })
            }
            Task::BurnToken => {
                let tx_hash = self.token.burn(account, self.settings.token_burn).await?;
                Ok(TaskOutcome::Sent { tx_hash })
            }
            Task::MintToken => {
                let tx_hash = self
                    .token
                    .mint(account, account.address(), self.settings.token_mint)
                    .await?;
                match self.token.total_supply().await {
                    Ok(supply) => info!(total_supply = %supply, "DEZ supply after mint"),
                    Err(e) => warn!(error = %e, "Could not read DEZ total supply"),
                }
                Ok(TaskOutcome::Sent { tx_hash })
            }
            Task::MintNft => {
                let uri = self.settings.nft_uris.pick(ctx.occurrence).to_string();
                let token_id = self.nft.mint(account, &uri).await?;
                info!(
                    owner = %account.address(),
                    owned = self.nft.index().count(account.address()),
                    "NFTs held after mint"
                );
                Ok(TaskOutcome::Minted { token_id })
            }
            Task::TransferNft => {
                let outcome = self
                    .nft
                    .transfer_owned(account, ctx.receiver, self.settings.nft_batch, &mut self.rng)
                    .await;
                batch_result(outcome)
            }
            Task::BurnNft => {
                let outcome = self
                    .nft
                    .burn_owned(account, self.settings.nft_batch, &mut self.rng)
                    .await;
                batch_result(outcome)
            }
        }
    }

    async fn reconcile(&mut self, account: &Account) -> Result<usize, TxError> {
        self.nft.reconcile(account.address()).await
    }
}

/// Nothing to send is a skip. A batch where every transaction failed is the
/// first failure.
pub fn batch_result(outcome: BatchOutcome) -> Result<TaskOutcome, TxError> {
    if outcome.is_empty() {
        return Ok(TaskOutcome::Skipped {
            reason: "no tracked NFTs owned",
        });
    }
    let succeeded = outcome.succeeded.len();
    let failed = outcome.failed.len();
    if succeeded == 0 {
        if let Some((_, first)) = outcome.failed.into_iter().next() {
            return Err(first);
        }
    }
    Ok(TaskOutcome::Batch { succeeded, failed })
}

fn format_native(wei: U256) -> String {
    alloy::primitives::utils::format_ether(wei)
}
