use std::time::Duration;

pub mod account;
pub mod artifact;
pub mod chain_client;
pub mod common;
pub mod deployer;
pub mod nft;
pub mod ownership;
pub mod storage;
pub mod token;

// ============================================================================
// Client Type Re-exports
// ============================================================================

pub use account::{Account, random_address};
pub use artifact::ContractArtifact;
pub use chain_client::ChainClient;
pub use common::errors::TxError;
pub use common::tx_submitter::{TransactionSubmitter, TxPayload};
pub use deployer::{ContractDeployer, DeployedContract};
pub use nft::{BatchOutcome, NftManager};
pub use ownership::OwnershipIndex;
pub use storage::StorageManager;
pub use token::TokenManager;

// ============================================================================
// Client Configuration
// ============================================================================

/// Fixed gas limits. Gas is never estimated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasLimits {
    pub deploy: u64,
    pub call: u64,
    pub native_transfer: u64,
}

impl Default for GasLimits {
    fn default() -> Self {
        Self {
            deploy: 2_000_000,
            call: 200_000,
            native_transfer: 21_000,
        }
    }
}

/// Configuration for connecting to the chain
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// `None` waits for receipts indefinitely.
    pub receipt_timeout: Option<Duration>,
    pub gas: GasLimits,
}

impl ClientConfig {
    /// Create a new configuration with default gas limits and a 2 minute receipt timeout
    ///
    /// # Arguments
    /// * `rpc_url` - RPC endpoint (HTTP or WebSocket)
    /// * `chain_id` - Chain id used for EIP-155 signing
    pub fn new(rpc_url: String, chain_id: u64) -> Self {
        Self {
            rpc_url,
            chain_id,
            receipt_timeout: Some(Duration::from_secs(120)),
            gas: GasLimits::default(),
        }
    }

    pub fn with_receipt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn with_gas_limits(mut self, gas: GasLimits) -> Self {
        self.gas = gas;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
