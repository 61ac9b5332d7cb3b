use crate::{ClientConfig, TxError};
use alloy::{
    network::Ethereum,
    primitives::{Address, B256, Bytes, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
};
use anyhow::Context;
use tracing::{error, info, warn};

/// Thin adapter over the JSON-RPC connection.
///
/// Holds no signing state: transactions are built and signed per account by
/// [`crate::TransactionSubmitter`] and handed over as raw bytes. Nonces are
/// queried fresh for every transaction, so two concurrent senders on the same
/// account would collide.
#[derive(Clone)]
pub struct ChainClient {
    provider: DynProvider,
    config: ClientConfig,
}

impl ChainClient {
    /// Connect to the configured endpoint (`http(s)://` or `ws(s)://`).
    pub async fn connect(config: ClientConfig) -> anyhow::Result<Self> {
        let provider: DynProvider = ProviderBuilder::new()
            .connect(&config.rpc_url)
            .await
            .with_context(|| format!("Failed to connect to RPC endpoint {}", config.rpc_url))?
            .erased();

        Ok(Self { provider, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// Check the node answers, log the current block and warn when the node
    /// serves a different chain than the one we sign for.
    pub async fn is_connected(&self) -> bool {
        let chain_id = match self.provider.get_chain_id().await {
            Ok(id) => id,
            Err(e) => {
                error!(rpc_url = %self.config.rpc_url, error = %e, "❌ Connection error");
                return false;
            }
        };

        if chain_id != self.config.chain_id {
            warn!(
                node_chain_id = chain_id,
                configured_chain_id = self.config.chain_id,
                "Node reports a different chain id, transactions will be rejected"
            );
        }

        match self.block_number().await {
            Ok(block) => {
                info!(rpc_url = %self.config.rpc_url, chain_id, block, "🌐 Connected");
                true
            }
            Err(e) => {
                error!(rpc_url = %self.config.rpc_url, error = %e, "❌ Connection error");
                false
            }
        }
    }

    pub async fn block_number(&self) -> Result<u64, TxError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| TxError::from_rpc("eth_blockNumber", &e))
    }

    /// Native balance in wei.
    pub async fn balance(&self, address: Address) -> Result<U256, TxError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| TxError::from_rpc("eth_getBalance", &e))
    }

    /// Next nonce for `address`, counting pending transactions.
    pub async fn nonce(&self, address: Address) -> Result<u64, TxError> {
        self.provider
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| TxError::from_rpc("eth_getTransactionCount", &e))
    }

    pub async fn gas_price(&self) -> Result<u128, TxError> {
        self.provider
            .get_gas_price()
            .await
            .map_err(|e| TxError::from_rpc("eth_gasPrice", &e))
    }

    /// Execute `tx` with `eth_call` against the latest state without broadcasting.
    pub async fn simulate(&self, method: &str, tx: &TransactionRequest) -> Result<Bytes, TxError> {
        self.provider
            .call(tx.clone())
            .await
            .map_err(|e| TxError::from_rpc(method, &e))
    }

    /// Broadcast an already signed, EIP-2718 encoded transaction.
    ///
    /// A rejection from the node is classified as usual. A transport failure
    /// without a response may have delivered the transaction, so it is
    /// reported as [`TxError::Unconfirmed`].
    pub async fn send_raw(
        &self,
        method: &str,
        tx_hash: B256,
        raw: &[u8],
    ) -> Result<PendingTransactionBuilder<Ethereum>, TxError> {
        self.provider
            .send_raw_transaction(raw)
            .await
            .map_err(|e| TxError::from_broadcast(method, tx_hash, &e))
    }

    /// Block until the transaction is included or the receipt timeout elapses.
    pub async fn wait_for_receipt(
        &self,
        method: &str,
        pending: PendingTransactionBuilder<Ethereum>,
    ) -> Result<TransactionReceipt, TxError> {
        let tx_hash = *pending.tx_hash();
        pending
            .with_timeout(self.config.receipt_timeout)
            .get_receipt()
            .await
            .map_err(|e| TxError::from_pending(method, tx_hash, e))
    }
}
