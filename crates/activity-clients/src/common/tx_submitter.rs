use crate::{Account, ChainClient, TxError};
use alloy::{
    eips::eip2718::Encodable2718,
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxKind, U256},
    rpc::types::{TransactionInput, TransactionReceipt, TransactionRequest},
};
use tracing::{debug, info, warn};

/// What a transaction does, independent of who signs it and how it is priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPayload {
    pub to: TxKind,
    pub input: Bytes,
    pub value: U256,
}

impl TxPayload {
    /// Contract call with ABI-encoded calldata.
    pub fn call(to: Address, input: Bytes) -> Self {
        Self {
            to: TxKind::Call(to),
            input,
            value: U256::ZERO,
        }
    }

    /// Contract creation with bytecode followed by constructor arguments.
    pub fn create(code: Bytes) -> Self {
        Self {
            to: TxKind::Create,
            input: code,
            value: U256::ZERO,
        }
    }

    /// Plain native currency transfer.
    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to: TxKind::Call(to),
            input: Bytes::new(),
            value,
        }
    }

    /// Pre-simulation is skipped for value transfers and creations: the first
    /// cannot revert, the second would just execute the constructor twice.
    fn needs_simulation(&self) -> bool {
        matches!(self.to, TxKind::Call(_)) && !self.input.is_empty()
    }

    fn into_request(self, from: Address) -> TransactionRequest {
        TransactionRequest {
            from: Some(from),
            to: Some(self.to),
            value: Some(self.value),
            input: TransactionInput::new(self.input),
            ..Default::default()
        }
    }
}

/// Builds, signs, broadcasts and confirms transactions one at a time.
///
/// Each transaction gets a fresh nonce and gas price and a fixed gas limit.
/// Calls are pre-simulated so reverts surface with a decoded reason before
/// any gas is spent.
#[derive(Clone)]
pub struct TransactionSubmitter {
    client: ChainClient,
}

impl TransactionSubmitter {
    pub fn new(client: ChainClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ChainClient {
        &self.client
    }

    pub async fn invoke(
        &self,
        account: &Account,
        method: &str,
        payload: TxPayload,
        gas_limit: u64,
    ) -> Result<TransactionReceipt, TxError> {
        let from = account.address();
        let simulate = payload.needs_simulation();
        let request = payload.into_request(from);

        // Pre-simulate to catch reverts with proper error messages
        if simulate {
            self.client.simulate(method, &request).await?;
        }

        let nonce = self.client.nonce(from).await?;
        let gas_price = self.client.gas_price().await?;
        let request = request
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_gas_price(gas_price)
            .with_chain_id(self.client.chain_id());

        let envelope = request
            .build(&account.wallet())
            .await
            .map_err(|e| TxError::Signing(format!("{method}: {e}")))?;
        let tx_hash = *envelope.tx_hash();
        let raw = envelope.encoded_2718();

        let pending = self.client.send_raw(method, tx_hash, &raw).await?;
        debug!(method = %method, tx_hash = ?tx_hash, from = %from, nonce, gas_price, "📤 transaction broadcast");

        let receipt = self.client.wait_for_receipt(method, pending).await?;

        Self::log_fee_details(method, &receipt, gas_limit);

        // Validate success
        if !receipt.status() {
            let used = receipt.gas_used;
            if used >= gas_limit {
                return Err(TxError::OutOfGas {
                    method: method.to_string(),
                    used,
                    limit: gas_limit,
                    tx_hash,
                });
            }
            return Err(TxError::Reverted {
                method: method.to_string(),
                reason: format!("reverted on-chain. Tx hash: {tx_hash:?}"),
            });
        }

        Ok(receipt)
    }

    /// Send native currency using the native transfer gas limit.
    pub async fn send_native(
        &self,
        account: &Account,
        to: Address,
        value: U256,
    ) -> Result<TransactionReceipt, TxError> {
        let gas_limit = self.client.config().gas.native_transfer;
        self.invoke(account, "send_native", TxPayload::transfer(to, value), gas_limit)
            .await
    }

    fn log_fee_details(method: &str, receipt: &TransactionReceipt, gas_limit: u64) {
        let total_cost = receipt.effective_gas_price * receipt.gas_used as u128;

        // Within 10% of the fixed limit the next call of this kind may run out
        if receipt.gas_used.saturating_mul(10) >= gas_limit.saturating_mul(9) {
            warn!(
                method = %method,
                tx_hash = ?receipt.transaction_hash,
                block = ?receipt.block_number,
                effective_gas_price = receipt.effective_gas_price,
                gas_used = receipt.gas_used,
                gas_limit,
                total_cost,
                "💰 transaction gas details (close to gas limit)"
            );
        } else {
            info!(
                method = %method,
                tx_hash = ?receipt.transaction_hash,
                block = ?receipt.block_number,
                effective_gas_price = receipt.effective_gas_price,
                gas_used = receipt.gas_used,
                gas_limit,
                total_cost,
                "💰 transaction gas details"
            );
        }
    }
}
