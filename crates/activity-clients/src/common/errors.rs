//! # Transaction Errors
//!
//! Every chain-facing operation in this crate returns [`TxError`], so callers
//! can tell a reverted call from a dropped connection and decide whether a
//! retry makes sense.

use alloy::{
    primitives::B256,
    providers::{PendingTransactionError, WatchTxError},
    sol_types::decode_revert_reason,
    transports::TransportError,
};
use thiserror::Error;

/// Classified failure of a chain operation.
#[derive(Debug, Error)]
pub enum TxError {
    /// The node could not be reached or returned an unclassified RPC error.
    #[error("network failure: {0}")]
    Network(String),

    /// The call reverted, either during pre-simulation or on-chain.
    #[error("{method} reverted: {reason}")]
    Reverted { method: String, reason: String },

    /// The transaction was mined but consumed its whole gas limit.
    #[error("{method} ran out of gas (used {used} of {limit} limit). Tx: {tx_hash:?}")]
    OutOfGas {
        method: String,
        used: u64,
        limit: u64,
        tx_hash: B256,
    },

    /// Not enough native currency for gas, or not enough tokens for the call.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// No receipt arrived before the configured deadline. The transaction may
    /// still be mined later.
    #[error("timed out waiting for receipt of {0:?}")]
    Timeout(B256),

    /// The nonce was taken by another transaction before ours arrived.
    #[error("nonce conflict: {0}")]
    NonceConflict(String),

    /// The node already holds this exact transaction.
    #[error("transaction already pending: {0}")]
    AlreadyPending(String),

    /// Broadcast succeeded but waiting for the receipt failed. The
    /// transaction may still be mined.
    #[error("{method}: lost track of {tx_hash:?} after broadcast: {reason}")]
    Unconfirmed {
        method: String,
        tx_hash: B256,
        reason: String,
    },

    /// Gas price below what the node accepts.
    #[error("transaction underpriced: {0}")]
    Underpriced(String),

    #[error("failed to sign transaction: {0}")]
    Signing(String),

    /// The node answered, but not with something we can use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TxError {
    /// Short, stable name of the error kind for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            TxError::Network(_) => "network",
            TxError::Reverted { .. } => "reverted",
            TxError::OutOfGas { .. } => "out_of_gas",
            TxError::InsufficientFunds(_) => "insufficient_funds",
            TxError::Timeout(_) => "timeout",
            TxError::NonceConflict(_) => "nonce_conflict",
            TxError::AlreadyPending(_) => "already_pending",
            TxError::Unconfirmed { .. } => "unconfirmed",
            TxError::Underpriced(_) => "underpriced",
            TxError::Signing(_) => "signing",
            TxError::InvalidResponse(_) => "invalid_response",
        }
    }

    /// True when the transaction was not accepted by the node, so sending it
    /// again cannot double-spend.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TxError::Network(_) | TxError::NonceConflict(_) | TxError::Underpriced(_)
        )
    }

    /// Classify an RPC error, decoding revert data when the node returned any.
    pub fn from_rpc(method: &str, error: &TransportError) -> Self {
        if let Some(payload) = error.as_error_resp() {
            if let Some(data) = payload.as_revert_data() {
                let reason = decode_revert_reason(&data).unwrap_or_else(|| data.to_string());
                return TxError::Reverted {
                    method: method.to_string(),
                    reason,
                };
            }
            return classify_message(method, &payload.message);
        }
        classify_message(method, &error.to_string())
    }

    /// Classify an error from a contract view call.
    pub fn from_contract(method: &str, error: alloy::contract::Error) -> Self {
        match error {
            alloy::contract::Error::TransportError(e) => Self::from_rpc(method, &e),
            other => TxError::InvalidResponse(format!("{method}: {other}")),
        }
    }

    /// Classify a failed `eth_sendRawTransaction`. Only an error response
    /// proves the node refused the transaction.
    pub fn from_broadcast(method: &str, tx_hash: B256, error: &TransportError) -> Self {
        if error.as_error_resp().is_some() {
            return Self::from_rpc(method, error);
        }
        TxError::Unconfirmed {
            method: method.to_string(),
            tx_hash,
            reason: error.to_string(),
        }
    }

    /// Classify an error raised while waiting for a receipt. The transaction
    /// is already broadcast here, so nothing from this path is retryable.
    pub fn from_pending(method: &str, tx_hash: B256, error: PendingTransactionError) -> Self {
        match error {
            PendingTransactionError::TxWatcher(WatchTxError::Timeout) => TxError::Timeout(tx_hash),
            other => TxError::Unconfirmed {
                method: method.to_string(),
                tx_hash,
                reason: other.to_string(),
            },
        }
    }
}

/// Map a node error message onto an error kind.
///
/// Node implementations disagree on error codes, so the message text is the
/// only portable signal.
pub fn classify_message(method: &str, message: &str) -> TxError {
    let lower = message.to_lowercase();

    if lower.contains("insufficient funds") {
        TxError::InsufficientFunds(format!("{method}: {message}"))
    } else if lower.contains("revert") {
        TxError::Reverted {
            method: method.to_string(),
            reason: message.to_string(),
        }
    } else if lower.contains("already known") || lower.contains("already imported") {
        TxError::AlreadyPending(format!("{method}: {message}"))
    } else if lower.contains("nonce too low") || lower.contains("nonce too high") {
        TxError::NonceConflict(format!("{method}: {message}"))
    } else if lower.contains("underpriced") || lower.contains("fee too low") {
        TxError::Underpriced(format!("{method}: {message}"))
    } else {
        TxError::Network(format!("{method}: {message}"))
    }
}
