//! Wallet service port
//!
//! Prize settlement goes through an external wallet service. Transfers are
//! idempotent on the `reference` string: re-invoking with the same
//! reference must not double-pay, and the engine records the returned
//! transaction id verbatim.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletHandle {
    pub wallet_id: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_wallet: String,
    pub to_wallet: String,
    pub amount: i64,
    pub currency: String,
    /// Idempotency key, stable per prize.
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
}

impl TransferOutcome {
    pub fn ok(transaction_id: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait WalletService: Send + Sync {
    async fn get_wallet(&self, user_id: Uuid) -> EngineResult<Option<WalletHandle>>;
    async fn transfer(&self, request: &TransferRequest) -> EngineResult<TransferOutcome>;
    async fn verify_identity(&self, user_id: Uuid) -> EngineResult<bool>;
}
