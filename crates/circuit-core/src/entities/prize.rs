//! Prize entity - one payout row in the distribution workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrizeType {
    Cash,
    Token,
    Nft,
    Item,
    Points,
}

impl PrizeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrizeType::Cash => "cash",
            PrizeType::Token => "token",
            PrizeType::Nft => "nft",
            PrizeType::Item => "item",
            PrizeType::Points => "points",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(PrizeType::Cash),
            "token" => Some(PrizeType::Token),
            "nft" => Some(PrizeType::Nft),
            "item" => Some(PrizeType::Item),
            "points" => Some(PrizeType::Points),
            _ => None,
        }
    }
}

impl std::fmt::Display for PrizeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payout workflow status.
///
/// pending → calculated → processing → distributed, with processing able
/// to fail back to failed, failed able to retry into calculated, and
/// cancellation reachable until the money has moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrizeStatus {
    Pending,
    Calculated,
    Processing,
    Distributed,
    Failed,
    Cancelled,
}

impl PrizeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrizeStatus::Pending => "pending",
            PrizeStatus::Calculated => "calculated",
            PrizeStatus::Processing => "processing",
            PrizeStatus::Distributed => "distributed",
            PrizeStatus::Failed => "failed",
            PrizeStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PrizeStatus::Pending),
            "calculated" => Some(PrizeStatus::Calculated),
            "processing" => Some(PrizeStatus::Processing),
            "distributed" => Some(PrizeStatus::Distributed),
            "failed" => Some(PrizeStatus::Failed),
            "cancelled" => Some(PrizeStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PrizeStatus::Distributed | PrizeStatus::Cancelled)
    }

    pub fn can_transition_to(&self, target: PrizeStatus) -> bool {
        use PrizeStatus::*;
        match (self, target) {
            (Pending, Calculated) => true,
            (Calculated, Processing) => true,
            (Processing, Distributed) | (Processing, Failed) => true,
            // Retry path re-arms the row for another distribute call.
            (Failed, Calculated) => true,
            (Pending, Cancelled) | (Calculated, Cancelled) | (Failed, Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PrizeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prize {
    pub id: Uuid,
    pub tournament_id: Uuid,
    /// 1..N for placements, 0 for a bonus prize.
    pub placement: u32,
    pub recipient_id: Option<Uuid>,
    pub recipient_name: Option<String>,
    pub team_id: Option<Uuid>,
    pub prize_type: PrizeType,
    pub amount: i64,
    pub currency: String,
    pub percentage_of_pool: Option<f64>,
    pub status: PrizeStatus,
    pub wallet_id: Option<String>,
    pub wallet_address: Option<String>,
    pub transaction_id: Option<String>,
    pub distributed_at: Option<DateTime<Utc>>,
    pub distributed_by: Option<Uuid>,
    pub failure_reason: Option<String>,
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub identity_verified: bool,
    pub tax_form_submitted: bool,
    pub tax_form_type: Option<String>,
    pub tax_withheld: i64,
    /// amount − tax_withheld.
    pub net_amount: i64,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prize {
    pub fn new(
        tournament_id: Uuid,
        placement: u32,
        prize_type: PrizeType,
        amount: i64,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            placement,
            recipient_id: None,
            recipient_name: None,
            team_id: None,
            prize_type,
            amount,
            currency: currency.into(),
            percentage_of_pool: None,
            status: PrizeStatus::Pending,
            wallet_id: None,
            wallet_address: None,
            transaction_id: None,
            distributed_at: None,
            distributed_by: None,
            failure_reason: None,
            retry_count: 0,
            last_retry_at: None,
            identity_verified: false,
            tax_form_submitted: false,
            tax_form_type: None,
            tax_withheld: 0,
            net_amount: amount,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition_to(&mut self, target: PrizeStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(EngineError::illegal_transition("prize", self.status, target));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Stable idempotency key handed to the wallet service.
    pub fn transfer_reference(&self) -> String {
        format!("tournament-prize-{}", self.id)
    }

    /// Withhold tax at the given percentage rate; persists both the
    /// withheld and net amounts.
    pub fn apply_tax_rate(&mut self, rate_percent: f64) {
        let withheld = (self.amount as f64 * rate_percent / 100.0).round() as i64;
        self.tax_withheld = withheld;
        self.net_amount = self.amount - withheld;
        self.updated_at = Utc::now();
    }
}
