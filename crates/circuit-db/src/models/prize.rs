//! Prize row model

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use circuit_core::{Prize, PrizeStatus, PrizeType};

use super::bad_enum;
use crate::DbError;

#[derive(Debug, Clone, FromRow)]
pub struct PrizeRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub placement: i32,
    pub recipient_id: Option<Uuid>,
    pub recipient_name: Option<String>,
    pub team_id: Option<Uuid>,
    pub prize_type: String,
    pub amount: i64,
    pub currency: String,
    pub percentage_of_pool: Option<f64>,
    pub status: String,
    pub wallet_id: Option<String>,
    pub wallet_address: Option<String>,
    pub transaction_id: Option<String>,
    pub distributed_at: Option<DateTime<Utc>>,
    pub distributed_by: Option<Uuid>,
    pub failure_reason: Option<String>,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub identity_verified: bool,
    pub tax_form_submitted: bool,
    pub tax_form_type: Option<String>,
    pub tax_withheld: i64,
    pub net_amount: i64,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Prize> for PrizeRow {
    fn from(p: &Prize) -> Self {
        Self {
            id: p.id,
            tournament_id: p.tournament_id,
            placement: p.placement as i32,
            recipient_id: p.recipient_id,
            recipient_name: p.recipient_name.clone(),
            team_id: p.team_id,
            prize_type: p.prize_type.as_str().to_string(),
            amount: p.amount,
            currency: p.currency.clone(),
            percentage_of_pool: p.percentage_of_pool,
            status: p.status.as_str().to_string(),
            wallet_id: p.wallet_id.clone(),
            wallet_address: p.wallet_address.clone(),
            transaction_id: p.transaction_id.clone(),
            distributed_at: p.distributed_at,
            distributed_by: p.distributed_by,
            failure_reason: p.failure_reason.clone(),
            retry_count: p.retry_count as i32,
            last_retry_at: p.last_retry_at,
            identity_verified: p.identity_verified,
            tax_form_submitted: p.tax_form_submitted,
            tax_form_type: p.tax_form_type.clone(),
            tax_withheld: p.tax_withheld,
            net_amount: p.net_amount,
            metadata: p.metadata.clone(),
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

impl TryFrom<PrizeRow> for Prize {
    type Error = DbError;

    fn try_from(row: PrizeRow) -> Result<Self, DbError> {
        let prize_type = PrizeType::parse(&row.prize_type)
            .ok_or_else(|| bad_enum("prize type", &row.prize_type))?;
        let status =
            PrizeStatus::parse(&row.status).ok_or_else(|| bad_enum("prize status", &row.status))?;

        Ok(Prize {
            id: row.id,
            tournament_id: row.tournament_id,
            placement: row.placement as u32,
            recipient_id: row.recipient_id,
            recipient_name: row.recipient_name,
            team_id: row.team_id,
            prize_type,
            amount: row.amount,
            currency: row.currency,
            percentage_of_pool: row.percentage_of_pool,
            status,
            wallet_id: row.wallet_id,
            wallet_address: row.wallet_address,
            transaction_id: row.transaction_id,
            distributed_at: row.distributed_at,
            distributed_by: row.distributed_by,
            failure_reason: row.failure_reason,
            retry_count: row.retry_count as u32,
            last_retry_at: row.last_retry_at,
            identity_verified: row.identity_verified,
            tax_form_submitted: row.tax_form_submitted,
            tax_form_type: row.tax_form_type,
            tax_withheld: row.tax_withheld,
            net_amount: row.net_amount,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
