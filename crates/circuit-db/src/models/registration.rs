//! Registration row model

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use circuit_core::{Registration, RegistrationStatus, Team};

use super::{bad_enum, from_json, to_json};
use crate::DbError;

#[derive(Debug, Clone, FromRow)]
pub struct RegistrationRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub participant_id: Uuid,
    pub display_name: String,
    pub team: Option<serde_json::Value>,
    pub status: String,
    pub seed: Option<i32>,
    pub mmr: Option<i32>,
    pub identity_verified: bool,
    pub region: Option<String>,
    pub entry_fee_paid: bool,
    pub refund_issued: bool,
    pub refund_amount: Option<i64>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub waitlist_position: Option<i32>,
    pub substituted_from: Option<Uuid>,
    pub substituted_at: Option<DateTime<Utc>>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&Registration> for RegistrationRow {
    type Error = DbError;

    fn try_from(r: &Registration) -> Result<Self, DbError> {
        Ok(Self {
            id: r.id,
            tournament_id: r.tournament_id,
            participant_id: r.participant_id,
            display_name: r.display_name.clone(),
            team: r.team.as_ref().map(to_json).transpose()?,
            status: r.status.as_str().to_string(),
            seed: r.seed.map(|s| s as i32),
            mmr: r.mmr,
            identity_verified: r.identity_verified,
            region: r.region.clone(),
            entry_fee_paid: r.entry_fee_paid,
            refund_issued: r.refund_issued,
            refund_amount: r.refund_amount,
            refunded_at: r.refunded_at,
            waitlist_position: r.waitlist_position.map(|p| p as i32),
            substituted_from: r.substituted_from,
            substituted_at: r.substituted_at,
            checked_in_at: r.checked_in_at,
            metadata: r.metadata.clone(),
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = DbError;

    fn try_from(row: RegistrationRow) -> Result<Self, DbError> {
        let status = RegistrationStatus::parse(&row.status)
            .ok_or_else(|| bad_enum("registration status", &row.status))?;
        let team: Option<Team> = row
            .team
            .map(|value| from_json(value, "registration team"))
            .transpose()?;

        Ok(Registration {
            id: row.id,
            tournament_id: row.tournament_id,
            participant_id: row.participant_id,
            display_name: row.display_name,
            team,
            status,
            seed: row.seed.map(|s| s as u32),
            mmr: row.mmr,
            identity_verified: row.identity_verified,
            region: row.region,
            entry_fee_paid: row.entry_fee_paid,
            refund_issued: row.refund_issued,
            refund_amount: row.refund_amount,
            refunded_at: row.refunded_at,
            waitlist_position: row.waitlist_position.map(|p| p as u32),
            substituted_from: row.substituted_from,
            substituted_at: row.substituted_at,
            checked_in_at: row.checked_in_at,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
