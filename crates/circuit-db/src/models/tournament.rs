//! Tournament row model

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

use circuit_core::{
    RegistrationType, Tournament, TournamentFormat, TournamentStatus, Visibility,
};

use super::{bad_enum, from_json, to_json};
use crate::DbError;

#[derive(Debug, Clone, FromRow)]
pub struct TournamentRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub game_id: String,
    pub format: String,
    pub status: String,
    pub visibility: String,
    pub registration_type: String,
    pub organizer_id: Uuid,
    pub team_size: i32,
    pub min_participants: i32,
    pub max_participants: i32,
    pub min_mmr: Option<i32>,
    pub max_mmr: Option<i32>,
    pub allowed_regions: serde_json::Value,
    pub require_identity_verification: bool,
    pub prize_pool: i64,
    pub currency: String,
    pub prize_distribution: serde_json::Value,
    pub entry_fee: i64,
    pub registration_start: Option<DateTime<Utc>>,
    pub registration_end: Option<DateTime<Utc>>,
    pub check_in_start: Option<DateTime<Utc>>,
    pub check_in_end: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub match_interval_minutes: i32,
    pub swiss_rounds: Option<i32>,
    pub grand_finals_reset: bool,
    pub rules: Option<String>,
    pub stream_url: Option<String>,
    pub template_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&Tournament> for TournamentRow {
    type Error = DbError;

    fn try_from(t: &Tournament) -> Result<Self, DbError> {
        Ok(Self {
            id: t.id,
            name: t.name.clone(),
            description: t.description.clone(),
            game_id: t.game_id.clone(),
            format: t.format.as_str().to_string(),
            status: t.status.as_str().to_string(),
            visibility: t.visibility.as_str().to_string(),
            registration_type: t.registration_type.as_str().to_string(),
            organizer_id: t.organizer_id,
            team_size: t.team_size as i32,
            min_participants: t.min_participants as i32,
            max_participants: t.max_participants as i32,
            min_mmr: t.min_mmr,
            max_mmr: t.max_mmr,
            allowed_regions: to_json(&t.allowed_regions)?,
            require_identity_verification: t.require_identity_verification,
            prize_pool: t.prize_pool,
            currency: t.currency.clone(),
            prize_distribution: to_json(&t.prize_distribution)?,
            entry_fee: t.entry_fee,
            registration_start: t.registration_start,
            registration_end: t.registration_end,
            check_in_start: t.check_in_start,
            check_in_end: t.check_in_end,
            start_date: t.start_date,
            end_date: t.end_date,
            match_interval_minutes: t.match_interval_minutes as i32,
            swiss_rounds: t.swiss_rounds.map(|r| r as i32),
            grand_finals_reset: t.grand_finals_reset,
            rules: t.rules.clone(),
            stream_url: t.stream_url.clone(),
            template_id: t.template_id,
            metadata: t.metadata.clone(),
            created_at: t.created_at,
            updated_at: t.updated_at,
        })
    }
}

impl TryFrom<TournamentRow> for Tournament {
    type Error = DbError;

    fn try_from(row: TournamentRow) -> Result<Self, DbError> {
        let format = TournamentFormat::parse(&row.format)
            .ok_or_else(|| bad_enum("tournament format", &row.format))?;
        let status = TournamentStatus::parse(&row.status)
            .ok_or_else(|| bad_enum("tournament status", &row.status))?;
        let visibility = Visibility::parse(&row.visibility)
            .ok_or_else(|| bad_enum("tournament visibility", &row.visibility))?;
        let registration_type = RegistrationType::parse(&row.registration_type)
            .ok_or_else(|| bad_enum("registration type", &row.registration_type))?;

        let allowed_regions: Vec<String> = from_json(row.allowed_regions, "allowed_regions")?;
        let prize_distribution: BTreeMap<u32, f64> =
            from_json(row.prize_distribution, "prize_distribution")?;

        Ok(Tournament {
            id: row.id,
            name: row.name,
            description: row.description,
            game_id: row.game_id,
            format,
            status,
            visibility,
            registration_type,
            organizer_id: row.organizer_id,
            team_size: row.team_size as u32,
            min_participants: row.min_participants as u32,
            max_participants: row.max_participants as u32,
            min_mmr: row.min_mmr,
            max_mmr: row.max_mmr,
            allowed_regions,
            require_identity_verification: row.require_identity_verification,
            prize_pool: row.prize_pool,
            currency: row.currency,
            prize_distribution,
            entry_fee: row.entry_fee,
            registration_start: row.registration_start,
            registration_end: row.registration_end,
            check_in_start: row.check_in_start,
            check_in_end: row.check_in_end,
            start_date: row.start_date,
            end_date: row.end_date,
            match_interval_minutes: row.match_interval_minutes as u32,
            swiss_rounds: row.swiss_rounds.map(|r| r as u32),
            grand_finals_reset: row.grand_finals_reset,
            rules: row.rules,
            stream_url: row.stream_url,
            template_id: row.template_id,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
