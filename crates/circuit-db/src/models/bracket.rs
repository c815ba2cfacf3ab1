//! Bracket row model

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use circuit_core::{
    Bracket, BracketStatus, BracketType, BracketView, SeedEntry, TournamentFormat,
};

use super::{bad_enum, from_json, to_json};
use crate::DbError;

#[derive(Debug, Clone, FromRow)]
pub struct BracketRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub bracket_type: String,
    pub format: String,
    pub status: String,
    pub total_rounds: i32,
    pub current_round: i32,
    pub total_matches: i32,
    pub completed_matches: i32,
    pub participant_count: i32,
    pub bye_count: i32,
    pub seeds: serde_json::Value,
    pub visualization: serde_json::Value,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<&Bracket> for BracketRow {
    type Error = DbError;

    fn try_from(b: &Bracket) -> Result<Self, DbError> {
        Ok(Self {
            id: b.id,
            tournament_id: b.tournament_id,
            bracket_type: b.bracket_type.as_str().to_string(),
            format: b.format.as_str().to_string(),
            status: b.status.as_str().to_string(),
            total_rounds: b.total_rounds as i32,
            current_round: b.current_round as i32,
            total_matches: b.total_matches as i32,
            completed_matches: b.completed_matches as i32,
            participant_count: b.participant_count as i32,
            bye_count: b.bye_count as i32,
            seeds: to_json(&b.seeds)?,
            visualization: to_json(&b.visualization)?,
            metadata: b.metadata.clone(),
            created_at: b.created_at,
            updated_at: b.updated_at,
        })
    }
}

impl TryFrom<BracketRow> for Bracket {
    type Error = DbError;

    fn try_from(row: BracketRow) -> Result<Self, DbError> {
        let bracket_type = BracketType::parse(&row.bracket_type)
            .ok_or_else(|| bad_enum("bracket type", &row.bracket_type))?;
        let format = TournamentFormat::parse(&row.format)
            .ok_or_else(|| bad_enum("bracket format", &row.format))?;
        let status = BracketStatus::parse(&row.status)
            .ok_or_else(|| bad_enum("bracket status", &row.status))?;
        let seeds: Vec<SeedEntry> = from_json(row.seeds, "bracket seeds")?;
        let visualization: BracketView = from_json(row.visualization, "bracket visualization")?;

        Ok(Bracket {
            id: row.id,
            tournament_id: row.tournament_id,
            bracket_type,
            format,
            status,
            total_rounds: row.total_rounds as u32,
            current_round: row.current_round as u32,
            total_matches: row.total_matches as u32,
            completed_matches: row.completed_matches as u32,
            participant_count: row.participant_count as u32,
            bye_count: row.bye_count as u32,
            seeds,
            visualization,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
