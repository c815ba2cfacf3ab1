//! Match row model
//!
//! Participant slots are flattened into columns so participant filters
//! stay indexable; disputes, overrides, and per-game stats ride as JSONB.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use circuit_core::{
    AdminOverride, Dispute, GameStat, Match, MatchSlot, MatchStatus, MatchType,
};

use super::{bad_enum, from_json, to_json};
use crate::DbError;

#[derive(Debug, Clone, FromRow)]
pub struct MatchRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub bracket_id: Uuid,
    pub round: i32,
    pub match_number: i32,
    pub match_type: String,
    pub status: String,
    pub participant1_id: Option<Uuid>,
    pub participant1_name: Option<String>,
    pub participant1_seed: Option<i32>,
    pub participant2_id: Option<Uuid>,
    pub participant2_name: Option<String>,
    pub participant2_seed: Option<i32>,
    pub participant1_score: i32,
    pub participant2_score: i32,
    pub winner_id: Option<Uuid>,
    pub loser_id: Option<Uuid>,
    pub participant1_confirmed: bool,
    pub participant2_confirmed: bool,
    pub participant1_checked_in: bool,
    pub participant2_checked_in: bool,
    pub participant1_checked_in_at: Option<DateTime<Utc>>,
    pub participant2_checked_in_at: Option<DateTime<Utc>>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub server_id: Option<String>,
    pub lobby_code: Option<String>,
    pub stream_url: Option<String>,
    pub next_match_id: Option<Uuid>,
    pub loser_next_match_id: Option<Uuid>,
    pub dispute: Option<serde_json::Value>,
    pub admin_override: Option<serde_json::Value>,
    pub best_of: i32,
    pub games_played: i32,
    pub game_stats: serde_json::Value,
    pub is_bye: bool,
    pub version: i64,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn slot_columns(slot: &Option<MatchSlot>) -> (Option<Uuid>, Option<String>, Option<i32>) {
    match slot {
        Some(s) => (
            Some(s.participant_id),
            Some(s.display_name.clone()),
            s.seed.map(|v| v as i32),
        ),
        None => (None, None, None),
    }
}

fn slot_from_columns(
    id: Option<Uuid>,
    name: Option<String>,
    seed: Option<i32>,
) -> Option<MatchSlot> {
    id.map(|participant_id| MatchSlot {
        participant_id,
        display_name: name.unwrap_or_default(),
        seed: seed.map(|v| v as u32),
    })
}

impl TryFrom<&Match> for MatchRow {
    type Error = DbError;

    fn try_from(m: &Match) -> Result<Self, DbError> {
        let (p1_id, p1_name, p1_seed) = slot_columns(&m.participant1);
        let (p2_id, p2_name, p2_seed) = slot_columns(&m.participant2);
        Ok(Self {
            id: m.id,
            tournament_id: m.tournament_id,
            bracket_id: m.bracket_id,
            round: m.round as i32,
            match_number: m.match_number as i32,
            match_type: m.match_type.as_str().to_string(),
            status: m.status.as_str().to_string(),
            participant1_id: p1_id,
            participant1_name: p1_name,
            participant1_seed: p1_seed,
            participant2_id: p2_id,
            participant2_name: p2_name,
            participant2_seed: p2_seed,
            participant1_score: m.participant1_score as i32,
            participant2_score: m.participant2_score as i32,
            winner_id: m.winner_id,
            loser_id: m.loser_id,
            participant1_confirmed: m.participant1_confirmed,
            participant2_confirmed: m.participant2_confirmed,
            participant1_checked_in: m.participant1_checked_in,
            participant2_checked_in: m.participant2_checked_in,
            participant1_checked_in_at: m.participant1_checked_in_at,
            participant2_checked_in_at: m.participant2_checked_in_at,
            scheduled_at: m.scheduled_at,
            started_at: m.started_at,
            completed_at: m.completed_at,
            server_id: m.server_id.clone(),
            lobby_code: m.lobby_code.clone(),
            stream_url: m.stream_url.clone(),
            next_match_id: m.next_match_id,
            loser_next_match_id: m.loser_next_match_id,
            dispute: m.dispute.as_ref().map(to_json).transpose()?,
            admin_override: m.admin_override.as_ref().map(to_json).transpose()?,
            best_of: m.best_of as i32,
            games_played: m.games_played as i32,
            game_stats: to_json(&m.game_stats)?,
            is_bye: m.is_bye,
            version: m.version,
            metadata: m.metadata.clone(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

impl TryFrom<MatchRow> for Match {
    type Error = DbError;

    fn try_from(row: MatchRow) -> Result<Self, DbError> {
        let match_type = MatchType::parse(&row.match_type)
            .ok_or_else(|| bad_enum("match type", &row.match_type))?;
        let status =
            MatchStatus::parse(&row.status).ok_or_else(|| bad_enum("match status", &row.status))?;
        let dispute: Option<Dispute> = row
            .dispute
            .map(|value| from_json(value, "match dispute"))
            .transpose()?;
        let admin_override: Option<AdminOverride> = row
            .admin_override
            .map(|value| from_json(value, "match admin override"))
            .transpose()?;
        let game_stats: Vec<GameStat> = from_json(row.game_stats, "match game stats")?;

        Ok(Match {
            id: row.id,
            tournament_id: row.tournament_id,
            bracket_id: row.bracket_id,
            round: row.round as u32,
            match_number: row.match_number as u32,
            match_type,
            status,
            participant1: slot_from_columns(
                row.participant1_id,
                row.participant1_name,
                row.participant1_seed,
            ),
            participant2: slot_from_columns(
                row.participant2_id,
                row.participant2_name,
                row.participant2_seed,
            ),
            participant1_score: row.participant1_score as u32,
            participant2_score: row.participant2_score as u32,
            winner_id: row.winner_id,
            loser_id: row.loser_id,
            participant1_confirmed: row.participant1_confirmed,
            participant2_confirmed: row.participant2_confirmed,
            participant1_checked_in: row.participant1_checked_in,
            participant2_checked_in: row.participant2_checked_in,
            participant1_checked_in_at: row.participant1_checked_in_at,
            participant2_checked_in_at: row.participant2_checked_in_at,
            scheduled_at: row.scheduled_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            server_id: row.server_id,
            lobby_code: row.lobby_code,
            stream_url: row.stream_url,
            next_match_id: row.next_match_id,
            loser_next_match_id: row.loser_next_match_id,
            dispute,
            admin_override,
            best_of: row.best_of as u32,
            games_played: row.games_played as u32,
            game_stats,
            is_bye: row.is_bye,
            version: row.version,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_round_trip_through_columns() {
        let mut m = Match::new(Uuid::new_v4(), Uuid::new_v4(), 1, 1, MatchType::Winners);
        m.participant1 = Some(MatchSlot {
            participant_id: Uuid::new_v4(),
            display_name: "alice".into(),
            seed: Some(1),
        });
        m.dispute = Some(Dispute {
            raised_by: m.participant1.as_ref().unwrap().participant_id,
            reason: "score mismatch".into(),
            raised_at: Utc::now(),
            resolved_by: None,
            resolution: None,
            resolved_at: None,
        });

        let row = MatchRow::try_from(&m).unwrap();
        let back = Match::try_from(row).unwrap();
        assert_eq!(back.participant1, m.participant1);
        assert_eq!(back.participant2, None);
        assert_eq!(back.dispute.as_ref().map(|d| d.reason.clone()), Some("score mismatch".into()));
    }
}
