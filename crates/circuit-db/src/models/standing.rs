//! Standing row model

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use circuit_core::{Standing, StreakType};

use super::bad_enum;
use crate::DbError;

#[derive(Debug, Clone, FromRow)]
pub struct StandingRow {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub participant_id: Uuid,
    pub team_id: Option<Uuid>,
    pub display_name: String,
    pub seed: Option<i32>,
    pub rank: i32,
    pub points: i64,
    pub wins: i32,
    pub losses: i32,
    pub draws: i32,
    pub matches_played: i32,
    pub games_won: i32,
    pub games_lost: i32,
    pub rounds_won: i32,
    pub rounds_lost: i32,
    pub win_rate: f64,
    pub buchholz_score: i64,
    pub opponent_win_rate: f64,
    pub head_to_head_wins: i32,
    pub current_streak: i32,
    pub streak_type: String,
    pub longest_win_streak: i32,
    pub is_eliminated: bool,
    pub eliminated_in_round: Option<i32>,
    pub eliminated_by: Option<Uuid>,
    pub is_disqualified: bool,
    pub final_placement: Option<i32>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Standing> for StandingRow {
    fn from(s: &Standing) -> Self {
        Self {
            id: s.id,
            tournament_id: s.tournament_id,
            participant_id: s.participant_id,
            team_id: s.team_id,
            display_name: s.display_name.clone(),
            seed: s.seed.map(|v| v as i32),
            rank: s.rank as i32,
            points: s.points,
            wins: s.wins as i32,
            losses: s.losses as i32,
            draws: s.draws as i32,
            matches_played: s.matches_played as i32,
            games_won: s.games_won as i32,
            games_lost: s.games_lost as i32,
            rounds_won: s.rounds_won as i32,
            rounds_lost: s.rounds_lost as i32,
            win_rate: s.win_rate,
            buchholz_score: s.buchholz_score,
            opponent_win_rate: s.opponent_win_rate,
            head_to_head_wins: s.head_to_head_wins as i32,
            current_streak: s.current_streak as i32,
            streak_type: s.streak_type.as_str().to_string(),
            longest_win_streak: s.longest_win_streak as i32,
            is_eliminated: s.is_eliminated,
            eliminated_in_round: s.eliminated_in_round.map(|v| v as i32),
            eliminated_by: s.eliminated_by,
            is_disqualified: s.is_disqualified,
            final_placement: s.final_placement.map(|v| v as i32),
            metadata: s.metadata.clone(),
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

impl TryFrom<StandingRow> for Standing {
    type Error = DbError;

    fn try_from(row: StandingRow) -> Result<Self, DbError> {
        let streak_type = StreakType::parse(&row.streak_type)
            .ok_or_else(|| bad_enum("streak type", &row.streak_type))?;

        Ok(Standing {
            id: row.id,
            tournament_id: row.tournament_id,
            participant_id: row.participant_id,
            team_id: row.team_id,
            display_name: row.display_name,
            seed: row.seed.map(|v| v as u32),
            rank: row.rank as u32,
            points: row.points,
            wins: row.wins as u32,
            losses: row.losses as u32,
            draws: row.draws as u32,
            matches_played: row.matches_played as u32,
            games_won: row.games_won as u32,
            games_lost: row.games_lost as u32,
            rounds_won: row.rounds_won as u32,
            rounds_lost: row.rounds_lost as u32,
            win_rate: row.win_rate,
            buchholz_score: row.buchholz_score,
            opponent_win_rate: row.opponent_win_rate,
            head_to_head_wins: row.head_to_head_wins as u32,
            current_streak: row.current_streak as u32,
            streak_type,
            longest_win_streak: row.longest_win_streak as u32,
            is_eliminated: row.is_eliminated,
            eliminated_in_round: row.eliminated_in_round.map(|v| v as u32),
            eliminated_by: row.eliminated_by,
            is_disqualified: row.is_disqualified,
            final_placement: row.final_placement.map(|v| v as u32),
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
