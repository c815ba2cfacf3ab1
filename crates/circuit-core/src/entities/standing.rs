//! Standing entity - a participant's evolving record within one tournament

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakType {
    Win,
    Loss,
    None,
}

impl StreakType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreakType::Win => "win",
            StreakType::Loss => "loss",
            StreakType::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "win" => Some(StreakType::Win),
            "loss" => Some(StreakType::Loss),
            "none" => Some(StreakType::None),
            _ => None,
        }
    }
}

impl std::fmt::Display for StreakType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standing {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub participant_id: Uuid,
    pub team_id: Option<Uuid>,
    pub display_name: String,
    pub seed: Option<u32>,
    /// Dense, 1-based; assigned by the ranking pass.
    pub rank: u32,
    pub points: i64,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub matches_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub rounds_won: u32,
    pub rounds_lost: u32,
    /// wins / matches_played, 0 when unplayed.
    pub win_rate: f64,
    /// Sum of opponents' points; Swiss tiebreaker.
    pub buchholz_score: i64,
    pub opponent_win_rate: f64,
    pub head_to_head_wins: u32,
    pub current_streak: u32,
    pub streak_type: StreakType,
    pub longest_win_streak: u32,
    pub is_eliminated: bool,
    pub eliminated_in_round: Option<u32>,
    pub eliminated_by: Option<Uuid>,
    pub is_disqualified: bool,
    pub final_placement: Option<u32>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Standing {
    pub fn new(tournament_id: Uuid, participant_id: Uuid, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            participant_id,
            team_id: None,
            display_name: display_name.into(),
            seed: None,
            rank: 0,
            points: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            matches_played: 0,
            games_won: 0,
            games_lost: 0,
            rounds_won: 0,
            rounds_lost: 0,
            win_rate: 0.0,
            buchholz_score: 0,
            opponent_win_rate: 0.0,
            head_to_head_wins: 0,
            current_streak: 0,
            streak_type: StreakType::None,
            longest_win_streak: 0,
            is_eliminated: false,
            eliminated_in_round: None,
            eliminated_by: None,
            is_disqualified: false,
            final_placement: None,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn game_differential(&self) -> i64 {
        self.games_won as i64 - self.games_lost as i64
    }

    fn refresh_win_rate(&mut self) {
        self.win_rate = if self.matches_played > 0 {
            self.wins as f64 / self.matches_played as f64
        } else {
            0.0
        };
    }

    /// Record a won match with the given game scores.
    pub fn record_win(&mut self, games_won: u32, games_lost: u32) {
        self.wins += 1;
        self.matches_played += 1;
        self.games_won += games_won;
        self.games_lost += games_lost;
        self.points += 3;
        self.current_streak = if self.streak_type == StreakType::Win {
            self.current_streak + 1
        } else {
            1
        };
        self.streak_type = StreakType::Win;
        self.longest_win_streak = self.longest_win_streak.max(self.current_streak);
        self.refresh_win_rate();
        self.updated_at = Utc::now();
    }

    /// Record a lost match with the given game scores (from this side's
    /// perspective).
    pub fn record_loss(&mut self, games_won: u32, games_lost: u32) {
        self.losses += 1;
        self.matches_played += 1;
        self.games_won += games_won;
        self.games_lost += games_lost;
        self.current_streak = if self.streak_type == StreakType::Loss {
            self.current_streak + 1
        } else {
            1
        };
        self.streak_type = StreakType::Loss;
        self.refresh_win_rate();
        self.updated_at = Utc::now();
    }

    /// Record a drawn match (formats that support it).
    pub fn record_draw(&mut self, games_won: u32, games_lost: u32) {
        self.draws += 1;
        self.matches_played += 1;
        self.games_won += games_won;
        self.games_lost += games_lost;
        self.points += 1;
        self.current_streak = 0;
        self.streak_type = StreakType::None;
        self.refresh_win_rate();
        self.updated_at = Utc::now();
    }

    /// Zero the match record while keeping identity, seed, and
    /// disqualification state. Used by full recalculation.
    pub fn reset_record(&mut self) {
        self.rank = 0;
        self.points = 0;
        self.wins = 0;
        self.losses = 0;
        self.draws = 0;
        self.matches_played = 0;
        self.games_won = 0;
        self.games_lost = 0;
        self.rounds_won = 0;
        self.rounds_lost = 0;
        self.win_rate = 0.0;
        self.buchholz_score = 0;
        self.opponent_win_rate = 0.0;
        self.head_to_head_wins = 0;
        self.current_streak = 0;
        self.streak_type = StreakType::None;
        self.longest_win_streak = 0;
        self.updated_at = Utc::now();
    }
}
