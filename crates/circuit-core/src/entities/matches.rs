//! Match entity and its lifecycle state machine
//!
//! Matches hold the canonical forward edges of the bracket graph
//! (`next_match_id`, `loser_next_match_id`); brackets only back-reference
//! their matches. Concurrent result submissions are serialized by the
//! optimistic `version` column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Winners,
    Losers,
    GrandFinals,
    GrandFinalsReset,
    Swiss,
    RoundRobin,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Winners => "winners",
            MatchType::Losers => "losers",
            MatchType::GrandFinals => "grand_finals",
            MatchType::GrandFinalsReset => "grand_finals_reset",
            MatchType::Swiss => "swiss",
            MatchType::RoundRobin => "round_robin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "winners" => Some(MatchType::Winners),
            "losers" => Some(MatchType::Losers),
            "grand_finals" => Some(MatchType::GrandFinals),
            "grand_finals_reset" => Some(MatchType::GrandFinalsReset),
            "swiss" => Some(MatchType::Swiss),
            "round_robin" => Some(MatchType::RoundRobin),
            _ => None,
        }
    }

    /// Losing one of these ends the loser's run (no losers-bracket edge).
    pub fn is_terminal_for_loser(&self) -> bool {
        matches!(
            self,
            MatchType::Losers | MatchType::GrandFinals | MatchType::GrandFinalsReset
        )
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Pending,
    Scheduled,
    CheckIn,
    InProgress,
    AwaitingConfirmation,
    Disputed,
    Completed,
    Postponed,
    Forfeit,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::CheckIn => "check_in",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::AwaitingConfirmation => "awaiting_confirmation",
            MatchStatus::Disputed => "disputed",
            MatchStatus::Completed => "completed",
            MatchStatus::Postponed => "postponed",
            MatchStatus::Forfeit => "forfeit",
            MatchStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MatchStatus::Pending),
            "scheduled" => Some(MatchStatus::Scheduled),
            "check_in" => Some(MatchStatus::CheckIn),
            "in_progress" => Some(MatchStatus::InProgress),
            "awaiting_confirmation" => Some(MatchStatus::AwaitingConfirmation),
            "disputed" => Some(MatchStatus::Disputed),
            "completed" => Some(MatchStatus::Completed),
            "postponed" => Some(MatchStatus::Postponed),
            "forfeit" => Some(MatchStatus::Forfeit),
            "cancelled" => Some(MatchStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MatchStatus::Completed | MatchStatus::Forfeit | MatchStatus::Cancelled
        )
    }

    /// Results may only be submitted while the match is live.
    pub fn accepts_results(&self) -> bool {
        matches!(
            self,
            MatchStatus::Scheduled | MatchStatus::CheckIn | MatchStatus::InProgress
        )
    }

    pub fn can_transition_to(&self, target: MatchStatus) -> bool {
        use MatchStatus::*;
        match (self, target) {
            (Pending, Scheduled) => true,
            (Scheduled, CheckIn) => true,
            (Scheduled, InProgress) | (CheckIn, InProgress) => true,
            // Submission straight from a result-accepting state.
            (Scheduled, AwaitingConfirmation)
            | (CheckIn, AwaitingConfirmation)
            | (InProgress, AwaitingConfirmation) => true,
            (AwaitingConfirmation, Completed) => true,
            (AwaitingConfirmation, Disputed) => true,
            (Disputed, Completed) => true,
            // Admin sends a disputed match back for replay.
            (Disputed, InProgress) => true,
            (Pending, Postponed) | (Scheduled, Postponed) => true,
            (Postponed, Scheduled) => true,
            // Forfeit and cancellation from any non-terminal state.
            (from, Forfeit) => !from.is_terminal(),
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the match a participant occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    One,
    Two,
}

/// A filled participant slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSlot {
    pub participant_id: Uuid,
    pub display_name: String,
    pub seed: Option<u32>,
}

/// Dispute raised against a submitted result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub raised_by: Uuid,
    pub reason: String,
    pub raised_at: DateTime<Utc>,
    pub resolved_by: Option<Uuid>,
    pub resolution: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Audit record for an admin decision overriding the normal flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminOverride {
    pub admin_id: Uuid,
    pub reason: String,
    pub overridden_at: DateTime<Utc>,
}

/// Per-game detail inside a best-of series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStat {
    pub game_number: u32,
    pub winner_id: Option<Uuid>,
    pub participant1_score: u32,
    pub participant2_score: u32,
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub bracket_id: Uuid,
    pub round: u32,
    /// Unique within the bracket.
    pub match_number: u32,
    pub match_type: MatchType,
    pub status: MatchStatus,

    pub participant1: Option<MatchSlot>,
    pub participant2: Option<MatchSlot>,
    pub participant1_score: u32,
    pub participant2_score: u32,
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

    /// Winner forward edge.
    pub next_match_id: Option<Uuid>,
    /// Loser forward edge; populated only for double-elim winners matches.
    pub loser_next_match_id: Option<Uuid>,

    pub dispute: Option<Dispute>,
    pub admin_override: Option<AdminOverride>,

    pub best_of: u32,
    pub games_played: u32,
    pub game_stats: Vec<GameStat>,
    pub is_bye: bool,

    /// Optimistic lock; bumped on every update.
    pub version: i64,

    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub fn new(
        tournament_id: Uuid,
        bracket_id: Uuid,
        round: u32,
        match_number: u32,
        match_type: MatchType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            bracket_id,
            round,
            match_number,
            match_type,
            status: MatchStatus::Pending,
            participant1: None,
            participant2: None,
            participant1_score: 0,
            participant2_score: 0,
            winner_id: None,
            loser_id: None,
            participant1_confirmed: false,
            participant2_confirmed: false,
            participant1_checked_in: false,
            participant2_checked_in: false,
            participant1_checked_in_at: None,
            participant2_checked_in_at: None,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            server_id: None,
            lobby_code: None,
            stream_url: None,
            next_match_id: None,
            loser_next_match_id: None,
            dispute: None,
            admin_override: None,
            best_of: 1,
            games_played: 0,
            game_stats: Vec::new(),
            is_bye: false,
            version: 0,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition_to(&mut self, target: MatchStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(EngineError::illegal_transition("match", self.status, target));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Which side a participant plays on, if any.
    pub fn side_of(&self, participant_id: Uuid) -> Option<Side> {
        if self.participant1.as_ref().map(|s| s.participant_id) == Some(participant_id) {
            Some(Side::One)
        } else if self.participant2.as_ref().map(|s| s.participant_id) == Some(participant_id) {
            Some(Side::Two)
        } else {
            None
        }
    }

    pub fn has_both_participants(&self) -> bool {
        self.participant1.is_some() && self.participant2.is_some()
    }

    /// Fill the first empty slot, participant1 before participant2.
    pub fn fill_first_empty_slot(&mut self, slot: MatchSlot) -> EngineResult<()> {
        if self.participant1.is_none() {
            self.participant1 = Some(slot);
        } else if self.participant2.is_none() {
            self.participant2 = Some(slot);
        } else {
            return Err(EngineError::Integrity(format!(
                "match {} already has both participants",
                self.id
            )));
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn opponent_of(&self, participant_id: Uuid) -> Option<&MatchSlot> {
        match self.side_of(participant_id)? {
            Side::One => self.participant2.as_ref(),
            Side::Two => self.participant1.as_ref(),
        }
    }

    /// Resolve a bye at generation time: the lone slot wins 1-0.
    pub fn complete_as_bye(&mut self) -> EngineResult<()> {
        let winner = match (&self.participant1, &self.participant2) {
            (Some(slot), None) => slot.participant_id,
            (None, Some(slot)) => slot.participant_id,
            _ => {
                return Err(EngineError::Integrity(format!(
                    "match {} is not a bye: expected exactly one filled slot",
                    self.id
                )))
            }
        };
        self.is_bye = true;
        self.status = MatchStatus::Completed;
        if self.participant1.is_some() {
            self.participant1_score = 1;
            self.participant2_score = 0;
        } else {
            self.participant1_score = 0;
            self.participant2_score = 1;
        }
        self.winner_id = Some(winner);
        self.completed_at = Some(Utc::now());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn winner_slot(&self) -> Option<&MatchSlot> {
        let winner = self.winner_id?;
        self.side_of(winner).and_then(|side| match side {
            Side::One => self.participant1.as_ref(),
            Side::Two => self.participant2.as_ref(),
        })
    }

    pub fn loser_slot(&self) -> Option<&MatchSlot> {
        let winner = self.winner_id?;
        self.opponent_of(winner)
    }
}
