//! Bracket entity - one match graph owned by a tournament
//!
//! A tournament owns one bracket per graph it plays: a single winners
//! bracket for single elimination, winners + losers + grand finals for
//! double elimination, one bracket for Swiss or round robin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::tournament::TournamentFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketType {
    Winners,
    Losers,
    GrandFinals,
    Swiss,
    RoundRobin,
    Groups,
}

impl BracketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BracketType::Winners => "winners",
            BracketType::Losers => "losers",
            BracketType::GrandFinals => "grand_finals",
            BracketType::Swiss => "swiss",
            BracketType::RoundRobin => "round_robin",
            BracketType::Groups => "groups",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "winners" => Some(BracketType::Winners),
            "losers" => Some(BracketType::Losers),
            "grand_finals" => Some(BracketType::GrandFinals),
            "swiss" => Some(BracketType::Swiss),
            "round_robin" => Some(BracketType::RoundRobin),
            "groups" => Some(BracketType::Groups),
            _ => None,
        }
    }
}

impl std::fmt::Display for BracketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketStatus {
    Pending,
    Generated,
    InProgress,
    Completed,
}

impl BracketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BracketStatus::Pending => "pending",
            BracketStatus::Generated => "generated",
            BracketStatus::InProgress => "in_progress",
            BracketStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BracketStatus::Pending),
            "generated" => Some(BracketStatus::Generated),
            "in_progress" => Some(BracketStatus::InProgress),
            "completed" => Some(BracketStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for BracketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A seed snapshot entry, persisted at generation time so reseeds and
/// audits can reconstruct the original order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedEntry {
    pub participant_id: Uuid,
    pub display_name: String,
    pub seed: u32,
}

/// One participant slot in the visualization payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    pub participant_id: Option<Uuid>,
    pub display_name: Option<String>,
    pub seed: Option<u32>,
}

/// One match node in the visualization payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchNode {
    pub match_number: u32,
    pub round: u32,
    pub participant1: SlotView,
    pub participant2: SlotView,
    pub next_match_number: Option<u32>,
    pub loser_next_match_number: Option<u32>,
    pub is_bye: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundView {
    pub round: u32,
    pub matches: Vec<MatchNode>,
}

/// Structural visualization of a bracket: per-round match nodes with their
/// forward links. Consumed by any rendering layer; the engine never draws.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketView {
    pub rounds: Vec<RoundView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bracket {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub bracket_type: BracketType,
    pub format: TournamentFormat,
    pub status: BracketStatus,
    pub total_rounds: u32,
    /// Highest round containing a completed match; 0 before any completion.
    pub current_round: u32,
    pub total_matches: u32,
    pub completed_matches: u32,
    pub participant_count: u32,
    pub bye_count: u32,
    pub seeds: Vec<SeedEntry>,
    pub visualization: BracketView,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bracket {
    pub fn new(tournament_id: Uuid, bracket_type: BracketType, format: TournamentFormat) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            bracket_type,
            format,
            status: BracketStatus::Pending,
            total_rounds: 0,
            current_round: 0,
            total_matches: 0,
            completed_matches: 0,
            participant_count: 0,
            bye_count: 0,
            seeds: Vec::new(),
            visualization: BracketView::default(),
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }
}
