//! Tournament entity and its status machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult, ValidationErrors};

/// Competition format. Drives which generator builds the match graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentFormat {
    SingleElimination,
    DoubleElimination,
    Swiss,
    RoundRobin,
}

impl TournamentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentFormat::SingleElimination => "single_elimination",
            TournamentFormat::DoubleElimination => "double_elimination",
            TournamentFormat::Swiss => "swiss",
            TournamentFormat::RoundRobin => "round_robin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "single_elimination" => Some(TournamentFormat::SingleElimination),
            "double_elimination" => Some(TournamentFormat::DoubleElimination),
            "swiss" => Some(TournamentFormat::Swiss),
            "round_robin" => Some(TournamentFormat::RoundRobin),
            _ => None,
        }
    }
}

impl std::fmt::Display for TournamentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tournament lifecycle status.
///
/// The legal walk is the chain draft → registration_open →
/// registration_closed → check_in → in_progress → completed, with
/// cancellation reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    Draft,
    RegistrationOpen,
    RegistrationClosed,
    CheckIn,
    InProgress,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Draft => "draft",
            TournamentStatus::RegistrationOpen => "registration_open",
            TournamentStatus::RegistrationClosed => "registration_closed",
            TournamentStatus::CheckIn => "check_in",
            TournamentStatus::InProgress => "in_progress",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(TournamentStatus::Draft),
            "registration_open" => Some(TournamentStatus::RegistrationOpen),
            "registration_closed" => Some(TournamentStatus::RegistrationClosed),
            "check_in" => Some(TournamentStatus::CheckIn),
            "in_progress" => Some(TournamentStatus::InProgress),
            "completed" => Some(TournamentStatus::Completed),
            "cancelled" => Some(TournamentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TournamentStatus::Completed | TournamentStatus::Cancelled)
    }

    /// Static transition table.
    pub fn can_transition_to(&self, target: TournamentStatus) -> bool {
        use TournamentStatus::*;
        match (self, target) {
            (Draft, RegistrationOpen) => true,
            (RegistrationOpen, RegistrationClosed) => true,
            (RegistrationClosed, CheckIn) => true,
            (CheckIn, InProgress) => true,
            (InProgress, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who can see the tournament in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    Unlisted,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "unlisted" => Some(Visibility::Unlisted),
            _ => None,
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How participants get in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationType {
    Open,
    InviteOnly,
}

impl RegistrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationType::Open => "open",
            RegistrationType::InviteOnly => "invite_only",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(RegistrationType::Open),
            "invite_only" => Some(RegistrationType::InviteOnly),
            _ => None,
        }
    }
}

impl std::fmt::Display for RegistrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A competitive event from registration through payout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub game_id: String,
    pub format: TournamentFormat,
    pub status: TournamentStatus,
    pub visibility: Visibility,
    pub registration_type: RegistrationType,
    pub organizer_id: Uuid,

    /// 1 = solo play.
    pub team_size: u32,
    pub min_participants: u32,
    pub max_participants: u32,

    // Entry requirements
    pub min_mmr: Option<i32>,
    pub max_mmr: Option<i32>,
    pub allowed_regions: Vec<String>,
    pub require_identity_verification: bool,

    // Prize pool
    pub prize_pool: i64,
    pub currency: String,
    /// placement → percentage of pool, 0 < p ≤ 100, Σ ≤ 100.
    pub prize_distribution: BTreeMap<u32, f64>,
    pub entry_fee: i64,

    // Schedule windows
    pub registration_start: Option<DateTime<Utc>>,
    pub registration_end: Option<DateTime<Utc>>,
    pub check_in_start: Option<DateTime<Utc>>,
    pub check_in_end: Option<DateTime<Utc>>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub match_interval_minutes: u32,

    // Format knobs
    pub swiss_rounds: Option<u32>,
    pub grand_finals_reset: bool,

    pub rules: Option<String>,
    pub stream_url: Option<String>,
    /// Source tournament when cloned from a template.
    pub template_id: Option<Uuid>,

    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tournament {
    pub fn new(
        name: impl Into<String>,
        game_id: impl Into<String>,
        format: TournamentFormat,
        organizer_id: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            game_id: game_id.into(),
            format,
            status: TournamentStatus::Draft,
            visibility: Visibility::Public,
            registration_type: RegistrationType::Open,
            organizer_id,
            team_size: 1,
            min_participants: 2,
            max_participants: 16,
            min_mmr: None,
            max_mmr: None,
            allowed_regions: Vec::new(),
            require_identity_verification: false,
            prize_pool: 0,
            currency: "USD".to_string(),
            prize_distribution: BTreeMap::new(),
            entry_fee: 0,
            registration_start: None,
            registration_end: None,
            check_in_start: None,
            check_in_end: None,
            start_date: None,
            end_date: None,
            match_interval_minutes: 30,
            swiss_rounds: None,
            grand_finals_reset: false,
            rules: None,
            stream_url: None,
            template_id: None,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_team_event(&self) -> bool {
        self.team_size > 1
    }

    /// Guarded status move. Rejects anything outside the transition table
    /// with an error naming source and target.
    pub fn transition_to(&mut self, target: TournamentStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(EngineError::illegal_transition(
                "tournament",
                self.status,
                target,
            ));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Static validation of the configured limits and windows.
    pub fn validate(&self) -> EngineResult<()> {
        let mut errs = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errs.add("name must not be empty");
        }
        if self.min_participants < 2 {
            errs.add("min_participants must be at least 2");
        }
        if self.min_participants > self.max_participants {
            errs.add("min_participants must not exceed max_participants");
        }
        if self.max_participants > 1024 {
            errs.add("max_participants must not exceed 1024");
        }
        if self.team_size == 0 {
            errs.add("team_size must be at least 1");
        }
        if let (Some(min), Some(max)) = (self.min_mmr, self.max_mmr) {
            if min > max {
                errs.add("min_mmr must not exceed max_mmr");
            }
        }
        if self.format == TournamentFormat::Swiss {
            if let Some(rounds) = self.swiss_rounds {
                if rounds == 0 {
                    errs.add("swiss_rounds must be greater than zero");
                }
            }
        }

        crate::invariants::check_prize_distribution(&self.prize_distribution, &mut errs);
        crate::invariants::check_schedule_windows(self, &mut errs);

        errs.into_result()
    }
}
