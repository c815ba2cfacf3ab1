//! Registration entity - a participant's (or team's) entry into a tournament

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Waitlisted,
    CheckedIn,
    Cancelled,
    Disqualified,
    NoShow,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Waitlisted => "waitlisted",
            RegistrationStatus::CheckedIn => "checked_in",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::Disqualified => "disqualified",
            RegistrationStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RegistrationStatus::Pending),
            "confirmed" => Some(RegistrationStatus::Confirmed),
            "waitlisted" => Some(RegistrationStatus::Waitlisted),
            "checked_in" => Some(RegistrationStatus::CheckedIn),
            "cancelled" => Some(RegistrationStatus::Cancelled),
            "disqualified" => Some(RegistrationStatus::Disqualified),
            "no_show" => Some(RegistrationStatus::NoShow),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Cancelled
                | RegistrationStatus::Disqualified
                | RegistrationStatus::NoShow
        )
    }

    /// Counts against tournament capacity.
    pub fn occupies_slot(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Confirmed | RegistrationStatus::CheckedIn
        )
    }

    pub fn can_transition_to(&self, target: RegistrationStatus) -> bool {
        use RegistrationStatus::*;
        match (self, target) {
            (Pending, Confirmed) | (Pending, Waitlisted) | (Pending, Cancelled) => true,
            (Confirmed, CheckedIn) => true,
            (Confirmed, Cancelled) | (Confirmed, Disqualified) | (Confirmed, NoShow) => true,
            (Waitlisted, Confirmed) | (Waitlisted, Cancelled) => true,
            (CheckedIn, Disqualified) | (CheckedIn, NoShow) | (CheckedIn, Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Team entry details, present when the tournament's team_size > 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub members: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub participant_id: Uuid,
    pub display_name: String,
    pub team: Option<Team>,
    pub status: RegistrationStatus,
    pub seed: Option<u32>,
    pub mmr: Option<i32>,
    pub identity_verified: bool,
    pub region: Option<String>,
    pub entry_fee_paid: bool,

    // Refund bookkeeping; issuing is idempotent.
    pub refund_issued: bool,
    pub refund_amount: Option<i64>,
    pub refunded_at: Option<DateTime<Utc>>,

    /// Dense ordinal ≥ 1 while waitlisted, cleared on promotion.
    pub waitlist_position: Option<u32>,

    // Substitution audit trail
    pub substituted_from: Option<Uuid>,
    pub substituted_at: Option<DateTime<Utc>>,

    pub checked_in_at: Option<DateTime<Utc>>,

    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    pub fn new(tournament_id: Uuid, participant_id: Uuid, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tournament_id,
            participant_id,
            display_name: display_name.into(),
            team: None,
            status: RegistrationStatus::Pending,
            seed: None,
            mmr: None,
            identity_verified: false,
            region: None,
            entry_fee_paid: false,
            refund_issued: false,
            refund_amount: None,
            refunded_at: None,
            waitlist_position: None,
            substituted_from: None,
            substituted_at: None,
            checked_in_at: None,
            metadata: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition_to(&mut self, target: RegistrationStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(target) {
            return Err(EngineError::illegal_transition(
                "registration",
                self.status,
                target,
            ));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }
}
