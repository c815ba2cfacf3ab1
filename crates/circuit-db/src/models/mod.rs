//! Row models - column-shaped mirrors of the domain entities
//!
//! Status enums persist as text, nested structures (teams, disputes,
//! per-game stats, seed snapshots, visualization payloads) as JSONB.

pub mod bracket;
pub mod matches;
pub mod prize;
pub mod registration;
pub mod standing;
pub mod tournament;

pub use bracket::BracketRow;
pub use matches::MatchRow;
pub use prize::PrizeRow;
pub use registration::RegistrationRow;
pub use standing::StandingRow;
pub use tournament::TournamentRow;

use crate::DbError;

/// Decode failure for a text-encoded enum column.
pub(crate) fn bad_enum(field: &str, value: &str) -> DbError {
    DbError::Serialization(format!("unrecognized {} value: {}", field, value))
}

pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(value).map_err(|e| DbError::Serialization(e.to_string()))
}

pub(crate) fn from_json<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    field: &str,
) -> Result<T, DbError> {
    serde_json::from_value(value)
        .map_err(|e| DbError::Serialization(format!("{}: {}", field, e)))
}
