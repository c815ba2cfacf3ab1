//! Database error types

use circuit_core::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Stale write: {0}")]
    StaleWrite(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl From<redis::RedisError> for DbError {
    fn from(err: redis::RedisError) -> Self {
        DbError::Cache(err.to_string())
    }
}

/// Map database failures into the engine taxonomy: uniqueness clashes and
/// serialization failures surface as conflicts, missing rows as not-found,
/// everything else as an integrity violation aborting the operation.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => EngineError::NotFound(what),
            DbError::Duplicate(what) => EngineError::Conflict(what),
            DbError::StaleWrite(what) => EngineError::Conflict(what),
            DbError::Sql(sqlx::Error::RowNotFound) => {
                EngineError::NotFound("database row".to_string())
            }
            DbError::Sql(sqlx::Error::Database(db)) => {
                let code = db.code().map(|c| c.to_string()).unwrap_or_default();
                match code.as_str() {
                    // unique_violation
                    "23505" => EngineError::Conflict(db.to_string()),
                    // serialization_failure | deadlock_detected
                    "40001" | "40P01" => EngineError::Conflict(db.to_string()),
                    _ => EngineError::Integrity(db.to_string()),
                }
            }
            other => EngineError::Integrity(other.to_string()),
        }
    }
}
