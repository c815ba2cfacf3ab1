//! Engine error taxonomy
//!
//! Every fallible operation in the engine surfaces one of these kinds.
//! Messages name the offending entity and the rule that failed, so the
//! transport layer can map them to user-facing responses without inspecting
//! internals.

use thiserror::Error;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Requested entity absent.
    #[error("{0} not found")]
    NotFound(String),

    /// Request fails a static constraint. Collects every failed rule for a
    /// single request where feasible.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Entity already exists where uniqueness is required.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation violates a state machine.
    #[error("illegal {entity} transition from {from} to {to}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Dynamic guard failed (window closed, capacity reached, already
    /// started, and so on).
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The wallet service (or another external collaborator) errored or
    /// timed out.
    #[error("external service failure: {0}")]
    External(String),

    /// An invariant check failed during a write; the surrounding
    /// transaction is aborted.
    #[error("integrity violation: {0}")]
    Integrity(String),
}

impl EngineError {
    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        EngineError::NotFound(format!("{} {}", entity, id))
    }

    pub fn illegal_transition(
        entity: &'static str,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        EngineError::IllegalTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Conflict(_))
    }
}

/// Accumulator for validation failures. A request is rejected with the full
/// list rather than the first failure only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Consume the accumulator: `Ok(())` when nothing failed, the full
    /// error set otherwise.
    pub fn into_result(self) -> EngineResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}

impl From<ValidationErrors> for EngineError {
    fn from(errs: ValidationErrors) -> Self {
        EngineError::Validation(errs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_collect_all_failures() {
        let mut errs = ValidationErrors::new();
        errs.add("mmr below minimum");
        errs.add("region not allowed");
        let err = errs.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation failed: mmr below minimum; region not allowed"
        );
    }

    #[test]
    fn empty_validation_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn illegal_transition_names_both_states() {
        let err = EngineError::illegal_transition("tournament", "completed", "draft");
        assert_eq!(
            err.to_string(),
            "illegal tournament transition from completed to draft"
        );
    }
}
