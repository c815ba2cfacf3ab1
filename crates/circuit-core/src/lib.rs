//! Arena Circuit domain model
//!
//! Entities, invariants, the error taxonomy, engine configuration, and the
//! ports (persistence, wallet, cache) the orchestration engine is wired
//! against. No I/O lives here; everything is pure types and contracts.

pub mod config;
pub mod entities;
pub mod error;
pub mod invariants;
pub mod ports;

pub use config::EngineConfig;
pub use entities::*;
pub use error::{EngineError, EngineResult, ValidationErrors};
pub use ports::*;
