//! PostgreSQL repositories, one per entity

pub mod bracket;
pub mod matches;
pub mod prize;
pub mod registration;
pub mod standing;
pub mod tournament;

pub use bracket::PgBracketRepository;
pub use matches::PgMatchRepository;
pub use prize::PgPrizeRepository;
pub use registration::PgRegistrationRepository;
pub use standing::PgStandingRepository;
pub use tournament::PgTournamentRepository;
