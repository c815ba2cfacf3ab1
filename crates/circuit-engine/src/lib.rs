//! Arena Circuit orchestration engine
//!
//! The services behind the tournament lifecycle: registration, bracket
//! generation for four formats, the match state machine with its
//! completion fan-out, standings, prize distribution, and the cached
//! leaderboard surface. Everything runs against the ports defined in
//! `circuit-core`; no persistence technology leaks in here.

pub mod bracket;
pub mod leaderboard;
pub mod matches;
pub mod prize;
pub mod registration;
pub mod standings;
pub mod tournament;
mod tx;

pub use bracket::BracketService;
pub use leaderboard::{
    GlobalEntry, GlobalLeaderboardFilter, HistoricalResult, LeaderboardService, PlayerStats,
    Timeframe,
};
pub use matches::{AdminOverrideRequest, DisputeRuling, MatchService, SubmitResultRequest};
pub use prize::{PrizePoolEntry, PrizeService, PrizeSummary};
pub use registration::{RegisterIndividualRequest, RegisterTeamRequest, RegistrationService};
pub use standings::StandingsService;
pub use tournament::{CreateTournamentRequest, TournamentService, TournamentUpdate};

/// One page of a listing plus the unpaged total.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}
