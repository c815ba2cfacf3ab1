//! Persistence ports
//!
//! Repository contracts implemented by secondary adapters (PostgreSQL in
//! `circuit-db`, in-memory stores in tests). The engine only ever talks to
//! these traits; the store behind them is the single source of truth.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::entities::{
    Bracket, BracketType, Match, MatchStatus, Prize, PrizeStatus, Registration,
    RegistrationStatus, Standing, Tournament, TournamentFormat, TournamentStatus, Visibility,
};
use crate::error::EngineResult;

/// 1-based pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit,
        }
    }

    /// Everything in one page; for internal scans.
    pub fn all() -> Self {
        Self {
            page: 1,
            limit: u32::MAX,
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 50 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TournamentOrder {
    CreatedAt(SortDir),
    StartDate(SortDir),
    Name(SortDir),
}

impl Default for TournamentOrder {
    fn default() -> Self {
        TournamentOrder::CreatedAt(SortDir::Desc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOrder {
    CreatedAt(SortDir),
    WaitlistPosition,
}

impl Default for RegistrationOrder {
    fn default() -> Self {
        RegistrationOrder::CreatedAt(SortDir::Asc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchOrder {
    /// (round asc, match_number asc) - generation and scheduling order.
    #[default]
    RoundAndNumber,
    ScheduledAt(SortDir),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandingOrder {
    Rank(SortDir),
    Points(SortDir),
    Wins(SortDir),
    WinRate(SortDir),
}

impl Default for StandingOrder {
    fn default() -> Self {
        StandingOrder::Rank(SortDir::Asc)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TournamentFilter {
    pub game_id: Option<String>,
    pub statuses: Option<Vec<TournamentStatus>>,
    pub visibility: Option<Visibility>,
    pub organizer_id: Option<Uuid>,
    pub format: Option<TournamentFormat>,
    /// Case-insensitive substring match on the name.
    pub name_search: Option<String>,
    pub starts_after: Option<DateTime<Utc>>,
    pub starts_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationFilter {
    pub tournament_id: Option<Uuid>,
    pub participant_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub statuses: Option<Vec<RegistrationStatus>>,
}

#[derive(Debug, Clone, Default)]
pub struct BracketFilter {
    pub tournament_id: Option<Uuid>,
    pub bracket_type: Option<BracketType>,
}

#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub tournament_id: Option<Uuid>,
    pub bracket_id: Option<Uuid>,
    pub statuses: Option<Vec<MatchStatus>>,
    pub round: Option<u32>,
    pub participant_id: Option<Uuid>,
    pub scheduled_after: Option<DateTime<Utc>>,
    pub scheduled_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct StandingFilter {
    pub tournament_id: Option<Uuid>,
    pub participant_id: Option<Uuid>,
    pub is_eliminated: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct PrizeFilter {
    pub tournament_id: Option<Uuid>,
    pub recipient_id: Option<Uuid>,
    pub statuses: Option<Vec<PrizeStatus>>,
}

#[async_trait]
pub trait TournamentRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Tournament>>;
    async fn find_many(
        &self,
        filter: &TournamentFilter,
        order: TournamentOrder,
        page: Page,
    ) -> EngineResult<Vec<Tournament>>;
    async fn count(&self, filter: &TournamentFilter) -> EngineResult<u64>;
    async fn insert(&self, tournament: &Tournament) -> EngineResult<Tournament>;
    async fn update(&self, tournament: &Tournament) -> EngineResult<Tournament>;
    async fn delete(&self, id: Uuid) -> EngineResult<()>;
}

#[async_trait]
pub trait RegistrationRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Registration>>;
    async fn find_many(
        &self,
        filter: &RegistrationFilter,
        order: RegistrationOrder,
        page: Page,
    ) -> EngineResult<Vec<Registration>>;
    async fn count(&self, filter: &RegistrationFilter) -> EngineResult<u64>;
    async fn insert(&self, registration: &Registration) -> EngineResult<Registration>;
    async fn update(&self, registration: &Registration) -> EngineResult<Registration>;
    async fn delete(&self, id: Uuid) -> EngineResult<()>;
    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64>;
}

#[async_trait]
pub trait BracketRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Bracket>>;
    async fn find_many(&self, filter: &BracketFilter, page: Page) -> EngineResult<Vec<Bracket>>;
    async fn count(&self, filter: &BracketFilter) -> EngineResult<u64>;
    async fn insert(&self, bracket: &Bracket) -> EngineResult<Bracket>;
    async fn update(&self, bracket: &Bracket) -> EngineResult<Bracket>;
    async fn delete(&self, id: Uuid) -> EngineResult<()>;
    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64>;
}

#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Match>>;
    async fn find_many(
        &self,
        filter: &MatchFilter,
        order: MatchOrder,
        page: Page,
    ) -> EngineResult<Vec<Match>>;
    async fn count(&self, filter: &MatchFilter) -> EngineResult<u64>;
    async fn insert(&self, m: &Match) -> EngineResult<Match>;
    /// Optimistic update: succeeds only when the stored row still carries
    /// `m.version`, and bumps the version on success. A stale write returns
    /// `EngineError::Conflict`.
    async fn update(&self, m: &Match) -> EngineResult<Match>;
    async fn delete(&self, id: Uuid) -> EngineResult<()>;
    async fn delete_by_bracket(&self, bracket_id: Uuid) -> EngineResult<u64>;
    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64>;
}

#[async_trait]
pub trait StandingRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Standing>>;
    async fn find_many(
        &self,
        filter: &StandingFilter,
        order: StandingOrder,
        page: Page,
    ) -> EngineResult<Vec<Standing>>;
    async fn count(&self, filter: &StandingFilter) -> EngineResult<u64>;
    async fn insert(&self, standing: &Standing) -> EngineResult<Standing>;
    async fn update(&self, standing: &Standing) -> EngineResult<Standing>;
    async fn delete(&self, id: Uuid) -> EngineResult<()>;
    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64>;
}

#[async_trait]
pub trait PrizeRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Prize>>;
    async fn find_many(&self, filter: &PrizeFilter, page: Page) -> EngineResult<Vec<Prize>>;
    async fn count(&self, filter: &PrizeFilter) -> EngineResult<u64>;
    async fn insert(&self, prize: &Prize) -> EngineResult<Prize>;
    async fn update(&self, prize: &Prize) -> EngineResult<Prize>;
    async fn delete(&self, id: Uuid) -> EngineResult<()>;
    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64>;
}

/// Work executed inside one transaction. The closure receives a store view
/// whose repository calls all share the transaction.
pub type TxWork = Box<dyn for<'a> FnOnce(&'a dyn Store) -> BoxFuture<'a, EngineResult<()>> + Send>;

/// Aggregate persistence port: one accessor per entity repository plus a
/// transactional scope.
#[async_trait]
pub trait Store: Send + Sync {
    fn tournaments(&self) -> &dyn TournamentRepository;
    fn registrations(&self) -> &dyn RegistrationRepository;
    fn brackets(&self) -> &dyn BracketRepository;
    fn matches(&self) -> &dyn MatchRepository;
    fn standings(&self) -> &dyn StandingRepository;
    fn prizes(&self) -> &dyn PrizeRepository;

    /// Run `work` atomically: all reads and writes inside the closure
    /// commit together or not at all.
    async fn run(&self, work: TxWork) -> EngineResult<()>;
}
