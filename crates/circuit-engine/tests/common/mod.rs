//! In-memory test doubles for the engine's ports plus scenario helpers.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use circuit_core::{
    Bracket, BracketFilter, BracketRepository, CacheStore, EngineConfig, EngineError,
    EngineResult, Match, MatchFilter, MatchOrder, MatchRepository, Page, Prize, PrizeFilter,
    PrizeRepository, Registration, RegistrationFilter, RegistrationOrder, RegistrationRepository,
    SortDir, Standing, StandingFilter, StandingOrder, StandingRepository, Store, Tournament,
    TournamentFilter, TournamentFormat, TournamentOrder, TournamentRepository, TransferOutcome,
    TransferRequest, TxWork, WalletHandle, WalletService,
};
use circuit_engine::{
    BracketService, LeaderboardService, MatchService, PrizeService, RegistrationService,
    StandingsService, SubmitResultRequest, TournamentService,
};

/// Hash-map backed store. `run` serializes transactions behind one lock;
/// rollback is not simulated, which the scenario tests never rely on.
#[derive(Default)]
pub struct MemStore {
    tournaments: Mutex<HashMap<Uuid, Tournament>>,
    registrations: Mutex<HashMap<Uuid, Registration>>,
    brackets: Mutex<HashMap<Uuid, Bracket>>,
    matches: Mutex<HashMap<Uuid, Match>>,
    standings: Mutex<HashMap<Uuid, Standing>>,
    prizes: Mutex<HashMap<Uuid, Prize>>,
    tx_gate: tokio::sync::Mutex<()>,
}

fn paginate<T>(mut items: Vec<T>, page: Page) -> Vec<T> {
    let start = (page.offset() as usize).min(items.len());
    let end = start
        .saturating_add(page.limit as usize)
        .min(items.len());
    items.drain(..start);
    items.truncate(end - start);
    items
}

fn poisoned() -> EngineError {
    EngineError::Integrity("test store lock poisoned".to_string())
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl TournamentRepository for MemStore {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Tournament>> {
        Ok(self.tournaments.lock().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn find_many(
        &self,
        filter: &TournamentFilter,
        order: TournamentOrder,
        page: Page,
    ) -> EngineResult<Vec<Tournament>> {
        let guard = self.tournaments.lock().map_err(|_| poisoned())?;
        let mut items: Vec<Tournament> = guard
            .values()
            .filter(|t| tournament_matches(t, filter))
            .cloned()
            .collect();
        match order {
            TournamentOrder::CreatedAt(dir) => {
                items.sort_by_key(|t| t.created_at);
                if dir == SortDir::Desc {
                    items.reverse();
                }
            }
            TournamentOrder::StartDate(dir) => {
                items.sort_by_key(|t| t.start_date);
                if dir == SortDir::Desc {
                    items.reverse();
                }
            }
            TournamentOrder::Name(dir) => {
                items.sort_by(|a, b| a.name.cmp(&b.name));
                if dir == SortDir::Desc {
                    items.reverse();
                }
            }
        }
        Ok(paginate(items, page))
    }

    async fn count(&self, filter: &TournamentFilter) -> EngineResult<u64> {
        let guard = self.tournaments.lock().map_err(|_| poisoned())?;
        Ok(guard.values().filter(|t| tournament_matches(t, filter)).count() as u64)
    }

    async fn insert(&self, tournament: &Tournament) -> EngineResult<Tournament> {
        let mut guard = self.tournaments.lock().map_err(|_| poisoned())?;
        if guard.contains_key(&tournament.id) {
            return Err(EngineError::Conflict(format!(
                "tournament {} already exists",
                tournament.id
            )));
        }
        guard.insert(tournament.id, tournament.clone());
        Ok(tournament.clone())
    }

    async fn update(&self, tournament: &Tournament) -> EngineResult<Tournament> {
        let mut guard = self.tournaments.lock().map_err(|_| poisoned())?;
        if !guard.contains_key(&tournament.id) {
            return Err(EngineError::not_found("tournament", tournament.id));
        }
        guard.insert(tournament.id, tournament.clone());
        Ok(tournament.clone())
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.tournaments
            .lock()
            .map_err(|_| poisoned())?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found("tournament", id))
    }
}

fn tournament_matches(t: &Tournament, filter: &TournamentFilter) -> bool {
    if let Some(game_id) = &filter.game_id {
        if &t.game_id != game_id {
            return false;
        }
    }
    if let Some(statuses) = &filter.statuses {
        if !statuses.contains(&t.status) {
            return false;
        }
    }
    if let Some(visibility) = filter.visibility {
        if t.visibility != visibility {
            return false;
        }
    }
    if let Some(organizer_id) = filter.organizer_id {
        if t.organizer_id != organizer_id {
            return false;
        }
    }
    if let Some(format) = filter.format {
        if t.format != format {
            return false;
        }
    }
    if let Some(search) = &filter.name_search {
        if !t.name.to_lowercase().contains(&search.to_lowercase()) {
            return false;
        }
    }
    if let Some(after) = filter.starts_after {
        if t.start_date.map_or(true, |d| d < after) {
            return false;
        }
    }
    if let Some(before) = filter.starts_before {
        if t.start_date.map_or(true, |d| d > before) {
            return false;
        }
    }
    true
}

#[async_trait]
impl RegistrationRepository for MemStore {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Registration>> {
        Ok(self.registrations.lock().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn find_many(
        &self,
        filter: &RegistrationFilter,
        order: RegistrationOrder,
        page: Page,
    ) -> EngineResult<Vec<Registration>> {
        let guard = self.registrations.lock().map_err(|_| poisoned())?;
        let mut items: Vec<Registration> = guard
            .values()
            .filter(|r| registration_matches(r, filter))
            .cloned()
            .collect();
        match order {
            RegistrationOrder::CreatedAt(dir) => {
                items.sort_by_key(|r| (r.created_at, r.id));
                if dir == SortDir::Desc {
                    items.reverse();
                }
            }
            RegistrationOrder::WaitlistPosition => {
                items.sort_by_key(|r| (r.waitlist_position.unwrap_or(u32::MAX), r.created_at));
            }
        }
        Ok(paginate(items, page))
    }

    async fn count(&self, filter: &RegistrationFilter) -> EngineResult<u64> {
        let guard = self.registrations.lock().map_err(|_| poisoned())?;
        Ok(guard.values().filter(|r| registration_matches(r, filter)).count() as u64)
    }

    async fn insert(&self, registration: &Registration) -> EngineResult<Registration> {
        let mut guard = self.registrations.lock().map_err(|_| poisoned())?;
        if guard.contains_key(&registration.id) {
            return Err(EngineError::Conflict(format!(
                "registration {} already exists",
                registration.id
            )));
        }
        guard.insert(registration.id, registration.clone());
        Ok(registration.clone())
    }

    async fn update(&self, registration: &Registration) -> EngineResult<Registration> {
        let mut guard = self.registrations.lock().map_err(|_| poisoned())?;
        if !guard.contains_key(&registration.id) {
            return Err(EngineError::not_found("registration", registration.id));
        }
        guard.insert(registration.id, registration.clone());
        Ok(registration.clone())
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.registrations
            .lock()
            .map_err(|_| poisoned())?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found("registration", id))
    }

    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64> {
        let mut guard = self.registrations.lock().map_err(|_| poisoned())?;
        let before = guard.len();
        guard.retain(|_, r| r.tournament_id != tournament_id);
        Ok((before - guard.len()) as u64)
    }
}

fn registration_matches(r: &Registration, filter: &RegistrationFilter) -> bool {
    if let Some(tournament_id) = filter.tournament_id {
        if r.tournament_id != tournament_id {
            return false;
        }
    }
    if let Some(participant_id) = filter.participant_id {
        if r.participant_id != participant_id {
            return false;
        }
    }
    if let Some(team_id) = filter.team_id {
        if r.team.as_ref().map(|t| t.id) != Some(team_id) {
            return false;
        }
    }
    if let Some(statuses) = &filter.statuses {
        if !statuses.contains(&r.status) {
            return false;
        }
    }
    true
}

#[async_trait]
impl BracketRepository for MemStore {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Bracket>> {
        Ok(self.brackets.lock().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn find_many(&self, filter: &BracketFilter, page: Page) -> EngineResult<Vec<Bracket>> {
        let guard = self.brackets.lock().map_err(|_| poisoned())?;
        let mut items: Vec<Bracket> = guard
            .values()
            .filter(|b| {
                filter.tournament_id.map_or(true, |id| b.tournament_id == id)
                    && filter.bracket_type.map_or(true, |t| b.bracket_type == t)
            })
            .cloned()
            .collect();
        items.sort_by_key(|b| b.created_at);
        Ok(paginate(items, page))
    }

    async fn count(&self, filter: &BracketFilter) -> EngineResult<u64> {
        Ok(BracketRepository::find_many(self, filter, Page::all()).await?.len() as u64)
    }

    async fn insert(&self, bracket: &Bracket) -> EngineResult<Bracket> {
        let mut guard = self.brackets.lock().map_err(|_| poisoned())?;
        if guard.contains_key(&bracket.id) {
            return Err(EngineError::Conflict(format!(
                "bracket {} already exists",
                bracket.id
            )));
        }
        guard.insert(bracket.id, bracket.clone());
        Ok(bracket.clone())
    }

    async fn update(&self, bracket: &Bracket) -> EngineResult<Bracket> {
        let mut guard = self.brackets.lock().map_err(|_| poisoned())?;
        if !guard.contains_key(&bracket.id) {
            return Err(EngineError::not_found("bracket", bracket.id));
        }
        guard.insert(bracket.id, bracket.clone());
        Ok(bracket.clone())
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.brackets
            .lock()
            .map_err(|_| poisoned())?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found("bracket", id))
    }

    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64> {
        let mut guard = self.brackets.lock().map_err(|_| poisoned())?;
        let before = guard.len();
        guard.retain(|_, b| b.tournament_id != tournament_id);
        Ok((before - guard.len()) as u64)
    }
}

#[async_trait]
impl MatchRepository for MemStore {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Match>> {
        Ok(self.matches.lock().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn find_many(
        &self,
        filter: &MatchFilter,
        order: MatchOrder,
        page: Page,
    ) -> EngineResult<Vec<Match>> {
        let guard = self.matches.lock().map_err(|_| poisoned())?;
        let mut items: Vec<Match> = guard
            .values()
            .filter(|m| match_matches(m, filter))
            .cloned()
            .collect();
        match order {
            MatchOrder::RoundAndNumber => {
                items.sort_by_key(|m| (m.round, m.match_number, m.created_at));
            }
            MatchOrder::ScheduledAt(dir) => {
                items.sort_by_key(|m| (m.scheduled_at, m.match_number));
                if dir == SortDir::Desc {
                    items.reverse();
                }
            }
        }
        Ok(paginate(items, page))
    }

    async fn count(&self, filter: &MatchFilter) -> EngineResult<u64> {
        let guard = self.matches.lock().map_err(|_| poisoned())?;
        Ok(guard.values().filter(|m| match_matches(m, filter)).count() as u64)
    }

    async fn insert(&self, m: &Match) -> EngineResult<Match> {
        let mut guard = self.matches.lock().map_err(|_| poisoned())?;
        if guard.contains_key(&m.id) {
            return Err(EngineError::Conflict(format!("match {} already exists", m.id)));
        }
        guard.insert(m.id, m.clone());
        Ok(m.clone())
    }

    async fn update(&self, m: &Match) -> EngineResult<Match> {
        let mut guard = self.matches.lock().map_err(|_| poisoned())?;
        let stored = guard
            .get(&m.id)
            .ok_or_else(|| EngineError::not_found("match", m.id))?;
        if stored.version != m.version {
            return Err(EngineError::Conflict(format!(
                "match {} version {} is stale (stored {})",
                m.id, m.version, stored.version
            )));
        }
        let mut updated = m.clone();
        updated.version += 1;
        guard.insert(m.id, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.matches
            .lock()
            .map_err(|_| poisoned())?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found("match", id))
    }

    async fn delete_by_bracket(&self, bracket_id: Uuid) -> EngineResult<u64> {
        let mut guard = self.matches.lock().map_err(|_| poisoned())?;
        let before = guard.len();
        guard.retain(|_, m| m.bracket_id != bracket_id);
        Ok((before - guard.len()) as u64)
    }

    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64> {
        let mut guard = self.matches.lock().map_err(|_| poisoned())?;
        let before = guard.len();
        guard.retain(|_, m| m.tournament_id != tournament_id);
        Ok((before - guard.len()) as u64)
    }
}

fn match_matches(m: &Match, filter: &MatchFilter) -> bool {
    if let Some(tournament_id) = filter.tournament_id {
        if m.tournament_id != tournament_id {
            return false;
        }
    }
    if let Some(bracket_id) = filter.bracket_id {
        if m.bracket_id != bracket_id {
            return false;
        }
    }
    if let Some(statuses) = &filter.statuses {
        if !statuses.contains(&m.status) {
            return false;
        }
    }
    if let Some(round) = filter.round {
        if m.round != round {
            return false;
        }
    }
    if let Some(participant_id) = filter.participant_id {
        if m.side_of(participant_id).is_none() {
            return false;
        }
    }
    if let Some(after) = filter.scheduled_after {
        if m.scheduled_at.map_or(true, |at| at < after) {
            return false;
        }
    }
    if let Some(before) = filter.scheduled_before {
        if m.scheduled_at.map_or(true, |at| at > before) {
            return false;
        }
    }
    true
}

#[async_trait]
impl StandingRepository for MemStore {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Standing>> {
        Ok(self.standings.lock().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn find_many(
        &self,
        filter: &StandingFilter,
        order: StandingOrder,
        page: Page,
    ) -> EngineResult<Vec<Standing>> {
        let guard = self.standings.lock().map_err(|_| poisoned())?;
        let mut items: Vec<Standing> = guard
            .values()
            .filter(|s| {
                filter.tournament_id.map_or(true, |id| s.tournament_id == id)
                    && filter
                        .participant_id
                        .map_or(true, |id| s.participant_id == id)
                    && filter.is_eliminated.map_or(true, |e| s.is_eliminated == e)
            })
            .cloned()
            .collect();
        match order {
            StandingOrder::Rank(dir) => {
                items.sort_by_key(|s| (s.rank, s.seed.unwrap_or(u32::MAX)));
                if dir == SortDir::Desc {
                    items.reverse();
                }
            }
            StandingOrder::Points(dir) => {
                items.sort_by_key(|s| s.points);
                if dir == SortDir::Desc {
                    items.reverse();
                }
            }
            StandingOrder::Wins(dir) => {
                items.sort_by_key(|s| s.wins);
                if dir == SortDir::Desc {
                    items.reverse();
                }
            }
            StandingOrder::WinRate(dir) => {
                items.sort_by(|a, b| {
                    a.win_rate
                        .partial_cmp(&b.win_rate)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                if dir == SortDir::Desc {
                    items.reverse();
                }
            }
        }
        Ok(paginate(items, page))
    }

    async fn count(&self, filter: &StandingFilter) -> EngineResult<u64> {
        Ok(StandingRepository::find_many(self, filter, StandingOrder::default(), Page::all())
            .await?
            .len() as u64)
    }

    async fn insert(&self, standing: &Standing) -> EngineResult<Standing> {
        let mut guard = self.standings.lock().map_err(|_| poisoned())?;
        let duplicate = guard.values().any(|s| {
            s.tournament_id == standing.tournament_id
                && s.participant_id == standing.participant_id
        });
        if duplicate || guard.contains_key(&standing.id) {
            return Err(EngineError::Conflict(format!(
                "standing for participant {} already exists",
                standing.participant_id
            )));
        }
        guard.insert(standing.id, standing.clone());
        Ok(standing.clone())
    }

    async fn update(&self, standing: &Standing) -> EngineResult<Standing> {
        let mut guard = self.standings.lock().map_err(|_| poisoned())?;
        if !guard.contains_key(&standing.id) {
            return Err(EngineError::not_found("standing", standing.id));
        }
        guard.insert(standing.id, standing.clone());
        Ok(standing.clone())
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.standings
            .lock()
            .map_err(|_| poisoned())?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found("standing", id))
    }

    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64> {
        let mut guard = self.standings.lock().map_err(|_| poisoned())?;
        let before = guard.len();
        guard.retain(|_, s| s.tournament_id != tournament_id);
        Ok((before - guard.len()) as u64)
    }
}

#[async_trait]
impl PrizeRepository for MemStore {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Prize>> {
        Ok(self.prizes.lock().map_err(|_| poisoned())?.get(&id).cloned())
    }

    async fn find_many(&self, filter: &PrizeFilter, page: Page) -> EngineResult<Vec<Prize>> {
        let guard = self.prizes.lock().map_err(|_| poisoned())?;
        let mut items: Vec<Prize> = guard
            .values()
            .filter(|p| {
                filter.tournament_id.map_or(true, |id| p.tournament_id == id)
                    && filter.recipient_id.map_or(true, |id| p.recipient_id == Some(id))
                    && filter
                        .statuses
                        .as_ref()
                        .map_or(true, |statuses| statuses.contains(&p.status))
            })
            .cloned()
            .collect();
        items.sort_by_key(|p| (p.placement, p.created_at));
        Ok(paginate(items, page))
    }

    async fn count(&self, filter: &PrizeFilter) -> EngineResult<u64> {
        Ok(PrizeRepository::find_many(self, filter, Page::all()).await?.len() as u64)
    }

    async fn insert(&self, prize: &Prize) -> EngineResult<Prize> {
        let mut guard = self.prizes.lock().map_err(|_| poisoned())?;
        if guard.contains_key(&prize.id) {
            return Err(EngineError::Conflict(format!("prize {} already exists", prize.id)));
        }
        guard.insert(prize.id, prize.clone());
        Ok(prize.clone())
    }

    async fn update(&self, prize: &Prize) -> EngineResult<Prize> {
        let mut guard = self.prizes.lock().map_err(|_| poisoned())?;
        if !guard.contains_key(&prize.id) {
            return Err(EngineError::not_found("prize", prize.id));
        }
        guard.insert(prize.id, prize.clone());
        Ok(prize.clone())
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        self.prizes
            .lock()
            .map_err(|_| poisoned())?
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found("prize", id))
    }

    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64> {
        let mut guard = self.prizes.lock().map_err(|_| poisoned())?;
        let before = guard.len();
        guard.retain(|_, p| p.tournament_id != tournament_id);
        Ok((before - guard.len()) as u64)
    }
}

#[async_trait]
impl Store for MemStore {
    fn tournaments(&self) -> &dyn TournamentRepository {
        self
    }

    fn registrations(&self) -> &dyn RegistrationRepository {
        self
    }

    fn brackets(&self) -> &dyn BracketRepository {
        self
    }

    fn matches(&self) -> &dyn MatchRepository {
        self
    }

    fn standings(&self) -> &dyn StandingRepository {
        self
    }

    fn prizes(&self) -> &dyn PrizeRepository {
        self
    }

    async fn run(&self, work: TxWork) -> EngineResult<()> {
        let _gate = self.tx_gate.lock().await;
        work(self).await
    }
}

/// Wallet stub: deterministic transaction ids, scripted failures, and
/// reference-level idempotency like the real service contract.
#[derive(Default)]
pub struct StubWallet {
    wallets: Mutex<HashMap<Uuid, WalletHandle>>,
    verified: Mutex<HashSet<Uuid>>,
    fail_next: AtomicU32,
    by_reference: Mutex<HashMap<String, String>>,
    pub transfers: Mutex<Vec<TransferRequest>>,
}

impl StubWallet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register_wallet(&self, user: Uuid, verified: bool) {
        self.wallets.lock().unwrap().insert(
            user,
            WalletHandle {
                wallet_id: format!("wallet-{}", user.simple()),
                address: format!("0x{}", user.simple()),
            },
        );
        if verified {
            self.verified.lock().unwrap().insert(user);
        }
    }

    /// Make the next `n` transfers fail.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }
}

#[async_trait]
impl WalletService for StubWallet {
    async fn get_wallet(&self, user_id: Uuid) -> EngineResult<Option<WalletHandle>> {
        Ok(self.wallets.lock().unwrap().get(&user_id).cloned())
    }

    async fn transfer(&self, request: &TransferRequest) -> EngineResult<TransferOutcome> {
        self.transfers.lock().unwrap().push(request.clone());

        if self.fail_next.load(Ordering::SeqCst) > 0 {
            self.fail_next.fetch_sub(1, Ordering::SeqCst);
            return Ok(TransferOutcome::failed("wallet rejected transfer"));
        }

        let mut seen = self.by_reference.lock().unwrap();
        let next_id = format!("tx-{}", seen.len() + 1);
        let id = seen.entry(request.reference.clone()).or_insert(next_id);
        Ok(TransferOutcome::ok(id.clone()))
    }

    async fn verify_identity(&self, user_id: Uuid) -> EngineResult<bool> {
        Ok(self.verified.lock().unwrap().contains(&user_id))
    }
}

/// TTL-less cache double; tests only care about hits and invalidation.
#[derive(Default)]
pub struct MemCache {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl MemCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl CacheStore for MemCache {
    async fn get(&self, key: &str) -> EngineResult<Option<serde_json::Value>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
        _ttl: Duration,
    ) -> EngineResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> EngineResult<u64> {
        let mut guard = self.entries.lock().unwrap();
        let before = guard.len();
        guard.retain(|k, _| !k.starts_with(prefix));
        Ok((before - guard.len()) as u64)
    }
}

/// Everything a scenario needs, wired against the in-memory doubles.
pub struct Harness {
    pub store: Arc<MemStore>,
    pub cache: Arc<MemCache>,
    pub wallet: Arc<StubWallet>,
    pub tournaments: TournamentService,
    pub registrations: RegistrationService,
    pub brackets: BracketService,
    pub matches: MatchService,
    pub standings: StandingsService,
    pub prizes: PrizeService,
    pub leaderboard: LeaderboardService,
}

impl Harness {
    pub fn new() -> Self {
        let store = MemStore::new();
        let cache = MemCache::new();
        let wallet = StubWallet::new();
        let config = EngineConfig::default();

        let dyn_store: Arc<dyn Store> = store.clone();
        let dyn_cache: Arc<dyn CacheStore> = cache.clone();
        let dyn_wallet: Arc<dyn WalletService> = wallet.clone();

        Self {
            tournaments: TournamentService::new(dyn_store.clone(), dyn_cache.clone()),
            registrations: RegistrationService::new(dyn_store.clone()),
            brackets: BracketService::new(dyn_store.clone(), dyn_cache.clone()),
            matches: MatchService::new(dyn_store.clone(), dyn_cache.clone()),
            standings: StandingsService::new(dyn_store.clone()),
            prizes: PrizeService::new(dyn_store.clone(), Some(dyn_wallet), config.clone()),
            leaderboard: LeaderboardService::new(dyn_store, dyn_cache, config),
            store,
            cache,
            wallet,
        }
    }

    /// Create a tournament, register `players` participants (MMR strictly
    /// descending so seeds follow registration order), and walk it to
    /// registration closed with seeds assigned.
    pub async fn seeded_tournament(
        &self,
        format: TournamentFormat,
        players: u32,
    ) -> (Tournament, Vec<Uuid>) {
        let mut tournament = self
            .tournaments
            .create(circuit_engine::CreateTournamentRequest {
                name: format!("{} open", format.as_str()),
                description: None,
                game_id: "aim-arena".to_string(),
                format,
                organizer_id: Uuid::new_v4(),
                team_size: None,
                min_participants: Some(2),
                max_participants: Some(players.max(2)),
                visibility: None,
                registration_type: None,
            })
            .await
            .expect("create tournament");

        if format == TournamentFormat::Swiss {
            tournament = self
                .tournaments
                .update(
                    tournament.id,
                    circuit_engine::TournamentUpdate {
                        swiss_rounds: Some(Some(3)),
                        ..Default::default()
                    },
                )
                .await
                .expect("set swiss rounds");
        }
        tournament = self
            .tournaments
            .update(
                tournament.id,
                circuit_engine::TournamentUpdate {
                    start_date: Some(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .await
            .expect("set start date");

        self.tournaments
            .open_registration(tournament.id)
            .await
            .expect("open registration");

        let mut participants = Vec::with_capacity(players as usize);
        for i in 0..players {
            let participant_id = Uuid::new_v4();
            self.registrations
                .register_individual(circuit_engine::RegisterIndividualRequest {
                    tournament_id: tournament.id,
                    participant_id,
                    display_name: format!("player-{}", i + 1),
                    mmr: Some(3000 - i as i32 * 100),
                    region: None,
                    identity_verified: true,
                    entry_fee_paid: true,
                })
                .await
                .expect("register participant");
            participants.push(participant_id);
        }

        let tournament = self
            .tournaments
            .close_registration(tournament.id)
            .await
            .expect("close registration");
        self.registrations
            .seed_by_mmr(tournament.id)
            .await
            .expect("seed by mmr");

        (tournament, participants)
    }

    /// Submit and mutually confirm one result.
    pub async fn play(
        &self,
        match_id: Uuid,
        winner: Uuid,
        winner_score: u32,
        loser_score: u32,
    ) -> Match {
        let m = self.matches.get(match_id).await.expect("load match");
        let loser = m
            .opponent_of(winner)
            .map(|slot| slot.participant_id)
            .expect("match has an opponent");
        let (p1_score, p2_score) = if m.side_of(winner) == Some(circuit_core::Side::One) {
            (winner_score, loser_score)
        } else {
            (loser_score, winner_score)
        };

        self.matches
            .submit_result(SubmitResultRequest {
                match_id,
                submitted_by: winner,
                winner_id: winner,
                participant1_score: p1_score,
                participant2_score: p2_score,
                games_played: Some(winner_score + loser_score),
                game_stats: Vec::new(),
            })
            .await
            .expect("submit result");

        self.matches
            .confirm_result(match_id, loser, true, None)
            .await
            .expect("confirm result")
    }

    /// The tournament's matches in (round, number) order.
    pub async fn all_matches(&self, tournament_id: Uuid) -> Vec<Match> {
        self.matches
            .list(
                &MatchFilter {
                    tournament_id: Some(tournament_id),
                    ..Default::default()
                },
                MatchOrder::RoundAndNumber,
                Page::all(),
            )
            .await
            .expect("list matches")
    }

    pub async fn standings_by_rank(&self, tournament_id: Uuid) -> Vec<Standing> {
        self.leaderboard
            .real_time_standings(tournament_id, Page::all(), StandingOrder::default())
            .await
            .expect("load standings")
    }
}
