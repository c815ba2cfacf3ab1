//! Tournament controller
//!
//! Lifecycle, configuration mutations behind stage gates, listing with
//! filters, clone-as-template, and the cascades a terminal transition
//! drags along (final placements on completion, match and prize
//! cancellation on cancel, full ownership cascade on delete).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use circuit_core::{
    CacheStore, EngineError, EngineResult, MatchFilter, MatchOrder, Page, PrizeFilter,
    PrizeStatus, RegistrationType, Store, Tournament, TournamentFilter, TournamentFormat,
    TournamentOrder, TournamentStatus, Visibility,
};

use crate::leaderboard::invalidate_tournament;
use crate::standings;
use crate::tx::in_tx;
use crate::PageResult;

#[derive(Debug, Clone)]
pub struct CreateTournamentRequest {
    pub name: String,
    pub description: Option<String>,
    pub game_id: String,
    pub format: TournamentFormat,
    pub organizer_id: Uuid,
    pub team_size: Option<u32>,
    pub min_participants: Option<u32>,
    pub max_participants: Option<u32>,
    pub visibility: Option<Visibility>,
    pub registration_type: Option<RegistrationType>,
}

/// Sparse patch; gates are checked per populated field group.
#[derive(Debug, Clone, Default)]
pub struct TournamentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub format: Option<TournamentFormat>,
    pub team_size: Option<u32>,
    pub min_participants: Option<u32>,
    pub max_participants: Option<u32>,
    pub registration_type: Option<RegistrationType>,
    pub min_mmr: Option<Option<i32>>,
    pub max_mmr: Option<Option<i32>>,
    pub allowed_regions: Option<Vec<String>>,
    pub require_identity_verification: Option<bool>,
    pub prize_pool: Option<i64>,
    pub currency: Option<String>,
    pub prize_distribution: Option<BTreeMap<u32, f64>>,
    pub entry_fee: Option<i64>,
    pub stream_url: Option<Option<String>>,
    pub rules: Option<Option<String>>,
    pub visibility: Option<Visibility>,
    pub registration_start: Option<Option<DateTime<Utc>>>,
    pub registration_end: Option<Option<DateTime<Utc>>>,
    pub check_in_start: Option<Option<DateTime<Utc>>>,
    pub check_in_end: Option<Option<DateTime<Utc>>>,
    pub start_date: Option<Option<DateTime<Utc>>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub match_interval_minutes: Option<u32>,
    pub swiss_rounds: Option<Option<u32>>,
    pub grand_finals_reset: Option<bool>,
}

impl TournamentUpdate {
    fn touches_format(&self) -> bool {
        self.format.is_some()
    }

    fn touches_registration_config(&self) -> bool {
        self.team_size.is_some()
            || self.min_participants.is_some()
            || self.max_participants.is_some()
            || self.registration_type.is_some()
    }

    fn touches_entry_requirements(&self) -> bool {
        self.min_mmr.is_some()
            || self.max_mmr.is_some()
            || self.allowed_regions.is_some()
            || self.require_identity_verification.is_some()
    }

    fn touches_schedule(&self) -> bool {
        self.registration_start.is_some()
            || self.registration_end.is_some()
            || self.check_in_start.is_some()
            || self.check_in_end.is_some()
            || self.start_date.is_some()
            || self.end_date.is_some()
            || self.match_interval_minutes.is_some()
    }
}

pub struct TournamentService {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheStore>,
}

impl TournamentService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn CacheStore>) -> Self {
        Self { store, cache }
    }

    pub async fn create(&self, req: CreateTournamentRequest) -> EngineResult<Tournament> {
        let mut tournament =
            Tournament::new(req.name, req.game_id, req.format, req.organizer_id);
        if let Some(description) = req.description {
            tournament.description = description;
        }
        if let Some(team_size) = req.team_size {
            tournament.team_size = team_size;
        }
        if let Some(min) = req.min_participants {
            tournament.min_participants = min;
        }
        if let Some(max) = req.max_participants {
            tournament.max_participants = max;
        }
        if let Some(visibility) = req.visibility {
            tournament.visibility = visibility;
        }
        if let Some(registration_type) = req.registration_type {
            tournament.registration_type = registration_type;
        }

        tournament.validate()?;
        let tournament = self.store.tournaments().insert(&tournament).await?;
        info!(tournament_id = %tournament.id, name = %tournament.name, "tournament created");
        Ok(tournament)
    }

    pub async fn get(&self, id: Uuid) -> EngineResult<Tournament> {
        self.store
            .tournaments()
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found("tournament", id))
    }

    pub async fn list(
        &self,
        filter: &TournamentFilter,
        order: TournamentOrder,
        page: Page,
    ) -> EngineResult<PageResult<Tournament>> {
        let items = self.store.tournaments().find_many(filter, order, page).await?;
        let total = self.store.tournaments().count(filter).await?;
        Ok(PageResult {
            items,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    /// Apply a sparse update; each touched field group is checked against
    /// the stage gate table for the current status.
    pub async fn update(&self, id: Uuid, patch: TournamentUpdate) -> EngineResult<Tournament> {
        let mut t = self.get(id).await?;
        let status = t.status;

        if status.is_terminal() {
            return Err(EngineError::PreconditionFailed(format!(
                "tournament {} is {} and can no longer be edited",
                id, status
            )));
        }
        if patch.touches_format() && status != TournamentStatus::Draft {
            return Err(EngineError::PreconditionFailed(format!(
                "format is only editable in draft, tournament {} is {}",
                id, status
            )));
        }
        if patch.touches_registration_config()
            && !matches!(
                status,
                TournamentStatus::Draft | TournamentStatus::RegistrationOpen
            )
        {
            return Err(EngineError::PreconditionFailed(format!(
                "registration settings are frozen once registration closes, tournament {} is {}",
                id, status
            )));
        }
        if patch.touches_entry_requirements() && status != TournamentStatus::Draft {
            return Err(EngineError::PreconditionFailed(format!(
                "entry requirements are only editable in draft, tournament {} is {}",
                id, status
            )));
        }
        if patch.touches_schedule() && status == TournamentStatus::InProgress {
            return Err(EngineError::PreconditionFailed(format!(
                "schedule cannot change while tournament {} is in progress",
                id
            )));
        }

        apply_patch(&mut t, patch);
        t.validate()?;
        t.updated_at = Utc::now();
        self.store.tournaments().update(&t).await
    }

    // Focused configuration surfaces; each funnels through the same gates.

    pub async fn set_format(&self, id: Uuid, format: TournamentFormat) -> EngineResult<Tournament> {
        self.update(
            id,
            TournamentUpdate {
                format: Some(format),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn configure_registration(
        &self,
        id: Uuid,
        team_size: Option<u32>,
        min_participants: Option<u32>,
        max_participants: Option<u32>,
        registration_type: Option<RegistrationType>,
    ) -> EngineResult<Tournament> {
        self.update(
            id,
            TournamentUpdate {
                team_size,
                min_participants,
                max_participants,
                registration_type,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_entry_requirements(
        &self,
        id: Uuid,
        min_mmr: Option<i32>,
        max_mmr: Option<i32>,
        allowed_regions: Vec<String>,
        require_identity_verification: bool,
    ) -> EngineResult<Tournament> {
        self.update(
            id,
            TournamentUpdate {
                min_mmr: Some(min_mmr),
                max_mmr: Some(max_mmr),
                allowed_regions: Some(allowed_regions),
                require_identity_verification: Some(require_identity_verification),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn configure_prize_pool(
        &self,
        id: Uuid,
        prize_pool: i64,
        currency: String,
        distribution: BTreeMap<u32, f64>,
        entry_fee: Option<i64>,
    ) -> EngineResult<Tournament> {
        self.update(
            id,
            TournamentUpdate {
                prize_pool: Some(prize_pool),
                currency: Some(currency),
                prize_distribution: Some(distribution),
                entry_fee,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_schedule(&self, id: Uuid, patch: TournamentUpdate) -> EngineResult<Tournament> {
        self.update(id, patch).await
    }

    pub async fn set_rules(&self, id: Uuid, rules: Option<String>) -> EngineResult<Tournament> {
        self.update(
            id,
            TournamentUpdate {
                rules: Some(rules),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn set_visibility(&self, id: Uuid, visibility: Visibility) -> EngineResult<Tournament> {
        self.update(
            id,
            TournamentUpdate {
                visibility: Some(visibility),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn configure_streaming(
        &self,
        id: Uuid,
        stream_url: Option<String>,
    ) -> EngineResult<Tournament> {
        self.update(
            id,
            TournamentUpdate {
                stream_url: Some(stream_url),
                ..Default::default()
            },
        )
        .await
    }

    // Status transitions.

    pub async fn open_registration(&self, id: Uuid) -> EngineResult<Tournament> {
        self.transition(id, TournamentStatus::RegistrationOpen).await
    }

    pub async fn close_registration(&self, id: Uuid) -> EngineResult<Tournament> {
        self.transition(id, TournamentStatus::RegistrationClosed).await
    }

    pub async fn start_check_in(&self, id: Uuid) -> EngineResult<Tournament> {
        self.transition(id, TournamentStatus::CheckIn).await
    }

    pub async fn start(&self, id: Uuid) -> EngineResult<Tournament> {
        self.transition(id, TournamentStatus::InProgress).await
    }

    /// Complete the tournament and freeze final placements from the
    /// current ranks.
    pub async fn complete(&self, id: Uuid) -> EngineResult<Tournament> {
        let tournament = in_tx(&self.store, move |s| {
            Box::pin(async move {
                let mut t = s
                    .tournaments()
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("tournament", id))?;
                t.transition_to(TournamentStatus::Completed)?;
                t.end_date = Some(Utc::now());
                let t = s.tournaments().update(&t).await?;

                standings::rerank(s, id, t.format).await?;
                for mut standing in standings::all_standings(s, id).await? {
                    standing.final_placement = Some(standing.rank);
                    s.standings().update(&standing).await?;
                }
                Ok(t)
            })
        })
        .await?;
        invalidate_tournament(&self.cache, id).await;
        info!(tournament_id = %id, "tournament completed");
        Ok(tournament)
    }

    /// Cancel the tournament; open matches are cancelled and undistributed
    /// prizes move to cancelled (distributed rows stay untouched).
    pub async fn cancel(&self, id: Uuid) -> EngineResult<Tournament> {
        let tournament = in_tx(&self.store, move |s| {
            Box::pin(async move {
                let mut t = s
                    .tournaments()
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("tournament", id))?;
                t.transition_to(TournamentStatus::Cancelled)?;
                let t = s.tournaments().update(&t).await?;

                let open = s
                    .matches()
                    .find_many(
                        &MatchFilter {
                            tournament_id: Some(id),
                            ..Default::default()
                        },
                        MatchOrder::RoundAndNumber,
                        Page::all(),
                    )
                    .await?;
                for mut m in open {
                    if !m.status.is_terminal() {
                        m.transition_to(circuit_core::MatchStatus::Cancelled)?;
                        s.matches().update(&m).await?;
                    }
                }

                let prizes = s
                    .prizes()
                    .find_many(
                        &PrizeFilter {
                            tournament_id: Some(id),
                            ..Default::default()
                        },
                        Page::all(),
                    )
                    .await?;
                for mut prize in prizes {
                    if matches!(
                        prize.status,
                        PrizeStatus::Pending | PrizeStatus::Calculated | PrizeStatus::Failed
                    ) {
                        prize.transition_to(PrizeStatus::Cancelled)?;
                        s.prizes().update(&prize).await?;
                    }
                }
                Ok(t)
            })
        })
        .await?;
        invalidate_tournament(&self.cache, id).await;
        info!(tournament_id = %id, "tournament cancelled");
        Ok(tournament)
    }

    /// Delete the tournament and everything it owns. Refused mid-play.
    pub async fn delete(&self, id: Uuid) -> EngineResult<()> {
        let tournament = self.get(id).await?;
        if tournament.status == TournamentStatus::InProgress {
            return Err(EngineError::PreconditionFailed(format!(
                "tournament {} is in progress and cannot be deleted",
                id
            )));
        }

        in_tx(&self.store, move |s| {
            Box::pin(async move {
                s.prizes().delete_by_tournament(id).await?;
                s.standings().delete_by_tournament(id).await?;
                s.matches().delete_by_tournament(id).await?;
                s.brackets().delete_by_tournament(id).await?;
                s.registrations().delete_by_tournament(id).await?;
                s.tournaments().delete(id).await?;
                Ok(())
            })
        })
        .await?;
        invalidate_tournament(&self.cache, id).await;
        info!(tournament_id = %id, "tournament deleted");
        Ok(())
    }

    /// Clone configuration into a fresh draft owned by `organizer_id`,
    /// recording the source as the template.
    pub async fn clone_as_template(
        &self,
        source_id: Uuid,
        organizer_id: Uuid,
        name: Option<String>,
    ) -> EngineResult<Tournament> {
        let source = self.get(source_id).await?;

        let mut clone = Tournament::new(
            name.unwrap_or_else(|| format!("{} (copy)", source.name)),
            source.game_id.clone(),
            source.format,
            organizer_id,
        );
        clone.description = source.description.clone();
        clone.visibility = source.visibility;
        clone.registration_type = source.registration_type;
        clone.team_size = source.team_size;
        clone.min_participants = source.min_participants;
        clone.max_participants = source.max_participants;
        clone.min_mmr = source.min_mmr;
        clone.max_mmr = source.max_mmr;
        clone.allowed_regions = source.allowed_regions.clone();
        clone.require_identity_verification = source.require_identity_verification;
        clone.prize_pool = source.prize_pool;
        clone.currency = source.currency.clone();
        clone.prize_distribution = source.prize_distribution.clone();
        clone.entry_fee = source.entry_fee;
        clone.match_interval_minutes = source.match_interval_minutes;
        clone.swiss_rounds = source.swiss_rounds;
        clone.grand_finals_reset = source.grand_finals_reset;
        clone.rules = source.rules.clone();
        // Dates are cleared; the placeholder start keeps scheduling sane.
        clone.start_date = source.start_date;
        clone.template_id = Some(source.id);

        clone.validate()?;
        self.store.tournaments().insert(&clone).await
    }

    async fn transition(&self, id: Uuid, target: TournamentStatus) -> EngineResult<Tournament> {
        let mut t = self.get(id).await?;
        t.transition_to(target)?;
        self.store.tournaments().update(&t).await
    }
}

fn apply_patch(t: &mut Tournament, patch: TournamentUpdate) {
    if let Some(name) = patch.name {
        t.name = name;
    }
    if let Some(description) = patch.description {
        t.description = description;
    }
    if let Some(format) = patch.format {
        t.format = format;
    }
    if let Some(team_size) = patch.team_size {
        t.team_size = team_size;
    }
    if let Some(min) = patch.min_participants {
        t.min_participants = min;
    }
    if let Some(max) = patch.max_participants {
        t.max_participants = max;
    }
    if let Some(registration_type) = patch.registration_type {
        t.registration_type = registration_type;
    }
    if let Some(min_mmr) = patch.min_mmr {
        t.min_mmr = min_mmr;
    }
    if let Some(max_mmr) = patch.max_mmr {
        t.max_mmr = max_mmr;
    }
    if let Some(regions) = patch.allowed_regions {
        t.allowed_regions = regions;
    }
    if let Some(flag) = patch.require_identity_verification {
        t.require_identity_verification = flag;
    }
    if let Some(pool) = patch.prize_pool {
        t.prize_pool = pool;
    }
    if let Some(currency) = patch.currency {
        t.currency = currency;
    }
    if let Some(distribution) = patch.prize_distribution {
        t.prize_distribution = distribution;
    }
    if let Some(fee) = patch.entry_fee {
        t.entry_fee = fee;
    }
    if let Some(stream_url) = patch.stream_url {
        t.stream_url = stream_url;
    }
    if let Some(rules) = patch.rules {
        t.rules = rules;
    }
    if let Some(visibility) = patch.visibility {
        t.visibility = visibility;
    }
    if let Some(v) = patch.registration_start {
        t.registration_start = v;
    }
    if let Some(v) = patch.registration_end {
        t.registration_end = v;
    }
    if let Some(v) = patch.check_in_start {
        t.check_in_start = v;
    }
    if let Some(v) = patch.check_in_end {
        t.check_in_end = v;
    }
    if let Some(v) = patch.start_date {
        t.start_date = v;
    }
    if let Some(v) = patch.end_date {
        t.end_date = v;
    }
    if let Some(interval) = patch.match_interval_minutes {
        t.match_interval_minutes = interval;
    }
    if let Some(rounds) = patch.swiss_rounds {
        t.swiss_rounds = rounds;
    }
    if let Some(reset) = patch.grand_finals_reset {
        t.grand_finals_reset = reset;
    }
}
