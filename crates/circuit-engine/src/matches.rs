//! Match engine
//!
//! Drives the match state machine: scheduling, check-in, result submission
//! with mutual confirmation, disputes, admin override, forfeits, and the
//! post-completion fan-out (standings update, winner/loser advancement,
//! bracket progress, cache invalidation).
//!
//! Concurrent submissions and confirmations are serialized by the
//! optimistic version on the match row; contended operations retry a
//! bounded number of times.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{info, warn};
use uuid::Uuid;

use circuit_core::{
    AdminOverride, BracketStatus, CacheStore, Dispute, EngineError, EngineResult, GameStat, Match,
    MatchFilter, MatchOrder, MatchStatus, MatchType, Page, SortDir, Store, Tournament,
};

use crate::bracket::resolve_runtime_byes;
use crate::leaderboard::invalidate_tournament;
use crate::standings;
use crate::tx::in_tx;

/// Bounded retries when optimistic updates collide.
const VERSION_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct SubmitResultRequest {
    pub match_id: Uuid,
    pub submitted_by: Uuid,
    pub winner_id: Uuid,
    pub participant1_score: u32,
    pub participant2_score: u32,
    pub games_played: Option<u32>,
    pub game_stats: Vec<GameStat>,
}

#[derive(Debug, Clone)]
pub enum DisputeRuling {
    /// Admin decides the outcome outright.
    Decide {
        winner_id: Uuid,
        participant1_score: u32,
        participant2_score: u32,
    },
    /// Send the match back for replay.
    Replay,
}

#[derive(Debug, Clone)]
pub struct AdminOverrideRequest {
    pub match_id: Uuid,
    pub admin_id: Uuid,
    pub reason: String,
    pub winner_id: Uuid,
    pub participant1_score: u32,
    pub participant2_score: u32,
}

pub struct MatchService {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheStore>,
}

impl MatchService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn CacheStore>) -> Self {
        Self { store, cache }
    }

    pub async fn get(&self, match_id: Uuid) -> EngineResult<Match> {
        self.store
            .matches()
            .find_by_id(match_id)
            .await?
            .ok_or_else(|| EngineError::not_found("match", match_id))
    }

    pub async fn list(
        &self,
        filter: &MatchFilter,
        order: MatchOrder,
        page: Page,
    ) -> EngineResult<Vec<Match>> {
        self.store.matches().find_many(filter, order, page).await
    }

    /// Matches scheduled from now onward, soonest first.
    pub async fn upcoming(&self, tournament_id: Uuid, page: Page) -> EngineResult<Vec<Match>> {
        let filter = MatchFilter {
            tournament_id: Some(tournament_id),
            statuses: Some(vec![MatchStatus::Scheduled, MatchStatus::CheckIn]),
            scheduled_after: Some(Utc::now()),
            ..Default::default()
        };
        self.store
            .matches()
            .find_many(&filter, MatchOrder::ScheduledAt(SortDir::Asc), page)
            .await
    }

    pub async fn disputed(&self, tournament_id: Uuid) -> EngineResult<Vec<Match>> {
        let filter = MatchFilter {
            tournament_id: Some(tournament_id),
            statuses: Some(vec![MatchStatus::Disputed]),
            ..Default::default()
        };
        self.store
            .matches()
            .find_many(&filter, MatchOrder::RoundAndNumber, Page::all())
            .await
    }

    /// Assign times to every pending match with both slots filled: walk in
    /// (round, match number) order from the tournament start, one interval
    /// apart, with an extra interval between rounds.
    pub async fn auto_schedule(&self, tournament_id: Uuid) -> EngineResult<Vec<Match>> {
        let tournament = self.tournament(tournament_id).await?;
        let start = tournament.start_date.ok_or_else(|| {
            EngineError::PreconditionFailed(format!(
                "tournament {} has no start date to schedule from",
                tournament_id
            ))
        })?;
        let interval = Duration::minutes(tournament.match_interval_minutes.max(1) as i64);

        in_tx(&self.store, move |s| {
            Box::pin(async move {
                let filter = MatchFilter {
                    tournament_id: Some(tournament_id),
                    statuses: Some(vec![MatchStatus::Pending]),
                    ..Default::default()
                };
                let pending = s
                    .matches()
                    .find_many(&filter, MatchOrder::RoundAndNumber, Page::all())
                    .await?;

                let mut cursor = start;
                let mut last_round: Option<u32> = None;
                let mut scheduled = Vec::new();
                for mut m in pending {
                    if !m.has_both_participants() {
                        continue;
                    }
                    if let Some(prev) = last_round {
                        if m.round != prev {
                            cursor += interval;
                        }
                    }
                    last_round = Some(m.round);
                    m.scheduled_at = Some(cursor);
                    m.transition_to(MatchStatus::Scheduled)?;
                    scheduled.push(s.matches().update(&m).await?);
                    cursor += interval;
                }
                Ok(scheduled)
            })
        })
        .await
    }

    /// Explicitly schedule one match.
    pub async fn schedule(&self, match_id: Uuid, at: DateTime<Utc>) -> EngineResult<Match> {
        let mut m = self.get(match_id).await?;
        if !m.has_both_participants() {
            return Err(EngineError::PreconditionFailed(format!(
                "match {} is still waiting for participants",
                match_id
            )));
        }
        m.transition_to(MatchStatus::Scheduled)?;
        m.scheduled_at = Some(at);
        self.store.matches().update(&m).await
    }

    pub async fn postpone(&self, match_id: Uuid) -> EngineResult<Match> {
        let mut m = self.get(match_id).await?;
        m.transition_to(MatchStatus::Postponed)?;
        self.store.matches().update(&m).await
    }

    /// Participant check-in; idempotent per side. Both sides in starts the
    /// match.
    pub async fn check_in(&self, match_id: Uuid, participant_id: Uuid) -> EngineResult<Match> {
        let mut m = self.get(match_id).await?;
        let side = m.side_of(participant_id).ok_or_else(|| {
            EngineError::PreconditionFailed(format!(
                "participant {} is not in match {}",
                participant_id, match_id
            ))
        })?;

        if !matches!(m.status, MatchStatus::Scheduled | MatchStatus::CheckIn) {
            return Err(EngineError::illegal_transition(
                "match",
                m.status,
                MatchStatus::CheckIn,
            ));
        }

        let now = Utc::now();
        match side {
            circuit_core::Side::One => {
                if !m.participant1_checked_in {
                    m.participant1_checked_in = true;
                    m.participant1_checked_in_at = Some(now);
                }
            }
            circuit_core::Side::Two => {
                if !m.participant2_checked_in {
                    m.participant2_checked_in = true;
                    m.participant2_checked_in_at = Some(now);
                }
            }
        }

        if m.status == MatchStatus::Scheduled {
            m.transition_to(MatchStatus::CheckIn)?;
        }
        if m.participant1_checked_in && m.participant2_checked_in {
            m.transition_to(MatchStatus::InProgress)?;
            m.started_at = Some(now);
        }
        self.store.matches().update(&m).await
    }

    /// Submit a result; the submitter's side is auto-confirmed and the
    /// match waits for the opponent.
    pub async fn submit_result(&self, req: SubmitResultRequest) -> EngineResult<Match> {
        let mut attempt = 0;
        loop {
            let result = self.try_submit(&req).await;
            match result {
                Err(ref e) if e.is_conflict() && attempt < VERSION_RETRIES => {
                    attempt += 1;
                    continue;
                }
                other => return other,
            }
        }
    }

    async fn try_submit(&self, req: &SubmitResultRequest) -> EngineResult<Match> {
        let mut m = self.get(req.match_id).await?;
        if !m.status.accepts_results() {
            return Err(EngineError::illegal_transition(
                "match",
                m.status,
                MatchStatus::AwaitingConfirmation,
            ));
        }
        let winner_side = m.side_of(req.winner_id).ok_or_else(|| {
            EngineError::PreconditionFailed(format!(
                "winner {} is not a participant of match {}",
                req.winner_id, req.match_id
            ))
        })?;
        let submitter_side = m.side_of(req.submitted_by).ok_or_else(|| {
            EngineError::PreconditionFailed(format!(
                "participant {} is not in match {}",
                req.submitted_by, req.match_id
            ))
        })?;

        m.participant1_score = req.participant1_score;
        m.participant2_score = req.participant2_score;
        m.winner_id = Some(req.winner_id);
        m.loser_id = match winner_side {
            circuit_core::Side::One => m.participant2.as_ref().map(|p| p.participant_id),
            circuit_core::Side::Two => m.participant1.as_ref().map(|p| p.participant_id),
        };
        m.games_played = req
            .games_played
            .unwrap_or(req.participant1_score + req.participant2_score);
        m.game_stats = req.game_stats.clone();
        m.transition_to(MatchStatus::AwaitingConfirmation)?;
        match submitter_side {
            circuit_core::Side::One => m.participant1_confirmed = true,
            circuit_core::Side::Two => m.participant2_confirmed = true,
        }
        self.store.matches().update(&m).await
    }

    /// Confirm or reject a submitted result. Both confirmations complete
    /// the match and run the fan-out exactly once.
    pub async fn confirm_result(
        &self,
        match_id: Uuid,
        participant_id: Uuid,
        accept: bool,
        reason: Option<String>,
    ) -> EngineResult<Match> {
        let mut attempt = 0;
        loop {
            match self
                .try_confirm(match_id, participant_id, accept, reason.clone())
                .await
            {
                Err(e) if e.is_conflict() && attempt < VERSION_RETRIES => {
                    attempt += 1;
                    continue;
                }
                Ok(m) => {
                    invalidate_tournament(&self.cache, m.tournament_id).await;
                    return Ok(m);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_confirm(
        &self,
        match_id: Uuid,
        participant_id: Uuid,
        accept: bool,
        reason: Option<String>,
    ) -> EngineResult<Match> {
        let m = self.get(match_id).await?;
        if m.status != MatchStatus::AwaitingConfirmation {
            return Err(EngineError::illegal_transition(
                "match",
                m.status,
                if accept {
                    MatchStatus::Completed
                } else {
                    MatchStatus::Disputed
                },
            ));
        }
        let side = m.side_of(participant_id).ok_or_else(|| {
            EngineError::PreconditionFailed(format!(
                "participant {} is not in match {}",
                participant_id, match_id
            ))
        })?;

        if !accept {
            let mut m = m;
            m.transition_to(MatchStatus::Disputed)?;
            m.dispute = Some(Dispute {
                raised_by: participant_id,
                reason: reason.unwrap_or_else(|| "result rejected".to_string()),
                raised_at: Utc::now(),
                resolved_by: None,
                resolution: None,
                resolved_at: None,
            });
            return self.store.matches().update(&m).await;
        }

        in_tx(&self.store, move |s| {
            Box::pin(async move {
                let mut m = s
                    .matches()
                    .find_by_id(match_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("match", match_id))?;
                if m.status != MatchStatus::AwaitingConfirmation {
                    return Err(EngineError::illegal_transition(
                        "match",
                        m.status,
                        MatchStatus::Completed,
                    ));
                }
                match side {
                    circuit_core::Side::One => m.participant1_confirmed = true,
                    circuit_core::Side::Two => m.participant2_confirmed = true,
                }
                if m.participant1_confirmed && m.participant2_confirmed {
                    m.transition_to(MatchStatus::Completed)?;
                    m.completed_at = Some(Utc::now());
                    let m = s.matches().update(&m).await?;
                    fan_out(s, &m).await?;
                    Ok(m)
                } else {
                    s.matches().update(&m).await
                }
            })
        })
        .await
    }

    /// Raise a dispute against the submitted result.
    pub async fn raise_dispute(
        &self,
        match_id: Uuid,
        participant_id: Uuid,
        reason: String,
    ) -> EngineResult<Match> {
        let mut m = self.get(match_id).await?;
        if m.side_of(participant_id).is_none() {
            return Err(EngineError::PreconditionFailed(format!(
                "participant {} is not in match {}",
                participant_id, match_id
            )));
        }
        m.transition_to(MatchStatus::Disputed)?;
        m.dispute = Some(Dispute {
            raised_by: participant_id,
            reason,
            raised_at: Utc::now(),
            resolved_by: None,
            resolution: None,
            resolved_at: None,
        });
        self.store.matches().update(&m).await
    }

    /// Admin resolution: decide the outcome (completing the match and
    /// rebuilding standings) or send it back for replay.
    pub async fn resolve_dispute(
        &self,
        match_id: Uuid,
        admin_id: Uuid,
        ruling: DisputeRuling,
    ) -> EngineResult<Match> {
        let m = self.get(match_id).await?;
        if m.status != MatchStatus::Disputed {
            return Err(EngineError::PreconditionFailed(format!(
                "match {} is not disputed",
                match_id
            )));
        }

        match ruling {
            DisputeRuling::Replay => {
                let mut m = m;
                m.transition_to(MatchStatus::InProgress)?;
                m.winner_id = None;
                m.loser_id = None;
                m.participant1_score = 0;
                m.participant2_score = 0;
                m.participant1_confirmed = false;
                m.participant2_confirmed = false;
                if let Some(dispute) = m.dispute.as_mut() {
                    dispute.resolved_by = Some(admin_id);
                    dispute.resolution = Some("replay ordered".to_string());
                    dispute.resolved_at = Some(Utc::now());
                }
                self.store.matches().update(&m).await
            }
            DisputeRuling::Decide {
                winner_id,
                participant1_score,
                participant2_score,
            } => {
                let updated = in_tx(&self.store, move |s| {
                    Box::pin(async move {
                        let mut m = s
                            .matches()
                            .find_by_id(match_id)
                            .await?
                            .ok_or_else(|| EngineError::not_found("match", match_id))?;
                        if m.side_of(winner_id).is_none() {
                            return Err(EngineError::PreconditionFailed(format!(
                                "winner {} is not a participant of match {}",
                                winner_id, match_id
                            )));
                        }
                        m.winner_id = Some(winner_id);
                        m.loser_id = m.opponent_of(winner_id).map(|p| p.participant_id);
                        m.participant1_score = participant1_score;
                        m.participant2_score = participant2_score;
                        m.participant1_confirmed = true;
                        m.participant2_confirmed = true;
                        m.admin_override = Some(AdminOverride {
                            admin_id,
                            reason: "dispute resolved".to_string(),
                            overridden_at: Utc::now(),
                        });
                        if let Some(dispute) = m.dispute.as_mut() {
                            dispute.resolved_by = Some(admin_id);
                            dispute.resolution = Some("outcome decided".to_string());
                            dispute.resolved_at = Some(Utc::now());
                        }
                        m.transition_to(MatchStatus::Completed)?;
                        m.completed_at = Some(Utc::now());
                        let m = s.matches().update(&m).await?;

                        // Overridden outcomes rebuild standings from the log
                        // rather than trusting incremental state.
                        let tournament = tournament_of(s, m.tournament_id).await?;
                        advance(s, &tournament, &m).await?;
                        resolve_runtime_byes(s, tournament.id).await?;
                        update_bracket_progress(s, tournament.id).await?;
                        standings::recalculate(s, tournament.id, tournament.format).await?;
                        Ok(m)
                    })
                })
                .await?;
                invalidate_tournament(&self.cache, updated.tournament_id).await;
                Ok(updated)
            }
        }
    }

    /// Admin override from any state: records the audit trail, forces both
    /// confirmations, completes, and rebuilds standings.
    pub async fn admin_override(&self, req: AdminOverrideRequest) -> EngineResult<Match> {
        let req2 = req.clone();
        let updated = in_tx(&self.store, move |s| {
            Box::pin(async move {
                let mut m = s
                    .matches()
                    .find_by_id(req2.match_id)
                    .await?
                    .ok_or_else(|| EngineError::not_found("match", req2.match_id))?;
                if m.side_of(req2.winner_id).is_none() {
                    return Err(EngineError::PreconditionFailed(format!(
                        "winner {} is not a participant of match {}",
                        req2.winner_id, req2.match_id
                    )));
                }
                let was_terminal = m.status.is_terminal();
                m.winner_id = Some(req2.winner_id);
                m.loser_id = m.opponent_of(req2.winner_id).map(|p| p.participant_id);
                m.participant1_score = req2.participant1_score;
                m.participant2_score = req2.participant2_score;
                m.participant1_confirmed = true;
                m.participant2_confirmed = true;
                m.admin_override = Some(AdminOverride {
                    admin_id: req2.admin_id,
                    reason: req2.reason.clone(),
                    overridden_at: Utc::now(),
                });
                // Overrides bypass the transition table by design.
                m.status = MatchStatus::Completed;
                m.completed_at = Some(Utc::now());
                m.updated_at = Utc::now();
                let m = s.matches().update(&m).await?;

                let tournament = tournament_of(s, m.tournament_id).await?;
                if !was_terminal {
                    advance(s, &tournament, &m).await?;
                    resolve_runtime_byes(s, tournament.id).await?;
                }
                update_bracket_progress(s, tournament.id).await?;
                standings::recalculate(s, tournament.id, tournament.format).await?;
                Ok(m)
            })
        })
        .await?;
        info!(match_id = %req.match_id, admin = %req.admin_id, "admin override applied");
        invalidate_tournament(&self.cache, updated.tournament_id).await;
        Ok(updated)
    }

    /// Assign a game server and mint a lobby code for the participants.
    pub async fn assign_server(&self, match_id: Uuid, server_id: String) -> EngineResult<Match> {
        let mut m = self.get(match_id).await?;
        m.server_id = Some(server_id);
        if m.lobby_code.is_none() {
            m.lobby_code = Some(generate_lobby_code());
        }
        self.store.matches().update(&m).await
    }

    /// Guarded manual status move.
    pub async fn update_status(&self, match_id: Uuid, status: MatchStatus) -> EngineResult<Match> {
        let mut m = self.get(match_id).await?;
        m.transition_to(status)?;
        self.store.matches().update(&m).await
    }

    /// Advisory result-manipulation heuristics; flags only, never enforces.
    pub async fn detect_manipulation(&self, match_id: Uuid) -> EngineResult<Vec<String>> {
        let m = self.get(match_id).await?;
        let mut flags = Vec::new();

        let past_play = matches!(
            m.status,
            MatchStatus::AwaitingConfirmation
                | MatchStatus::Disputed
                | MatchStatus::Completed
        );
        if past_play && m.participant1_score == 0 && m.participant2_score == 0 && !m.is_bye {
            flags.push(format!(
                "match {} reports a 0-0 score after play",
                m.match_number
            ));
        }
        if m.games_played > 0
            && m.participant1_score + m.participant2_score != m.games_played
        {
            flags.push(format!(
                "match {} scores {}-{} do not add up to {} games played",
                m.match_number, m.participant1_score, m.participant2_score, m.games_played
            ));
        }

        if !flags.is_empty() {
            warn!(match_id = %match_id, flags = flags.len(), "result manipulation heuristics tripped");
        }
        Ok(flags)
    }

    async fn tournament(&self, id: Uuid) -> EngineResult<Tournament> {
        self.store
            .tournaments()
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::not_found("tournament", id))
    }
}

fn generate_lobby_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

pub(crate) async fn tournament_of(store: &dyn Store, id: Uuid) -> EngineResult<Tournament> {
    store
        .tournaments()
        .find_by_id(id)
        .await?
        .ok_or_else(|| EngineError::not_found("tournament", id))
}

/// Post-completion fan-out: standings, advancement, starved-bye resolution,
/// bracket progress, rerank. Runs inside the caller's transaction.
pub(crate) async fn fan_out(store: &dyn Store, m: &Match) -> EngineResult<()> {
    let tournament = tournament_of(store, m.tournament_id).await?;
    standings::record_result(store, m).await?;
    advance(store, &tournament, m).await?;
    resolve_runtime_byes(store, tournament.id).await?;
    update_bracket_progress(store, tournament.id).await?;
    standings::rerank(store, tournament.id, tournament.format).await?;
    Ok(())
}

/// Winner advancement, loser routing, elimination bookkeeping, and the
/// grand-finals reset trigger.
pub(crate) async fn advance(
    store: &dyn Store,
    tournament: &Tournament,
    m: &Match,
) -> EngineResult<()> {
    let winner_id = match m.winner_id {
        Some(id) => id,
        None => return Ok(()),
    };

    // Winner forward.
    if let Some(next_id) = m.next_match_id {
        let mut next = store
            .matches()
            .find_by_id(next_id)
            .await?
            .ok_or_else(|| EngineError::not_found("match", next_id))?;
        let slot = m
            .winner_slot()
            .cloned()
            .ok_or_else(|| EngineError::Integrity("winner not present in match slots".into()))?;
        if next.side_of(winner_id).is_none() {
            next.fill_first_empty_slot(slot)?;
            store.matches().update(&next).await?;
        }
    }

    // Loser routing or elimination.
    if let Some(loser_slot) = m.loser_slot().cloned() {
        if let Some(loser_next_id) = m.loser_next_match_id {
            let mut next = store
                .matches()
                .find_by_id(loser_next_id)
                .await?
                .ok_or_else(|| EngineError::not_found("match", loser_next_id))?;
            if next.side_of(loser_slot.participant_id).is_none() {
                next.fill_first_empty_slot(loser_slot)?;
                store.matches().update(&next).await?;
            }
        } else {
            let eliminate = match m.match_type {
                // A winners-bracket loss with no losers edge is single elim.
                MatchType::Winners => {
                    tournament.format == circuit_core::TournamentFormat::SingleElimination
                }
                MatchType::Losers | MatchType::GrandFinalsReset => true,
                // The first grand final is decisive unless the losers
                // champion just forced the reset.
                MatchType::GrandFinals => {
                    !tournament.grand_finals_reset
                        || losers_champion_of(store, m).await? != Some(winner_id)
                }
                MatchType::Swiss | MatchType::RoundRobin => false,
            };
            if eliminate {
                let mut standing =
                    standings::standing_of(store, m.tournament_id, loser_slot.participant_id)
                        .await?;
                standing.is_eliminated = true;
                standing.eliminated_in_round = Some(m.round);
                standing.eliminated_by = Some(winner_id);
                store.standings().update(&standing).await?;
            }
        }
    }

    // Grand finals reset: the losers champion taking the first grand final
    // forces one more match with the same pair.
    if m.match_type == MatchType::GrandFinals
        && tournament.grand_finals_reset
        && losers_champion_of(store, m).await? == Some(winner_id)
    {
        create_reset_match(store, m).await?;
    }

    Ok(())
}

/// The participant who reached the grand final through the losers bracket:
/// winner of the losers final, or the winners-final loser in a two-player
/// bracket where the loser drops straight to the final.
async fn losers_champion_of(store: &dyn Store, grand_final: &Match) -> EngineResult<Option<Uuid>> {
    let feeders = store
        .matches()
        .find_many(
            &MatchFilter {
                tournament_id: Some(grand_final.tournament_id),
                ..Default::default()
            },
            MatchOrder::RoundAndNumber,
            Page::all(),
        )
        .await?;
    Ok(feeders.iter().find_map(|f| {
        if f.next_match_id == Some(grand_final.id) && f.match_type == MatchType::Losers {
            f.winner_id
        } else if f.loser_next_match_id == Some(grand_final.id) {
            f.loser_id
        } else {
            None
        }
    }))
}

pub(crate) async fn create_reset_match(store: &dyn Store, grand_final: &Match) -> EngineResult<()> {
    // Only one reset per tournament.
    let filter = MatchFilter {
        bracket_id: Some(grand_final.bracket_id),
        ..Default::default()
    };
    let existing = store
        .matches()
        .find_many(&filter, MatchOrder::RoundAndNumber, Page::all())
        .await?;
    if existing
        .iter()
        .any(|m| m.match_type == MatchType::GrandFinalsReset)
    {
        return Ok(());
    }

    let mut reset = Match::new(
        grand_final.tournament_id,
        grand_final.bracket_id,
        grand_final.round + 1,
        existing.iter().map(|m| m.match_number).max().unwrap_or(0) + 1,
        MatchType::GrandFinalsReset,
    );
    reset.participant1 = grand_final.participant1.clone();
    reset.participant2 = grand_final.participant2.clone();
    store.matches().insert(&reset).await?;

    if let Some(mut bracket) = store.brackets().find_by_id(grand_final.bracket_id).await? {
        bracket.total_matches += 1;
        bracket.total_rounds = bracket.total_rounds.max(reset.round);
        store.brackets().update(&bracket).await?;
    }

    info!(match_id = %reset.id, "grand finals reset match created");
    Ok(())
}

/// Recompute every bracket's counters and status from its matches.
pub(crate) async fn update_bracket_progress(
    store: &dyn Store,
    tournament_id: Uuid,
) -> EngineResult<()> {
    let brackets = store
        .brackets()
        .find_many(
            &circuit_core::BracketFilter {
                tournament_id: Some(tournament_id),
                ..Default::default()
            },
            Page::all(),
        )
        .await?;

    for bracket in brackets {
        let matches = store
            .matches()
            .find_many(
                &MatchFilter {
                    bracket_id: Some(bracket.id),
                    ..Default::default()
                },
                MatchOrder::RoundAndNumber,
                Page::all(),
            )
            .await?;

        let completed = matches
            .iter()
            .filter(|m| m.status == MatchStatus::Completed)
            .count() as u32;
        let closed = matches.iter().filter(|m| m.status.is_terminal()).count() as u32;
        let current_round = matches
            .iter()
            .filter(|m| m.status == MatchStatus::Completed)
            .map(|m| m.round)
            .max()
            .unwrap_or(0);

        let mut bracket = bracket;
        bracket.completed_matches = completed;
        bracket.current_round = current_round;
        bracket.total_matches = matches.len() as u32;
        // A Swiss bracket creates its rounds one at a time, so the graph
        // being fully played only closes it once every round exists.
        let rounds_outstanding = bracket.bracket_type == circuit_core::BracketType::Swiss
            && matches.iter().map(|m| m.round).max().unwrap_or(0) < bracket.total_rounds;
        // Generation-time byes alone do not start a bracket; the first real
        // result does, which keeps reseeding legal until play begins.
        bracket.status = if !matches.is_empty()
            && closed == bracket.total_matches
            && !rounds_outstanding
        {
            BracketStatus::Completed
        } else if completed > bracket.bye_count {
            BracketStatus::InProgress
        } else {
            bracket.status
        };
        store.brackets().update(&bracket).await?;
    }
    Ok(())
}

/// Forfeit one match in favor of `winner_id` (or close it with no winner
/// when the slot opposite the removed participant is empty) and fan out.
pub(crate) async fn forfeit_match(
    store: &dyn Store,
    tournament: &Tournament,
    mut m: Match,
    winner_id: Option<Uuid>,
) -> EngineResult<()> {
    m.transition_to(MatchStatus::Forfeit)?;
    if let Some(winner) = winner_id {
        m.winner_id = Some(winner);
        m.loser_id = m.opponent_of(winner).map(|p| p.participant_id);
        if m.side_of(winner) == Some(circuit_core::Side::One) {
            m.participant1_score = 1;
            m.participant2_score = 0;
        } else {
            m.participant1_score = 0;
            m.participant2_score = 1;
        }
    }
    m.completed_at = Some(Utc::now());
    let m = store.matches().update(&m).await?;

    standings::record_result(store, &m).await?;
    advance(store, tournament, &m).await?;
    Ok(())
}
