//! Standings engine
//!
//! Incremental stat updates as matches complete, Buchholz and
//! opponent-win-rate for Swiss, rank resolution with the full tie-break
//! ladder, and full recomputation from the completed-match log.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use circuit_core::{
    EngineError, EngineResult, Match, MatchFilter, MatchOrder, MatchStatus, Page, Standing,
    StandingFilter, StandingOrder, Store, TournamentFormat,
};

use crate::tx::in_tx;

/// Tie-break ladder short of head-to-head: points, wins, Buchholz, game
/// differential, games won.
fn primary_key(s: &Standing) -> (i64, u32, i64, i64, u32) {
    (
        s.points,
        s.wins,
        s.buchholz_score,
        s.game_differential(),
        s.games_won,
    )
}

fn primary_cmp(a: &Standing, b: &Standing) -> Ordering {
    primary_key(b).cmp(&primary_key(a))
}

/// Rank standings in place: sort by the primary ladder, resolve remaining
/// ties pairwise by head-to-head among the tied set, fall through to seed
/// ascending, then assign dense 1-based ranks.
pub fn rank_standings(standings: &mut [Standing], completed: &[Match]) {
    standings.sort_by(primary_cmp);

    let mut start = 0;
    while start < standings.len() {
        let mut end = start + 1;
        while end < standings.len()
            && primary_key(&standings[start]) == primary_key(&standings[end])
        {
            end += 1;
        }
        if end - start > 1 {
            resolve_tied_group(&mut standings[start..end], completed);
        }
        start = end;
    }

    for (idx, standing) in standings.iter_mut().enumerate() {
        standing.rank = idx as u32 + 1;
    }
}

/// Head-to-head wins inside the tied set; circular ties leave the counts
/// equal and fall through to seed order.
fn resolve_tied_group(group: &mut [Standing], completed: &[Match]) {
    let members: Vec<Uuid> = group.iter().map(|s| s.participant_id).collect();
    let mut h2h: HashMap<Uuid, u32> = members.iter().map(|id| (*id, 0)).collect();

    for m in completed {
        if let (Some(winner), Some(loser)) = (m.winner_id, m.loser_id) {
            if h2h.contains_key(&winner) && h2h.contains_key(&loser) {
                *h2h.entry(winner).or_default() += 1;
            }
        }
    }

    for standing in group.iter_mut() {
        standing.head_to_head_wins = h2h[&standing.participant_id];
    }

    group.sort_by(|a, b| {
        b.head_to_head_wins
            .cmp(&a.head_to_head_wins)
            .then(a.seed.unwrap_or(u32::MAX).cmp(&b.seed.unwrap_or(u32::MAX)))
    });
}

/// Matches that count toward the record: completed results plus forfeits
/// that produced a winner.
fn counts_for_record(m: &Match) -> bool {
    match m.status {
        MatchStatus::Completed => true,
        MatchStatus::Forfeit => m.winner_id.is_some(),
        _ => false,
    }
}

/// Apply one finished match to the two standings involved.
///
/// Byes update only the lone participant. Called inside the completion
/// fan-out transaction.
pub(crate) async fn record_result(store: &dyn Store, m: &Match) -> EngineResult<()> {
    let winner_id = match m.winner_id {
        Some(id) => id,
        None => return Ok(()),
    };
    let (winner_score, loser_score) = if m.side_of(winner_id) == Some(circuit_core::Side::One) {
        (m.participant1_score, m.participant2_score)
    } else {
        (m.participant2_score, m.participant1_score)
    };

    let mut winner = standing_of(store, m.tournament_id, winner_id).await?;
    winner.record_win(winner_score, loser_score);
    store.standings().update(&winner).await?;

    if let Some(loser_slot) = m.loser_slot() {
        let mut loser = standing_of(store, m.tournament_id, loser_slot.participant_id).await?;
        loser.record_loss(loser_score, winner_score);
        store.standings().update(&loser).await?;
    }

    debug!(
        match_id = %m.id,
        winner = %winner_id,
        "recorded match result into standings"
    );
    Ok(())
}

/// Recompute Buchholz and opponent win rate for every standing in the
/// tournament from its completed matches.
pub(crate) async fn recompute_tiebreaks(store: &dyn Store, tournament_id: Uuid) -> EngineResult<()> {
    let standings = all_standings(store, tournament_id).await?;
    let matches = counted_matches(store, tournament_id).await?;

    let by_participant: HashMap<Uuid, &Standing> =
        standings.iter().map(|s| (s.participant_id, s)).collect();

    let mut updated = Vec::with_capacity(standings.len());
    for standing in &standings {
        let mut opponents: Vec<Uuid> = Vec::new();
        for m in &matches {
            if m.side_of(standing.participant_id).is_some() {
                if let Some(op) = m.opponent_of(standing.participant_id) {
                    opponents.push(op.participant_id);
                }
            }
        }

        let mut s = standing.clone();
        s.buchholz_score = opponents
            .iter()
            .filter_map(|id| by_participant.get(id))
            .map(|o| o.points)
            .sum();
        s.opponent_win_rate = if opponents.is_empty() {
            0.0
        } else {
            opponents
                .iter()
                .filter_map(|id| by_participant.get(id))
                .map(|o| o.win_rate)
                .sum::<f64>()
                / opponents.len() as f64
        };
        updated.push(s);
    }

    for s in updated {
        store.standings().update(&s).await?;
    }
    Ok(())
}

/// Rerank the whole tournament; Swiss recomputes tiebreaks first.
pub(crate) async fn rerank(
    store: &dyn Store,
    tournament_id: Uuid,
    format: TournamentFormat,
) -> EngineResult<()> {
    if format == TournamentFormat::Swiss {
        recompute_tiebreaks(store, tournament_id).await?;
    }

    let mut standings = all_standings(store, tournament_id).await?;
    let matches = counted_matches(store, tournament_id).await?;
    rank_standings(&mut standings, &matches);

    for s in &standings {
        store.standings().update(s).await?;
    }
    Ok(())
}

/// Rebuild every standing from the completed-match log. Idempotent.
pub(crate) async fn recalculate(
    store: &dyn Store,
    tournament_id: Uuid,
    format: TournamentFormat,
) -> EngineResult<()> {
    let standings = all_standings(store, tournament_id).await?;
    for standing in &standings {
        let mut s = standing.clone();
        s.reset_record();
        store.standings().update(&s).await?;
    }

    let mut matches = counted_matches(store, tournament_id).await?;
    matches.sort_by(|a, b| {
        a.completed_at
            .cmp(&b.completed_at)
            .then(a.round.cmp(&b.round))
            .then(a.match_number.cmp(&b.match_number))
    });

    for m in &matches {
        record_result(store, m).await?;
    }

    rerank(store, tournament_id, format).await?;
    info!(tournament_id = %tournament_id, "standings recalculated from match log");
    Ok(())
}

pub(crate) async fn standing_of(
    store: &dyn Store,
    tournament_id: Uuid,
    participant_id: Uuid,
) -> EngineResult<Standing> {
    let filter = StandingFilter {
        tournament_id: Some(tournament_id),
        participant_id: Some(participant_id),
        ..Default::default()
    };
    store
        .standings()
        .find_many(&filter, StandingOrder::default(), Page::all())
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            EngineError::not_found("standing for participant", participant_id)
        })
}

pub(crate) async fn all_standings(
    store: &dyn Store,
    tournament_id: Uuid,
) -> EngineResult<Vec<Standing>> {
    let filter = StandingFilter {
        tournament_id: Some(tournament_id),
        ..Default::default()
    };
    store
        .standings()
        .find_many(&filter, StandingOrder::default(), Page::all())
        .await
}

async fn counted_matches(store: &dyn Store, tournament_id: Uuid) -> EngineResult<Vec<Match>> {
    let filter = MatchFilter {
        tournament_id: Some(tournament_id),
        ..Default::default()
    };
    let matches = store
        .matches()
        .find_many(&filter, MatchOrder::RoundAndNumber, Page::all())
        .await?;
    Ok(matches.into_iter().filter(counts_for_record).collect())
}

/// Public surface for standings maintenance.
pub struct StandingsService {
    store: Arc<dyn Store>,
}

impl StandingsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Rebuild all standings from the match log and rerank, atomically.
    pub async fn recalculate(&self, tournament_id: Uuid) -> EngineResult<Vec<Standing>> {
        let format = tournament_format(&self.store, tournament_id).await?;
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                recalculate(s, tournament_id, format).await?;
                all_standings(s, tournament_id).await
            })
        })
        .await
    }

    /// Explicit Buchholz / opponent-win-rate pass for any format.
    pub async fn compute_buchholz(&self, tournament_id: Uuid) -> EngineResult<Vec<Standing>> {
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                recompute_tiebreaks(s, tournament_id).await?;
                all_standings(s, tournament_id).await
            })
        })
        .await
    }
}

async fn tournament_format(
    store: &Arc<dyn Store>,
    tournament_id: Uuid,
) -> EngineResult<TournamentFormat> {
    Ok(store
        .tournaments()
        .find_by_id(tournament_id)
        .await?
        .ok_or_else(|| EngineError::not_found("tournament", tournament_id))?
        .format)
}
