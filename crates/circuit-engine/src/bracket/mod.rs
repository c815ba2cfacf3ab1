//! Bracket generation and maintenance
//!
//! One generator per format behind a single dispatch; byes, reseeding,
//! disqualification cascades, grand-finals resets, and the structural
//! visualization payload all live here. Matches carry the forward edges;
//! brackets only summarize.

pub mod double_elim;
pub mod round_robin;
pub mod seeding;
pub mod single_elim;
pub mod swiss;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use circuit_core::{
    Bracket, BracketFilter, BracketStatus, BracketType, BracketView, CacheStore, EngineError,
    EngineResult, Match, MatchFilter, MatchNode, MatchOrder, MatchStatus, MatchType, Page,
    RegistrationFilter, RegistrationOrder, RegistrationStatus, RoundView, SeedEntry, SlotView,
    StandingOrder, Store, Tournament, TournamentFormat, TournamentStatus,
};

use crate::leaderboard::invalidate_tournament;
use crate::matches::{
    create_reset_match, forfeit_match, tournament_of, update_bracket_progress,
};
use crate::standings;
use crate::tx::in_tx;

/// One generated bracket with its wired matches, ready to persist.
#[derive(Debug, Clone)]
pub struct Generated {
    pub bracket: Bracket,
    pub matches: Vec<Match>,
}

/// Build the structural visualization payload from wired matches.
pub(crate) fn build_view(matches: &[Match], total_rounds: u32) -> BracketView {
    let numbers: HashMap<Uuid, u32> = matches.iter().map(|m| (m.id, m.match_number)).collect();

    let slot_view = |slot: &Option<circuit_core::MatchSlot>| match slot {
        Some(s) => SlotView {
            participant_id: Some(s.participant_id),
            display_name: Some(s.display_name.clone()),
            seed: s.seed,
        },
        None => SlotView {
            participant_id: None,
            display_name: None,
            seed: None,
        },
    };

    let mut rounds = Vec::new();
    for round in 1..=total_rounds {
        let mut nodes: Vec<MatchNode> = matches
            .iter()
            .filter(|m| m.round == round)
            .map(|m| MatchNode {
                match_number: m.match_number,
                round: m.round,
                participant1: slot_view(&m.participant1),
                participant2: slot_view(&m.participant2),
                next_match_number: m.next_match_id.and_then(|id| numbers.get(&id).copied()),
                loser_next_match_number: m
                    .loser_next_match_id
                    .and_then(|id| numbers.get(&id).copied()),
                is_bye: m.is_bye,
            })
            .collect();
        nodes.sort_by_key(|n| n.match_number);
        if !nodes.is_empty() {
            rounds.push(RoundView { round, matches: nodes });
        }
    }
    BracketView { rounds }
}

/// Resolve matches that can never fill both slots: when every feeder is
/// terminal, a single-slot match completes as a bye and forwards its
/// winner, and an empty one is removed (at generation) or cancelled (at
/// runtime). Returns (all changed ids, newly byed ids).
pub(crate) fn resolve_ready(
    matches: &mut Vec<Match>,
    remove_empty: bool,
) -> EngineResult<(HashSet<Uuid>, Vec<Uuid>)> {
    let mut changed: HashSet<Uuid> = HashSet::new();
    let mut byed: Vec<Uuid> = Vec::new();

    'outer: loop {
        let index_of: HashMap<Uuid, usize> =
            matches.iter().enumerate().map(|(i, m)| (m.id, i)).collect();
        let mut feeders: HashMap<Uuid, Vec<usize>> = HashMap::new();
        for (idx, m) in matches.iter().enumerate() {
            for target in [m.next_match_id, m.loser_next_match_id].into_iter().flatten() {
                if index_of.contains_key(&target) {
                    feeders.entry(target).or_default().push(idx);
                }
            }
        }

        for idx in 0..matches.len() {
            let m = &matches[idx];
            if m.status.is_terminal() || m.has_both_participants() {
                continue;
            }
            let all_feeders_done = feeders
                .get(&m.id)
                .map(|f| f.iter().all(|i| matches[*i].status.is_terminal()))
                .unwrap_or(true);
            if !all_feeders_done {
                continue;
            }

            let filled =
                m.participant1.is_some() as usize + m.participant2.is_some() as usize;
            match filled {
                1 => {
                    matches[idx].complete_as_bye()?;
                    changed.insert(matches[idx].id);
                    byed.push(matches[idx].id);

                    let winner = matches[idx].winner_slot().cloned().ok_or_else(|| {
                        EngineError::Integrity("bye completed without winner".into())
                    })?;
                    if let Some(next_id) = matches[idx].next_match_id {
                        if let Some(&next_idx) = index_of.get(&next_id) {
                            if matches[next_idx].side_of(winner.participant_id).is_none() {
                                matches[next_idx].fill_first_empty_slot(winner)?;
                                changed.insert(matches[next_idx].id);
                            }
                        }
                    }
                    continue 'outer;
                }
                0 => {
                    if remove_empty {
                        matches.remove(idx);
                    } else {
                        matches[idx].transition_to(MatchStatus::Cancelled)?;
                        changed.insert(matches[idx].id);
                    }
                    continue 'outer;
                }
                _ => {}
            }
        }
        break;
    }

    Ok((changed, byed))
}

/// Generation-time wrapper: starved matches are dropped from the graph.
pub(crate) fn resolve_generated_byes(matches: &mut Vec<Match>) -> EngineResult<()> {
    resolve_ready(matches, true).map(|_| ())
}

/// Runtime wrapper over the store: persists every change and records bye
/// wins into standings. Idempotent.
pub(crate) async fn resolve_runtime_byes(
    store: &dyn Store,
    tournament_id: Uuid,
) -> EngineResult<Vec<Uuid>> {
    let filter = MatchFilter {
        tournament_id: Some(tournament_id),
        ..Default::default()
    };
    let mut matches = store
        .matches()
        .find_many(&filter, MatchOrder::RoundAndNumber, Page::all())
        .await?;

    let (changed, byed) = resolve_ready(&mut matches, false)?;
    if changed.is_empty() {
        return Ok(Vec::new());
    }

    for m in matches.iter().filter(|m| changed.contains(&m.id)) {
        store.matches().update(m).await?;
    }
    for id in &byed {
        if let Some(m) = matches.iter().find(|m| m.id == *id) {
            standings::record_result(store, m).await?;
        }
    }
    Ok(changed.into_iter().collect())
}

pub struct BracketService {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheStore>,
}

impl BracketService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn CacheStore>) -> Self {
        Self { store, cache }
    }

    pub async fn get(&self, bracket_id: Uuid) -> EngineResult<Bracket> {
        self.store
            .brackets()
            .find_by_id(bracket_id)
            .await?
            .ok_or_else(|| EngineError::not_found("bracket", bracket_id))
    }

    pub async fn list_by_tournament(&self, tournament_id: Uuid) -> EngineResult<Vec<Bracket>> {
        self.store
            .brackets()
            .find_many(
                &BracketFilter {
                    tournament_id: Some(tournament_id),
                    ..Default::default()
                },
                Page::all(),
            )
            .await
    }

    /// The persisted structural payload for rendering layers.
    pub async fn visualize(&self, bracket_id: Uuid) -> EngineResult<BracketView> {
        Ok(self.get(bracket_id).await?.visualization)
    }

    /// Full structural export: bracket summary plus every match.
    pub async fn export(&self, bracket_id: Uuid) -> EngineResult<serde_json::Value> {
        let bracket = self.get(bracket_id).await?;
        let matches = self
            .store
            .matches()
            .find_many(
                &MatchFilter {
                    bracket_id: Some(bracket_id),
                    ..Default::default()
                },
                MatchOrder::RoundAndNumber,
                Page::all(),
            )
            .await?;
        serde_json::to_value(serde_json::json!({
            "bracket": bracket,
            "matches": matches,
        }))
        .map_err(|e| EngineError::Integrity(format!("bracket export serialization: {}", e)))
    }

    /// Generate the match graph for the tournament's format. Seeds come
    /// from the request, or from confirmed registrations otherwise.
    pub async fn generate(
        &self,
        tournament_id: Uuid,
        seeds: Option<Vec<SeedEntry>>,
    ) -> EngineResult<Vec<Bracket>> {
        let tournament = tournament_of(self.store.as_ref(), tournament_id).await?;
        if !matches!(
            tournament.status,
            TournamentStatus::RegistrationClosed
                | TournamentStatus::CheckIn
                | TournamentStatus::InProgress
        ) {
            return Err(EngineError::PreconditionFailed(format!(
                "tournament {} cannot generate brackets while {}",
                tournament_id, tournament.status
            )));
        }
        let existing = self.list_by_tournament(tournament_id).await?;
        if !existing.is_empty() {
            return Err(EngineError::Conflict(format!(
                "tournament {} already has {} bracket(s)",
                tournament_id,
                existing.len()
            )));
        }

        let seeds = match seeds {
            Some(seeds) => seeds,
            None => self.seeds_from_registrations(tournament_id).await?,
        };
        if (seeds.len() as u32) < tournament.min_participants {
            return Err(EngineError::PreconditionFailed(format!(
                "tournament {} needs {} participants, has {}",
                tournament_id,
                tournament.min_participants,
                seeds.len()
            )));
        }

        let generated = dispatch_generate(&tournament, &seeds)?;
        let brackets = self
            .persist_generated(&tournament, &seeds, generated, false)
            .await?;
        invalidate_tournament(&self.cache, tournament_id).await;
        info!(
            tournament_id = %tournament_id,
            brackets = brackets.len(),
            "brackets generated"
        );
        Ok(brackets)
    }

    /// Re-run starved-bye resolution over a bracket's tournament. Safe to
    /// call repeatedly; a second invocation changes nothing.
    pub async fn handle_byes(&self, bracket_id: Uuid) -> EngineResult<Vec<Uuid>> {
        let bracket = self.get(bracket_id).await?;
        let tournament_id = bracket.tournament_id;
        let changed = in_tx(&self.store, move |s| {
            Box::pin(async move {
                let changed = resolve_runtime_byes(s, tournament_id).await?;
                if !changed.is_empty() {
                    update_bracket_progress(s, tournament_id).await?;
                    let t = tournament_of(s, tournament_id).await?;
                    standings::rerank(s, tournament_id, t.format).await?;
                }
                Ok(changed)
            })
        })
        .await?;
        if !changed.is_empty() {
            invalidate_tournament(&self.cache, tournament_id).await;
        }
        Ok(changed)
    }

    /// Throw away every match and regenerate with new seeds. Only legal
    /// before play begins (all brackets still `generated`).
    pub async fn reseed(
        &self,
        tournament_id: Uuid,
        seeds: Option<Vec<SeedEntry>>,
    ) -> EngineResult<Vec<Bracket>> {
        let tournament = tournament_of(self.store.as_ref(), tournament_id).await?;
        let brackets = self.list_by_tournament(tournament_id).await?;
        if brackets.is_empty() {
            return Err(EngineError::not_found("brackets for tournament", tournament_id));
        }
        if brackets.iter().any(|b| b.status != BracketStatus::Generated) {
            return Err(EngineError::PreconditionFailed(format!(
                "tournament {} bracket already has played matches; reseed refused",
                tournament_id
            )));
        }

        let seeds = match seeds {
            Some(seeds) => seeds,
            None => self.seeds_from_standings(tournament_id).await?,
        };

        let generated = dispatch_generate(&tournament, &seeds)?;
        let brackets = self
            .persist_generated(&tournament, &seeds, generated, true)
            .await?;
        invalidate_tournament(&self.cache, tournament_id).await;
        Ok(brackets)
    }

    /// Disqualify a participant: the standing is marked, and every
    /// unfinished match they sit in forfeits in the opponent's favor.
    pub async fn disqualify(
        &self,
        tournament_id: Uuid,
        participant_id: Uuid,
    ) -> EngineResult<()> {
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                let tournament = tournament_of(s, tournament_id).await?;

                let mut standing =
                    standings::standing_of(s, tournament_id, participant_id).await?;
                standing.is_disqualified = true;
                standing.is_eliminated = true;
                s.standings().update(&standing).await?;

                let filter = MatchFilter {
                    tournament_id: Some(tournament_id),
                    participant_id: Some(participant_id),
                    ..Default::default()
                };
                let affected = s
                    .matches()
                    .find_many(&filter, MatchOrder::RoundAndNumber, Page::all())
                    .await?;

                for m in affected {
                    if m.status.is_terminal() {
                        continue;
                    }
                    let winner = m.opponent_of(participant_id).map(|p| p.participant_id);
                    forfeit_match(s, &tournament, m, winner).await?;
                }

                resolve_runtime_byes(s, tournament_id).await?;
                update_bracket_progress(s, tournament_id).await?;
                standings::rerank(s, tournament_id, tournament.format).await?;
                Ok(())
            })
        })
        .await?;
        invalidate_tournament(&self.cache, tournament_id).await;
        info!(tournament_id = %tournament_id, participant = %participant_id, "participant disqualified");
        Ok(())
    }

    /// Explicit grand-finals reset: a fresh deciding match with the same
    /// pair, one round later.
    pub async fn bracket_reset(&self, tournament_id: Uuid) -> EngineResult<Match> {
        let store = self.store.clone();
        in_tx(&store, move |s| {
            Box::pin(async move {
                let brackets = s
                    .brackets()
                    .find_many(
                        &BracketFilter {
                            tournament_id: Some(tournament_id),
                            bracket_type: Some(BracketType::GrandFinals),
                        },
                        Page::all(),
                    )
                    .await?;
                let finals = brackets.into_iter().next().ok_or_else(|| {
                    EngineError::not_found("grand finals bracket for tournament", tournament_id)
                })?;

                let matches = s
                    .matches()
                    .find_many(
                        &MatchFilter {
                            bracket_id: Some(finals.id),
                            ..Default::default()
                        },
                        MatchOrder::RoundAndNumber,
                        Page::all(),
                    )
                    .await?;
                let grand_final = matches
                    .iter()
                    .find(|m| {
                        m.match_type == MatchType::GrandFinals
                            && m.status == MatchStatus::Completed
                    })
                    .ok_or_else(|| {
                        EngineError::PreconditionFailed(format!(
                            "tournament {} has no completed grand final to reset",
                            tournament_id
                        ))
                    })?;

                create_reset_match(s, grand_final).await?;
                let reset = s
                    .matches()
                    .find_many(
                        &MatchFilter {
                            bracket_id: Some(finals.id),
                            ..Default::default()
                        },
                        MatchOrder::RoundAndNumber,
                        Page::all(),
                    )
                    .await?
                    .into_iter()
                    .find(|m| m.match_type == MatchType::GrandFinalsReset)
                    .ok_or_else(|| {
                        EngineError::Integrity("reset match missing after creation".into())
                    })?;
                Ok(reset)
            })
        })
        .await
    }

    /// Pair the next Swiss round from the current standings.
    pub async fn swiss_pair_round(&self, tournament_id: Uuid) -> EngineResult<Vec<Match>> {
        let created = in_tx(&self.store, move |s| {
            Box::pin(async move {
                let tournament = tournament_of(s, tournament_id).await?;
                if tournament.format != TournamentFormat::Swiss {
                    return Err(EngineError::PreconditionFailed(format!(
                        "tournament {} is not Swiss",
                        tournament_id
                    )));
                }

                let mut bracket = s
                    .brackets()
                    .find_many(
                        &BracketFilter {
                            tournament_id: Some(tournament_id),
                            bracket_type: Some(BracketType::Swiss),
                        },
                        Page::all(),
                    )
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        EngineError::not_found("swiss bracket for tournament", tournament_id)
                    })?;

                let existing = s
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

                let last_round = existing.iter().map(|m| m.round).max().unwrap_or(0);
                if existing
                    .iter()
                    .any(|m| m.round == last_round && !m.status.is_terminal())
                {
                    return Err(EngineError::PreconditionFailed(format!(
                        "swiss round {} still has open matches",
                        last_round
                    )));
                }
                let next_round = last_round + 1;
                if next_round > bracket.total_rounds {
                    return Err(EngineError::PreconditionFailed(format!(
                        "tournament {} already played all {} swiss rounds",
                        tournament_id, bracket.total_rounds
                    )));
                }

                // Prior pairings and bye history from the existing graph.
                let mut prior = HashSet::new();
                let mut had_bye = HashSet::new();
                for m in &existing {
                    match (&m.participant1, &m.participant2) {
                        (Some(a), Some(b)) => {
                            prior.insert(swiss::pair_key(a.participant_id, b.participant_id));
                        }
                        _ => {
                            if let Some(winner) = m.winner_id {
                                had_bye.insert(winner);
                            }
                        }
                    }
                }

                let mut field = standings::all_standings(s, tournament_id)
                    .await?
                    .into_iter()
                    .filter(|st| !st.is_eliminated && !st.is_disqualified)
                    .collect::<Vec<_>>();
                swiss::sort_for_pairing(&mut field);
                let names: HashMap<Uuid, (String, Option<u32>)> = field
                    .iter()
                    .map(|st| (st.participant_id, (st.display_name.clone(), st.seed)))
                    .collect();

                let pairing = swiss::pair_round(&field, &prior, &had_bye);

                let mut number = existing.iter().map(|m| m.match_number).max().unwrap_or(0);
                let mut created = Vec::new();
                let slot = |id: Uuid, names: &HashMap<Uuid, (String, Option<u32>)>| {
                    let (name, seed) = names.get(&id).cloned().unwrap_or_default();
                    circuit_core::MatchSlot {
                        participant_id: id,
                        display_name: name,
                        seed,
                    }
                };

                for (a, b, rematch) in &pairing.pairs {
                    number += 1;
                    let mut m = Match::new(
                        tournament_id,
                        bracket.id,
                        next_round,
                        number,
                        MatchType::Swiss,
                    );
                    m.participant1 = Some(slot(*a, &names));
                    m.participant2 = Some(slot(*b, &names));
                    if *rematch {
                        m.metadata = serde_json::json!({ "rematch": true });
                    }
                    created.push(s.matches().insert(&m).await?);
                }
                if let Some(bye_id) = pairing.bye {
                    number += 1;
                    let mut m = Match::new(
                        tournament_id,
                        bracket.id,
                        next_round,
                        number,
                        MatchType::Swiss,
                    );
                    m.participant1 = Some(slot(bye_id, &names));
                    m.complete_as_bye()?;
                    let m = s.matches().insert(&m).await?;
                    standings::record_result(s, &m).await?;
                    bracket.bye_count += 1;
                    created.push(m);
                }

                bracket.total_matches += created.len() as u32;
                bracket.completed_matches += created.iter().filter(|m| m.is_bye).count() as u32;
                s.brackets().update(&bracket).await?;
                standings::rerank(s, tournament_id, tournament.format).await?;
                Ok(created)
            })
        })
        .await?;
        invalidate_tournament(&self.cache, tournament_id).await;
        Ok(created)
    }

    /// Persist brackets and matches in one transaction; `wipe_existing`
    /// clears the previous graph first (the reseed path).
    async fn persist_generated(
        &self,
        tournament: &Tournament,
        seeds: &[SeedEntry],
        generated: Vec<Generated>,
        wipe_existing: bool,
    ) -> EngineResult<Vec<Bracket>> {
        let tournament = tournament.clone();
        let seeds = seeds.to_vec();
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                if wipe_existing {
                    s.matches().delete_by_tournament(tournament.id).await?;
                    s.brackets().delete_by_tournament(tournament.id).await?;
                }
                let mut brackets = Vec::with_capacity(generated.len());
                for g in &generated {
                    brackets.push(s.brackets().insert(&g.bracket).await?);
                    for m in &g.matches {
                        s.matches().insert(m).await?;
                    }
                }

                // Snapshot seeds into standings and credit bye wins.
                for entry in &seeds {
                    if let Ok(mut standing) =
                        standings::standing_of(s, tournament.id, entry.participant_id).await
                    {
                        standing.seed = Some(entry.seed);
                        s.standings().update(&standing).await?;
                    }
                }
                for g in &generated {
                    for m in g.matches.iter().filter(|m| m.is_bye) {
                        standings::record_result(s, m).await?;
                    }
                }
                standings::rerank(s, tournament.id, tournament.format).await?;
                Ok(brackets)
            })
        })
        .await
    }

    /// Ordered seed list from confirmed/checked-in registrations: explicit
    /// seeds first, the rest by MMR descending with earlier registration
    /// breaking ties.
    async fn seeds_from_registrations(
        &self,
        tournament_id: Uuid,
    ) -> EngineResult<Vec<SeedEntry>> {
        let regs = self
            .store
            .registrations()
            .find_many(
                &RegistrationFilter {
                    tournament_id: Some(tournament_id),
                    statuses: Some(vec![
                        RegistrationStatus::Confirmed,
                        RegistrationStatus::CheckedIn,
                    ]),
                    ..Default::default()
                },
                RegistrationOrder::CreatedAt(circuit_core::SortDir::Asc),
                Page::all(),
            )
            .await?;

        let mut regs = regs;
        regs.sort_by(|a, b| {
            match (a.seed, b.seed) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => b
                    .mmr
                    .unwrap_or(i32::MIN)
                    .cmp(&a.mmr.unwrap_or(i32::MIN))
                    .then(a.created_at.cmp(&b.created_at)),
            }
        });

        Ok(regs
            .into_iter()
            .enumerate()
            .map(|(i, r)| SeedEntry {
                participant_id: r.participant_id,
                display_name: r.display_name,
                seed: i as u32 + 1,
            })
            .collect())
    }

    /// Seed list from current standings order (rank ascending).
    async fn seeds_from_standings(&self, tournament_id: Uuid) -> EngineResult<Vec<SeedEntry>> {
        let standings = self
            .store
            .standings()
            .find_many(
                &circuit_core::StandingFilter {
                    tournament_id: Some(tournament_id),
                    ..Default::default()
                },
                StandingOrder::default(),
                Page::all(),
            )
            .await?;
        let mut standings = standings;
        standings.sort_by_key(|s| if s.rank == 0 { u32::MAX } else { s.rank });
        Ok(standings
            .into_iter()
            .enumerate()
            .map(|(i, s)| SeedEntry {
                participant_id: s.participant_id,
                display_name: s.display_name,
                seed: i as u32 + 1,
            })
            .collect())
    }
}

/// Format dispatch; no trait objects needed, the tag is enough.
fn dispatch_generate(
    tournament: &Tournament,
    seeds: &[SeedEntry],
) -> EngineResult<Vec<Generated>> {
    match tournament.format {
        TournamentFormat::SingleElimination => {
            Ok(vec![single_elim::generate(tournament, seeds)?])
        }
        TournamentFormat::DoubleElimination => double_elim::generate(tournament, seeds),
        TournamentFormat::RoundRobin => Ok(vec![round_robin::generate(tournament, seeds)?]),
        TournamentFormat::Swiss => Ok(vec![swiss::generate(tournament, seeds)?]),
    }
}
