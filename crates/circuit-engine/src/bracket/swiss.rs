//! Swiss pairing
//!
//! Round 1 pairs by seed. Later rounds sort standings by points then
//! Buchholz, group by point total, and greedily pair each participant with
//! the earliest unpaired candidate who is not a prior opponent - floating
//! down a group when the own group is exhausted, and conceding a rematch
//! only when nothing else remains. Single-pass and deterministic by
//! construction; no backtracking.

use std::collections::HashSet;
use uuid::Uuid;

use circuit_core::{
    Bracket, BracketStatus, BracketType, EngineError, EngineResult, Match, MatchType, SeedEntry,
    Standing, Tournament,
};

use super::single_elim::seed_to_slot;
use super::{build_view, Generated};

/// Default round count when the tournament does not pin one: enough rounds
/// to separate the field, ⌈log2(n)⌉.
pub fn default_rounds(n: u32) -> u32 {
    32 - n.max(2).next_power_of_two().leading_zeros() - 1
}

/// Generate the Swiss bracket with its first round paired by seed.
pub fn generate(tournament: &Tournament, seeds: &[SeedEntry]) -> EngineResult<Generated> {
    let n = seeds.len() as u32;
    if n < 2 {
        return Err(EngineError::PreconditionFailed(format!(
            "tournament {} needs at least 2 participants to generate a bracket, has {}",
            tournament.id, n
        )));
    }

    let rounds = tournament.swiss_rounds.unwrap_or_else(|| default_rounds(n));

    let mut bracket = Bracket::new(tournament.id, BracketType::Swiss, tournament.format);
    bracket.total_rounds = rounds;
    bracket.participant_count = n;
    bracket.seeds = seeds.to_vec();

    let mut ordered: Vec<SeedEntry> = seeds.to_vec();
    ordered.sort_by_key(|s| s.seed);

    let mut matches: Vec<Match> = Vec::new();
    let mut number = 0u32;
    let mut byes = 0u32;

    // 1 vs 2, 3 vs 4, ...; an odd field gives the lowest seed a bye.
    for chunk in ordered.chunks(2) {
        number += 1;
        let mut m = Match::new(tournament.id, bracket.id, 1, number, MatchType::Swiss);
        m.participant1 = seed_to_slot(&ordered, 2 * (number - 1));
        if chunk.get(1).is_some() {
            m.participant2 = seed_to_slot(&ordered, 2 * (number - 1) + 1);
        } else {
            byes += 1;
            m.complete_as_bye()?;
        }
        matches.push(m);
    }

    bracket.total_matches = matches.len() as u32;
    bracket.completed_matches = byes;
    bracket.bye_count = byes;
    bracket.current_round = if byes > 0 { 1 } else { 0 };
    bracket.status = BracketStatus::Generated;
    bracket.visualization = build_view(&matches, rounds);

    Ok(Generated { bracket, matches })
}

/// Output of one pairing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundPairing {
    /// (higher-ranked, lower-ranked, conceded rematch).
    pub pairs: Vec<(Uuid, Uuid, bool)>,
    pub bye: Option<Uuid>,
}

/// Normalized key so (a, b) and (b, a) collide.
pub fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Sort standings into pairing order: points desc, Buchholz desc, seed asc
/// as the deterministic tail.
pub fn sort_for_pairing(standings: &mut [Standing]) {
    standings.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.buchholz_score.cmp(&a.buchholz_score))
            .then(a.seed.unwrap_or(u32::MAX).cmp(&b.seed.unwrap_or(u32::MAX)))
    });
}

/// Pair one Swiss round from sorted standings.
///
/// `prior` holds every pairing already played (normalized via [`pair_key`]);
/// `had_bye` the participants who already received their one bye.
pub fn pair_round(
    standings: &[Standing],
    prior: &HashSet<(Uuid, Uuid)>,
    had_bye: &HashSet<Uuid>,
) -> RoundPairing {
    let mut pool: Vec<Uuid> = standings.iter().map(|s| s.participant_id).collect();

    // An odd field sits somebody out first: the lowest-ranked participant
    // who has not yet taken a bye.
    let mut bye = None;
    if pool.len() % 2 == 1 {
        let idx = pool
            .iter()
            .rposition(|p| !had_bye.contains(p))
            .unwrap_or(pool.len() - 1);
        bye = Some(pool.remove(idx));
    }

    let mut paired: HashSet<Uuid> = HashSet::new();
    let mut pairs = Vec::with_capacity(pool.len() / 2);

    for i in 0..pool.len() {
        let a = pool[i];
        if paired.contains(&a) {
            continue;
        }
        paired.insert(a);

        // Earliest subsequent unpaired non-opponent; group order in the
        // sorted list makes this prefer the own score group, then float
        // down to the best candidate below.
        let partner = pool[i + 1..]
            .iter()
            .find(|b| !paired.contains(b) && !prior.contains(&pair_key(a, **b)))
            .copied();

        let (b, rematch) = match partner {
            Some(b) => (b, false),
            None => {
                // Rematch unavoidable: take the earliest unpaired anyway.
                let b = pool[i + 1..]
                    .iter()
                    .find(|b| !paired.contains(b))
                    .copied();
                match b {
                    Some(b) => (b, true),
                    None => break,
                }
            }
        };
        paired.insert(b);
        pairs.push((a, b, rematch));
    }

    RoundPairing { pairs, bye }
}
