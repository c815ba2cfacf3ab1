//! Single-elimination generator
//!
//! Builds the full match graph up front: round 1 pairs adjacent slots of
//! the seeding order, later rounds are empty nodes, and every match links
//! forward to `round + 1, index / 2`. Byes resolve eagerly at generation
//! and their winners are forwarded immediately.

use circuit_core::{
    Bracket, BracketStatus, BracketType, EngineError, EngineResult, Match, MatchSlot, MatchType,
    SeedEntry, Tournament,
};

use super::seeding::{bracket_size, slot_order};
use super::{build_view, Generated};

pub fn generate(tournament: &Tournament, seeds: &[SeedEntry]) -> EngineResult<Generated> {
    let n = seeds.len() as u32;
    if n < 2 {
        return Err(EngineError::PreconditionFailed(format!(
            "tournament {} needs at least 2 participants to generate a bracket, has {}",
            tournament.id, n
        )));
    }

    let mut seeds = seeds.to_vec();
    seeds.sort_by_key(|s| s.seed);
    let seeds = seeds.as_slice();

    let size = bracket_size(n);
    let rounds = size.trailing_zeros();
    let order = slot_order(size);

    let mut bracket = Bracket::new(tournament.id, BracketType::Winners, tournament.format);
    bracket.total_rounds = rounds;
    bracket.participant_count = n;
    bracket.seeds = seeds.to_vec();

    let mut matches: Vec<Match> = Vec::with_capacity(size as usize - 1);
    let mut match_number = 0u32;

    // Round 1 from the seeding order, later rounds as empty nodes.
    for round in 1..=rounds {
        let count = size >> round;
        for i in 0..count {
            match_number += 1;
            let mut m = Match::new(
                tournament.id,
                bracket.id,
                round,
                match_number,
                MatchType::Winners,
            );
            m.best_of = best_of_for(tournament);
            if round == 1 {
                let p1_seed = order[(2 * i) as usize];
                let p2_seed = order[(2 * i + 1) as usize];
                m.participant1 = seed_to_slot(seeds, p1_seed);
                m.participant2 = seed_to_slot(seeds, p2_seed);
            }
            matches.push(m);
        }
    }

    // Patch winner edges: round r match i feeds round r+1 match i/2.
    patch_forward_edges(&mut matches, rounds, size);

    // Eager byes: a lone slot wins 1-0 and advances now.
    let mut byes = 0u32;
    for idx in 0..matches.len() {
        let needs_bye = matches[idx].round == 1
            && matches[idx].participant1.is_some() != matches[idx].participant2.is_some();
        if needs_bye {
            byes += 1;
            matches[idx].complete_as_bye()?;
            let winner = matches[idx]
                .winner_slot()
                .cloned()
                .ok_or_else(|| EngineError::Integrity("bye completed without winner".into()))?;
            let next_id = matches[idx].next_match_id;
            if let Some(next_id) = next_id {
                let next = matches
                    .iter_mut()
                    .find(|m| m.id == next_id)
                    .ok_or_else(|| EngineError::Integrity("dangling winner edge".into()))?;
                next.fill_first_empty_slot(winner)?;
            }
        }
    }

    bracket.total_matches = matches.len() as u32;
    bracket.completed_matches = byes;
    bracket.bye_count = byes;
    bracket.current_round = if byes > 0 { 1 } else { 0 };
    bracket.status = BracketStatus::Generated;
    bracket.visualization = build_view(&matches, rounds);

    Ok(Generated {
        bracket,
        matches,
    })
}

fn best_of_for(tournament: &Tournament) -> u32 {
    tournament
        .metadata
        .get("best_of")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
        .unwrap_or(1)
}

pub(super) fn seed_to_slot(seeds: &[SeedEntry], seed_index: u32) -> Option<MatchSlot> {
    seeds.get(seed_index as usize).map(|entry| MatchSlot {
        participant_id: entry.participant_id,
        display_name: entry.display_name.clone(),
        seed: Some(entry.seed),
    })
}

/// Wire `next_match_id` for a balanced elimination tree laid out round by
/// round in `matches`.
pub(super) fn patch_forward_edges(matches: &mut [Match], rounds: u32, size: u32) {
    // Offsets of each round's first match in the flat vec.
    let mut offsets = Vec::with_capacity(rounds as usize);
    let mut offset = 0usize;
    for round in 1..=rounds {
        offsets.push(offset);
        offset += (size >> round) as usize;
    }

    for round in 1..rounds {
        let count = (size >> round) as usize;
        let this_start = offsets[(round - 1) as usize];
        let next_start = offsets[round as usize];
        for i in 0..count {
            let next_id = matches[next_start + i / 2].id;
            matches[this_start + i].next_match_id = Some(next_id);
        }
    }
}
