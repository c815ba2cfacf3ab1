//! Double-elimination generator
//!
//! Three linked brackets: winners, losers, and grand finals. Losers-bracket
//! rounds alternate between pairing survivors among themselves and meeting
//! the losers dropping out of the winners bracket:
//!
//! - winners round 1 losers enter losers round 1;
//! - winners round k (k ≥ 2) losers enter losers round 2k − 2, with the
//!   drop-down order reversed on alternating rounds so early winners-bracket
//!   opponents do not meet again immediately;
//! - losers round r holds B / 2^(⌈r/2⌉ + 1) matches.
//!
//! The winners champion and the losers champion meet in grand finals; when
//! the reset flag is set and the losers champion takes the first grand
//! finals, the match engine spawns the deciding reset match.

use circuit_core::{
    Bracket, BracketStatus, BracketType, EngineError, EngineResult, Match, MatchType, SeedEntry,
    Tournament,
};

use super::seeding::{bracket_size, slot_order};
use super::single_elim::{patch_forward_edges, seed_to_slot};
use super::{build_view, resolve_generated_byes, Generated};

pub fn generate(tournament: &Tournament, seeds: &[SeedEntry]) -> EngineResult<Vec<Generated>> {
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
    let winners_rounds = size.trailing_zeros();
    let losers_rounds = 2 * winners_rounds.saturating_sub(1);
    let order = slot_order(size);

    // Winners bracket, same layout as single elimination.
    let mut winners_bracket = Bracket::new(tournament.id, BracketType::Winners, tournament.format);
    winners_bracket.total_rounds = winners_rounds;
    winners_bracket.participant_count = n;
    winners_bracket.seeds = seeds.to_vec();

    let mut winners: Vec<Match> = Vec::with_capacity(size as usize - 1);
    let mut number = 0u32;
    for round in 1..=winners_rounds {
        let count = size >> round;
        for i in 0..count {
            number += 1;
            let mut m = Match::new(
                tournament.id,
                winners_bracket.id,
                round,
                number,
                MatchType::Winners,
            );
            if round == 1 {
                m.participant1 = seed_to_slot(seeds, order[(2 * i) as usize]);
                m.participant2 = seed_to_slot(seeds, order[(2 * i + 1) as usize]);
            }
            winners.push(m);
        }
    }
    patch_forward_edges(&mut winners, winners_rounds, size);

    // Losers bracket nodes.
    let mut losers_bracket = Bracket::new(tournament.id, BracketType::Losers, tournament.format);
    losers_bracket.total_rounds = losers_rounds;
    losers_bracket.participant_count = n.saturating_sub(1);

    let mut losers: Vec<Match> = Vec::new();
    let mut losers_round_start: Vec<usize> = Vec::with_capacity(losers_rounds as usize);
    number = 0;
    for round in 1..=losers_rounds {
        losers_round_start.push(losers.len());
        for _ in 0..losers_round_count(size, round) {
            number += 1;
            losers.push(Match::new(
                tournament.id,
                losers_bracket.id,
                round,
                number,
                MatchType::Losers,
            ));
        }
    }

    // Winner edges inside the losers bracket: survivors of an odd round meet
    // the next drop-downs one-to-one, survivors of an even round pair up.
    for round in 1..losers_rounds {
        let start = losers_round_start[(round - 1) as usize];
        let next_start = losers_round_start[round as usize];
        let count = losers_round_count(size, round) as usize;
        for i in 0..count {
            let target = if round % 2 == 1 { i } else { i / 2 };
            losers[start + i].next_match_id = Some(losers[next_start + target].id);
        }
    }

    // Grand finals.
    let mut finals_bracket =
        Bracket::new(tournament.id, BracketType::GrandFinals, tournament.format);
    finals_bracket.total_rounds = 1;
    finals_bracket.participant_count = 2;
    let mut grand_final = Match::new(
        tournament.id,
        finals_bracket.id,
        1,
        1,
        MatchType::GrandFinals,
    );
    grand_final.best_of = 1;

    // Champions of both brackets flow into the grand final: winners champion
    // first (participant1), losers champion second.
    if let Some(winners_final) = winners.last_mut() {
        winners_final.next_match_id = Some(grand_final.id);
    }
    if let Some(losers_final) = losers.last_mut() {
        losers_final.next_match_id = Some(grand_final.id);
    }

    // Loser edges out of the winners bracket.
    let mut w_offset = 0usize;
    for round in 1..=winners_rounds {
        let count = (size >> round) as usize;
        for i in 0..count {
            let target_id = if losers_rounds == 0 {
                // Two-player bracket: the only loser goes straight to finals.
                grand_final.id
            } else if round == 1 {
                losers[i / 2].id
            } else {
                let target_round = 2 * round - 2;
                let start = losers_round_start[(target_round - 1) as usize];
                let round_count = losers_round_count(size, target_round) as usize;
                // Reverse the drop-down order on alternating rounds.
                let j = if round % 2 == 0 { round_count - 1 - i } else { i };
                losers[start + j].id
            };
            winners[w_offset + i].loser_next_match_id = Some(target_id);
        }
        w_offset += count;
    }

    // Eager byes in winners round 1, then cascade starved losers matches.
    let mut all: Vec<Match> = Vec::new();
    all.append(&mut winners);
    all.append(&mut losers);
    all.push(grand_final);

    for idx in 0..all.len() {
        let is_round_one_winners = all[idx].match_type == MatchType::Winners && all[idx].round == 1;
        if is_round_one_winners
            && all[idx].participant1.is_some() != all[idx].participant2.is_some()
        {
            all[idx].complete_as_bye()?;
            let winner = all[idx]
                .winner_slot()
                .cloned()
                .ok_or_else(|| EngineError::Integrity("bye completed without winner".into()))?;
            let next_id = all[idx].next_match_id;
            if let Some(next_id) = next_id {
                let next = all
                    .iter_mut()
                    .find(|m| m.id == next_id)
                    .ok_or_else(|| EngineError::Integrity("dangling winner edge".into()))?;
                next.fill_first_empty_slot(winner)?;
            }
        }
    }
    resolve_generated_byes(&mut all)?;

    // Split back per bracket and finalize counters.
    let winners_id = winners_bracket.id;
    let losers_id = losers_bracket.id;
    let finals_id = finals_bracket.id;
    let mut out = Vec::with_capacity(3);
    for (bracket, id, rounds) in [
        (&mut winners_bracket, winners_id, winners_rounds),
        (&mut losers_bracket, losers_id, losers_rounds),
        (&mut finals_bracket, finals_id, 1),
    ] {
        let matches: Vec<Match> = all.iter().filter(|m| m.bracket_id == id).cloned().collect();
        if matches.is_empty() && id == losers_id {
            // Two-player double elim has no losers bracket at all.
            continue;
        }
        finalize_bracket(bracket, &matches, rounds);
        out.push(Generated {
            bracket: bracket.clone(),
            matches,
        });
    }

    Ok(out)
}

/// Matches in losers round `r` of a bracket sized `size`.
fn losers_round_count(size: u32, round: u32) -> u32 {
    let halvings = round.div_ceil(2) + 1;
    (size >> halvings).max(1)
}

fn finalize_bracket(bracket: &mut Bracket, matches: &[Match], rounds: u32) {
    bracket.total_matches = matches.len() as u32;
    bracket.completed_matches = matches.iter().filter(|m| m.is_bye).count() as u32;
    bracket.bye_count = bracket.completed_matches;
    bracket.current_round = matches
        .iter()
        .filter(|m| m.status == circuit_core::MatchStatus::Completed)
        .map(|m| m.round)
        .max()
        .unwrap_or(0);
    bracket.status = BracketStatus::Generated;
    bracket.visualization = build_view(matches, rounds);
    bracket.updated_at = chrono::Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use circuit_core::TournamentFormat;
    use uuid::Uuid;

    fn seeds(n: u32) -> Vec<SeedEntry> {
        (1..=n)
            .map(|i| SeedEntry {
                participant_id: Uuid::new_v4(),
                display_name: format!("player-{}", i),
                seed: i,
            })
            .collect()
    }

    fn tournament() -> Tournament {
        let mut t = Tournament::new(
            "cup",
            "game",
            TournamentFormat::DoubleElimination,
            Uuid::new_v4(),
        );
        t.grand_finals_reset = true;
        t
    }

    #[test]
    fn four_players_produce_three_brackets() {
        let brackets = generate(&tournament(), &seeds(4)).unwrap();
        assert_eq!(brackets.len(), 3);

        let winners = &brackets[0];
        let losers = &brackets[1];
        let finals = &brackets[2];
        assert_eq!(winners.bracket.bracket_type, BracketType::Winners);
        assert_eq!(winners.matches.len(), 3);
        assert_eq!(losers.bracket.bracket_type, BracketType::Losers);
        assert_eq!(losers.matches.len(), 2);
        assert_eq!(finals.bracket.bracket_type, BracketType::GrandFinals);
        assert_eq!(finals.matches.len(), 1);
    }

    #[test]
    fn winners_round_one_losers_drop_to_losers_round_one() {
        let brackets = generate(&tournament(), &seeds(4)).unwrap();
        let winners = &brackets[0];
        let losers = &brackets[1];
        let l1 = losers.matches.iter().find(|m| m.round == 1).unwrap();
        for m in winners.matches.iter().filter(|m| m.round == 1) {
            assert_eq!(m.loser_next_match_id, Some(l1.id));
        }
    }

    #[test]
    fn winners_final_loser_drops_to_losers_final() {
        let brackets = generate(&tournament(), &seeds(4)).unwrap();
        let winners = &brackets[0];
        let losers = &brackets[1];
        let w_final = winners.matches.iter().find(|m| m.round == 2).unwrap();
        let l_final = losers.matches.iter().find(|m| m.round == 2).unwrap();
        assert_eq!(w_final.loser_next_match_id, Some(l_final.id));
    }

    #[test]
    fn both_finals_feed_the_grand_final() {
        let brackets = generate(&tournament(), &seeds(4)).unwrap();
        let gf = brackets[2].matches[0].id;
        let w_final = brackets[0].matches.iter().find(|m| m.round == 2).unwrap();
        let l_final = brackets[1].matches.iter().find(|m| m.round == 2).unwrap();
        assert_eq!(w_final.next_match_id, Some(gf));
        assert_eq!(l_final.next_match_id, Some(gf));
    }

    #[test]
    fn eight_players_losers_round_sizes() {
        let brackets = generate(&tournament(), &seeds(8)).unwrap();
        let losers = &brackets[1];
        assert_eq!(losers.bracket.total_rounds, 4);
        for (round, expected) in [(1u32, 2usize), (2, 2), (3, 1), (4, 1)] {
            let count = losers.matches.iter().filter(|m| m.round == round).count();
            assert_eq!(count, expected, "losers round {}", round);
        }
    }

    #[test]
    fn two_players_skip_losers_bracket() {
        let brackets = generate(&tournament(), &seeds(2)).unwrap();
        assert_eq!(brackets.len(), 2);
        let winners = &brackets[0];
        let finals = &brackets[1];
        assert_eq!(finals.bracket.bracket_type, BracketType::GrandFinals);
        // The lone winners match routes its loser straight to the final.
        assert_eq!(
            winners.matches[0].loser_next_match_id,
            Some(finals.matches[0].id)
        );
    }

    #[test]
    fn bye_cascade_removes_starved_losers_matches() {
        // Five players in an eight bracket: three winners byes, so one
        // losers match can never fill and must not exist.
        let brackets = generate(&tournament(), &seeds(5)).unwrap();
        let winners = &brackets[0];
        let losers = &brackets[1];
        assert_eq!(winners.bracket.bye_count, 3);
        let l1_count = losers.matches.iter().filter(|m| m.round == 1).count();
        assert_eq!(l1_count, 1);
    }
}
