//! Round-robin scheduling via the circle method
//!
//! Fix the first participant; in every round pair position i against
//! position n'-1-i, then rotate all positions but the first clockwise by
//! one. An odd field gets a virtual bye participant whose pairings are
//! simply not played, leaving n(n-1)/2 real matches.

use circuit_core::{
    Bracket, BracketStatus, BracketType, EngineError, EngineResult, Match, MatchType, SeedEntry,
    Tournament,
};

use super::single_elim::seed_to_slot;
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

    // Positions hold seed indexes; None is the virtual bye slot.
    let mut positions: Vec<Option<u32>> = (0..n).map(Some).collect();
    if n % 2 == 1 {
        positions.push(None);
    }
    let field = positions.len();
    let rounds = (field - 1) as u32;

    let mut bracket = Bracket::new(tournament.id, BracketType::RoundRobin, tournament.format);
    bracket.total_rounds = rounds;
    bracket.participant_count = n;
    bracket.seeds = seeds.to_vec();

    let mut matches: Vec<Match> = Vec::with_capacity((n * (n - 1) / 2) as usize);
    let mut byes = 0u32;
    let mut number = 0u32;

    for round in 1..=rounds {
        for i in 0..field / 2 {
            let a = positions[i];
            let b = positions[field - 1 - i];
            match (a, b) {
                (Some(a), Some(b)) => {
                    number += 1;
                    let mut m = Match::new(
                        tournament.id,
                        bracket.id,
                        round,
                        number,
                        MatchType::RoundRobin,
                    );
                    m.participant1 = seed_to_slot(seeds, a);
                    m.participant2 = seed_to_slot(seeds, b);
                    matches.push(m);
                }
                // A pairing against the virtual participant is a rest round,
                // not a match.
                _ => byes += 1,
            }
        }
        // Rotate everything but the fixed head clockwise by one.
        let last = positions.pop().ok_or_else(|| {
            EngineError::Integrity("round robin rotation on empty field".into())
        })?;
        positions.insert(1, last);
    }

    bracket.total_matches = matches.len() as u32;
    bracket.bye_count = byes;
    bracket.status = BracketStatus::Generated;
    bracket.visualization = build_view(&matches, rounds);

    Ok(Generated { bracket, matches })
}

#[cfg(test)]
mod tests {
    use super::*;
    use circuit_core::TournamentFormat;
    use std::collections::HashSet;
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
        Tournament::new("league", "game", TournamentFormat::RoundRobin, Uuid::new_v4())
    }

    #[test]
    fn four_players_three_rounds_six_matches() {
        let g = generate(&tournament(), &seeds(4)).unwrap();
        assert_eq!(g.bracket.total_rounds, 3);
        assert_eq!(g.matches.len(), 6);
        assert_eq!(g.bracket.bye_count, 0);
    }

    #[test]
    fn every_pair_meets_exactly_once() {
        let s = seeds(6);
        let g = generate(&tournament(), &s).unwrap();
        assert_eq!(g.matches.len(), 15);

        let mut seen: HashSet<(Uuid, Uuid)> = HashSet::new();
        for m in &g.matches {
            let a = m.participant1.as_ref().unwrap().participant_id;
            let b = m.participant2.as_ref().unwrap().participant_id;
            let key = if a < b { (a, b) } else { (b, a) };
            assert!(seen.insert(key), "pair met twice");
        }
    }

    #[test]
    fn odd_field_gets_one_rest_per_round() {
        let g = generate(&tournament(), &seeds(5)).unwrap();
        // 5 players: 5 rounds, 10 real matches, one rest slot per round.
        assert_eq!(g.bracket.total_rounds, 5);
        assert_eq!(g.matches.len(), 10);
        assert_eq!(g.bracket.bye_count, 5);
    }

    #[test]
    fn nobody_plays_twice_in_one_round() {
        let g = generate(&tournament(), &seeds(6)).unwrap();
        for round in 1..=g.bracket.total_rounds {
            let mut seen = HashSet::new();
            for m in g.matches.iter().filter(|m| m.round == round) {
                assert!(seen.insert(m.participant1.as_ref().unwrap().participant_id));
                assert!(seen.insert(m.participant2.as_ref().unwrap().participant_id));
            }
        }
    }
}
