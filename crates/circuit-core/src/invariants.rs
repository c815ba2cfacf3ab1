//! Cross-entity invariant checks
//!
//! Pure functions, the single source of truth for validity. Every mutating
//! operation funnels its writes through these before committing.

use crate::entities::{Bracket, Registration, RegistrationStatus, Standing, Team, Tournament};
use crate::error::{EngineError, EngineResult, ValidationErrors};
use std::collections::BTreeMap;

/// Every percentage in (0, 100], sum at most 100.
pub fn check_prize_distribution(distribution: &BTreeMap<u32, f64>, errs: &mut ValidationErrors) {
    let mut total = 0.0;
    for (placement, pct) in distribution {
        if *pct <= 0.0 || *pct > 100.0 {
            errs.add(format!(
                "prize percentage for placement {} must be in (0, 100], got {}",
                placement, pct
            ));
        }
        total += pct;
    }
    if total > 100.0 {
        errs.add(format!(
            "prize percentages sum to {}, exceeding 100",
            total
        ));
    }
}

/// Schedule windows must be monotone wherever both endpoints are set:
/// registration ≤ check-in ≤ play, and each window internally ordered.
pub fn check_schedule_windows(t: &Tournament, errs: &mut ValidationErrors) {
    let pairs: [(&str, _, _); 5] = [
        ("registration window", t.registration_start, t.registration_end),
        ("check-in window", t.check_in_start, t.check_in_end),
        ("registration end vs check-in start", t.registration_end, t.check_in_start),
        ("check-in end vs start date", t.check_in_end, t.start_date),
        ("start date vs end date", t.start_date, t.end_date),
    ];
    for (label, earlier, later) in pairs {
        if let (Some(a), Some(b)) = (earlier, later) {
            if a > b {
                errs.add(format!("{} is not monotone", label));
            }
        }
    }
}

/// Team entries must match the tournament's team size exactly.
pub fn check_team_size(t: &Tournament, team: &Team, errs: &mut ValidationErrors) {
    if t.team_size <= 1 {
        errs.add(format!(
            "tournament {} is not a team event (team_size {})",
            t.id, t.team_size
        ));
    } else if team.members.len() as u32 != t.team_size {
        errs.add(format!(
            "team {} has {} members, tournament requires {}",
            team.id,
            team.members.len(),
            t.team_size
        ));
    }
}

/// Waitlisted registrations must hold positions forming a contiguous 1..k.
pub fn check_waitlist_positions(registrations: &[Registration]) -> EngineResult<()> {
    let mut positions: Vec<u32> = registrations
        .iter()
        .filter(|r| r.status == RegistrationStatus::Waitlisted)
        .filter_map(|r| r.waitlist_position)
        .collect();
    positions.sort_unstable();
    for (idx, pos) in positions.iter().enumerate() {
        if *pos != idx as u32 + 1 {
            return Err(EngineError::Integrity(format!(
                "waitlist positions are not contiguous: expected {}, found {}",
                idx + 1,
                pos
            )));
        }
    }
    Ok(())
}

/// wins + losses + draws must equal matches_played.
pub fn check_standing_arithmetic(standing: &Standing) -> EngineResult<()> {
    if standing.wins + standing.losses + standing.draws != standing.matches_played {
        return Err(EngineError::Integrity(format!(
            "standing {} record {}-{}-{} does not sum to {} matches played",
            standing.id, standing.wins, standing.losses, standing.draws, standing.matches_played
        )));
    }
    Ok(())
}

/// completed_matches bounded by total, current_round bounded by total.
pub fn check_bracket_progress(bracket: &Bracket) -> EngineResult<()> {
    if bracket.completed_matches > bracket.total_matches {
        return Err(EngineError::Integrity(format!(
            "bracket {} reports {} completed of {} total matches",
            bracket.id, bracket.completed_matches, bracket.total_matches
        )));
    }
    if bracket.current_round > bracket.total_rounds {
        return Err(EngineError::Integrity(format!(
            "bracket {} current round {} exceeds total rounds {}",
            bracket.id, bracket.current_round, bracket.total_rounds
        )));
    }
    Ok(())
}

/// Confirmed + checked-in registrations must fit the capacity.
pub fn check_capacity(t: &Tournament, registrations: &[Registration]) -> EngineResult<()> {
    let occupied = registrations
        .iter()
        .filter(|r| r.status.occupies_slot())
        .count() as u32;
    if occupied > t.max_participants {
        return Err(EngineError::Integrity(format!(
            "tournament {} has {} occupied slots but capacity {}",
            t.id, occupied, t.max_participants
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TournamentFormat;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn tournament() -> Tournament {
        Tournament::new("t", "g", TournamentFormat::SingleElimination, Uuid::new_v4())
    }

    #[test]
    fn prize_distribution_over_100_rejected() {
        let mut errs = ValidationErrors::new();
        let dist = BTreeMap::from([(1, 60.0), (2, 50.0)]);
        check_prize_distribution(&dist, &mut errs);
        assert!(!errs.is_empty());
    }

    #[test]
    fn prize_distribution_zero_percentage_rejected() {
        let mut errs = ValidationErrors::new();
        let dist = BTreeMap::from([(1, 0.0)]);
        check_prize_distribution(&dist, &mut errs);
        assert!(!errs.is_empty());
    }

    #[test]
    fn prize_distribution_exact_100_allowed() {
        let mut errs = ValidationErrors::new();
        let dist = BTreeMap::from([(1, 50.0), (2, 30.0), (3, 20.0)]);
        check_prize_distribution(&dist, &mut errs);
        assert!(errs.is_empty());
    }

    #[test]
    fn reversed_window_rejected() {
        let mut t = tournament();
        let now = Utc::now();
        t.registration_start = Some(now);
        t.registration_end = Some(now - Duration::hours(1));
        let mut errs = ValidationErrors::new();
        check_schedule_windows(&t, &mut errs);
        assert!(!errs.is_empty());
    }

    #[test]
    fn unset_windows_are_fine() {
        let t = tournament();
        let mut errs = ValidationErrors::new();
        check_schedule_windows(&t, &mut errs);
        assert!(errs.is_empty());
    }

    #[test]
    fn waitlist_gap_detected() {
        let mut a = Registration::new(Uuid::new_v4(), Uuid::new_v4(), "a");
        a.status = RegistrationStatus::Waitlisted;
        a.waitlist_position = Some(1);
        let mut b = a.clone();
        b.id = Uuid::new_v4();
        b.waitlist_position = Some(3);
        assert!(check_waitlist_positions(&[a.clone()]).is_ok());
        assert!(check_waitlist_positions(&[a, b]).is_err());
    }

    #[test]
    fn team_size_mismatch_detected() {
        let mut t = tournament();
        t.team_size = 3;
        let team = Team {
            id: Uuid::new_v4(),
            name: "duo".into(),
            members: vec![Uuid::new_v4(), Uuid::new_v4()],
        };
        let mut errs = ValidationErrors::new();
        check_team_size(&t, &team, &mut errs);
        assert!(!errs.is_empty());
    }
}
