//! Registration engine flows: admission, waitlist, substitutions, seeds.

mod common;

use chrono::{Duration, Utc};
use circuit_core::{
    EngineError, RegistrationStatus, TournamentFormat, TournamentStatus,
};
use circuit_engine::{
    CreateTournamentRequest, RegisterIndividualRequest, RegisterTeamRequest, TournamentUpdate,
};
use common::Harness;
use uuid::Uuid;

async fn open_tournament(h: &Harness, max: u32, team_size: u32) -> circuit_core::Tournament {
    let t = h
        .tournaments
        .create(CreateTournamentRequest {
            name: "friday night cup".into(),
            description: None,
            game_id: "aim-arena".into(),
            format: TournamentFormat::SingleElimination,
            organizer_id: Uuid::new_v4(),
            team_size: Some(team_size),
            min_participants: Some(2),
            max_participants: Some(max),
            visibility: None,
            registration_type: None,
        })
        .await
        .unwrap();
    h.tournaments.open_registration(t.id).await.unwrap()
}

fn entry(tournament_id: Uuid, name: &str) -> RegisterIndividualRequest {
    RegisterIndividualRequest {
        tournament_id,
        participant_id: Uuid::new_v4(),
        display_name: name.into(),
        mmr: Some(1500),
        region: None,
        identity_verified: true,
        entry_fee_paid: true,
    }
}

/// Capacity two, three arrivals: the third waits at position one, and the
/// head is promoted when a confirmed spot frees up.
#[tokio::test]
async fn waitlist_promotion_on_cancellation() {
    let h = Harness::new();
    let t = open_tournament(&h, 2, 1).await;

    let r1 = h
        .registrations
        .register_individual(entry(t.id, "first"))
        .await
        .unwrap();
    let r2 = h
        .registrations
        .register_individual(entry(t.id, "second"))
        .await
        .unwrap();
    let r3 = h
        .registrations
        .register_individual(entry(t.id, "third"))
        .await
        .unwrap();

    assert_eq!(r1.status, RegistrationStatus::Confirmed);
    assert_eq!(r2.status, RegistrationStatus::Confirmed);
    assert_eq!(r3.status, RegistrationStatus::Waitlisted);
    assert_eq!(r3.waitlist_position, Some(1));

    h.registrations.cancel(r1.id).await.unwrap();

    let promoted = h.registrations.get(r3.id).await.unwrap();
    assert_eq!(promoted.status, RegistrationStatus::Confirmed);
    assert_eq!(promoted.waitlist_position, None);
    assert!(h.registrations.waitlist(t.id).await.unwrap().is_empty());

    // The promoted participant has a standing row now; the cancelled one
    // does not.
    let standings = h.standings_by_rank(t.id).await;
    assert!(standings.iter().any(|s| s.participant_id == r3.participant_id));
    assert!(!standings.iter().any(|s| s.participant_id == r1.participant_id));
}

/// Waitlist positions stay dense when someone leaves the middle.
#[tokio::test]
async fn waitlist_compacts_after_middle_departure() {
    let h = Harness::new();
    let t = open_tournament(&h, 1, 1).await;

    h.registrations
        .register_individual(entry(t.id, "holder"))
        .await
        .unwrap();
    let w1 = h
        .registrations
        .register_individual(entry(t.id, "q1"))
        .await
        .unwrap();
    let w2 = h
        .registrations
        .register_individual(entry(t.id, "q2"))
        .await
        .unwrap();
    let w3 = h
        .registrations
        .register_individual(entry(t.id, "q3"))
        .await
        .unwrap();
    assert_eq!(
        (w1.waitlist_position, w2.waitlist_position, w3.waitlist_position),
        (Some(1), Some(2), Some(3))
    );

    h.registrations.cancel(w2.id).await.unwrap();

    let waitlist = h.registrations.waitlist(t.id).await.unwrap();
    let positions: Vec<_> = waitlist.iter().map(|r| r.waitlist_position).collect();
    assert_eq!(positions, vec![Some(1), Some(2)]);
    assert_eq!(waitlist[0].id, w1.id);
    assert_eq!(waitlist[1].id, w3.id);
}

/// Every failed requirement is reported at once.
#[tokio::test]
async fn admission_collects_all_validation_failures() {
    let h = Harness::new();
    // Entry requirements are draft-only, so configure them before opening.
    let draft = h
        .tournaments
        .create(CreateTournamentRequest {
            name: "gated cup".into(),
            description: None,
            game_id: "aim-arena".into(),
            format: TournamentFormat::SingleElimination,
            organizer_id: Uuid::new_v4(),
            team_size: Some(1),
            min_participants: Some(2),
            max_participants: Some(8),
            visibility: None,
            registration_type: None,
        })
        .await
        .unwrap();
    h.tournaments
        .set_entry_requirements(draft.id, Some(1000), Some(2000), vec!["eu-west".into()], true)
        .await
        .unwrap();
    h.tournaments
        .update(
            draft.id,
            TournamentUpdate {
                entry_fee: Some(500),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.tournaments.open_registration(draft.id).await.unwrap();

    let err = h
        .registrations
        .register_individual(RegisterIndividualRequest {
            tournament_id: draft.id,
            participant_id: Uuid::new_v4(),
            display_name: "rule breaker".into(),
            mmr: Some(2500),
            region: Some("us-east".into()),
            identity_verified: false,
            entry_fee_paid: false,
        })
        .await
        .unwrap_err();

    match err {
        EngineError::Validation(errs) => {
            let text = errs.to_string();
            assert!(text.contains("mmr above the maximum"));
            assert!(text.contains("identity verification"));
            assert!(text.contains("region"));
            assert!(text.contains("entry fee"));
        }
        other => panic!("expected validation error, got {other}"),
    }
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let h = Harness::new();
    let t = open_tournament(&h, 8, 1).await;
    let request = entry(t.id, "dup");
    h.registrations
        .register_individual(request.clone())
        .await
        .unwrap();
    let err = h
        .registrations
        .register_individual(request)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn registration_window_is_enforced() {
    let h = Harness::new();
    let t = open_tournament(&h, 8, 1).await;
    h.tournaments
        .update(
            t.id,
            TournamentUpdate {
                registration_start: Some(Some(Utc::now() - Duration::hours(2))),
                registration_end: Some(Some(Utc::now() - Duration::hours(1))),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = h
        .registrations
        .register_individual(entry(t.id, "late"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("registration window has closed"));
}

/// Team entries need the exact roster size and fresh members.
#[tokio::test]
async fn team_admission_checks_roster() {
    let h = Harness::new();
    let t = open_tournament(&h, 8, 3).await;

    let members = vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
    let ok = h
        .registrations
        .register_team(RegisterTeamRequest {
            tournament_id: t.id,
            participant_id: members[0],
            display_name: "trio".into(),
            team_id: Uuid::new_v4(),
            team_name: "the regulars".into(),
            members: members.clone(),
            mmr: Some(1600),
            region: None,
            identity_verified: true,
            entry_fee_paid: true,
        })
        .await
        .unwrap();
    assert_eq!(ok.status, RegistrationStatus::Confirmed);

    // Wrong roster size.
    let err = h
        .registrations
        .register_team(RegisterTeamRequest {
            tournament_id: t.id,
            participant_id: Uuid::new_v4(),
            display_name: "duo".into(),
            team_id: Uuid::new_v4(),
            team_name: "understaffed".into(),
            members: vec![Uuid::new_v4(), Uuid::new_v4()],
            mmr: None,
            region: None,
            identity_verified: true,
            entry_fee_paid: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    // A member already playing blocks the whole team.
    let err = h
        .registrations
        .register_team(RegisterTeamRequest {
            tournament_id: t.id,
            participant_id: Uuid::new_v4(),
            display_name: "poachers".into(),
            team_id: Uuid::new_v4(),
            team_name: "poachers".into(),
            members: vec![members[1], Uuid::new_v4(), Uuid::new_v4()],
            mmr: None,
            region: None,
            identity_verified: true,
            entry_fee_paid: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn refunds_are_idempotent() {
    let h = Harness::new();
    let t = open_tournament(&h, 8, 1).await;
    let r = h
        .registrations
        .register_individual(entry(t.id, "refundee"))
        .await
        .unwrap();

    let refunded = h.registrations.issue_refund(r.id, Some(500)).await.unwrap();
    assert!(refunded.refund_issued);
    assert_eq!(refunded.refund_amount, Some(500));

    let err = h.registrations.issue_refund(r.id, None).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));
}

/// Substitution swaps the participant in both the registration and the
/// standing, and refuses known participants.
#[tokio::test]
async fn substitution_carries_the_standing() {
    let h = Harness::new();
    let t = open_tournament(&h, 8, 1).await;
    let r = h
        .registrations
        .register_individual(entry(t.id, "original"))
        .await
        .unwrap();
    let other = h
        .registrations
        .register_individual(entry(t.id, "other"))
        .await
        .unwrap();

    let replacement = Uuid::new_v4();
    let subbed = h
        .registrations
        .substitute(r.id, replacement, "stand-in".into())
        .await
        .unwrap();
    assert_eq!(subbed.participant_id, replacement);
    assert_eq!(subbed.substituted_from, Some(r.participant_id));

    let standings = h.standings_by_rank(t.id).await;
    assert!(standings.iter().any(|s| s.participant_id == replacement));
    assert!(!standings.iter().any(|s| s.participant_id == r.participant_id));

    // Substituting in an already-registered participant is refused.
    let err = h
        .registrations
        .substitute(subbed.id, other.participant_id, "taken".into())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn seeding_by_mmr_breaks_ties_by_arrival() {
    let h = Harness::new();
    let t = open_tournament(&h, 8, 1).await;

    let mut early = entry(t.id, "early");
    early.mmr = Some(1800);
    let mut late = entry(t.id, "late");
    late.mmr = Some(1800);
    let mut top = entry(t.id, "top");
    top.mmr = Some(2200);

    let early = h.registrations.register_individual(early).await.unwrap();
    let late = h.registrations.register_individual(late).await.unwrap();
    let top = h.registrations.register_individual(top).await.unwrap();

    let seeded = h.registrations.seed_by_mmr(t.id).await.unwrap();
    let by_id = |id: Uuid| seeded.iter().find(|r| r.id == id).unwrap().seed;
    assert_eq!(by_id(top.id), Some(1));
    assert_eq!(by_id(early.id), Some(2));
    assert_eq!(by_id(late.id), Some(3));
}

#[tokio::test]
async fn bulk_seeds_apply_atomically() {
    let h = Harness::new();
    let t = open_tournament(&h, 8, 1).await;
    let a = h
        .registrations
        .register_individual(entry(t.id, "a"))
        .await
        .unwrap();
    let b = h
        .registrations
        .register_individual(entry(t.id, "b"))
        .await
        .unwrap();

    h.registrations
        .set_bulk_seeds(vec![(a.id, 2), (b.id, 1)])
        .await
        .unwrap();
    assert_eq!(h.registrations.get(a.id).await.unwrap().seed, Some(2));
    assert_eq!(h.registrations.get(b.id).await.unwrap().seed, Some(1));

    // One unknown id rejects the whole batch.
    let err = h
        .registrations
        .set_bulk_seeds(vec![(a.id, 5), (Uuid::new_v4(), 6)])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

/// Check-in needs the check-in phase and window.
#[tokio::test]
async fn check_in_requires_the_window() {
    let h = Harness::new();
    let t = open_tournament(&h, 8, 1).await;
    let r = h
        .registrations
        .register_individual(entry(t.id, "prompt"))
        .await
        .unwrap();

    let err = h.registrations.check_in(r.id).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));

    h.tournaments.close_registration(t.id).await.unwrap();
    h.tournaments
        .update(
            t.id,
            TournamentUpdate {
                check_in_start: Some(Some(Utc::now() - Duration::minutes(10))),
                check_in_end: Some(Some(Utc::now() + Duration::minutes(10))),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.tournaments.start_check_in(t.id).await.unwrap();

    let checked = h.registrations.check_in(r.id).await.unwrap();
    assert_eq!(checked.status, RegistrationStatus::CheckedIn);
    assert!(checked.checked_in_at.is_some());

    assert_eq!(
        h.tournaments.get(t.id).await.unwrap().status,
        TournamentStatus::CheckIn
    );
}
