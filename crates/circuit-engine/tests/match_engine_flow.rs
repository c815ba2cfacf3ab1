//! Match engine: check-in, confirmation gating, disputes, overrides,
//! scheduling, and the manipulation heuristics.

mod common;

use chrono::Duration;
use circuit_core::{EngineError, MatchStatus, TournamentFormat};
use circuit_engine::{AdminOverrideRequest, DisputeRuling, SubmitResultRequest};
use common::Harness;
use uuid::Uuid;

async fn scheduled_pair(h: &Harness) -> (Uuid, circuit_core::Match, Uuid, Uuid) {
    let (t, players) = h
        .seeded_tournament(TournamentFormat::SingleElimination, 2)
        .await;
    h.brackets.generate(t.id, None).await.unwrap();
    h.matches.auto_schedule(t.id).await.unwrap();
    let m = h.all_matches(t.id).await.remove(0);
    (t.id, m, players[0], players[1])
}

#[tokio::test]
async fn check_in_is_idempotent_and_starts_the_match() {
    let h = Harness::new();
    let (_, m, p1, p2) = scheduled_pair(&h).await;

    let after_one = h.matches.check_in(m.id, p1).await.unwrap();
    assert_eq!(after_one.status, MatchStatus::CheckIn);
    assert!(after_one.participant1_checked_in);

    // Same side twice changes nothing further.
    let again = h.matches.check_in(m.id, p1).await.unwrap();
    assert_eq!(again.status, MatchStatus::CheckIn);
    assert_eq!(
        again.participant1_checked_in_at,
        after_one.participant1_checked_in_at
    );

    let live = h.matches.check_in(m.id, p2).await.unwrap();
    assert_eq!(live.status, MatchStatus::InProgress);
    assert!(live.started_at.is_some());
}

#[tokio::test]
async fn submission_requires_winner_from_the_match() {
    let h = Harness::new();
    let (_, m, p1, _) = scheduled_pair(&h).await;

    let err = h
        .matches
        .submit_result(SubmitResultRequest {
            match_id: m.id,
            submitted_by: p1,
            winner_id: Uuid::new_v4(),
            participant1_score: 2,
            participant2_score: 0,
            games_played: None,
            game_stats: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));
}

#[tokio::test]
async fn submitter_is_auto_confirmed_and_opponent_completes() {
    let h = Harness::new();
    let (_, m, p1, p2) = scheduled_pair(&h).await;

    let submitted = h
        .matches
        .submit_result(SubmitResultRequest {
            match_id: m.id,
            submitted_by: p1,
            winner_id: p1,
            participant1_score: 2,
            participant2_score: 1,
            games_played: Some(3),
            game_stats: Vec::new(),
        })
        .await
        .unwrap();
    assert_eq!(submitted.status, MatchStatus::AwaitingConfirmation);
    assert!(submitted.participant1_confirmed);
    assert!(!submitted.participant2_confirmed);

    // A second submission is rejected: the match left the accepting states.
    let err = h
        .matches
        .submit_result(SubmitResultRequest {
            match_id: m.id,
            submitted_by: p2,
            winner_id: p2,
            participant1_score: 0,
            participant2_score: 2,
            games_played: None,
            game_stats: Vec::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));

    let done = h.matches.confirm_result(m.id, p2, true, None).await.unwrap();
    assert_eq!(done.status, MatchStatus::Completed);
    assert!(done.completed_at.is_some());
    assert_eq!(done.winner_id, Some(p1));
}

#[tokio::test]
async fn rejection_routes_to_dispute_and_replay_clears_the_slate() {
    let h = Harness::new();
    let (_, m, p1, p2) = scheduled_pair(&h).await;

    h.matches
        .submit_result(SubmitResultRequest {
            match_id: m.id,
            submitted_by: p1,
            winner_id: p1,
            participant1_score: 2,
            participant2_score: 0,
            games_played: None,
            game_stats: Vec::new(),
        })
        .await
        .unwrap();

    let disputed = h
        .matches
        .confirm_result(m.id, p2, false, Some("wrong score".into()))
        .await
        .unwrap();
    assert_eq!(disputed.status, MatchStatus::Disputed);
    let dispute = disputed.dispute.unwrap();
    assert_eq!(dispute.raised_by, p2);
    assert_eq!(dispute.reason, "wrong score");

    let replayed = h
        .matches
        .resolve_dispute(m.id, Uuid::new_v4(), DisputeRuling::Replay)
        .await
        .unwrap();
    assert_eq!(replayed.status, MatchStatus::InProgress);
    assert_eq!(replayed.winner_id, None);
    assert_eq!(
        (replayed.participant1_score, replayed.participant2_score),
        (0, 0)
    );
    assert!(!replayed.participant1_confirmed && !replayed.participant2_confirmed);
    assert!(replayed.dispute.unwrap().resolved_at.is_some());
}

#[tokio::test]
async fn dispute_decision_completes_with_override_audit() {
    let h = Harness::new();
    let (tid, m, p1, p2) = scheduled_pair(&h).await;

    h.matches
        .submit_result(SubmitResultRequest {
            match_id: m.id,
            submitted_by: p1,
            winner_id: p1,
            participant1_score: 2,
            participant2_score: 1,
            games_played: None,
            game_stats: Vec::new(),
        })
        .await
        .unwrap();
    h.matches
        .confirm_result(m.id, p2, false, Some("scores flipped".into()))
        .await
        .unwrap();

    let admin = Uuid::new_v4();
    let decided = h
        .matches
        .resolve_dispute(
            m.id,
            admin,
            DisputeRuling::Decide {
                winner_id: p2,
                participant1_score: 1,
                participant2_score: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(decided.status, MatchStatus::Completed);
    assert_eq!(decided.winner_id, Some(p2));
    assert_eq!(decided.admin_override.unwrap().admin_id, admin);

    // Standings reflect the decided outcome via full recalculation.
    let standings = h.standings_by_rank(tid).await;
    assert_eq!(standings[0].participant_id, p2);
    assert_eq!(standings[0].wins, 1);
}

#[tokio::test]
async fn admin_override_rewrites_a_completed_match() {
    let h = Harness::new();
    let (tid, m, p1, p2) = scheduled_pair(&h).await;
    h.play(m.id, p1, 2, 0).await;

    let overridden = h
        .matches
        .admin_override(AdminOverrideRequest {
            match_id: m.id,
            admin_id: Uuid::new_v4(),
            reason: "wrong result reported".into(),
            winner_id: p2,
            participant1_score: 0,
            participant2_score: 2,
        })
        .await
        .unwrap();
    assert_eq!(overridden.status, MatchStatus::Completed);
    assert_eq!(overridden.winner_id, Some(p2));

    let standings = h.standings_by_rank(tid).await;
    assert_eq!(standings[0].participant_id, p2);
    assert_eq!(standings[1].wins, 0, "old winner's record was rebuilt");
}

#[tokio::test]
async fn auto_schedule_spaces_matches_and_rounds() {
    let h = Harness::new();
    let (t, _) = h.seeded_tournament(TournamentFormat::RoundRobin, 4).await;
    h.brackets.generate(t.id, None).await.unwrap();
    let scheduled = h.matches.auto_schedule(t.id).await.unwrap();
    assert_eq!(scheduled.len(), 6);

    let start = h
        .tournaments
        .get(t.id)
        .await
        .unwrap()
        .start_date
        .unwrap();
    let interval = Duration::minutes(30);
    let times: Vec<_> = scheduled.iter().map(|m| m.scheduled_at.unwrap()).collect();

    // Two matches per round, one extra interval between rounds.
    assert_eq!(times[0], start);
    assert_eq!(times[1], start + interval);
    assert_eq!(times[2], start + interval * 3);
    assert_eq!(times[3], start + interval * 4);
    assert_eq!(times[4], start + interval * 6);
    assert_eq!(times[5], start + interval * 7);

    // All scheduled matches moved out of pending.
    assert!(scheduled.iter().all(|m| m.status == MatchStatus::Scheduled));
}

#[tokio::test]
async fn postpone_and_reschedule() {
    let h = Harness::new();
    let (_, m, _, _) = scheduled_pair(&h).await;

    let postponed = h.matches.postpone(m.id).await.unwrap();
    assert_eq!(postponed.status, MatchStatus::Postponed);

    let rescheduled = h
        .matches
        .schedule(m.id, chrono::Utc::now() + Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(rescheduled.status, MatchStatus::Scheduled);
}

#[tokio::test]
async fn server_assignment_mints_a_lobby_code() {
    let h = Harness::new();
    let (_, m, _, _) = scheduled_pair(&h).await;

    let assigned = h
        .matches
        .assign_server(m.id, "eu-west-7".into())
        .await
        .unwrap();
    assert_eq!(assigned.server_id.as_deref(), Some("eu-west-7"));
    let code = assigned.lobby_code.clone().unwrap();
    assert_eq!(code.len(), 8);
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));

    // Reassignment keeps the existing code.
    let reassigned = h
        .matches
        .assign_server(m.id, "eu-west-9".into())
        .await
        .unwrap();
    assert_eq!(reassigned.lobby_code, Some(code));
}

#[tokio::test]
async fn update_status_respects_the_table() {
    let h = Harness::new();
    let (_, m, _, _) = scheduled_pair(&h).await;

    let err = h
        .matches
        .update_status(m.id, MatchStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::IllegalTransition { .. }));

    let cancelled = h
        .matches
        .update_status(m.id, MatchStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, MatchStatus::Cancelled);
}

#[tokio::test]
async fn manipulation_heuristics_flag_suspicious_results() {
    let h = Harness::new();
    let (_, m, p1, p2) = scheduled_pair(&h).await;

    // Scores that do not add up to the games played.
    h.matches
        .submit_result(SubmitResultRequest {
            match_id: m.id,
            submitted_by: p1,
            winner_id: p1,
            participant1_score: 2,
            participant2_score: 0,
            games_played: Some(5),
            game_stats: Vec::new(),
        })
        .await
        .unwrap();
    let flags = h.matches.detect_manipulation(m.id).await.unwrap();
    assert_eq!(flags.len(), 1);
    assert!(flags[0].contains("do not add up"));

    // A 0-0 completion trips the other heuristic.
    let h2 = Harness::new();
    let (_, m2, q1, q2) = scheduled_pair(&h2).await;
    h2.matches
        .submit_result(SubmitResultRequest {
            match_id: m2.id,
            submitted_by: q1,
            winner_id: q1,
            participant1_score: 0,
            participant2_score: 0,
            games_played: None,
            game_stats: Vec::new(),
        })
        .await
        .unwrap();
    let _ = q2;
    let flags = h2.matches.detect_manipulation(m2.id).await.unwrap();
    assert!(flags.iter().any(|f| f.contains("0-0")));
}

#[tokio::test]
async fn disputed_listing_surfaces_open_disputes() {
    let h = Harness::new();
    let (tid, m, p1, p2) = scheduled_pair(&h).await;

    h.matches
        .submit_result(SubmitResultRequest {
            match_id: m.id,
            submitted_by: p1,
            winner_id: p1,
            participant1_score: 1,
            participant2_score: 0,
            games_played: None,
            game_stats: Vec::new(),
        })
        .await
        .unwrap();
    h.matches
        .confirm_result(m.id, p2, false, None)
        .await
        .unwrap();

    let disputed = h.matches.disputed(tid).await.unwrap();
    assert_eq!(disputed.len(), 1);
    assert_eq!(disputed[0].id, m.id);
}
