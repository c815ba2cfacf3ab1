//! Prize workflow: setup, calculation, distribution, retries, tax.

mod common;

use circuit_core::{EngineError, PrizeStatus, PrizeType, TournamentFormat};
use circuit_engine::{PrizePoolEntry, TournamentUpdate};
use common::Harness;
use uuid::Uuid;

fn pct(placement: u32, percentage: f64) -> PrizePoolEntry {
    PrizePoolEntry {
        placement,
        prize_type: PrizeType::Cash,
        amount: None,
        percentage_of_pool: Some(percentage),
    }
}

/// Run a four-player tournament to completion with the given prize plan
/// installed beforehand (the pool freezes once the tournament completes).
/// Returns the tournament id and participants in final rank order.
async fn completed_tournament(h: &Harness, plan: Vec<PrizePoolEntry>) -> (Uuid, Vec<Uuid>) {
    let (t, players) = h
        .seeded_tournament(TournamentFormat::SingleElimination, 4)
        .await;
    h.tournaments
        .update(
            t.id,
            TournamentUpdate {
                prize_pool: Some(1000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.prizes.setup_pool(t.id, plan).await.unwrap();

    h.brackets.generate(t.id, None).await.unwrap();
    h.tournaments.start_check_in(t.id).await.unwrap();
    h.tournaments.start(t.id).await.unwrap();
    h.matches.auto_schedule(t.id).await.unwrap();

    let matches = h.all_matches(t.id).await;
    let r1: Vec<_> = matches.iter().filter(|m| m.round == 1).collect();
    h.play(r1[0].id, players[0], 2, 0).await;
    h.play(r1[1].id, players[1], 2, 0).await;
    h.matches.auto_schedule(t.id).await.unwrap();
    let final_match = h
        .all_matches(t.id)
        .await
        .into_iter()
        .find(|m| m.round == 2)
        .unwrap();
    h.play(final_match.id, players[0], 2, 1).await;
    h.tournaments.complete(t.id).await.unwrap();

    let ranked: Vec<Uuid> = h
        .standings_by_rank(t.id)
        .await
        .into_iter()
        .map(|s| s.participant_id)
        .collect();
    (t.id, ranked)
}

/// S6: a distribution failure lands on the row, retry pays out and keeps
/// the counter where the failure left it.
#[tokio::test]
async fn failed_distribution_retries_to_success() {
    let h = Harness::new();
    let (tournament_id, ranked) =
        completed_tournament(&h, vec![pct(1, 50.0), pct(2, 30.0), pct(3, 20.0)]).await;
    for p in &ranked {
        h.wallet.register_wallet(*p, true);
    }

    let prizes = h.prizes.list(tournament_id).await.unwrap();
    assert_eq!(
        prizes.iter().map(|p| p.amount).collect::<Vec<_>>(),
        vec![500, 300, 200]
    );

    let calculated = h.prizes.calculate(tournament_id).await.unwrap();
    assert_eq!(calculated.len(), 3);
    let first = calculated.iter().find(|p| p.placement == 1).unwrap();
    assert_eq!(first.recipient_id, Some(ranked[0]));
    assert_eq!(first.status, PrizeStatus::Calculated);
    assert!(first.wallet_id.is_some());

    h.wallet.fail_next(1);
    let failed = h.prizes.distribute(first.id, None).await.unwrap();
    assert_eq!(failed.status, PrizeStatus::Failed);
    assert_eq!(failed.retry_count, 1);
    assert!(failed.failure_reason.is_some());

    let paid = h.prizes.retry(first.id).await.unwrap();
    assert_eq!(paid.status, PrizeStatus::Distributed);
    assert_eq!(paid.retry_count, 1, "retry count only moves on failure");
    assert!(paid.transaction_id.is_some());
    assert!(paid.distributed_at.is_some());
}

/// Three failures exhaust the retry budget; the fourth attempt is refused.
#[tokio::test]
async fn retries_are_bounded_at_three() {
    let h = Harness::new();
    let (tournament_id, ranked) = completed_tournament(&h, vec![pct(1, 100.0)]).await;
    h.wallet.register_wallet(ranked[0], true);

    let prize = h.prizes.calculate(tournament_id).await.unwrap().remove(0);

    h.wallet.fail_next(3);
    let p = h.prizes.distribute(prize.id, None).await.unwrap();
    assert_eq!((p.status, p.retry_count), (PrizeStatus::Failed, 1));
    let p = h.prizes.retry(prize.id).await.unwrap();
    assert_eq!((p.status, p.retry_count), (PrizeStatus::Failed, 2));
    let p = h.prizes.retry(prize.id).await.unwrap();
    assert_eq!((p.status, p.retry_count), (PrizeStatus::Failed, 3));

    let err = h.prizes.retry(prize.id).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));
}

/// The wallet idempotency contract: a replayed reference never double
/// pays and the transaction id is recorded verbatim.
#[tokio::test]
async fn transfer_reference_is_stable_and_idempotent() {
    let h = Harness::new();
    let (tournament_id, ranked) = completed_tournament(&h, vec![pct(1, 100.0)]).await;
    h.wallet.register_wallet(ranked[0], true);

    let prize = h.prizes.calculate(tournament_id).await.unwrap().remove(0);
    let paid = h.prizes.distribute(prize.id, None).await.unwrap();

    let transfers = h.wallet.transfers.lock().unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(
        transfers[0].reference,
        format!("tournament-prize-{}", prize.id)
    );
    assert_eq!(transfers[0].amount, paid.net_amount);
    assert_eq!(paid.transaction_id.as_deref(), Some("tx-1"));
}

#[tokio::test]
async fn pool_setup_rejects_over_100_percent() {
    let h = Harness::new();
    let (t, _) = h
        .seeded_tournament(TournamentFormat::SingleElimination, 2)
        .await;

    let err = h
        .prizes
        .setup_pool(t.id, vec![pct(1, 70.0), pct(2, 40.0)])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn pool_is_frozen_after_completion() {
    let h = Harness::new();
    let (tournament_id, _) = completed_tournament(&h, vec![pct(1, 100.0)]).await;

    let err = h
        .prizes
        .setup_pool(tournament_id, vec![pct(1, 50.0)])
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));
}

#[tokio::test]
async fn calculate_requires_completed_tournament() {
    let h = Harness::new();
    let (t, _) = h
        .seeded_tournament(TournamentFormat::SingleElimination, 2)
        .await;
    h.tournaments
        .update(
            t.id,
            TournamentUpdate {
                prize_pool: Some(1000),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    h.prizes
        .setup_pool(t.id, vec![pct(1, 100.0)])
        .await
        .unwrap();

    let err = h.prizes.calculate(t.id).await.unwrap_err();
    assert!(matches!(err, EngineError::PreconditionFailed(_)));
}

/// Bulk distribution walks placements in order and splits outcomes.
#[tokio::test]
async fn bulk_distribution_reports_successes_and_failures() {
    let h = Harness::new();
    let (tournament_id, ranked) =
        completed_tournament(&h, vec![pct(1, 50.0), pct(2, 30.0), pct(3, 20.0)]).await;
    for p in &ranked {
        h.wallet.register_wallet(*p, true);
    }
    h.prizes.calculate(tournament_id).await.unwrap();

    // First transfer (placement one) fails, the rest succeed.
    h.wallet.fail_next(1);
    let (ok, failed) = h
        .prizes
        .bulk_distribute(tournament_id, false)
        .await
        .unwrap();
    assert_eq!(ok.len(), 2);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].placement, 1);
    assert!(ok.iter().all(|p| p.status == PrizeStatus::Distributed));
}

/// The verified-only filter skips unverified recipients entirely.
#[tokio::test]
async fn bulk_distribution_can_require_verification() {
    let h = Harness::new();
    let (tournament_id, ranked) =
        completed_tournament(&h, vec![pct(1, 60.0), pct(2, 40.0)]).await;
    h.wallet.register_wallet(ranked[0], true);
    h.wallet.register_wallet(ranked[1], false);
    h.prizes.calculate(tournament_id).await.unwrap();

    let (ok, failed) = h
        .prizes
        .bulk_distribute(tournament_id, true)
        .await
        .unwrap();
    assert_eq!(ok.len(), 1);
    assert!(failed.is_empty());
    assert_eq!(ok[0].recipient_id, Some(ranked[0]));

    let skipped = h
        .prizes
        .list(tournament_id)
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.placement == 2)
        .unwrap();
    assert_eq!(skipped.status, PrizeStatus::Calculated);
}

/// Tax withholding persists both the withheld and net amounts, and the
/// transfer moves the net.
#[tokio::test]
async fn tax_withholding_reduces_the_transfer() {
    let h = Harness::new();
    let (tournament_id, ranked) = completed_tournament(&h, vec![pct(1, 100.0)]).await;
    h.wallet.register_wallet(ranked[0], true);

    let prize = h.prizes.calculate(tournament_id).await.unwrap().remove(0);
    let taxed = h.prizes.calculate_tax(prize.id, 30.0).await.unwrap();
    assert_eq!(taxed.tax_withheld, 300);
    assert_eq!(taxed.net_amount, 700);

    let paid = h.prizes.distribute(prize.id, None).await.unwrap();
    assert_eq!(paid.status, PrizeStatus::Distributed);
    let transfers = h.wallet.transfers.lock().unwrap();
    assert_eq!(transfers[0].amount, 700);
}

/// Earnings aggregate only distributed rows.
#[tokio::test]
async fn total_earnings_counts_only_distributed() {
    let h = Harness::new();
    let (tournament_id, ranked) =
        completed_tournament(&h, vec![pct(1, 60.0), pct(2, 40.0)]).await;
    for p in &ranked {
        h.wallet.register_wallet(*p, true);
    }

    let prizes = h.prizes.calculate(tournament_id).await.unwrap();
    let champion_prize = prizes.iter().find(|p| p.placement == 1).unwrap();
    h.prizes.distribute(champion_prize.id, None).await.unwrap();

    assert_eq!(h.prizes.total_earnings(ranked[0]).await.unwrap(), 600);
    assert_eq!(h.prizes.total_earnings(ranked[1]).await.unwrap(), 0);

    let summary = h.prizes.summary(tournament_id).await.unwrap();
    assert_eq!(summary.distributed, 1);
    assert_eq!(summary.calculated, 1);
    assert_eq!(summary.total_distributed, 600);
}
