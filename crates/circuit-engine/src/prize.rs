//! Prize service
//!
//! Pool setup, placement-to-recipient binding once the tournament
//! completes, tax withholding, and the distribution workflow against the
//! external wallet service: calculated → processing → distributed, with
//! failures captured on the row and retried under a bounded counter.
//! Transfers are idempotent on the per-prize reference, so a replayed call
//! cannot double-pay.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use circuit_core::{
    invariants, EngineConfig, EngineError, EngineResult, Page, Prize, PrizeFilter, PrizeStatus,
    PrizeType, Store, TournamentStatus, TransferRequest, ValidationErrors, WalletService,
};

use crate::standings;
use crate::tx::in_tx;

#[derive(Debug, Clone)]
pub struct PrizePoolEntry {
    pub placement: u32,
    pub prize_type: PrizeType,
    /// Fixed amount in minor units; computed from the percentage when
    /// absent.
    pub amount: Option<i64>,
    pub percentage_of_pool: Option<f64>,
}

/// Aggregate view over a tournament's prize rows.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PrizeSummary {
    pub tournament_id: Uuid,
    pub currency: String,
    pub total_amount: i64,
    pub total_net: i64,
    pub total_distributed: i64,
    pub pending: u32,
    pub calculated: u32,
    pub processing: u32,
    pub distributed: u32,
    pub failed: u32,
    pub cancelled: u32,
}

pub struct PrizeService {
    store: Arc<dyn Store>,
    wallet: Option<Arc<dyn WalletService>>,
    config: EngineConfig,
}

impl PrizeService {
    pub fn new(
        store: Arc<dyn Store>,
        wallet: Option<Arc<dyn WalletService>>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            wallet,
            config,
        }
    }

    pub async fn get(&self, prize_id: Uuid) -> EngineResult<Prize> {
        self.store
            .prizes()
            .find_by_id(prize_id)
            .await?
            .ok_or_else(|| EngineError::not_found("prize", prize_id))
    }

    pub async fn list(&self, tournament_id: Uuid) -> EngineResult<Vec<Prize>> {
        let mut prizes = self
            .store
            .prizes()
            .find_many(
                &PrizeFilter {
                    tournament_id: Some(tournament_id),
                    ..Default::default()
                },
                Page::all(),
            )
            .await?;
        prizes.sort_by_key(|p| p.placement);
        Ok(prizes)
    }

    pub async fn list_by_recipient(&self, recipient_id: Uuid) -> EngineResult<Vec<Prize>> {
        self.store
            .prizes()
            .find_many(
                &PrizeFilter {
                    recipient_id: Some(recipient_id),
                    ..Default::default()
                },
                Page::all(),
            )
            .await
    }

    /// Sum of everything actually paid out to a recipient.
    pub async fn total_earnings(&self, recipient_id: Uuid) -> EngineResult<i64> {
        Ok(self
            .list_by_recipient(recipient_id)
            .await?
            .iter()
            .filter(|p| p.status == PrizeStatus::Distributed)
            .map(|p| p.net_amount)
            .sum())
    }

    pub async fn summary(&self, tournament_id: Uuid) -> EngineResult<PrizeSummary> {
        let prizes = self.list(tournament_id).await?;
        let currency = prizes
            .first()
            .map(|p| p.currency.clone())
            .unwrap_or_else(|| self.config.default_currency.clone());

        let mut summary = PrizeSummary {
            tournament_id,
            currency,
            total_amount: 0,
            total_net: 0,
            total_distributed: 0,
            pending: 0,
            calculated: 0,
            processing: 0,
            distributed: 0,
            failed: 0,
            cancelled: 0,
        };
        for p in &prizes {
            summary.total_amount += p.amount;
            summary.total_net += p.net_amount;
            match p.status {
                PrizeStatus::Pending => summary.pending += 1,
                PrizeStatus::Calculated => summary.calculated += 1,
                PrizeStatus::Processing => summary.processing += 1,
                PrizeStatus::Distributed => {
                    summary.distributed += 1;
                    summary.total_distributed += p.net_amount;
                }
                PrizeStatus::Failed => summary.failed += 1,
                PrizeStatus::Cancelled => summary.cancelled += 1,
            }
        }
        Ok(summary)
    }

    /// Replace the tournament's prize rows from the given plan. Refused
    /// once the tournament has completed.
    pub async fn setup_pool(
        &self,
        tournament_id: Uuid,
        entries: Vec<PrizePoolEntry>,
    ) -> EngineResult<Vec<Prize>> {
        let tournament = crate::matches::tournament_of(self.store.as_ref(), tournament_id).await?;
        if tournament.status == TournamentStatus::Completed {
            return Err(EngineError::PreconditionFailed(format!(
                "tournament {} is completed; the prize pool is frozen",
                tournament_id
            )));
        }

        let mut percentages: BTreeMap<u32, f64> = BTreeMap::new();
        for entry in &entries {
            if let Some(pct) = entry.percentage_of_pool {
                percentages.insert(entry.placement, pct);
            }
        }
        let mut errs = ValidationErrors::new();
        invariants::check_prize_distribution(&percentages, &mut errs);
        for entry in &entries {
            if entry.amount.is_none() && entry.percentage_of_pool.is_none() {
                errs.add(format!(
                    "prize for placement {} needs an amount or a percentage",
                    entry.placement
                ));
            }
        }
        errs.into_result()?;

        let pool = tournament.prize_pool;
        let currency = tournament.currency.clone();
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                s.prizes().delete_by_tournament(tournament_id).await?;

                let mut created = Vec::with_capacity(entries.len());
                for entry in entries {
                    let amount = entry.amount.unwrap_or_else(|| {
                        let pct = entry.percentage_of_pool.unwrap_or(0.0);
                        (pool as f64 * pct / 100.0).round() as i64
                    });
                    let mut prize = Prize::new(
                        tournament_id,
                        entry.placement,
                        entry.prize_type,
                        amount,
                        currency.clone(),
                    );
                    prize.percentage_of_pool = entry.percentage_of_pool;
                    created.push(s.prizes().insert(&prize).await?);
                }
                Ok(created)
            })
        })
        .await
    }

    /// Bind recipients from final placements. Only meaningful once the
    /// tournament has completed; bonus rows (placement 0) keep waiting for
    /// a manual recipient.
    pub async fn calculate(&self, tournament_id: Uuid) -> EngineResult<Vec<Prize>> {
        let tournament = crate::matches::tournament_of(self.store.as_ref(), tournament_id).await?;
        if tournament.status != TournamentStatus::Completed {
            return Err(EngineError::PreconditionFailed(format!(
                "tournament {} must be completed before prizes are calculated ({})",
                tournament_id, tournament.status
            )));
        }

        let wallet = self.wallet.clone();
        in_tx(&self.store, move |s| {
            Box::pin(async move {
                let standings = standings::all_standings(s, tournament_id).await?;
                let prizes = s
                    .prizes()
                    .find_many(
                        &PrizeFilter {
                            tournament_id: Some(tournament_id),
                            statuses: Some(vec![PrizeStatus::Pending]),
                            ..Default::default()
                        },
                        Page::all(),
                    )
                    .await?;

                let mut calculated = Vec::with_capacity(prizes.len());
                for mut prize in prizes {
                    if prize.placement == 0 {
                        continue;
                    }
                    let standing = standings.iter().find(|st| {
                        st.final_placement.unwrap_or(st.rank) == prize.placement
                    });
                    let standing = match standing {
                        Some(st) => st,
                        None => {
                            return Err(EngineError::PreconditionFailed(format!(
                                "no standing holds placement {} in tournament {}",
                                prize.placement, tournament_id
                            )))
                        }
                    };

                    prize.recipient_id = Some(standing.participant_id);
                    prize.recipient_name = Some(standing.display_name.clone());
                    prize.team_id = standing.team_id;
                    if let Some(wallet) = wallet.as_ref() {
                        if let Some(handle) =
                            wallet.get_wallet(standing.participant_id).await?
                        {
                            prize.wallet_id = Some(handle.wallet_id);
                            prize.wallet_address = Some(handle.address);
                        }
                        prize.identity_verified =
                            wallet.verify_identity(standing.participant_id).await?;
                    }
                    prize.transition_to(PrizeStatus::Calculated)?;
                    calculated.push(s.prizes().update(&prize).await?);
                }
                Ok(calculated)
            })
        })
        .await
    }

    /// Push one calculated prize through the wallet. A transfer failure is
    /// captured on the row, never raised.
    pub async fn distribute(
        &self,
        prize_id: Uuid,
        distributed_by: Option<Uuid>,
    ) -> EngineResult<Prize> {
        let prize = self.get(prize_id).await?;
        self.dispatch_transfer(prize, distributed_by).await
    }

    /// Distribute every calculated prize in placement order; optionally
    /// only to identity-verified recipients. Returns (successful, failed).
    pub async fn bulk_distribute(
        &self,
        tournament_id: Uuid,
        verified_only: bool,
    ) -> EngineResult<(Vec<Prize>, Vec<Prize>)> {
        let mut candidates: Vec<Prize> = self
            .list(tournament_id)
            .await?
            .into_iter()
            .filter(|p| p.status == PrizeStatus::Calculated)
            .filter(|p| !verified_only || p.identity_verified)
            .collect();
        candidates.sort_by_key(|p| p.placement);

        let mut successful = Vec::new();
        let mut failed = Vec::new();
        for prize in candidates {
            let outcome = self.dispatch_transfer(prize, None).await?;
            if outcome.status == PrizeStatus::Distributed {
                successful.push(outcome);
            } else {
                failed.push(outcome);
            }
        }
        info!(
            tournament_id = %tournament_id,
            ok = successful.len(),
            failed = failed.len(),
            "bulk prize distribution finished"
        );
        Ok((successful, failed))
    }

    /// Re-arm a failed prize and try again. The counter gates attempts:
    /// three failures exhaust the prize.
    pub async fn retry(&self, prize_id: Uuid) -> EngineResult<Prize> {
        let mut prize = self.get(prize_id).await?;
        if prize.status != PrizeStatus::Failed {
            return Err(EngineError::illegal_transition(
                "prize",
                prize.status,
                PrizeStatus::Calculated,
            ));
        }
        if prize.retry_count >= self.config.max_prize_retries {
            return Err(EngineError::PreconditionFailed(format!(
                "prize {} exhausted its {} retries",
                prize_id, self.config.max_prize_retries
            )));
        }
        prize.transition_to(PrizeStatus::Calculated)?;
        prize.last_retry_at = Some(Utc::now());
        let prize = self.store.prizes().update(&prize).await?;
        self.dispatch_transfer(prize, None).await
    }

    /// Withhold tax at the given rate and persist both amounts.
    pub async fn calculate_tax(&self, prize_id: Uuid, rate_percent: f64) -> EngineResult<Prize> {
        if !(0.0..=100.0).contains(&rate_percent) {
            let mut errs = ValidationErrors::new();
            errs.add(format!("tax rate {} is outside 0..100", rate_percent));
            return Err(errs.into());
        }
        let mut prize = self.get(prize_id).await?;
        prize.apply_tax_rate(rate_percent);
        self.store.prizes().update(&prize).await
    }

    /// Guarded manual status move.
    pub async fn update_status(&self, prize_id: Uuid, status: PrizeStatus) -> EngineResult<Prize> {
        let mut prize = self.get(prize_id).await?;
        prize.transition_to(status)?;
        self.store.prizes().update(&prize).await
    }

    pub async fn set_recipient_wallet(
        &self,
        prize_id: Uuid,
        wallet_id: String,
        wallet_address: String,
    ) -> EngineResult<Prize> {
        let mut prize = self.get(prize_id).await?;
        prize.wallet_id = Some(wallet_id);
        prize.wallet_address = Some(wallet_address);
        self.store.prizes().update(&prize).await
    }

    /// Re-check the recipient's identity with the wallet service.
    pub async fn verify_recipient(&self, prize_id: Uuid) -> EngineResult<Prize> {
        let mut prize = self.get(prize_id).await?;
        let recipient = prize.recipient_id.ok_or_else(|| {
            EngineError::PreconditionFailed(format!("prize {} has no recipient bound", prize_id))
        })?;
        let wallet = self.wallet.as_ref().ok_or_else(|| {
            EngineError::PreconditionFailed("no wallet service configured".to_string())
        })?;
        prize.identity_verified = wallet.verify_identity(recipient).await?;
        self.store.prizes().update(&prize).await
    }

    pub async fn cancel(&self, prize_id: Uuid) -> EngineResult<Prize> {
        let mut prize = self.get(prize_id).await?;
        prize.transition_to(PrizeStatus::Cancelled)?;
        self.store.prizes().update(&prize).await
    }

    /// The transfer itself: calculated → processing → distributed|failed.
    async fn dispatch_transfer(
        &self,
        mut prize: Prize,
        distributed_by: Option<Uuid>,
    ) -> EngineResult<Prize> {
        if prize.status != PrizeStatus::Calculated {
            return Err(EngineError::illegal_transition(
                "prize",
                prize.status,
                PrizeStatus::Processing,
            ));
        }
        let wallet = self.wallet.as_ref().ok_or_else(|| {
            EngineError::PreconditionFailed("no wallet service configured".to_string())
        })?;
        let to_wallet = prize.wallet_id.clone().ok_or_else(|| {
            EngineError::PreconditionFailed(format!(
                "prize {} has no recipient wallet bound",
                prize.id
            ))
        })?;

        prize.transition_to(PrizeStatus::Processing)?;
        let mut prize = self.store.prizes().update(&prize).await?;

        let request = TransferRequest {
            from_wallet: self.config.escrow_wallet_id.clone(),
            to_wallet,
            amount: prize.net_amount,
            currency: prize.currency.clone(),
            reference: prize.transfer_reference(),
        };

        let outcome =
            tokio::time::timeout(self.config.wallet_deadline(), wallet.transfer(&request)).await;

        match outcome {
            Ok(Ok(result)) if result.success => {
                prize.transition_to(PrizeStatus::Distributed)?;
                prize.transaction_id = result.transaction_id;
                prize.distributed_at = Some(Utc::now());
                prize.distributed_by = distributed_by;
                prize.failure_reason = None;
                let prize = self.store.prizes().update(&prize).await?;
                info!(prize_id = %prize.id, "prize distributed");
                Ok(prize)
            }
            Ok(Ok(result)) => {
                self.record_failure(
                    prize,
                    result
                        .error
                        .unwrap_or_else(|| "wallet transfer rejected".to_string()),
                )
                .await
            }
            Ok(Err(err)) => self.record_failure(prize, err.to_string()).await,
            Err(_) => self.record_failure(prize, "timeout".to_string()).await,
        }
    }

    /// External failure lands on the row, not in the caller's lap.
    async fn record_failure(&self, mut prize: Prize, reason: String) -> EngineResult<Prize> {
        warn!(prize_id = %prize.id, reason = %reason, "prize distribution failed");
        prize.transition_to(PrizeStatus::Failed)?;
        prize.retry_count += 1;
        prize.failure_reason = Some(reason);
        self.store.prizes().update(&prize).await
    }
}
