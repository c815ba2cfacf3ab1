//! Prize repository

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use circuit_core::{EngineError, EngineResult, Page, Prize, PrizeFilter, PrizeRepository};

use crate::models::PrizeRow;
use crate::store::{with_conn, PgHandle};
use crate::DbError;

pub struct PgPrizeRepository {
    handle: PgHandle,
}

impl PgPrizeRepository {
    pub(crate) fn new(handle: PgHandle) -> Self {
        Self { handle }
    }
}

fn push_filter(qb: &mut QueryBuilder<Postgres>, filter: &PrizeFilter) {
    if let Some(tournament_id) = filter.tournament_id {
        qb.push(" AND tournament_id = ").push_bind(tournament_id);
    }
    if let Some(recipient_id) = filter.recipient_id {
        qb.push(" AND recipient_id = ").push_bind(recipient_id);
    }
    if let Some(statuses) = &filter.statuses {
        let values: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        qb.push(" AND status = ANY(").push_bind(values).push(")");
    }
}

#[async_trait]
impl PrizeRepository for PgPrizeRepository {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Prize>> {
        let row = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, PrizeRow>("SELECT * FROM prizes WHERE id = $1")
                .bind(id)
                .fetch_optional(ex)
                .await
        })
        .map_err(DbError::from)?;
        row.map(Prize::try_from)
            .transpose()
            .map_err(EngineError::from)
    }

    async fn find_many(&self, filter: &PrizeFilter, page: Page) -> EngineResult<Vec<Prize>> {
        let mut qb = QueryBuilder::new("SELECT * FROM prizes WHERE 1=1");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY placement ASC");
        qb.push(" LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = with_conn!(self.handle, |ex| {
            qb.build_query_as::<PrizeRow>().fetch_all(ex).await
        })
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| Prize::try_from(row).map_err(EngineError::from))
            .collect()
    }

    async fn count(&self, filter: &PrizeFilter) -> EngineResult<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM prizes WHERE 1=1");
        push_filter(&mut qb, filter);
        let count: i64 = with_conn!(self.handle, |ex| {
            qb.build_query_scalar::<i64>().fetch_one(ex).await
        })
        .map_err(DbError::from)?;
        Ok(count as u64)
    }

    async fn insert(&self, prize: &Prize) -> EngineResult<Prize> {
        let row = PrizeRow::from(prize);
        let inserted = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, PrizeRow>(
                r#"
                INSERT INTO prizes (
                    id, tournament_id, placement, recipient_id, recipient_name,
                    team_id, prize_type, amount, currency, percentage_of_pool,
                    status, wallet_id, wallet_address, transaction_id,
                    distributed_at, distributed_by, failure_reason, retry_count,
                    last_retry_at, identity_verified, tax_form_submitted,
                    tax_form_type, tax_withheld, net_amount, metadata,
                    created_at, updated_at
                )
                VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                    $27
                )
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(row.tournament_id)
            .bind(row.placement)
            .bind(row.recipient_id)
            .bind(&row.recipient_name)
            .bind(row.team_id)
            .bind(&row.prize_type)
            .bind(row.amount)
            .bind(&row.currency)
            .bind(row.percentage_of_pool)
            .bind(&row.status)
            .bind(&row.wallet_id)
            .bind(&row.wallet_address)
            .bind(&row.transaction_id)
            .bind(row.distributed_at)
            .bind(row.distributed_by)
            .bind(&row.failure_reason)
            .bind(row.retry_count)
            .bind(row.last_retry_at)
            .bind(row.identity_verified)
            .bind(row.tax_form_submitted)
            .bind(&row.tax_form_type)
            .bind(row.tax_withheld)
            .bind(row.net_amount)
            .bind(&row.metadata)
            .bind(row.created_at)
            .bind(row.updated_at)
            .fetch_one(ex)
            .await
        })
        .map_err(DbError::from)?;
        Prize::try_from(inserted).map_err(EngineError::from)
    }

    async fn update(&self, prize: &Prize) -> EngineResult<Prize> {
        let row = PrizeRow::from(prize);
        let updated = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, PrizeRow>(
                r#"
                UPDATE prizes SET
                    placement = $2, recipient_id = $3, recipient_name = $4,
                    team_id = $5, prize_type = $6, amount = $7, currency = $8,
                    percentage_of_pool = $9, status = $10, wallet_id = $11,
                    wallet_address = $12, transaction_id = $13,
                    distributed_at = $14, distributed_by = $15,
                    failure_reason = $16, retry_count = $17, last_retry_at = $18,
                    identity_verified = $19, tax_form_submitted = $20,
                    tax_form_type = $21, tax_withheld = $22, net_amount = $23,
                    metadata = $24, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(row.placement)
            .bind(row.recipient_id)
            .bind(&row.recipient_name)
            .bind(row.team_id)
            .bind(&row.prize_type)
            .bind(row.amount)
            .bind(&row.currency)
            .bind(row.percentage_of_pool)
            .bind(&row.status)
            .bind(&row.wallet_id)
            .bind(&row.wallet_address)
            .bind(&row.transaction_id)
            .bind(row.distributed_at)
            .bind(row.distributed_by)
            .bind(&row.failure_reason)
            .bind(row.retry_count)
            .bind(row.last_retry_at)
            .bind(row.identity_verified)
            .bind(row.tax_form_submitted)
            .bind(&row.tax_form_type)
            .bind(row.tax_withheld)
            .bind(row.net_amount)
            .bind(&row.metadata)
            .fetch_optional(ex)
            .await
        })
        .map_err(DbError::from)?;
        let updated = updated.ok_or_else(|| DbError::NotFound(format!("prize {}", prize.id)))?;
        Prize::try_from(updated).map_err(EngineError::from)
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM prizes WHERE id = $1")
                .bind(id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("prize {}", id)).into());
        }
        Ok(())
    }

    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM prizes WHERE tournament_id = $1")
                .bind(tournament_id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }
}
