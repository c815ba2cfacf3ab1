//! Registration repository

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use circuit_core::{
    EngineError, EngineResult, Page, Registration, RegistrationFilter, RegistrationOrder,
    RegistrationRepository, SortDir,
};

use crate::models::RegistrationRow;
use crate::store::{with_conn, PgHandle};
use crate::DbError;

pub struct PgRegistrationRepository {
    handle: PgHandle,
}

impl PgRegistrationRepository {
    pub(crate) fn new(handle: PgHandle) -> Self {
        Self { handle }
    }
}

fn push_filter(qb: &mut QueryBuilder<Postgres>, filter: &RegistrationFilter) {
    if let Some(tournament_id) = filter.tournament_id {
        qb.push(" AND tournament_id = ").push_bind(tournament_id);
    }
    if let Some(participant_id) = filter.participant_id {
        qb.push(" AND participant_id = ").push_bind(participant_id);
    }
    if let Some(team_id) = filter.team_id {
        qb.push(" AND team->>'id' = ").push_bind(team_id.to_string());
    }
    if let Some(statuses) = &filter.statuses {
        let values: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        qb.push(" AND status = ANY(").push_bind(values).push(")");
    }
}

fn order_clause(order: RegistrationOrder) -> &'static str {
    match order {
        RegistrationOrder::CreatedAt(SortDir::Asc) => " ORDER BY created_at ASC",
        RegistrationOrder::CreatedAt(SortDir::Desc) => " ORDER BY created_at DESC",
        RegistrationOrder::WaitlistPosition => " ORDER BY waitlist_position ASC NULLS LAST",
    }
}

#[async_trait]
impl RegistrationRepository for PgRegistrationRepository {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Registration>> {
        let row = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, RegistrationRow>("SELECT * FROM registrations WHERE id = $1")
                .bind(id)
                .fetch_optional(ex)
                .await
        })
        .map_err(DbError::from)?;
        row.map(Registration::try_from)
            .transpose()
            .map_err(EngineError::from)
    }

    async fn find_many(
        &self,
        filter: &RegistrationFilter,
        order: RegistrationOrder,
        page: Page,
    ) -> EngineResult<Vec<Registration>> {
        let mut qb = QueryBuilder::new("SELECT * FROM registrations WHERE 1=1");
        push_filter(&mut qb, filter);
        qb.push(order_clause(order));
        qb.push(" LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = with_conn!(self.handle, |ex| {
            qb.build_query_as::<RegistrationRow>().fetch_all(ex).await
        })
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| Registration::try_from(row).map_err(EngineError::from))
            .collect()
    }

    async fn count(&self, filter: &RegistrationFilter) -> EngineResult<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM registrations WHERE 1=1");
        push_filter(&mut qb, filter);
        let count: i64 = with_conn!(self.handle, |ex| {
            qb.build_query_scalar::<i64>().fetch_one(ex).await
        })
        .map_err(DbError::from)?;
        Ok(count as u64)
    }

    async fn insert(&self, registration: &Registration) -> EngineResult<Registration> {
        let row = RegistrationRow::try_from(registration)?;
        let inserted = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, RegistrationRow>(
                r#"
                INSERT INTO registrations (
                    id, tournament_id, participant_id, display_name, team, status,
                    seed, mmr, identity_verified, region, entry_fee_paid,
                    refund_issued, refund_amount, refunded_at, waitlist_position,
                    substituted_from, substituted_at, checked_in_at, metadata,
                    created_at, updated_at
                )
                VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21
                )
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(row.tournament_id)
            .bind(row.participant_id)
            .bind(&row.display_name)
            .bind(&row.team)
            .bind(&row.status)
            .bind(row.seed)
            .bind(row.mmr)
            .bind(row.identity_verified)
            .bind(&row.region)
            .bind(row.entry_fee_paid)
            .bind(row.refund_issued)
            .bind(row.refund_amount)
            .bind(row.refunded_at)
            .bind(row.waitlist_position)
            .bind(row.substituted_from)
            .bind(row.substituted_at)
            .bind(row.checked_in_at)
            .bind(&row.metadata)
            .bind(row.created_at)
            .bind(row.updated_at)
            .fetch_one(ex)
            .await
        })
        .map_err(DbError::from)?;
        Registration::try_from(inserted).map_err(EngineError::from)
    }

    async fn update(&self, registration: &Registration) -> EngineResult<Registration> {
        let row = RegistrationRow::try_from(registration)?;
        let updated = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, RegistrationRow>(
                r#"
                UPDATE registrations SET
                    participant_id = $2, display_name = $3, team = $4,
                    status = $5, seed = $6, mmr = $7, identity_verified = $8,
                    region = $9, entry_fee_paid = $10, refund_issued = $11,
                    refund_amount = $12, refunded_at = $13,
                    waitlist_position = $14, substituted_from = $15,
                    substituted_at = $16, checked_in_at = $17, metadata = $18,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(row.participant_id)
            .bind(&row.display_name)
            .bind(&row.team)
            .bind(&row.status)
            .bind(row.seed)
            .bind(row.mmr)
            .bind(row.identity_verified)
            .bind(&row.region)
            .bind(row.entry_fee_paid)
            .bind(row.refund_issued)
            .bind(row.refund_amount)
            .bind(row.refunded_at)
            .bind(row.waitlist_position)
            .bind(row.substituted_from)
            .bind(row.substituted_at)
            .bind(row.checked_in_at)
            .bind(&row.metadata)
            .fetch_optional(ex)
            .await
        })
        .map_err(DbError::from)?;
        let updated = updated
            .ok_or_else(|| DbError::NotFound(format!("registration {}", registration.id)))?;
        Registration::try_from(updated).map_err(EngineError::from)
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM registrations WHERE id = $1")
                .bind(id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("registration {}", id)).into());
        }
        Ok(())
    }

    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM registrations WHERE tournament_id = $1")
                .bind(tournament_id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }
}
