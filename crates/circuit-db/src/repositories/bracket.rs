//! Bracket repository

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use circuit_core::{Bracket, BracketFilter, BracketRepository, EngineError, EngineResult, Page};

use crate::models::BracketRow;
use crate::store::{with_conn, PgHandle};
use crate::DbError;

pub struct PgBracketRepository {
    handle: PgHandle,
}

impl PgBracketRepository {
    pub(crate) fn new(handle: PgHandle) -> Self {
        Self { handle }
    }
}

fn push_filter(qb: &mut QueryBuilder<Postgres>, filter: &BracketFilter) {
    if let Some(tournament_id) = filter.tournament_id {
        qb.push(" AND tournament_id = ").push_bind(tournament_id);
    }
    if let Some(bracket_type) = filter.bracket_type {
        qb.push(" AND bracket_type = ").push_bind(bracket_type.as_str());
    }
}

#[async_trait]
impl BracketRepository for PgBracketRepository {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Bracket>> {
        let row = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, BracketRow>("SELECT * FROM brackets WHERE id = $1")
                .bind(id)
                .fetch_optional(ex)
                .await
        })
        .map_err(DbError::from)?;
        row.map(Bracket::try_from)
            .transpose()
            .map_err(EngineError::from)
    }

    async fn find_many(&self, filter: &BracketFilter, page: Page) -> EngineResult<Vec<Bracket>> {
        let mut qb = QueryBuilder::new("SELECT * FROM brackets WHERE 1=1");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at ASC");
        qb.push(" LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = with_conn!(self.handle, |ex| {
            qb.build_query_as::<BracketRow>().fetch_all(ex).await
        })
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| Bracket::try_from(row).map_err(EngineError::from))
            .collect()
    }

    async fn count(&self, filter: &BracketFilter) -> EngineResult<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM brackets WHERE 1=1");
        push_filter(&mut qb, filter);
        let count: i64 = with_conn!(self.handle, |ex| {
            qb.build_query_scalar::<i64>().fetch_one(ex).await
        })
        .map_err(DbError::from)?;
        Ok(count as u64)
    }

    async fn insert(&self, bracket: &Bracket) -> EngineResult<Bracket> {
        let row = BracketRow::try_from(bracket)?;
        let inserted = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, BracketRow>(
                r#"
                INSERT INTO brackets (
                    id, tournament_id, bracket_type, format, status, total_rounds,
                    current_round, total_matches, completed_matches,
                    participant_count, bye_count, seeds, visualization, metadata,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(row.tournament_id)
            .bind(&row.bracket_type)
            .bind(&row.format)
            .bind(&row.status)
            .bind(row.total_rounds)
            .bind(row.current_round)
            .bind(row.total_matches)
            .bind(row.completed_matches)
            .bind(row.participant_count)
            .bind(row.bye_count)
            .bind(&row.seeds)
            .bind(&row.visualization)
            .bind(&row.metadata)
            .bind(row.created_at)
            .bind(row.updated_at)
            .fetch_one(ex)
            .await
        })
        .map_err(DbError::from)?;
        Bracket::try_from(inserted).map_err(EngineError::from)
    }

    async fn update(&self, bracket: &Bracket) -> EngineResult<Bracket> {
        let row = BracketRow::try_from(bracket)?;
        let updated = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, BracketRow>(
                r#"
                UPDATE brackets SET
                    bracket_type = $2, format = $3, status = $4,
                    total_rounds = $5, current_round = $6, total_matches = $7,
                    completed_matches = $8, participant_count = $9,
                    bye_count = $10, seeds = $11, visualization = $12,
                    metadata = $13, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(&row.bracket_type)
            .bind(&row.format)
            .bind(&row.status)
            .bind(row.total_rounds)
            .bind(row.current_round)
            .bind(row.total_matches)
            .bind(row.completed_matches)
            .bind(row.participant_count)
            .bind(row.bye_count)
            .bind(&row.seeds)
            .bind(&row.visualization)
            .bind(&row.metadata)
            .fetch_optional(ex)
            .await
        })
        .map_err(DbError::from)?;
        let updated =
            updated.ok_or_else(|| DbError::NotFound(format!("bracket {}", bracket.id)))?;
        Bracket::try_from(updated).map_err(EngineError::from)
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM brackets WHERE id = $1")
                .bind(id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("bracket {}", id)).into());
        }
        Ok(())
    }

    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM brackets WHERE tournament_id = $1")
                .bind(tournament_id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }
}
