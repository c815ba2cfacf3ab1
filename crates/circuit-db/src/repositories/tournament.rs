//! Tournament repository

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use circuit_core::{
    EngineError, EngineResult, Page, SortDir, Tournament, TournamentFilter, TournamentOrder,
    TournamentRepository,
};

use crate::models::TournamentRow;
use crate::store::{with_conn, PgHandle};
use crate::DbError;

pub struct PgTournamentRepository {
    handle: PgHandle,
}

impl PgTournamentRepository {
    pub(crate) fn new(handle: PgHandle) -> Self {
        Self { handle }
    }
}

fn push_filter(qb: &mut QueryBuilder<Postgres>, filter: &TournamentFilter) {
    if let Some(game_id) = &filter.game_id {
        qb.push(" AND game_id = ").push_bind(game_id.clone());
    }
    if let Some(statuses) = &filter.statuses {
        let values: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        qb.push(" AND status = ANY(").push_bind(values).push(")");
    }
    if let Some(visibility) = filter.visibility {
        qb.push(" AND visibility = ").push_bind(visibility.as_str());
    }
    if let Some(organizer_id) = filter.organizer_id {
        qb.push(" AND organizer_id = ").push_bind(organizer_id);
    }
    if let Some(format) = filter.format {
        qb.push(" AND format = ").push_bind(format.as_str());
    }
    if let Some(search) = &filter.name_search {
        qb.push(" AND name ILIKE ")
            .push_bind(format!("%{}%", search));
    }
    if let Some(after) = filter.starts_after {
        qb.push(" AND start_date >= ").push_bind(after);
    }
    if let Some(before) = filter.starts_before {
        qb.push(" AND start_date <= ").push_bind(before);
    }
}

fn order_clause(order: TournamentOrder) -> &'static str {
    match order {
        TournamentOrder::CreatedAt(SortDir::Asc) => " ORDER BY created_at ASC",
        TournamentOrder::CreatedAt(SortDir::Desc) => " ORDER BY created_at DESC",
        TournamentOrder::StartDate(SortDir::Asc) => " ORDER BY start_date ASC NULLS LAST",
        TournamentOrder::StartDate(SortDir::Desc) => " ORDER BY start_date DESC NULLS LAST",
        TournamentOrder::Name(SortDir::Asc) => " ORDER BY name ASC",
        TournamentOrder::Name(SortDir::Desc) => " ORDER BY name DESC",
    }
}

#[async_trait]
impl TournamentRepository for PgTournamentRepository {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Tournament>> {
        let row = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, TournamentRow>("SELECT * FROM tournaments WHERE id = $1")
                .bind(id)
                .fetch_optional(ex)
                .await
        })
        .map_err(DbError::from)?;
        row.map(Tournament::try_from)
            .transpose()
            .map_err(EngineError::from)
    }

    async fn find_many(
        &self,
        filter: &TournamentFilter,
        order: TournamentOrder,
        page: Page,
    ) -> EngineResult<Vec<Tournament>> {
        let mut qb = QueryBuilder::new("SELECT * FROM tournaments WHERE 1=1");
        push_filter(&mut qb, filter);
        qb.push(order_clause(order));
        qb.push(" LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = with_conn!(self.handle, |ex| {
            qb.build_query_as::<TournamentRow>().fetch_all(ex).await
        })
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| Tournament::try_from(row).map_err(EngineError::from))
            .collect()
    }

    async fn count(&self, filter: &TournamentFilter) -> EngineResult<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM tournaments WHERE 1=1");
        push_filter(&mut qb, filter);
        let count: i64 = with_conn!(self.handle, |ex| {
            qb.build_query_scalar::<i64>().fetch_one(ex).await
        })
        .map_err(DbError::from)?;
        Ok(count as u64)
    }

    async fn insert(&self, tournament: &Tournament) -> EngineResult<Tournament> {
        let row = TournamentRow::try_from(tournament)?;
        let inserted = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, TournamentRow>(
                r#"
                INSERT INTO tournaments (
                    id, name, description, game_id, format, status, visibility,
                    registration_type, organizer_id, team_size, min_participants,
                    max_participants, min_mmr, max_mmr, allowed_regions,
                    require_identity_verification, prize_pool, currency,
                    prize_distribution, entry_fee, registration_start,
                    registration_end, check_in_start, check_in_end, start_date,
                    end_date, match_interval_minutes, swiss_rounds,
                    grand_finals_reset, rules, stream_url, template_id, metadata,
                    created_at, updated_at
                )
                VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                    $27, $28, $29, $30, $31, $32, $33, $34, $35
                )
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(&row.name)
            .bind(&row.description)
            .bind(&row.game_id)
            .bind(&row.format)
            .bind(&row.status)
            .bind(&row.visibility)
            .bind(&row.registration_type)
            .bind(row.organizer_id)
            .bind(row.team_size)
            .bind(row.min_participants)
            .bind(row.max_participants)
            .bind(row.min_mmr)
            .bind(row.max_mmr)
            .bind(&row.allowed_regions)
            .bind(row.require_identity_verification)
            .bind(row.prize_pool)
            .bind(&row.currency)
            .bind(&row.prize_distribution)
            .bind(row.entry_fee)
            .bind(row.registration_start)
            .bind(row.registration_end)
            .bind(row.check_in_start)
            .bind(row.check_in_end)
            .bind(row.start_date)
            .bind(row.end_date)
            .bind(row.match_interval_minutes)
            .bind(row.swiss_rounds)
            .bind(row.grand_finals_reset)
            .bind(&row.rules)
            .bind(&row.stream_url)
            .bind(row.template_id)
            .bind(&row.metadata)
            .bind(row.created_at)
            .bind(row.updated_at)
            .fetch_one(ex)
            .await
        })
        .map_err(DbError::from)?;
        Tournament::try_from(inserted).map_err(EngineError::from)
    }

    async fn update(&self, tournament: &Tournament) -> EngineResult<Tournament> {
        let row = TournamentRow::try_from(tournament)?;
        let updated = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, TournamentRow>(
                r#"
                UPDATE tournaments SET
                    name = $2, description = $3, game_id = $4, format = $5,
                    status = $6, visibility = $7, registration_type = $8,
                    organizer_id = $9, team_size = $10, min_participants = $11,
                    max_participants = $12, min_mmr = $13, max_mmr = $14,
                    allowed_regions = $15, require_identity_verification = $16,
                    prize_pool = $17, currency = $18, prize_distribution = $19,
                    entry_fee = $20, registration_start = $21,
                    registration_end = $22, check_in_start = $23,
                    check_in_end = $24, start_date = $25, end_date = $26,
                    match_interval_minutes = $27, swiss_rounds = $28,
                    grand_finals_reset = $29, rules = $30, stream_url = $31,
                    template_id = $32, metadata = $33, updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(&row.name)
            .bind(&row.description)
            .bind(&row.game_id)
            .bind(&row.format)
            .bind(&row.status)
            .bind(&row.visibility)
            .bind(&row.registration_type)
            .bind(row.organizer_id)
            .bind(row.team_size)
            .bind(row.min_participants)
            .bind(row.max_participants)
            .bind(row.min_mmr)
            .bind(row.max_mmr)
            .bind(&row.allowed_regions)
            .bind(row.require_identity_verification)
            .bind(row.prize_pool)
            .bind(&row.currency)
            .bind(&row.prize_distribution)
            .bind(row.entry_fee)
            .bind(row.registration_start)
            .bind(row.registration_end)
            .bind(row.check_in_start)
            .bind(row.check_in_end)
            .bind(row.start_date)
            .bind(row.end_date)
            .bind(row.match_interval_minutes)
            .bind(row.swiss_rounds)
            .bind(row.grand_finals_reset)
            .bind(&row.rules)
            .bind(&row.stream_url)
            .bind(row.template_id)
            .bind(&row.metadata)
            .fetch_optional(ex)
            .await
        })
        .map_err(DbError::from)?;
        let updated = updated
            .ok_or_else(|| DbError::NotFound(format!("tournament {}", tournament.id)))?;
        Tournament::try_from(updated).map_err(EngineError::from)
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM tournaments WHERE id = $1")
                .bind(id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("tournament {}", id)).into());
        }
        Ok(())
    }
}
