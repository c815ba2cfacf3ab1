//! Match repository
//!
//! The update path is optimistic: it only lands when the stored version
//! still matches, and bumps the version as it does. Stale writes surface
//! as conflicts for the engine's bounded retry.

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use circuit_core::{
    EngineError, EngineResult, Match, MatchFilter, MatchOrder, MatchRepository, Page, SortDir,
};

use crate::models::MatchRow;
use crate::store::{with_conn, PgHandle};
use crate::DbError;

pub struct PgMatchRepository {
    handle: PgHandle,
}

impl PgMatchRepository {
    pub(crate) fn new(handle: PgHandle) -> Self {
        Self { handle }
    }
}

fn push_filter(qb: &mut QueryBuilder<Postgres>, filter: &MatchFilter) {
    if let Some(tournament_id) = filter.tournament_id {
        qb.push(" AND tournament_id = ").push_bind(tournament_id);
    }
    if let Some(bracket_id) = filter.bracket_id {
        qb.push(" AND bracket_id = ").push_bind(bracket_id);
    }
    if let Some(statuses) = &filter.statuses {
        let values: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        qb.push(" AND status = ANY(").push_bind(values).push(")");
    }
    if let Some(round) = filter.round {
        qb.push(" AND round = ").push_bind(round as i32);
    }
    if let Some(participant_id) = filter.participant_id {
        qb.push(" AND (participant1_id = ")
            .push_bind(participant_id)
            .push(" OR participant2_id = ")
            .push_bind(participant_id)
            .push(")");
    }
    if let Some(after) = filter.scheduled_after {
        qb.push(" AND scheduled_at >= ").push_bind(after);
    }
    if let Some(before) = filter.scheduled_before {
        qb.push(" AND scheduled_at <= ").push_bind(before);
    }
}

fn order_clause(order: MatchOrder) -> &'static str {
    match order {
        MatchOrder::RoundAndNumber => " ORDER BY round ASC, match_number ASC",
        MatchOrder::ScheduledAt(SortDir::Asc) => " ORDER BY scheduled_at ASC NULLS LAST",
        MatchOrder::ScheduledAt(SortDir::Desc) => " ORDER BY scheduled_at DESC NULLS LAST",
    }
}

#[async_trait]
impl MatchRepository for PgMatchRepository {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Match>> {
        let row = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, MatchRow>("SELECT * FROM matches WHERE id = $1")
                .bind(id)
                .fetch_optional(ex)
                .await
        })
        .map_err(DbError::from)?;
        row.map(Match::try_from)
            .transpose()
            .map_err(EngineError::from)
    }

    async fn find_many(
        &self,
        filter: &MatchFilter,
        order: MatchOrder,
        page: Page,
    ) -> EngineResult<Vec<Match>> {
        let mut qb = QueryBuilder::new("SELECT * FROM matches WHERE 1=1");
        push_filter(&mut qb, filter);
        qb.push(order_clause(order));
        qb.push(" LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = with_conn!(self.handle, |ex| {
            qb.build_query_as::<MatchRow>().fetch_all(ex).await
        })
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| Match::try_from(row).map_err(EngineError::from))
            .collect()
    }

    async fn count(&self, filter: &MatchFilter) -> EngineResult<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM matches WHERE 1=1");
        push_filter(&mut qb, filter);
        let count: i64 = with_conn!(self.handle, |ex| {
            qb.build_query_scalar::<i64>().fetch_one(ex).await
        })
        .map_err(DbError::from)?;
        Ok(count as u64)
    }

    async fn insert(&self, m: &Match) -> EngineResult<Match> {
        let row = MatchRow::try_from(m)?;
        let inserted = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, MatchRow>(
                r#"
                INSERT INTO matches (
                    id, tournament_id, bracket_id, round, match_number,
                    match_type, status, participant1_id, participant1_name,
                    participant1_seed, participant2_id, participant2_name,
                    participant2_seed, participant1_score, participant2_score,
                    winner_id, loser_id, participant1_confirmed,
                    participant2_confirmed, participant1_checked_in,
                    participant2_checked_in, participant1_checked_in_at,
                    participant2_checked_in_at, scheduled_at, started_at,
                    completed_at, server_id, lobby_code, stream_url,
                    next_match_id, loser_next_match_id, dispute, admin_override,
                    best_of, games_played, game_stats, is_bye, version, metadata,
                    created_at, updated_at
                )
                VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                    $27, $28, $29, $30, $31, $32, $33, $34, $35, $36, $37, $38,
                    $39, $40, $41
                )
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(row.tournament_id)
            .bind(row.bracket_id)
            .bind(row.round)
            .bind(row.match_number)
            .bind(&row.match_type)
            .bind(&row.status)
            .bind(row.participant1_id)
            .bind(&row.participant1_name)
            .bind(row.participant1_seed)
            .bind(row.participant2_id)
            .bind(&row.participant2_name)
            .bind(row.participant2_seed)
            .bind(row.participant1_score)
            .bind(row.participant2_score)
            .bind(row.winner_id)
            .bind(row.loser_id)
            .bind(row.participant1_confirmed)
            .bind(row.participant2_confirmed)
            .bind(row.participant1_checked_in)
            .bind(row.participant2_checked_in)
            .bind(row.participant1_checked_in_at)
            .bind(row.participant2_checked_in_at)
            .bind(row.scheduled_at)
            .bind(row.started_at)
            .bind(row.completed_at)
            .bind(&row.server_id)
            .bind(&row.lobby_code)
            .bind(&row.stream_url)
            .bind(row.next_match_id)
            .bind(row.loser_next_match_id)
            .bind(&row.dispute)
            .bind(&row.admin_override)
            .bind(row.best_of)
            .bind(row.games_played)
            .bind(&row.game_stats)
            .bind(row.is_bye)
            .bind(row.version)
            .bind(&row.metadata)
            .bind(row.created_at)
            .bind(row.updated_at)
            .fetch_one(ex)
            .await
        })
        .map_err(DbError::from)?;
        Match::try_from(inserted).map_err(EngineError::from)
    }

    async fn update(&self, m: &Match) -> EngineResult<Match> {
        let row = MatchRow::try_from(m)?;
        let updated = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, MatchRow>(
                r#"
                UPDATE matches SET
                    status = $3, participant1_id = $4, participant1_name = $5,
                    participant1_seed = $6, participant2_id = $7,
                    participant2_name = $8, participant2_seed = $9,
                    participant1_score = $10, participant2_score = $11,
                    winner_id = $12, loser_id = $13,
                    participant1_confirmed = $14, participant2_confirmed = $15,
                    participant1_checked_in = $16, participant2_checked_in = $17,
                    participant1_checked_in_at = $18,
                    participant2_checked_in_at = $19, scheduled_at = $20,
                    started_at = $21, completed_at = $22, server_id = $23,
                    lobby_code = $24, stream_url = $25, next_match_id = $26,
                    loser_next_match_id = $27, dispute = $28,
                    admin_override = $29, best_of = $30, games_played = $31,
                    game_stats = $32, is_bye = $33, metadata = $34,
                    version = version + 1, updated_at = NOW()
                WHERE id = $1 AND version = $2
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(row.version)
            .bind(&row.status)
            .bind(row.participant1_id)
            .bind(&row.participant1_name)
            .bind(row.participant1_seed)
            .bind(row.participant2_id)
            .bind(&row.participant2_name)
            .bind(row.participant2_seed)
            .bind(row.participant1_score)
            .bind(row.participant2_score)
            .bind(row.winner_id)
            .bind(row.loser_id)
            .bind(row.participant1_confirmed)
            .bind(row.participant2_confirmed)
            .bind(row.participant1_checked_in)
            .bind(row.participant2_checked_in)
            .bind(row.participant1_checked_in_at)
            .bind(row.participant2_checked_in_at)
            .bind(row.scheduled_at)
            .bind(row.started_at)
            .bind(row.completed_at)
            .bind(&row.server_id)
            .bind(&row.lobby_code)
            .bind(&row.stream_url)
            .bind(row.next_match_id)
            .bind(row.loser_next_match_id)
            .bind(&row.dispute)
            .bind(&row.admin_override)
            .bind(row.best_of)
            .bind(row.games_played)
            .bind(&row.game_stats)
            .bind(row.is_bye)
            .bind(&row.metadata)
            .fetch_optional(ex)
            .await
        })
        .map_err(DbError::from)?;
        let updated = updated.ok_or_else(|| {
            DbError::StaleWrite(format!("match {} version {}", m.id, m.version))
        })?;
        Match::try_from(updated).map_err(EngineError::from)
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM matches WHERE id = $1")
                .bind(id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("match {}", id)).into());
        }
        Ok(())
    }

    async fn delete_by_bracket(&self, bracket_id: Uuid) -> EngineResult<u64> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM matches WHERE bracket_id = $1")
                .bind(bracket_id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }

    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM matches WHERE tournament_id = $1")
                .bind(tournament_id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }
}
