//! Standing repository

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use circuit_core::{
    EngineError, EngineResult, Page, SortDir, Standing, StandingFilter, StandingOrder,
    StandingRepository,
};

use crate::models::StandingRow;
use crate::store::{with_conn, PgHandle};
use crate::DbError;

pub struct PgStandingRepository {
    handle: PgHandle,
}

impl PgStandingRepository {
    pub(crate) fn new(handle: PgHandle) -> Self {
        Self { handle }
    }
}

fn push_filter(qb: &mut QueryBuilder<Postgres>, filter: &StandingFilter) {
    if let Some(tournament_id) = filter.tournament_id {
        qb.push(" AND tournament_id = ").push_bind(tournament_id);
    }
    if let Some(participant_id) = filter.participant_id {
        qb.push(" AND participant_id = ").push_bind(participant_id);
    }
    if let Some(is_eliminated) = filter.is_eliminated {
        qb.push(" AND is_eliminated = ").push_bind(is_eliminated);
    }
}

fn order_clause(order: StandingOrder) -> &'static str {
    match order {
        StandingOrder::Rank(SortDir::Asc) => " ORDER BY rank ASC",
        StandingOrder::Rank(SortDir::Desc) => " ORDER BY rank DESC",
        StandingOrder::Points(SortDir::Asc) => " ORDER BY points ASC",
        StandingOrder::Points(SortDir::Desc) => " ORDER BY points DESC",
        StandingOrder::Wins(SortDir::Asc) => " ORDER BY wins ASC",
        StandingOrder::Wins(SortDir::Desc) => " ORDER BY wins DESC",
        StandingOrder::WinRate(SortDir::Asc) => " ORDER BY win_rate ASC",
        StandingOrder::WinRate(SortDir::Desc) => " ORDER BY win_rate DESC",
    }
}

#[async_trait]
impl StandingRepository for PgStandingRepository {
    async fn find_by_id(&self, id: Uuid) -> EngineResult<Option<Standing>> {
        let row = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, StandingRow>("SELECT * FROM standings WHERE id = $1")
                .bind(id)
                .fetch_optional(ex)
                .await
        })
        .map_err(DbError::from)?;
        row.map(Standing::try_from)
            .transpose()
            .map_err(EngineError::from)
    }

    async fn find_many(
        &self,
        filter: &StandingFilter,
        order: StandingOrder,
        page: Page,
    ) -> EngineResult<Vec<Standing>> {
        let mut qb = QueryBuilder::new("SELECT * FROM standings WHERE 1=1");
        push_filter(&mut qb, filter);
        qb.push(order_clause(order));
        qb.push(" LIMIT ")
            .push_bind(page.limit as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let rows = with_conn!(self.handle, |ex| {
            qb.build_query_as::<StandingRow>().fetch_all(ex).await
        })
        .map_err(DbError::from)?;
        rows.into_iter()
            .map(|row| Standing::try_from(row).map_err(EngineError::from))
            .collect()
    }

    async fn count(&self, filter: &StandingFilter) -> EngineResult<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM standings WHERE 1=1");
        push_filter(&mut qb, filter);
        let count: i64 = with_conn!(self.handle, |ex| {
            qb.build_query_scalar::<i64>().fetch_one(ex).await
        })
        .map_err(DbError::from)?;
        Ok(count as u64)
    }

    async fn insert(&self, standing: &Standing) -> EngineResult<Standing> {
        let row = StandingRow::from(standing);
        let inserted = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, StandingRow>(
                r#"
                INSERT INTO standings (
                    id, tournament_id, participant_id, team_id, display_name,
                    seed, rank, points, wins, losses, draws, matches_played,
                    games_won, games_lost, rounds_won, rounds_lost, win_rate,
                    buchholz_score, opponent_win_rate, head_to_head_wins,
                    current_streak, streak_type, longest_win_streak,
                    is_eliminated, eliminated_in_round, eliminated_by,
                    is_disqualified, final_placement, metadata, created_at,
                    updated_at
                )
                VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26,
                    $27, $28, $29, $30, $31
                )
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(row.tournament_id)
            .bind(row.participant_id)
            .bind(row.team_id)
            .bind(&row.display_name)
            .bind(row.seed)
            .bind(row.rank)
            .bind(row.points)
            .bind(row.wins)
            .bind(row.losses)
            .bind(row.draws)
            .bind(row.matches_played)
            .bind(row.games_won)
            .bind(row.games_lost)
            .bind(row.rounds_won)
            .bind(row.rounds_lost)
            .bind(row.win_rate)
            .bind(row.buchholz_score)
            .bind(row.opponent_win_rate)
            .bind(row.head_to_head_wins)
            .bind(row.current_streak)
            .bind(&row.streak_type)
            .bind(row.longest_win_streak)
            .bind(row.is_eliminated)
            .bind(row.eliminated_in_round)
            .bind(row.eliminated_by)
            .bind(row.is_disqualified)
            .bind(row.final_placement)
            .bind(&row.metadata)
            .bind(row.created_at)
            .bind(row.updated_at)
            .fetch_one(ex)
            .await
        })
        .map_err(DbError::from)?;
        Standing::try_from(inserted).map_err(EngineError::from)
    }

    async fn update(&self, standing: &Standing) -> EngineResult<Standing> {
        let row = StandingRow::from(standing);
        let updated = with_conn!(self.handle, |ex| {
            sqlx::query_as::<_, StandingRow>(
                r#"
                UPDATE standings SET
                    participant_id = $2, team_id = $3, display_name = $4,
                    seed = $5, rank = $6, points = $7, wins = $8, losses = $9,
                    draws = $10, matches_played = $11, games_won = $12,
                    games_lost = $13, rounds_won = $14, rounds_lost = $15,
                    win_rate = $16, buchholz_score = $17,
                    opponent_win_rate = $18, head_to_head_wins = $19,
                    current_streak = $20, streak_type = $21,
                    longest_win_streak = $22, is_eliminated = $23,
                    eliminated_in_round = $24, eliminated_by = $25,
                    is_disqualified = $26, final_placement = $27, metadata = $28,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(row.id)
            .bind(row.participant_id)
            .bind(row.team_id)
            .bind(&row.display_name)
            .bind(row.seed)
            .bind(row.rank)
            .bind(row.points)
            .bind(row.wins)
            .bind(row.losses)
            .bind(row.draws)
            .bind(row.matches_played)
            .bind(row.games_won)
            .bind(row.games_lost)
            .bind(row.rounds_won)
            .bind(row.rounds_lost)
            .bind(row.win_rate)
            .bind(row.buchholz_score)
            .bind(row.opponent_win_rate)
            .bind(row.head_to_head_wins)
            .bind(row.current_streak)
            .bind(&row.streak_type)
            .bind(row.longest_win_streak)
            .bind(row.is_eliminated)
            .bind(row.eliminated_in_round)
            .bind(row.eliminated_by)
            .bind(row.is_disqualified)
            .bind(row.final_placement)
            .bind(&row.metadata)
            .fetch_optional(ex)
            .await
        })
        .map_err(DbError::from)?;
        let updated =
            updated.ok_or_else(|| DbError::NotFound(format!("standing {}", standing.id)))?;
        Standing::try_from(updated).map_err(EngineError::from)
    }

    async fn delete(&self, id: Uuid) -> EngineResult<()> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM standings WHERE id = $1")
                .bind(id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("standing {}", id)).into());
        }
        Ok(())
    }

    async fn delete_by_tournament(&self, tournament_id: Uuid) -> EngineResult<u64> {
        let result = with_conn!(self.handle, |ex| {
            sqlx::query("DELETE FROM standings WHERE tournament_id = $1")
                .bind(tournament_id)
                .execute(ex)
                .await
        })
        .map_err(DbError::from)?;
        Ok(result.rows_affected())
    }
}
