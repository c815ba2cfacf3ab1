//! Leaderboard queries behind the read-through cache
//!
//! Keys follow `leaderboard:tournament:{id}:{page}:{limit}:{sort}:{order}`
//! and `leaderboard:global:{game}:{region}:{timeframe}`. Active
//! tournaments cache briefly, completed ones for up to an hour; every
//! standings mutation blows away the tournament prefix and all global
//! keys. The store remains authoritative throughout.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use circuit_core::{
    CacheStore, EngineConfig, EngineError, EngineResult, Page, RegistrationFilter,
    RegistrationOrder, SortDir, Standing, StandingFilter, StandingOrder, Store, TournamentFilter,
    TournamentOrder, TournamentStatus,
};

use crate::standings;
use crate::tx::in_tx;

/// Window for the global leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    All,
    Yearly,
    Monthly,
    Weekly,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::All => "all",
            Timeframe::Yearly => "yearly",
            Timeframe::Monthly => "monthly",
            Timeframe::Weekly => "weekly",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GlobalLeaderboardFilter {
    pub game_id: Option<String>,
    pub region: Option<String>,
    pub timeframe: Option<Timeframe>,
}

/// One aggregated row of the global leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalEntry {
    pub participant_id: Uuid,
    pub display_name: String,
    pub tournaments_played: u32,
    pub championships: u32,
    pub total_points: i64,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
}

/// Lifetime aggregate for one player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStats {
    pub participant_id: Uuid,
    pub tournaments_played: u32,
    pub championships: u32,
    pub matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_points: i64,
    pub best_placement: Option<u32>,
    pub win_rate: f64,
}

/// One line of a player's tournament history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalResult {
    pub tournament_id: Uuid,
    pub tournament_name: String,
    pub placement: Option<u32>,
    pub wins: u32,
    pub losses: u32,
    pub points: i64,
}

fn order_label(order: StandingOrder) -> (&'static str, &'static str) {
    match order {
        StandingOrder::Rank(d) => ("rank", dir_label(d)),
        StandingOrder::Points(d) => ("points", dir_label(d)),
        StandingOrder::Wins(d) => ("wins", dir_label(d)),
        StandingOrder::WinRate(d) => ("win_rate", dir_label(d)),
    }
}

fn dir_label(dir: SortDir) -> &'static str {
    match dir {
        SortDir::Asc => "asc",
        SortDir::Desc => "desc",
    }
}

fn tournament_key(id: Uuid, page: Page, order: StandingOrder) -> String {
    let (sort, dir) = order_label(order);
    format!(
        "leaderboard:tournament:{}:{}:{}:{}:{}",
        id, page.page, page.limit, sort, dir
    )
}

fn tournament_prefix(id: Uuid) -> String {
    format!("leaderboard:tournament:{}:", id)
}

const GLOBAL_PREFIX: &str = "leaderboard:global:";

/// Best-effort invalidation; a cache outage never fails the operation.
pub(crate) async fn invalidate_tournament(cache: &Arc<dyn CacheStore>, tournament_id: Uuid) {
    if let Err(err) = cache.delete_prefix(&tournament_prefix(tournament_id)).await {
        warn!(tournament_id = %tournament_id, error = %err, "leaderboard invalidation failed");
    }
    if let Err(err) = cache.delete_prefix(GLOBAL_PREFIX).await {
        warn!(error = %err, "global leaderboard invalidation failed");
    }
}

pub struct LeaderboardService {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheStore>,
    config: EngineConfig,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn CacheStore>, config: EngineConfig) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Paged, sorted standings through the cache.
    pub async fn tournament_standings(
        &self,
        tournament_id: Uuid,
        page: Page,
        order: StandingOrder,
    ) -> EngineResult<Vec<Standing>> {
        let key = tournament_key(tournament_id, page, order);
        match self.cache.get(&key).await {
            Ok(Some(value)) => {
                if let Ok(cached) = serde_json::from_value::<Vec<Standing>>(value) {
                    return Ok(cached);
                }
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "leaderboard cache read failed"),
        }

        let standings = self.load_standings(tournament_id, page, order).await?;

        let tournament = self
            .store
            .tournaments()
            .find_by_id(tournament_id)
            .await?
            .ok_or_else(|| EngineError::not_found("tournament", tournament_id))?;
        let ttl = if tournament.status == TournamentStatus::Completed {
            self.config.completed_leaderboard_ttl()
        } else {
            self.config.active_leaderboard_ttl()
        };

        match serde_json::to_value(&standings) {
            Ok(value) => {
                if let Err(err) = self.cache.set(&key, &value, ttl).await {
                    warn!(error = %err, "leaderboard cache write failed");
                }
            }
            Err(err) => warn!(error = %err, "leaderboard serialization failed"),
        }
        Ok(standings)
    }

    /// Same query with the cache bypassed.
    pub async fn real_time_standings(
        &self,
        tournament_id: Uuid,
        page: Page,
        order: StandingOrder,
    ) -> EngineResult<Vec<Standing>> {
        self.load_standings(tournament_id, page, order).await
    }

    /// Cross-tournament aggregate, cached under the global prefix.
    pub async fn global_leaderboard(
        &self,
        filter: &GlobalLeaderboardFilter,
        page: Page,
    ) -> EngineResult<Vec<GlobalEntry>> {
        let key = format!(
            "{}{}:{}:{}:{}:{}",
            GLOBAL_PREFIX,
            filter.game_id.as_deref().unwrap_or("*"),
            filter.region.as_deref().unwrap_or("*"),
            filter.timeframe.unwrap_or(Timeframe::All).as_str(),
            page.page,
            page.limit,
        );
        match self.cache.get(&key).await {
            Ok(Some(value)) => {
                if let Ok(cached) = serde_json::from_value::<Vec<GlobalEntry>>(value) {
                    return Ok(cached);
                }
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "global leaderboard cache read failed"),
        }

        let entries = self.aggregate_global(filter, page).await?;
        match serde_json::to_value(&entries) {
            Ok(value) => {
                let ttl = self.config.active_leaderboard_ttl();
                if let Err(err) = self.cache.set(&key, &value, ttl).await {
                    warn!(error = %err, "global leaderboard cache write failed");
                }
            }
            Err(err) => warn!(error = %err, "global leaderboard serialization failed"),
        }
        Ok(entries)
    }

    pub async fn player_stats(&self, participant_id: Uuid) -> EngineResult<PlayerStats> {
        let rows = self.player_standings(participant_id).await?;
        let mut stats = PlayerStats {
            participant_id,
            tournaments_played: 0,
            championships: 0,
            matches_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            total_points: 0,
            best_placement: None,
            win_rate: 0.0,
        };
        for standing in &rows {
            stats.tournaments_played += 1;
            stats.matches_played += standing.matches_played;
            stats.wins += standing.wins;
            stats.losses += standing.losses;
            stats.draws += standing.draws;
            stats.total_points += standing.points;
            let placement = standing.final_placement.or(if standing.rank > 0 {
                Some(standing.rank)
            } else {
                None
            });
            if placement == Some(1) {
                stats.championships += 1;
            }
            stats.best_placement = match (stats.best_placement, placement) {
                (Some(best), Some(p)) => Some(best.min(p)),
                (None, p) => p,
                (best, None) => best,
            };
        }
        if stats.matches_played > 0 {
            stats.win_rate = stats.wins as f64 / stats.matches_played as f64;
        }
        Ok(stats)
    }

    /// Per-tournament history for completed events, newest first.
    pub async fn historical_results(
        &self,
        participant_id: Uuid,
    ) -> EngineResult<Vec<HistoricalResult>> {
        let rows = self.player_standings(participant_id).await?;
        let mut results = Vec::new();
        for standing in rows {
            let tournament = self
                .store
                .tournaments()
                .find_by_id(standing.tournament_id)
                .await?;
            let tournament = match tournament {
                Some(t) if t.status == TournamentStatus::Completed => t,
                _ => continue,
            };
            results.push((
                tournament.end_date.unwrap_or(tournament.updated_at),
                HistoricalResult {
                    tournament_id: tournament.id,
                    tournament_name: tournament.name,
                    placement: standing.final_placement,
                    wins: standing.wins,
                    losses: standing.losses,
                    points: standing.points,
                },
            ));
        }
        results.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(results.into_iter().map(|(_, r)| r).collect())
    }

    /// Full rebuild from the match log, then fresh cache.
    pub async fn recalculate(&self, tournament_id: Uuid) -> EngineResult<Vec<Standing>> {
        let tournament = self
            .store
            .tournaments()
            .find_by_id(tournament_id)
            .await?
            .ok_or_else(|| EngineError::not_found("tournament", tournament_id))?;
        let format = tournament.format;
        let standings = in_tx(&self.store, move |s| {
            Box::pin(async move {
                standings::recalculate(s, tournament_id, format).await?;
                standings::all_standings(s, tournament_id).await
            })
        })
        .await?;
        invalidate_tournament(&self.cache, tournament_id).await;
        Ok(standings)
    }

    /// Explicit Buchholz pass, then fresh cache.
    pub async fn buchholz(&self, tournament_id: Uuid) -> EngineResult<Vec<Standing>> {
        let standings = in_tx(&self.store, move |s| {
            Box::pin(async move {
                standings::recompute_tiebreaks(s, tournament_id).await?;
                standings::all_standings(s, tournament_id).await
            })
        })
        .await?;
        invalidate_tournament(&self.cache, tournament_id).await;
        Ok(standings)
    }

    async fn load_standings(
        &self,
        tournament_id: Uuid,
        page: Page,
        order: StandingOrder,
    ) -> EngineResult<Vec<Standing>> {
        self.store
            .standings()
            .find_many(
                &StandingFilter {
                    tournament_id: Some(tournament_id),
                    ..Default::default()
                },
                order,
                page,
            )
            .await
    }

    async fn player_standings(&self, participant_id: Uuid) -> EngineResult<Vec<Standing>> {
        self.store
            .standings()
            .find_many(
                &StandingFilter {
                    participant_id: Some(participant_id),
                    ..Default::default()
                },
                StandingOrder::default(),
                Page::all(),
            )
            .await
    }

    async fn aggregate_global(
        &self,
        filter: &GlobalLeaderboardFilter,
        page: Page,
    ) -> EngineResult<Vec<GlobalEntry>> {
        let cutoff = match filter.timeframe.unwrap_or(Timeframe::All) {
            Timeframe::All => None,
            Timeframe::Yearly => Some(Utc::now() - Duration::days(365)),
            Timeframe::Monthly => Some(Utc::now() - Duration::days(30)),
            Timeframe::Weekly => Some(Utc::now() - Duration::days(7)),
        };

        let tournaments = self
            .store
            .tournaments()
            .find_many(
                &TournamentFilter {
                    game_id: filter.game_id.clone(),
                    statuses: Some(vec![
                        TournamentStatus::InProgress,
                        TournamentStatus::Completed,
                    ]),
                    ..Default::default()
                },
                TournamentOrder::default(),
                Page::all(),
            )
            .await?;

        let mut entries: HashMap<Uuid, GlobalEntry> = HashMap::new();
        for tournament in tournaments {
            let reference = tournament.end_date.unwrap_or(tournament.updated_at);
            if let Some(cutoff) = cutoff {
                if reference < cutoff {
                    continue;
                }
            }

            // Region filter resolves through the tournament's registrations.
            let allowed: Option<std::collections::HashSet<Uuid>> = match &filter.region {
                Some(region) => {
                    let regs = self
                        .store
                        .registrations()
                        .find_many(
                            &RegistrationFilter {
                                tournament_id: Some(tournament.id),
                                ..Default::default()
                            },
                            RegistrationOrder::CreatedAt(SortDir::Asc),
                            Page::all(),
                        )
                        .await?;
                    Some(
                        regs.into_iter()
                            .filter(|r| r.region.as_deref() == Some(region.as_str()))
                            .map(|r| r.participant_id)
                            .collect(),
                    )
                }
                None => None,
            };

            for standing in standings::all_standings(self.store.as_ref(), tournament.id).await? {
                if let Some(allowed) = &allowed {
                    if !allowed.contains(&standing.participant_id) {
                        continue;
                    }
                }
                let entry =
                    entries
                        .entry(standing.participant_id)
                        .or_insert_with(|| GlobalEntry {
                            participant_id: standing.participant_id,
                            display_name: standing.display_name.clone(),
                            tournaments_played: 0,
                            championships: 0,
                            total_points: 0,
                            wins: 0,
                            losses: 0,
                            win_rate: 0.0,
                        });
                entry.tournaments_played += 1;
                entry.total_points += standing.points;
                entry.wins += standing.wins;
                entry.losses += standing.losses;
                if standing.final_placement == Some(1) {
                    entry.championships += 1;
                }
            }
        }

        let mut entries: Vec<GlobalEntry> = entries.into_values().collect();
        for entry in entries.iter_mut() {
            let played = entry.wins + entry.losses;
            entry.win_rate = if played > 0 {
                entry.wins as f64 / played as f64
            } else {
                0.0
            };
        }
        entries.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then(b.wins.cmp(&a.wins))
                .then(a.display_name.cmp(&b.display_name))
        });

        let start = (page.offset() as usize).min(entries.len());
        let end = (start + page.limit as usize).min(entries.len());
        Ok(entries[start..end].to_vec())
    }
}
