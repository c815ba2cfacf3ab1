//! Engine configuration
//!
//! Typed settings loaded from the environment (optionally seeded from a
//! `.env` file). The wallet binding is process-wide: one escrow wallet and
//! one default currency per deployment.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the orchestration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Wallet the prize pool is escrowed in; the `from` side of every
    /// transfer.
    pub escrow_wallet_id: String,

    /// Currency used when a tournament does not name one.
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Leaderboard cache TTL while a tournament is active.
    #[serde(default = "default_active_ttl")]
    pub active_leaderboard_ttl_secs: u64,

    /// Leaderboard cache TTL once a tournament is completed.
    #[serde(default = "default_completed_ttl")]
    pub completed_leaderboard_ttl_secs: u64,

    /// Deadline on wallet transfer calls; a timed-out transfer marks the
    /// prize FAILED with reason "timeout".
    #[serde(default = "default_wallet_deadline")]
    pub wallet_deadline_secs: u64,

    /// Upper bound on prize distribution retries.
    #[serde(default = "default_max_retries")]
    pub max_prize_retries: u32,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_active_ttl() -> u64 {
    60
}

fn default_completed_ttl() -> u64 {
    3600
}

fn default_wallet_deadline() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            escrow_wallet_id: "escrow".to_string(),
            default_currency: default_currency(),
            active_leaderboard_ttl_secs: default_active_ttl(),
            completed_leaderboard_ttl_secs: default_completed_ttl(),
            wallet_deadline_secs: default_wallet_deadline(),
            max_prize_retries: default_max_retries(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from `CIRCUIT_`-prefixed environment variables,
    /// reading `.env` first when present.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("CIRCUIT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    pub fn active_leaderboard_ttl(&self) -> Duration {
        Duration::from_secs(self.active_leaderboard_ttl_secs)
    }

    pub fn completed_leaderboard_ttl(&self) -> Duration {
        Duration::from_secs(self.completed_leaderboard_ttl_secs)
    }

    pub fn wallet_deadline(&self) -> Duration {
        Duration::from_secs(self.wallet_deadline_secs)
    }
}
