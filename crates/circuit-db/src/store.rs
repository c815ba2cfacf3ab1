//! PostgreSQL store aggregate
//!
//! One repository per entity behind the `circuit-core` store port.
//! `run` opens a serializable transaction on a dedicated connection and
//! hands the closure a store view whose repositories all execute on that
//! connection; a nested `run` joins the surrounding transaction.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tokio::sync::Mutex;

use circuit_core::{
    BracketRepository, EngineError, EngineResult, MatchRepository, PrizeRepository,
    RegistrationRepository, StandingRepository, Store, TournamentRepository, TxWork,
};

use crate::repositories::{
    PgBracketRepository, PgMatchRepository, PgPrizeRepository, PgRegistrationRepository,
    PgStandingRepository, PgTournamentRepository,
};
use crate::DbError;

/// Where queries execute: the shared pool, or one transaction-bound
/// connection.
#[derive(Clone)]
pub(crate) enum PgHandle {
    Pool(PgPool),
    Conn(Arc<Mutex<PoolConnection<Postgres>>>),
}

/// Run a closure against whichever executor the handle holds.
macro_rules! with_conn {
    ($handle:expr, |$ex:ident| $body:expr) => {
        match &$handle {
            $crate::store::PgHandle::Pool(pool) => {
                let $ex = pool;
                $body
            }
            $crate::store::PgHandle::Conn(conn) => {
                let mut guard = conn.lock().await;
                let $ex = &mut **guard;
                $body
            }
        }
    };
}
pub(crate) use with_conn;

pub struct PgStore {
    pool: PgPool,
    handle: PgHandle,
    tournaments: PgTournamentRepository,
    registrations: PgRegistrationRepository,
    brackets: PgBracketRepository,
    matches: PgMatchRepository,
    standings: PgStandingRepository,
    prizes: PgPrizeRepository,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        let handle = PgHandle::Pool(pool.clone());
        Self::with_handle(pool, handle)
    }

    fn with_handle(pool: PgPool, handle: PgHandle) -> Self {
        Self {
            pool,
            tournaments: PgTournamentRepository::new(handle.clone()),
            registrations: PgRegistrationRepository::new(handle.clone()),
            brackets: PgBracketRepository::new(handle.clone()),
            matches: PgMatchRepository::new(handle.clone()),
            standings: PgStandingRepository::new(handle.clone()),
            prizes: PgPrizeRepository::new(handle.clone()),
            handle,
        }
    }
}

#[async_trait]
impl Store for PgStore {
    fn tournaments(&self) -> &dyn TournamentRepository {
        &self.tournaments
    }

    fn registrations(&self) -> &dyn RegistrationRepository {
        &self.registrations
    }

    fn brackets(&self) -> &dyn BracketRepository {
        &self.brackets
    }

    fn matches(&self) -> &dyn MatchRepository {
        &self.matches
    }

    fn standings(&self) -> &dyn StandingRepository {
        &self.standings
    }

    fn prizes(&self) -> &dyn PrizeRepository {
        &self.prizes
    }

    async fn run(&self, work: TxWork) -> EngineResult<()> {
        // Inside a transaction already: the scope simply joins it.
        if let PgHandle::Conn(_) = &self.handle {
            return work(self).await;
        }

        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| EngineError::from(DbError::from(e)))?;
        let shared = Arc::new(Mutex::new(conn));

        {
            let mut guard = shared.lock().await;
            sqlx::query("BEGIN TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut **guard)
                .await
                .map_err(|e| EngineError::from(DbError::from(e)))?;
        }

        let tx_store = PgStore::with_handle(self.pool.clone(), PgHandle::Conn(shared.clone()));
        let result = work(&tx_store).await;
        drop(tx_store);

        let mut guard = shared.lock().await;
        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut **guard)
                    .await
                    .map_err(|e| EngineError::from(DbError::from(e)))?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut **guard).await {
                    tracing::warn!(error = %rollback, "transaction rollback failed");
                }
                Err(err)
            }
        }
    }
}
