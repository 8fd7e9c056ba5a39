//! diesel-async postgres implementation of the match store (C2, spec §4.2).

pub mod matches;
pub mod participants;
pub mod schema;
pub mod stations;
pub mod store;
pub mod tenants;
pub mod tournaments;

use anyhow::{Context, Result, anyhow};
use app_core::DbError;
use diesel_async::{
    AsyncMigrationHarness, AsyncPgConnection,
    pooled_connection::{
        AsyncDieselConnectionManager,
        bb8::{Pool, PooledConnection},
    },
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{info, instrument, warn};
use url::Url;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub struct PgDb {
    pool: Pool<AsyncPgConnection>,
}

impl PgDb {
    pub async fn new(database: Url) -> Result<Self> {
        let config = AsyncDieselConnectionManager::new(database);
        Ok(PgDb {
            pool: Pool::builder().build(config).await?,
        })
    }

    #[instrument(name = "db.migration", skip(self))]
    pub async fn run_migration(&self) -> DbResult<()> {
        let conn = self.pool.get_owned().await.map_err(|e| DbError::Other(e.to_string()))?;
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut harness = AsyncMigrationHarness::new(conn);
            harness
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| anyhow!("migration failed: {e}"))?;
            Ok(())
        })
        .await
        .context("join error while running migrations")??;

        info!("migrations_applied");
        Ok(())
    }

    #[instrument(name = "db.conn.get", skip(self))]
    pub async fn new_connection(&self) -> DbResult<PooledConnection<'_, AsyncPgConnection>> {
        match self.pool.get().await {
            Ok(conn) => Ok(conn),
            Err(e) => {
                warn!(error = %e, "pool_get_failed");
                Err(DbError::Other(e.to_string()))
            }
        }
    }
}

use app_core::DbResult;
use diesel::result::{DatabaseErrorKind as K, Error as DE};

pub fn map_db_err(e: DE) -> DbError {
    match &e {
        DE::NotFound => DbError::NotFound,
        DE::DatabaseError(kind, info) => {
            let c = info.constraint_name().map(|s| s.to_string());
            match kind {
                K::UniqueViolation => DbError::UniqueViolation(c),
                K::ForeignKeyViolation => DbError::ForeignKeyViolation(c),
                K::CheckViolation => DbError::CheckViolation(c),
                K::SerializationFailure => DbError::SerializationFailure,
                _ => DbError::Other(e.to_string()),
            }
        }
        _ => DbError::Other(e.to_string()),
    }
}
