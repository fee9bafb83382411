//! # Database Migration System
//!
//! Migrations are embedded from the `migrations/` directory at build time and
//! discovered by their `YYYYMMDDHHMMSS_description.sql` file names. sqlx
//! serializes concurrent runs with a Postgres advisory lock and records applied
//! versions in `_sqlx_migrations`, so running them is idempotent.

use sqlx::PgPool;
use tracing::info;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Applies the embedded schema migrations.
pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Run all pending migrations in order
    pub async fn run_all(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(pool).await?;
        info!(
            migrations = MIGRATOR.iter().count(),
            "Database migrations applied"
        );
        Ok(())
    }
}
