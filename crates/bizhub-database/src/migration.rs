//! Embedded schema migrations.

use sqlx::PgPool;
use tracing::info;

use bizhub_core::error::{AppError, ErrorKind};
use bizhub_core::result::AppResult;

/// Apply every migration under `migrations/` that has not run yet.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::PersistenceFailure,
                format!("Failed to run migrations: {e}"),
                e,
            )
        })?;

    info!("Schema migrations applied");
    Ok(())
}
