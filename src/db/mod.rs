//! Postgres pool setup and the `kv_store` migration runner.
//!
//! Only used when `DATABASE_URL` is set; otherwise the server keeps its
//! state in memory.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to Postgres and bring the `kv_store` table up to date.
///
/// # Errors
///
/// Returns an error if the connection or migrations fail.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    info!(max_connections = MAX_CONNECTIONS, "db: pool ready, migrations applied");

    Ok(pool)
}
