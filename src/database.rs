use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

use crate::error::Result;

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Applies `migrations/` (board schema: users, posts, comments, vote ledgers).
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
