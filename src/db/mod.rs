//! Postgres access: pool construction, session audit context, and the row
//! operations the ingestion coordinators drive inside their transactions.

pub mod audit;
pub mod episodes;
pub mod movies;
pub mod series;
pub mod videos;

use crate::error::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| crate::error::Error::Database(e.into()))?;
    Ok(())
}
